//! quality.rs — Heuristic reply-quality scoring.
//!
//! Four bounded metrics over a candidate reply: vocabulary overlap with the
//! conversation, empathy signals, actionable-advice signals, and thematic
//! consistency with the user's message. The composite score is their plain
//! arithmetic mean (no learned weighting, a deliberate simplification).
//!
//! Raw metric math may produce NaN (a 0/0 theme ratio); callers go through
//! `analyze`, which routes every value through `QualityMetrics::sanitized`
//! so nothing outside <0.0, 1.0> ever escapes this module.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::candidate::{QualityMetrics, NEUTRAL_CONFIDENCE};

/// Fixed theme vocabulary for the consistency metric, matched as
/// case-insensitive substrings.
const THEMES: [&str; 10] = [
    "anxiety",
    "stress",
    "depression",
    "sleep",
    "work",
    "relationship",
    "family",
    "health",
    "future",
    "emotion",
];

static EMPATHY_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)understand|hear you|must be|feel").expect("valid empathy pattern"),
        Regex::new(r"(?i)support|help|guide|assist").expect("valid empathy pattern"),
        Regex::new(r"(?m)\?$").expect("valid empathy pattern"),
        Regex::new(r"(?i)let's|we can|together").expect("valid empathy pattern"),
    ]
});

static ACTION_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)try|practice|consider|suggest").expect("valid action pattern"),
        Regex::new(r"(?m)\d\.|^\s*-").expect("valid action pattern"),
        Regex::new(r"(?i)first|then|next|finally").expect("valid action pattern"),
        Regex::new(r"(?i)could|would|might|can").expect("valid action pattern"),
    ]
});

/// Result of scoring one reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    /// Mean of the four sanitized metrics, in <0.0, 1.0>.
    pub score: f32,
    pub metrics: QualityMetrics,
}

impl QualityReport {
    /// The default report when there is nothing to score.
    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_CONFIDENCE,
            metrics: QualityMetrics::uniform(NEUTRAL_CONFIDENCE),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Scores `response` against the user's `message` and the rendered
    /// conversation `context`. Relevance looks at message and context
    /// combined; consistency compares themes against the message alone.
    pub fn analyze(&self, response: &str, message: &str, context: &str) -> QualityReport {
        if response.is_empty() {
            return QualityReport::neutral();
        }

        let combined = format!("{message} {context}");
        let metrics = QualityMetrics {
            context_relevance: context_relevance(response, &combined),
            emotional_support: emotional_support(response),
            actionability: actionability(response),
            consistency: consistency(response, message),
        }
        .sanitized();

        // Mean of sanitized values is already in range.
        QualityReport {
            score: metrics.overall(),
            metrics,
        }
    }
}

/// Response tokens found in the unique context-token set, counted with
/// multiplicity, normalized by sqrt of the unique context-token count.
/// Tokens are lowercased whitespace splits; punctuation stays attached.
pub fn context_relevance(response: &str, context: &str) -> f32 {
    if response.is_empty() || context.is_empty() {
        return NEUTRAL_CONFIDENCE;
    }
    let ctx_lower = context.to_lowercase();
    let context_words: HashSet<&str> = ctx_lower.split_whitespace().collect();
    let resp_lower = response.to_lowercase();
    let matches = resp_lower
        .split_whitespace()
        .filter(|w| context_words.contains(w))
        .count();
    cap1(matches as f32 / (context_words.len() as f32).sqrt())
}

/// Fraction of the four empathy patterns present, plus a 0.3 floor.
pub fn emotional_support(response: &str) -> f32 {
    if response.is_empty() {
        return NEUTRAL_CONFIDENCE;
    }
    let matched = EMPATHY_PATTERNS
        .iter()
        .filter(|p| p.is_match(response))
        .count();
    cap1(matched as f32 / EMPATHY_PATTERNS.len() as f32 + 0.3)
}

/// Fraction of the four advice patterns present, plus a 0.2 floor.
pub fn actionability(response: &str) -> f32 {
    if response.is_empty() {
        return NEUTRAL_CONFIDENCE;
    }
    let matched = ACTION_PATTERNS
        .iter()
        .filter(|p| p.is_match(response))
        .count();
    cap1(matched as f32 / ACTION_PATTERNS.len() as f32 + 0.2)
}

/// Share of the message's themes that the response picks up, plus a 0.5
/// floor. Empty inputs short-circuit to 0.7. A message with no themes makes
/// the ratio 0/0; the NaN is left for the sanitation step.
pub fn consistency(response: &str, message: &str) -> f32 {
    if response.is_empty() || message.is_empty() {
        return 0.7;
    }
    let message_themes = extract_themes(message);
    let response_themes = extract_themes(response);
    let common = message_themes
        .iter()
        .filter(|t| response_themes.contains(t))
        .count();
    cap1(common as f32 / message_themes.len() as f32 + 0.5)
}

fn extract_themes(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    THEMES
        .iter()
        .copied()
        .filter(|t| lowered.contains(*t))
        .collect()
}

/// Caps at 1.0 while letting NaN through (unlike `f32::min`, which would
/// swallow it).
fn cap1(x: f32) -> f32 {
    if x > 1.0 {
        1.0
    } else {
        x
    }
}

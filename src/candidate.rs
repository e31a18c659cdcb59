//! candidate.rs — Core value types for response arbitration.
//!
//! Every source (scripted engine, generative providers, fallback) produces a
//! `Candidate`: the reply text, where it came from, how confident we are in
//! it, and the per-reply quality metrics. The arbiter compares candidates by
//! confidence only; metrics travel along for explainability and the API
//! response shape.

use serde::{Deserialize, Serialize};

/// Where a candidate reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Scripted,
    HuggingFace,
    Gemini,
    Fallback,
}

impl Source {
    /// Stable label for logs and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Scripted => "scripted",
            Source::HuggingFace => "huggingface",
            Source::Gemini => "gemini",
            Source::Fallback => "fallback",
        }
    }
}

/// Per-reply quality metrics, each in <0.0, 1.0> after sanitation.
///
/// Field names serialize in camelCase because the chat frontend consumes
/// them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub context_relevance: f32,
    pub emotional_support: f32,
    pub actionability: f32,
    pub consistency: f32,
}

impl QualityMetrics {
    /// All four metrics set to the same value. Used for the fallback reply
    /// and as the neutral default when scoring fails.
    pub fn uniform(v: f32) -> Self {
        Self {
            context_relevance: v,
            emotional_support: v,
            actionability: v,
            consistency: v,
        }
    }

    /// Coerces every metric into <0.0, 1.0>, mapping NaN to the neutral 0.5.
    /// This is the single sanitation point; raw metric math may produce NaN
    /// (e.g. a 0/0 theme ratio) and relies on it.
    pub fn sanitized(self) -> Self {
        Self {
            context_relevance: sanitize_metric(self.context_relevance),
            emotional_support: sanitize_metric(self.emotional_support),
            actionability: sanitize_metric(self.actionability),
            consistency: sanitize_metric(self.consistency),
        }
    }

    /// Arithmetic mean of the four metrics. Unweighted on purpose; callers
    /// sanitize first so the result is always in <0.0, 1.0>.
    pub fn overall(&self) -> f32 {
        (self.context_relevance + self.emotional_support + self.actionability + self.consistency)
            / 4.0
    }
}

/// One reply competing for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub source: Source,
    /// Confidence in <0.0, 1.0>. For generative sources this is the overall
    /// quality score; for scripted replies it comes from the trigger config.
    pub confidence: f32,
    pub metrics: QualityMetrics,
}

/// Reply of last resort when every source comes back empty.
pub const FALLBACK_TEXT: &str =
    "I'm here to listen. Could you tell me a little more about what's on your mind?";

/// Neutral confidence assigned to the fallback reply and to unscorable metrics.
pub const NEUTRAL_CONFIDENCE: f32 = 0.5;

impl Candidate {
    pub fn new(source: Source, text: impl Into<String>, confidence: f32, metrics: QualityMetrics) -> Self {
        Self {
            text: text.into(),
            source,
            confidence: clamp01(confidence),
            metrics: metrics.sanitized(),
        }
    }

    /// The fixed fallback candidate: neutral confidence, neutral metrics.
    pub fn fallback() -> Self {
        Self::new(
            Source::Fallback,
            FALLBACK_TEXT,
            NEUTRAL_CONFIDENCE,
            QualityMetrics::uniform(NEUTRAL_CONFIDENCE),
        )
    }
}

/// NaN becomes the neutral 0.5, everything else clamps into <0.0, 1.0>.
pub fn sanitize_metric(x: f32) -> f32 {
    if x.is_nan() {
        NEUTRAL_CONFIDENCE
    } else {
        clamp01(x)
    }
}

fn clamp01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_candidate_shape_matches_frontend_contract() {
        let c = Candidate::new(
            Source::Gemini,
            "You are not alone in this.",
            0.78,
            QualityMetrics {
                context_relevance: 0.6,
                emotional_support: 0.8,
                actionability: 0.45,
                consistency: 0.7,
            },
        );

        let v: serde_json::Value = serde_json::to_value(&c).unwrap();

        assert_eq!(v["source"], serde_json::json!("gemini"));
        assert_eq!(v["text"], serde_json::json!("You are not alone in this."));

        let conf = v["confidence"].as_f64().unwrap();
        assert!((conf - 0.78).abs() < 1e-6, "confidence ~= 0.78, got {}", conf);

        // camelCase metric keys, exactly as the frontend reads them.
        let m = &v["metrics"];
        assert!(m["contextRelevance"].is_number());
        assert!(m["emotionalSupport"].is_number());
        assert!(m["actionability"].is_number());
        assert!(m["consistency"].is_number());
    }

    #[test]
    fn sources_serialize_lowercase() {
        for (src, want) in [
            (Source::Scripted, "scripted"),
            (Source::HuggingFace, "huggingface"),
            (Source::Gemini, "gemini"),
            (Source::Fallback, "fallback"),
        ] {
            let v = serde_json::to_value(src).unwrap();
            assert_eq!(v, serde_json::json!(want));
            assert_eq!(src.as_str(), want);
        }
    }

    #[test]
    fn sanitize_coerces_nan_and_out_of_range() {
        assert!((sanitize_metric(f32::NAN) - 0.5).abs() < 1e-6);
        assert!((sanitize_metric(-0.3) - 0.0).abs() < 1e-6);
        assert!((sanitize_metric(1.7) - 1.0).abs() < 1e-6);
        assert!((sanitize_metric(0.42) - 0.42).abs() < 1e-6);
    }

    #[test]
    fn candidate_ctor_clamps_confidence_and_metrics() {
        let c = Candidate::new(
            Source::Scripted,
            "hi",
            1.5,
            QualityMetrics {
                context_relevance: f32::NAN,
                emotional_support: 2.0,
                actionability: -1.0,
                consistency: 0.9,
            },
        );
        assert!((c.confidence - 1.0).abs() < 1e-6);
        assert!((c.metrics.context_relevance - 0.5).abs() < 1e-6);
        assert!((c.metrics.emotional_support - 1.0).abs() < 1e-6);
        assert!((c.metrics.actionability - 0.0).abs() < 1e-6);
        assert!((c.metrics.consistency - 0.9).abs() < 1e-6);
    }

    #[test]
    fn fallback_is_neutral() {
        let f = Candidate::fallback();
        assert_eq!(f.source, Source::Fallback);
        assert!((f.confidence - 0.5).abs() < 1e-6);
        assert!((f.metrics.overall() - 0.5).abs() < 1e-6);
        assert!(!f.text.is_empty());
    }
}

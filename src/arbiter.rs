//! arbiter.rs — Multi-source response selection.
//!
//! One scripted engine and two generative providers compete for every user
//! message. A high-confidence scripted reply answers immediately without
//! touching the network; otherwise both providers run concurrently, every
//! reply gets a quality score, and the highest confidence wins. The whole
//! path is infallible: when nothing usable comes back, a fixed fallback
//! reply is served at neutral confidence.

use std::time::Instant;

use metrics::{counter, histogram};

use crate::candidate::{Candidate, Source};
use crate::prompt;
use crate::providers::DynProvider;
use crate::quality::QualityScorer;
use crate::script::ScriptHandle;
use crate::transcript::Turn;

/// Scripted replies above this confidence answer immediately and the
/// generative providers are never called. Strictly greater: a trigger at
/// exactly 0.8 still competes with the pool.
pub const SCRIPT_SHORT_CIRCUIT: f32 = 0.8;

pub struct ResponseArbiter {
    script: ScriptHandle,
    gemini: DynProvider,
    hugging_face: DynProvider,
    scorer: QualityScorer,
}

impl ResponseArbiter {
    pub fn new(script: ScriptHandle, gemini: DynProvider, hugging_face: DynProvider) -> Self {
        Self {
            script,
            gemini,
            hugging_face,
            scorer: QualityScorer::new(),
        }
    }

    /// Picks the best reply to `message` given the recent conversation turns.
    ///
    /// `user_id` only feeds the scripted engine's stable variant pick, so the
    /// same user keeps getting the same phrasing for the same trigger.
    pub async fn select_best_response(
        &self,
        user_id: &str,
        message: &str,
        context: &[Turn],
    ) -> Candidate {
        let started = Instant::now();

        let context_text = prompt::render_recent_context(context);

        // Scripted replies keep their configured confidence; the scorer only
        // fills in the metrics breakdown.
        let scripted = self.script.reply(user_id, message).map(|reply| {
            let report = self.scorer.analyze(&reply.text, message, &context_text);
            Candidate::new(
                Source::Scripted,
                reply.text,
                reply.confidence,
                report.metrics,
            )
        });

        if let Some(c) = &scripted {
            if c.confidence > SCRIPT_SHORT_CIRCUIT {
                counter!("chat_scripted_shortcircuit_total").increment(1);
                counter!("chat_source_wins_total", "source" => c.source.as_str()).increment(1);
                tracing::debug!(confidence = c.confidence, "scripted short-circuit");
                histogram!("chat_selection_ms").record(started.elapsed().as_millis() as f64);
                return c.clone();
            }
        }

        // Each provider absorbs its own failures and yields None, so a slow
        // or broken provider never sinks the request.
        let (gemini_text, hf_text) = tokio::join!(
            self.gemini.generate(message, &context_text),
            self.hugging_face.generate(message, &context_text)
        );

        let mut pool = Vec::with_capacity(3);
        if let Some(c) = scripted {
            pool.push(c);
        }
        if let Some(text) = gemini_text {
            pool.push(self.scored(Source::Gemini, text, message, &context_text));
        }
        if let Some(text) = hf_text {
            pool.push(self.scored(Source::HuggingFace, text, message, &context_text));
        }

        let best = pick_best(pool).unwrap_or_else(|| {
            counter!("chat_fallback_total").increment(1);
            tracing::warn!("no usable candidate, serving fallback");
            Candidate::fallback()
        });

        counter!("chat_source_wins_total", "source" => best.source.as_str()).increment(1);
        tracing::debug!(
            source = best.source.as_str(),
            confidence = best.confidence,
            "response selected"
        );
        histogram!("chat_selection_ms").record(started.elapsed().as_millis() as f64);
        best
    }

    fn scored(&self, source: Source, text: String, message: &str, context_text: &str) -> Candidate {
        let report = self.scorer.analyze(&text, message, context_text);
        Candidate::new(source, text, report.score, report.metrics)
    }
}

/// Highest confidence wins; ties keep the earlier candidate, so pool order
/// (scripted, gemini, huggingface) doubles as the tie-break.
pub fn pick_best(pool: Vec<Candidate>) -> Option<Candidate> {
    pool.into_iter().reduce(|best, next| {
        if next.confidence > best.confidence {
            next
        } else {
            best
        }
    })
}

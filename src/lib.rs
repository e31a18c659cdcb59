// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod arbiter;
pub mod candidate;
pub mod config;
pub mod metrics;
pub mod prompt;
pub mod providers;
pub mod quality;
pub mod script;
pub mod transcript;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::arbiter::{pick_best, ResponseArbiter, SCRIPT_SHORT_CIRCUIT};
pub use crate::candidate::{Candidate, QualityMetrics, Source};
pub use crate::quality::{QualityReport, QualityScorer};
pub use crate::transcript::{TranscriptStore, Turn};

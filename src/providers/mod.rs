//! Generative reply providers.
//!
//! Each provider is a remote LLM behind its own HTTP client. Implementations
//! absorb their own failures: transport errors, bad status codes and
//! unusable bodies all log a warning, bump the failure counter and yield
//! `None`, which the arbiter treats as "no candidate from this source".

pub mod gemini;
pub mod huggingface;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Generates a reply to `message` given the rendered conversation
    /// `context`, or `None` on any failure.
    async fn generate(&self, message: &str, context: &str) -> Option<String>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Trait object alias used by the arbiter and the provider factory.
pub type DynProvider = Arc<dyn GenerativeProvider>;

/// Retry behavior shared by the HTTP providers: a fixed delay between a
/// fixed number of re-attempts after the first call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Per-request timeout applied to both provider clients.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("solace-chat-engine/0.1")
        .timeout(timeout)
        .build()
        .expect("reqwest client")
}

/// Always returns `None`. Stands in for a provider that is switched off in
/// config or missing its API key.
pub struct DisabledProvider {
    name: &'static str,
}

impl DisabledProvider {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl GenerativeProvider for DisabledProvider {
    async fn generate(&self, _message: &str, _context: &str) -> Option<String> {
        tracing::debug!(provider = self.name, "provider disabled, skipping");
        None
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Deterministic provider returning a fixed reply. Used by the mock run mode
/// and by tests.
pub struct FixedReplyProvider {
    name: &'static str,
    reply: String,
}

impl FixedReplyProvider {
    pub fn new(name: &'static str, reply: impl Into<String>) -> Self {
        Self {
            name,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl GenerativeProvider for FixedReplyProvider {
    async fn generate(&self, _message: &str, _context: &str) -> Option<String> {
        Some(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

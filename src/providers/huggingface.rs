//! huggingface.rs — Hugging Face Inference API client.
//!
//! Calls the hosted conversational model with the raw user message; the
//! model takes no conversation context. Transport and HTTP-status errors are
//! retried per [`RetryPolicy`]; a 200 with no usable generation is not.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::{build_http_client, GenerativeProvider, RetryPolicy};

pub const DEFAULT_MODEL: &str = "facebook/blenderbot-400M-distill";
const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParams,
}

#[derive(Serialize)]
struct GenerateParams {
    do_sample: bool,
    max_length: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            do_sample: true,
            max_length: 200,
            temperature: 0.7,
            top_k: 50,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: Option<String>,
}

/// First non-empty generation in the response body, if any.
fn extract_generated_text(body: &[Generation]) -> Option<String> {
    let text = body.first()?.generated_text.clone()?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub struct HuggingFaceProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl HuggingFaceProvider {
    pub fn new(api_key: String, model: Option<&str>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            http: build_http_client(timeout),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            retry,
        }
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_once(&self, message: &str) -> Result<Option<String>> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let req = GenerateRequest {
            inputs: message,
            parameters: GenerateParams::default(),
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        let body: Vec<Generation> = resp.json().await?;
        Ok(extract_generated_text(&body))
    }
}

#[async_trait]
impl GenerativeProvider for HuggingFaceProvider {
    async fn generate(&self, message: &str, _context: &str) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.call_once(message).await {
                Ok(Some(text)) => return Some(text),
                Ok(None) => {
                    tracing::warn!(provider = self.name(), "no generation in response");
                    counter!("provider_failures_total").increment(1);
                    return None;
                }
                Err(e) => {
                    if attempt <= self.retry.max_retries {
                        tracing::debug!(
                            provider = self.name(),
                            attempt,
                            error = ?e,
                            "retrying generative call"
                        );
                        tokio::time::sleep(self.retry.retry_delay).await;
                        continue;
                    }
                    tracing::warn!(error = ?e, provider = self.name(), "provider error");
                    counter!("provider_failures_total").increment(1);
                    return None;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

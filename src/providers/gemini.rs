//! gemini.rs — Google Gemini `generateContent` client.
//!
//! The only provider that sees conversation context: the message and the
//! rendered history are folded into an instruction prompt, and the returned
//! text gets the markdown emphasis pass before anyone scores it. The API key
//! travels as a query parameter, which is how this endpoint authenticates.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::{build_http_client, GenerativeProvider, RetryPolicy};
use crate::prompt::{build_instruction_prompt, format_markdown};

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            max_output_tokens: 250,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ReplyCandidate>,
}

#[derive(Debug, Deserialize)]
struct ReplyCandidate {
    #[serde(default)]
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

/// Text of the first candidate part; every level of the response is
/// optional, so a partial body degrades to `None` instead of a parse error.
fn extract_reply_text(resp: &GenerateResponse) -> Option<String> {
    let text = resp
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .first()?
        .text
        .clone()?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiProvider {
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

    async fn call_once(&self, prompt: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/v1/models/{}:generateContent",
            self.base_url, self.model
        );
        let req = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
        };
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        let body: GenerateResponse = resp.json().await?;
        Ok(extract_reply_text(&body))
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate(&self, message: &str, context: &str) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }

        let prompt = build_instruction_prompt(message, context);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.call_once(&prompt).await {
                Ok(Some(text)) => {
                    let formatted = format_markdown(&text);
                    if formatted.is_empty() {
                        tracing::warn!(provider = self.name(), "generation formatted to empty text");
                        counter!("provider_failures_total").increment(1);
                        return None;
                    }
                    return Some(formatted);
                }
                Ok(None) => {
                    tracing::warn!(provider = self.name(), "no candidate in response");
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
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_generate_content_shape() {
        let req = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "the prompt" }],
            }],
            generation_config: GenerationConfig::default(),
        };
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["contents"][0]["role"], serde_json::json!("user"));
        assert_eq!(
            v["contents"][0]["parts"][0]["text"],
            serde_json::json!("the prompt")
        );

        let g = &v["generationConfig"];
        assert_eq!(g["maxOutputTokens"], serde_json::json!(250));
        assert!((g["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((g["topP"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn extracts_first_candidate_part() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "You are not alone."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            extract_reply_text(&body).as_deref(),
            Some("You are not alone.")
        );
    }

    #[test]
    fn tolerates_partial_response_bodies() {
        for raw in [
            r#"{}"#,
            r#"{"candidates": []}"#,
            r#"{"candidates": [{}]}"#,
            r#"{"candidates": [{"content": {}}]}"#,
            r#"{"candidates": [{"content": {"parts": []}}]}"#,
            r#"{"candidates": [{"content": {"parts": [{}]}}]}"#,
            r#"{"candidates": [{"content": {"parts": [{"text": ""}]}}]}"#,
        ] {
            let body: GenerateResponse = serde_json::from_str(raw).unwrap();
            assert_eq!(extract_reply_text(&body), None, "for body {raw}");
        }
    }
}

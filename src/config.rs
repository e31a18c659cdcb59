//! config.rs — Provider settings (`config/providers.json`) and client wiring.

use std::sync::Arc;
use std::time::Duration;
use std::{env, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::providers::gemini::GeminiProvider;
use crate::providers::huggingface::HuggingFaceProvider;
use crate::providers::{DisabledProvider, DynProvider, FixedReplyProvider, RetryPolicy};

pub const DEFAULT_PROVIDERS_CONFIG_PATH: &str = "config/providers.json";
pub const ENV_PROVIDERS_CONFIG_PATH: &str = "PROVIDERS_CONFIG_PATH";

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Model identifier; absent keeps the provider's built-in default.
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from HUGGINGFACE_API_KEY / GEMINI_API_KEY.
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: None,
            api_key: "ENV".to_string(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ProviderSettings {
    /// Resolve the "ENV" sentinel for an enabled provider.
    fn resolve_api_key(&mut self, var: &str) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key =
                env::var(var).map_err(|_| anyhow::anyhow!("Missing {var} env var"))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub huggingface: ProviderSettings,
    #[serde(default)]
    pub gemini: ProviderSettings,
}

impl ProvidersConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: ProvidersConfig = serde_json::from_str(&data)?;
        cfg.huggingface.resolve_api_key("HUGGINGFACE_API_KEY")?;
        cfg.gemini.resolve_api_key("GEMINI_API_KEY")?;
        Ok(cfg)
    }

    /// Load from `PROVIDERS_CONFIG_PATH` (default `config/providers.json`).
    /// Any load or key-resolution failure downgrades to an all-disabled
    /// config; the service still boots and answers from script + fallback.
    pub fn load_or_disabled() -> Self {
        let path = env::var(ENV_PROVIDERS_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_PROVIDERS_CONFIG_PATH.to_string());
        match Self::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    path = %path,
                    "providers config not loaded, generative providers disabled"
                );
                Self::default()
            }
        }
    }
}

/// Factory: build the (gemini, huggingface) client pair from config and
/// environment.
///
/// * If `CHAT_TEST_MODE=mock`, returns deterministic fixed-reply clients.
/// * A disabled entry or an empty key yields a [`DisabledProvider`].
pub fn build_providers(cfg: &ProvidersConfig) -> (DynProvider, DynProvider) {
    if env::var("CHAT_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let gemini: DynProvider = Arc::new(FixedReplyProvider::new(
            "gemini",
            "I'm here with you. What's been weighing on you today? (mock)",
        ));
        let huggingface: DynProvider = Arc::new(FixedReplyProvider::new(
            "huggingface",
            "That sounds really tough. I'm listening. (mock)",
        ));
        return (gemini, huggingface);
    }

    let gemini: DynProvider = if cfg.gemini.enabled && !cfg.gemini.api_key.is_empty() {
        Arc::new(GeminiProvider::new(
            cfg.gemini.api_key.clone(),
            cfg.gemini.model.as_deref(),
            cfg.gemini.timeout(),
            cfg.gemini.retry_policy(),
        ))
    } else {
        Arc::new(DisabledProvider::new("gemini"))
    };

    let huggingface: DynProvider = if cfg.huggingface.enabled && !cfg.huggingface.api_key.is_empty()
    {
        Arc::new(HuggingFaceProvider::new(
            cfg.huggingface.api_key.clone(),
            cfg.huggingface.model.as_deref(),
            cfg.huggingface.timeout(),
            cfg.huggingface.retry_policy(),
        ))
    } else {
        Arc::new(DisabledProvider::new("huggingface"))
    };

    (gemini, huggingface)
}

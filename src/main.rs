//! Chat Response Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the scripted engine, generative
//! providers, transcript store, and middleware.
//!
//! See `README.md` for quickstart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use solace_chat_engine::api::{self, AppState};
use solace_chat_engine::arbiter::ResponseArbiter;
use solace_chat_engine::config::{build_providers, ProvidersConfig};
use solace_chat_engine::metrics::Metrics;
use solace_chat_engine::script::{
    start_hot_reload_thread, ScriptEngine, ScriptHandle, DEFAULT_SCRIPT_CONFIG_PATH,
    ENV_SCRIPT_CONFIG_PATH,
};
use solace_chat_engine::transcript::{TranscriptStore, IDLE_CHAT_MAX_AGE_DAYS};

/// How often the idle-chat purge sweep runs.
const PURGE_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("solace_chat_engine=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    // This enables SCRIPT_CONFIG_PATH / PROVIDERS_CONFIG_PATH and the
    // provider API keys from .env.
    let _ = dotenvy::dotenv();

    init_tracing();

    // Install the recorder before the first counter is touched.
    let metrics = Metrics::init();

    // --- Scripted engine (plus dev-only hot reload) ---
    let script = ScriptHandle::new(ScriptEngine::load_or_builtin());
    let script_path = std::env::var(ENV_SCRIPT_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCRIPT_CONFIG_PATH));
    start_hot_reload_thread(script.clone(), script_path);

    // --- Generative providers ---
    let cfg = ProvidersConfig::load_or_disabled();
    let (gemini, hugging_face) = build_providers(&cfg);

    let arbiter = Arc::new(ResponseArbiter::new(script, gemini, hugging_face));
    let transcripts = Arc::new(TranscriptStore::new());

    spawn_purge_task(transcripts.clone());

    let state = AppState {
        arbiter,
        transcripts,
    };
    let router = api::create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "chat response service ready");

    axum::serve(listener, router).await?;
    Ok(())
}

/// Daily sweep deleting chats idle past the retention window.
fn spawn_purge_task(transcripts: Arc<TranscriptStore>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(PURGE_SWEEP_INTERVAL);
        // The first tick fires immediately; a sweep at startup is fine.
        loop {
            tick.tick().await;
            let removed =
                transcripts.purge_idle(Duration::from_secs(IDLE_CHAT_MAX_AGE_DAYS * 86_400));
            if removed > 0 {
                tracing::info!(removed, "purged idle chats");
            }
        }
    });
}

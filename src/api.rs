//! api.rs — HTTP surface: the chat endpoint, per-user history, health.
//!
//! Input validation lives here; selection logic lives in `arbiter`. Raw chat
//! text never reaches the logs, only a short hashed id.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use metrics::counter;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::arbiter::ResponseArbiter;
use crate::candidate::{QualityMetrics, Source};
use crate::transcript::{Chat, TranscriptStore, Turn};

/// Raw message length cap, counted in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub arbiter: Arc<ResponseArbiter>,
    pub transcripts: Arc<TranscriptStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/chat", post(chat))
        .route("/api/chat/history/{user_id}", get(history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    user_id: String,
    #[serde(default)]
    chat_id: Option<String>,
    message: String,
}

#[derive(serde::Serialize)]
struct ChatResponse {
    response: String,
    source: Source,
    confidence: f32,
    metrics: QualityMetrics,
    timestamp: String,
    chat_id: String,
}

type Rejection = (StatusCode, Json<serde_json::Value>);

fn reject(status: StatusCode, msg: &str) -> Rejection {
    (status, Json(json!({ "error": msg })))
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, Rejection> {
    if body.message.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "Message cannot be empty"));
    }
    if body.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Message too long (max 500 characters)",
        ));
    }

    // Resolve the chat before selecting a reply; an unknown id is the
    // client's problem, not a reason to burn provider calls.
    let (chat_id, context) = match &body.chat_id {
        Some(id) => match state.transcripts.context_snapshot(id) {
            Some(turns) => (id.clone(), turns),
            None => return Err(reject(StatusCode::NOT_FOUND, "Chat not found")),
        },
        None => (state.transcripts.create_chat(&body.user_id), Vec::new()),
    };

    counter!("chat_requests_total").increment(1);
    tracing::info!(
        msg_id = %anon_hash(&body.message),
        user = %anon_hash(&body.user_id),
        "chat request"
    );

    let best = state
        .arbiter
        .select_best_response(&body.user_id, &body.message, &context)
        .await;

    let appended = state.transcripts.append_exchange(
        &chat_id,
        Turn::user(body.message),
        Turn::bot_reply(&best),
    );
    if !appended {
        // The chat existed moments ago, so the purge sweep raced us.
        return Err(reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        ));
    }

    Ok(Json(ChatResponse {
        response: best.text,
        source: best.source,
        confidence: best.confidence,
        metrics: best.metrics,
        timestamp: Utc::now().to_rfc3339(),
        chat_id,
    }))
}

async fn history(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<Vec<Chat>> {
    Json(state.transcripts.history_for_user(&user_id))
}

/// Short stable hash for log lines, so chat text stays out of the logs.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

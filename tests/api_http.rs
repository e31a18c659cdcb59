// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with the
// scripted engine and providers wired from inline fakes.
//
// Covered:
// - GET /health
// - POST /api/chat  (validation 400s, 404, happy path contract, scripted path)
// - GET /api/chat/history/{user_id}

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use solace_chat_engine::api::{self, AppState};
use solace_chat_engine::arbiter::ResponseArbiter;
use solace_chat_engine::providers::{DisabledProvider, DynProvider, FixedReplyProvider};
use solace_chat_engine::script::{ScriptEngine, ScriptHandle};
use solace_chat_engine::transcript::TranscriptStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

const TEST_SCRIPT: &str = r#"
[[triggers]]
id = "greeting"
pattern = '(?i)^\s*(hi|hello|hey)\b'
replies = ["Hello! How are you feeling today?"]
"#;

const GENERATED_REPLY: &str = "I hear you. Could you tell me more about how that feels?";

/// Build the same Router shape the binary uses, wired with fakes.
fn test_router() -> Router {
    let script = ScriptHandle::new(ScriptEngine::from_toml_str(TEST_SCRIPT).expect("test script"));
    let gemini: DynProvider = Arc::new(FixedReplyProvider::new("gemini", GENERATED_REPLY));
    let hugging_face: DynProvider = Arc::new(DisabledProvider::new("huggingface"));

    let state = AppState {
        arbiter: Arc::new(ResponseArbiter::new(script, gemini, hugging_face)),
        transcripts: Arc::new(TranscriptStore::new()),
    };
    api::create_router(state)
}

fn chat_request(payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /api/chat")
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json body")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "OK", "health body should be 'OK'");
}

#[tokio::test]
async fn api_chat_happy_path_matches_contract() {
    let app = test_router();

    let payload = json!({ "user_id": "u1", "message": "my work stress is bad" });
    let resp = app.oneshot(chat_request(&payload)).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;

    // Contract checks for the chat frontend.
    assert_eq!(v["response"], json!(GENERATED_REPLY));
    assert_eq!(v["source"], json!("gemini"));
    assert!(v.get("timestamp").is_some(), "missing 'timestamp'");
    assert!(
        v["chat_id"].as_str().is_some_and(|s| !s.is_empty()),
        "missing 'chat_id'"
    );

    let confidence = v["confidence"].as_f64().expect("confidence is a number");
    assert!((0.0..=1.0).contains(&confidence), "confidence out of range");

    let m = &v["metrics"];
    for key in [
        "contextRelevance",
        "emotionalSupport",
        "actionability",
        "consistency",
    ] {
        let val = m[key]
            .as_f64()
            .unwrap_or_else(|| panic!("missing metric {key}"));
        assert!((0.0..=1.0).contains(&val), "metric {key} out of range");
    }
}

#[tokio::test]
async fn api_chat_scripted_greeting_wins() {
    let app = test_router();

    let payload = json!({ "user_id": "u1", "message": "hello" });
    let resp = app.oneshot(chat_request(&payload)).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["source"], json!("scripted"));
    assert_eq!(v["response"], json!("Hello! How are you feeling today?"));
}

#[tokio::test]
async fn api_chat_blank_message_is_400() {
    let app = test_router();

    let payload = json!({ "user_id": "u1", "message": "   " });
    let resp = app.oneshot(chat_request(&payload)).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let v = read_json(resp).await;
    assert_eq!(v["error"], json!("Message cannot be empty"));
}

#[tokio::test]
async fn api_chat_overlong_message_is_400_but_500_chars_pass() {
    let app = test_router();

    let payload = json!({ "user_id": "u1", "message": "x".repeat(501) });
    let resp = app
        .clone()
        .oneshot(chat_request(&payload))
        .await
        .expect("oneshot overlong");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert_eq!(v["error"], json!("Message too long (max 500 characters)"));

    // Exactly 500 characters is still accepted.
    let payload = json!({ "user_id": "u1", "message": "x".repeat(500) });
    let resp = app
        .oneshot(chat_request(&payload))
        .await
        .expect("oneshot 500 chars");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_chat_unknown_chat_id_is_404() {
    let app = test_router();

    let payload = json!({ "user_id": "u1", "chat_id": "no-such-chat", "message": "hello" });
    let resp = app.oneshot(chat_request(&payload)).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let v = read_json(resp).await;
    assert_eq!(v["error"], json!("Chat not found"));
}

#[tokio::test]
async fn api_chat_reuses_chat_and_history_reflects_it() {
    let app = test_router();

    // First message creates the chat.
    let payload = json!({ "user_id": "alice", "message": "i can't sleep" });
    let resp = app
        .clone()
        .oneshot(chat_request(&payload))
        .await
        .expect("first message");
    assert_eq!(resp.status(), StatusCode::OK);
    let chat_id = read_json(resp).await["chat_id"]
        .as_str()
        .expect("chat_id string")
        .to_string();

    // Second message continues it.
    let payload = json!({ "user_id": "alice", "chat_id": chat_id, "message": "still awake" });
    let resp = app
        .clone()
        .oneshot(chat_request(&payload))
        .await
        .expect("second message");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["chat_id"], json!(chat_id));

    // History shows one chat with both exchanges.
    let req = Request::builder()
        .method("GET")
        .uri("/api/chat/history/alice")
        .body(Body::empty())
        .expect("build GET history");
    let resp = app.clone().oneshot(req).await.expect("oneshot history");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    let chats = v.as_array().expect("history is an array");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], json!(chat_id));
    assert_eq!(
        chats[0]["turns"].as_array().expect("turns").len(),
        4,
        "two exchanges = four turns"
    );
    assert_eq!(chats[0]["turns"][0]["role"], json!("user"));
    assert_eq!(chats[0]["turns"][1]["role"], json!("bot"));

    // Another user sees nothing.
    let req = Request::builder()
        .method("GET")
        .uri("/api/chat/history/bob")
        .body(Body::empty())
        .expect("build GET history bob");
    let resp = app.oneshot(req).await.expect("oneshot history bob");
    let v = read_json(resp).await;
    assert!(v.as_array().expect("array").is_empty());
}

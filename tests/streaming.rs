//! Integration tests for POST /chat/stream
//!
//! Streams mock SSE completion frames through the full router and checks:
//! - Deltas arrive concatenated, in order, as plain text
//! - Malformed frames are skipped without ending the stream
//! - The [DONE] sentinel terminates the body
//! - Pre-stream provider failures surface as typed JSON errors
//! - Streamed turns are not written to history

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chatrelay::{config::Config, handlers::AppState, storage::pool::DatabasePool};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn test_config(primary_url: &str, db_path: &str) -> Config {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 0
request_timeout_seconds = 30

[database]
path = "{db_path}"

[translation]
base_url = "http://127.0.0.1:1"

[providers.primary]
name = "groq"
base_url = "{primary_url}"
model = "llama-3.3-70b-versatile"
timeout_seconds = 5

[providers.secondary]
name = "openrouter"
base_url = "http://127.0.0.1:1"
model = "meta-llama/llama-3.3-70b-instruct"
timeout_seconds = 5
"#
    );
    toml.parse().expect("should parse test config")
}

async fn create_test_app(primary_url: &str) -> (TempDir, DatabasePool, Router) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let db_path = dir.path().join("chat.db");
    let db_path = db_path.to_str().expect("path should be utf-8");

    let pool = DatabasePool::new(db_path).await.expect("should open pool");
    let config = test_config(primary_url, db_path);
    let state = AppState::new(config, pool.clone()).expect("AppState::new should succeed");

    (dir, pool, chatrelay::handlers::router(state))
}

/// One SSE frame carrying a content delta
fn content_frame(content: &str) -> String {
    format!(
        "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
        serde_json::to_string(content).expect("should encode delta")
    )
}

/// A typical streamed completion: role frame, content deltas, finish, [DONE]
fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::from(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    );
    for delta in deltas {
        body.push_str(&content_frame(delta));
    }
    body.push_str(
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    );
    body.push_str("data: [DONE]\n\n");
    body
}

fn stream_request(prompt: &str) -> Request<Body> {
    let payload = serde_json::json!({
        "prompt": prompt,
        "language": "en",
        "session_id": "s1"
    });
    Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("should build request")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

#[tokio::test]
async fn test_stream_concatenates_deltas_in_order() {
    let primary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(&["Hello", " ", "streaming", " world!"]))
                .insert_header("content-type", "text/event-stream"),
        )
        .expect(1)
        .mount(&primary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("hi"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .expect("should have a content type")
        .to_str()
        .expect("content type should be ascii");
    assert!(
        content_type.starts_with("text/plain"),
        "expected plain text, got: {content_type}"
    );

    assert_eq!(body_text(response).await, "Hello streaming world!");
}

#[tokio::test]
async fn test_stream_skips_malformed_frames() {
    let primary = MockServer::start().await;

    let mut body = content_frame("Before");
    body.push_str("data: {this is not json}\n\n");
    body.push_str(&content_frame(" after"));
    body.push_str("data: [DONE]\n\n");

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&primary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("hi"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Before after");
}

#[tokio::test]
async fn test_stream_stops_at_done_sentinel() {
    let primary = MockServer::start().await;

    let mut body = content_frame("Visible");
    body.push_str("data: [DONE]\n\n");
    body.push_str(&content_frame("Hidden"));

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&primary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("hi"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Visible");
}

#[tokio::test]
async fn test_stream_multibyte_deltas_survive() {
    let primary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(&["Grüß", " dich", ", Welt 🌍"]))
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&primary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("hi"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Grüß dich, Welt 🌍");
}

#[tokio::test]
async fn test_stream_provider_error_returns_gateway_error() {
    let primary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&primary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("hi"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    let body: Value = serde_json::from_slice(&bytes).expect("error body should be JSON");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_stream_empty_prompt_returns_400() {
    let primary = MockServer::start().await;
    let (_dir, _pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("   "))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_turns_are_not_persisted() {
    let primary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(&["Ephemeral."]))
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&primary)
        .await;

    let (_dir, pool, app) = create_test_app(&primary.uri()).await;

    let response = app
        .oneshot(stream_request("hi"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    let _ = body_text(response).await;

    let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_history")
        .fetch_one(&pool.reader)
        .await
        .expect("should count history rows");
    assert_eq!(history_count, 0, "streamed turns stay out of history");
}

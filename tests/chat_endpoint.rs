//! End-to-end tests for POST /chat
//!
//! Drives the full router with a mock provider endpoint and a temporary
//! SQLite database, covering:
//! - The happy path: prompt in, formatted HTML reply out
//! - Persistence: one history row and one session row per turn
//! - Canned creator answers that never reach a provider
//! - Request validation failures surfacing as 400 + JSON error bodies

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chatrelay::{config::Config, handlers::AppState, storage::pool::DatabasePool};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Build a config whose primary provider points at a mock server.
///
/// The secondary and translation endpoints use a reserved local port so any
/// accidental call fails immediately instead of hanging the test.
fn test_config(primary_url: &str, secondary_url: &str, db_path: &str) -> Config {
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
base_url = "{secondary_url}"
model = "meta-llama/llama-3.3-70b-instruct"
timeout_seconds = 5
"#
    );
    toml.parse().expect("should parse test config")
}

/// Create the app plus handles the assertions need: the temp dir keeps the
/// database file alive, the pool allows direct row-count queries.
async fn create_test_app(primary_url: &str, secondary_url: &str) -> (TempDir, DatabasePool, Router) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let db_path = dir.path().join("chat.db");
    let db_path = db_path.to_str().expect("path should be utf-8");

    let pool = DatabasePool::new(db_path).await.expect("should open pool");
    let config = test_config(primary_url, secondary_url, db_path);
    let state = AppState::new(config, pool.clone()).expect("AppState::new should succeed");

    (dir, pool, chatrelay::handlers::router(state))
}

/// Standard chat-completions success body with the given reply text
fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1234567890,
        "model": "llama-3.3-70b-versatile",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 12,
            "total_tokens": 22
        }
    })
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("should build request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

// -------------------------------------------------------------------------
// Happy path
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_returns_formatted_reply() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("Hello! How can I help you today?")),
        )
        .expect(1)
        .mount(&primary)
        .await;

    // The primary succeeds, so the secondary must stay untouched
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&secondary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "hi", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["response"], "<p>Hello! How can I help you today?</p>");
}

#[tokio::test]
async fn test_chat_persists_one_turn_and_one_session() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there.")))
        .mount(&primary)
        .await;

    let (_dir, pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .clone()
        .oneshot(chat_request(
            r#"{"prompt": "hi", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);

    let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_history")
        .fetch_one(&pool.reader)
        .await
        .expect("should count history rows");
    let session_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions")
        .fetch_one(&pool.reader)
        .await
        .expect("should count session rows");
    assert_eq!(history_count, 1, "exactly one turn should be recorded");
    assert_eq!(session_count, 1, "exactly one session should be recorded");

    let (user_prompt, final_response, language): (String, String, String) = sqlx::query_as(
        "SELECT user_prompt, final_response, language FROM chat_history WHERE session_id = 's1'",
    )
    .fetch_one(&pool.reader)
    .await
    .expect("should read the turn back");
    assert_eq!(user_prompt, "hi");
    assert_eq!(final_response, "<p>Hi there.</p>");
    assert_eq!(language, "en");

    let (session_user, title): (String, String) =
        sqlx::query_as("SELECT user_id, title FROM chat_sessions WHERE id = 's1'")
            .fetch_one(&pool.reader)
            .await
            .expect("should read the session back");
    assert_eq!(session_user, "u1");
    assert_eq!(title, "hi");
}

#[tokio::test]
async fn test_chat_second_turn_reuses_session_row() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Sure.")))
        .expect(2)
        .mount(&primary)
        .await;

    let (_dir, pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(chat_request(
                r#"{"prompt": "hi", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
            ))
            .await
            .expect("request should complete");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_history")
        .fetch_one(&pool.reader)
        .await
        .expect("should count history rows");
    let session_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions")
        .fetch_one(&pool.reader)
        .await
        .expect("should count session rows");
    assert_eq!(history_count, 2);
    assert_eq!(session_count, 1, "second turn must not duplicate the session");
}

#[tokio::test]
async fn test_chat_creator_question_never_reaches_provider() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&secondary)
        .await;

    let (_dir, pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "Who created you?", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["response"], "<p>I was built by the Chatrelay team.</p>");

    // Canned answers still persist like any other turn
    let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_history")
        .fetch_one(&pool.reader)
        .await
        .expect("should count history rows");
    assert_eq!(history_count, 1);
}

#[tokio::test]
async fn test_chat_multi_paragraph_reply_is_formatted() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("First paragraph.\n\nSecond paragraph.")),
        )
        .mount(&primary)
        .await;

    let (_dir, _pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "hi", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(
        body["response"],
        "<p>First paragraph.</p>\n<p>Second paragraph.</p>"
    );
}

// -------------------------------------------------------------------------
// Validation failures
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_empty_prompt_returns_400_json_error() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let (_dir, _pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "   ", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let message = body["error"].as_str().expect("error should be a string");
    assert!(
        message.contains("prompt"),
        "error should name the prompt field, got: {message}"
    );
}

#[tokio::test]
async fn test_chat_missing_session_id_returns_400() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let (_dir, _pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "hi", "language": "en", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let message = body["error"].as_str().expect("error should be a string");
    assert!(
        message.contains("session_id"),
        "error should name the missing field, got: {message}"
    );
}

#[tokio::test]
async fn test_chat_blank_language_returns_400() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let (_dir, _pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "hi", "language": "  ", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_malformed_json_returns_400_json_error() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let (_dir, _pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(r#"{"prompt": "hi", "#))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(
        body["error"].is_string(),
        "malformed JSON should still yield the standard error body, got: {body}"
    );
}

#[tokio::test]
async fn test_chat_validation_failure_persists_nothing() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let (_dir, pool, app) = create_test_app(&primary.uri(), &secondary.uri()).await;

    let response = app
        .oneshot(chat_request(
            r#"{"prompt": "", "language": "en", "session_id": "s1", "user_id": "u1"}"#,
        ))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_history")
        .fetch_one(&pool.reader)
        .await
        .expect("should count history rows");
    assert_eq!(history_count, 0, "rejected requests must not be stored");
}

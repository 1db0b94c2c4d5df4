//! HTTP request handlers for the chat API

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dispatch::{ModelDispatcher, streaming::StreamingDispatcher};
use crate::error::{AppError, AppResult};
use crate::language::LanguageService;
use crate::middleware::request_id_middleware;
use crate::storage::{ChatStore, pool::DatabasePool};

pub mod chat;
pub mod health;
pub mod history;
pub mod root;
pub mod sessions;
pub mod stream;

/// Application state shared across all handlers
///
/// Everything here is cheap to clone: immutable pieces are Arc'd and the
/// store's pools are reference-counted internally.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    dispatcher: Arc<ModelDispatcher>,
    streaming: Arc<StreamingDispatcher>,
    language: Arc<LanguageService>,
    store: ChatStore,
}

impl AppState {
    /// Create a new AppState from configuration and an opened database pool.
    ///
    /// Fails when a provider or the translation service names an environment
    /// variable that is not set.
    pub fn new(config: Config, pool: DatabasePool) -> AppResult<Self> {
        let dispatcher = Arc::new(ModelDispatcher::from_config(&config)?);
        let streaming = Arc::new(StreamingDispatcher::from_config(&config)?);
        let language = Arc::new(LanguageService::new(&config)?);

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            streaming,
            language,
            store: ChatStore::new(pool),
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the model dispatcher
    pub fn dispatcher(&self) -> &ModelDispatcher {
        &self.dispatcher
    }

    /// Get reference to the streaming dispatcher
    pub fn streaming(&self) -> &StreamingDispatcher {
        &self.streaming
    }

    /// Get reference to the language service
    pub fn language(&self) -> &LanguageService {
        &self.language
    }

    /// Get reference to the chat store
    pub fn store(&self) -> &ChatStore {
        &self.store
    }
}

/// Json extractor that reports rejections as typed validation errors
///
/// Axum's stock `Json` rejection is a plain-text body with its own status
/// codes; routing it through [`AppError::Validation`] keeps every error on
/// this API in the `{"error": message}` shape with a 400 status.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Build the application router.
///
/// The configured request timeout applies to every route except
/// `/chat/stream`, whose response body may outlive any fixed bound.
pub fn router(state: AppState) -> Router {
    let timeout = TimeoutLayer::new(Duration::from_secs(
        state.config().server.request_timeout_seconds,
    ));

    Router::new()
        .route("/", get(root::handler))
        .route("/health", get(health::handler))
        .route("/chat", post(chat::handler))
        .route("/history", get(history::handler))
        .route("/sessions", get(sessions::handler))
        .layer(timeout)
        .route("/chat/stream", post(stream::handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

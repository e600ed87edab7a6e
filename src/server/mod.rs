//! HTTP surface for the support agent.
//!
//! One operation does the work: `POST /api/chat` takes a user message and
//! returns the decision-plus-content payload. `GET /health` reports
//! service and database liveness.

mod handlers;

pub use handlers::{ChatRequest, ChatResponse};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::conversation::ConversationOrchestrator;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
pub struct AppState {
    /// Drives each chat turn.
    pub orchestrator: ConversationOrchestrator,
    /// Storage handle used by the health check.
    pub storage: SqliteStorage,
}

/// Shared reference to the application state.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(orchestrator: ConversationOrchestrator, storage: SqliteStorage) -> Self {
        Self {
            orchestrator,
            storage,
        }
    }
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn run(config: &ServerConfig, state: SharedState) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(bind_address = %config.bind_address, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::SharedState;
use crate::conversation::TurnNotification;
use crate::engine::AgentReply;

/// Incoming chat request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Stable per-browser-session identifier.
    pub session_id: String,
    /// Conversation to continue, when the client already knows it.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Outgoing chat response: the reply fields plus bookkeeping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// The conversation this turn belongs to.
    pub conversation_id: String,
    /// The engine's reply, flattened into the top level.
    #[serde(flatten)]
    pub reply: AgentReply,
    /// Side-effect notifications for the UI.
    pub notifications: Vec<TurnNotification>,
}

/// Handle `POST /api/chat`.
pub async fn chat(State(state): State<SharedState>, Json(request): Json<ChatRequest>) -> Response {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Message is required"})),
        )
            .into_response();
    }

    match state
        .orchestrator
        .handle_message(
            &request.message,
            &request.session_id,
            request.conversation_id.as_deref(),
        )
        .await
    {
        Ok(outcome) => Json(ChatResponse {
            conversation_id: outcome.conversation_id,
            reply: outcome.reply,
            notifications: outcome.notifications,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Chat turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string(), "fallback": true})),
            )
                .into_response()
        }
    }
}

/// Handle `GET /health`.
pub async fn health(State(state): State<SharedState>) -> Response {
    let database = match sqlx::query("SELECT 1").execute(state.storage.pool()).await {
        Ok(_) => json!({"status": "ok"}),
        Err(e) => {
            error!(error = %e, "Health check database probe failed");
            json!({"status": "error", "detail": e.to_string()})
        }
    };

    let healthy = database["status"] == "ok";
    let body = Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "database": database,
        "checked_at": Utc::now().to_rfc3339(),
    }));

    if healthy {
        body.into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}

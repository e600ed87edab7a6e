//! Per-turn conversation orchestration.
//!
//! The orchestrator owns everything the engine must not touch: it ensures
//! a conversation exists for the session, persists both turns, folds the
//! decision back into the conversation row, and surfaces notifications
//! for the transport layer. Turns within one conversation are serialized
//! so concurrent requests cannot interleave their writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{AgentReply, DecisionAction, DecisionEngine};
use crate::error::AppResult;
use crate::storage::{
    Conversation, ConversationStatus, DecisionMetadata, SqliteStorage, Storage, StoredMessage,
};

/// A side-effect notification surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnNotification {
    /// The conversation was handed to a human.
    Escalated {
        /// Why the agent escalated, when it said so.
        reason: Option<String>,
    },
    /// The agent resolved the issue.
    Resolved {
        /// Confidence of the resolving decision.
        confidence: f64,
    },
    /// A tool ran as part of the turn.
    ToolExecuted {
        /// Wire name of the tool.
        tool: String,
    },
}

/// Everything one turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// The conversation the turn belongs to.
    pub conversation_id: String,
    /// The engine's reply.
    pub reply: AgentReply,
    /// Side-effect notifications for the UI.
    pub notifications: Vec<TurnNotification>,
}

/// Sequences persistence and engine invocation for each turn.
pub struct ConversationOrchestrator {
    storage: SqliteStorage,
    engine: DecisionEngine,
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationOrchestrator {
    /// Create a new orchestrator
    pub fn new(storage: SqliteStorage, engine: DecisionEngine) -> Self {
        Self {
            storage,
            engine,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get or lazily create the conversation for a session. Idempotent:
    /// repeated calls for the same session return the same conversation.
    pub async fn ensure_conversation(&self, session_id: &str) -> AppResult<Conversation> {
        if let Some(existing) = self.storage.find_conversation_by_session(session_id).await? {
            return Ok(existing);
        }

        let conversation = Conversation::new(session_id);
        self.storage.create_conversation(&conversation).await?;
        info!(
            conversation_id = %conversation.id,
            session_id,
            "Conversation created"
        );
        Ok(conversation)
    }

    /// Run one full turn: persist the user message, decide, persist the
    /// agent message, and update the conversation from the decision.
    ///
    /// `conversation_id` is a client hint; an unknown id falls back to the
    /// session's conversation.
    pub async fn handle_message(
        &self,
        message: &str,
        session_id: &str,
        conversation_id: Option<&str>,
    ) -> AppResult<TurnOutcome> {
        let known = match conversation_id {
            Some(id) => self.storage.get_conversation(id).await?,
            None => None,
        };
        let mut conversation = match known {
            Some(conversation) => conversation,
            None => self.ensure_conversation(session_id).await?,
        };

        // Serialize turns per conversation; a second in-flight request for
        // the same conversation waits here.
        let lock = self.turn_lock(&conversation.id);
        let _guard = lock.lock().await;

        // The user's own message is persisted before the engine runs and
        // regardless of how the decision turns out.
        let user_message = StoredMessage::user(&conversation.id, message);
        self.storage.create_message(&user_message).await?;

        let reply = self
            .engine
            .decide(message, session_id, Some(&conversation.id))
            .await;

        let metadata = DecisionMetadata {
            intent: reply.intent.to_string(),
            confidence: reply.confidence,
            sentiment: reply.sentiment.to_string(),
            action: reply.action.to_string(),
            is_escalated: reply.action == DecisionAction::Escalate,
            is_resolved: reply.action == DecisionAction::Resolve,
            tool_executed: reply.tool_executed.clone(),
            reasoning: reply.reasoning.clone(),
            rag_sources_used: reply.rag_sources_used,
        };
        let agent_message = StoredMessage::agent(&conversation.id, &reply.content, metadata);
        self.storage.create_message(&agent_message).await?;

        conversation.status = match reply.action {
            DecisionAction::Escalate => ConversationStatus::Escalated,
            DecisionAction::Resolve => ConversationStatus::Resolved,
            DecisionAction::Clarify => ConversationStatus::Active,
        };
        conversation.sentiment = Some(reply.sentiment.to_string());
        conversation.avg_confidence = self
            .storage
            .agent_confidence_average(&conversation.id)
            .await?;
        conversation.is_resolved = reply.action == DecisionAction::Resolve;
        conversation.updated_at = Utc::now();
        self.storage.update_conversation(&conversation).await?;

        if reply.error.is_some() {
            warn!(
                conversation_id = %conversation.id,
                error = reply.error.as_deref().unwrap_or(""),
                "Turn completed with a degraded reply"
            );
        }

        let notifications = notifications_for(&reply);
        Ok(TurnOutcome {
            conversation_id: conversation.id,
            reply,
            notifications,
        })
    }

    fn turn_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.turn_locks.lock().expect("turn lock map poisoned");
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Notifications triggered by a reply: escalation, resolution, and tool
/// execution, in that order.
fn notifications_for(reply: &AgentReply) -> Vec<TurnNotification> {
    let mut notifications = Vec::new();

    match reply.action {
        DecisionAction::Escalate => notifications.push(TurnNotification::Escalated {
            reason: reply.reasoning.clone(),
        }),
        DecisionAction::Resolve => notifications.push(TurnNotification::Resolved {
            confidence: reply.confidence,
        }),
        DecisionAction::Clarify => {}
    }

    if let Some(tool) = &reply.tool_executed {
        notifications.push(TurnNotification::ToolExecuted { tool: tool.clone() });
    }

    notifications
}

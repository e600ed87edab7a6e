//! Storage layer for conversation persistence.
//!
//! This module provides SQLite-based storage for conversations, messages,
//! and user profiles. The decision engine itself never touches storage;
//! everything here is driven by the orchestrator and the context loader.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// A single chat session between a user and the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: String,
    /// Stable per-browser-session identifier.
    pub session_id: String,
    /// Current conversation state, driven by the most recent agent decision.
    pub status: ConversationStatus,
    /// Sentiment of the most recent agent turn.
    pub sentiment: Option<String>,
    /// Running average confidence across agent turns.
    pub avg_confidence: Option<f64>,
    /// Whether the latest decision resolved the conversation.
    pub is_resolved: bool,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Conversation lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Conversation is in progress.
    #[default]
    Active,
    /// The agent resolved the user's issue.
    Resolved,
    /// The conversation was handed to a human.
    Escalated,
    /// Waiting on an external follow-up.
    Pending,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Resolved => write!(f, "resolved"),
            ConversationStatus::Escalated => write!(f, "escalated"),
            ConversationStatus::Pending => write!(f, "pending"),
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConversationStatus::Active),
            "resolved" => Ok(ConversationStatus::Resolved),
            "escalated" => Ok(ConversationStatus::Escalated),
            "pending" => Ok(ConversationStatus::Pending),
            _ => Err(format!("Unknown conversation status: {}", s)),
        }
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The end user.
    User,
    /// The AI agent.
    Agent,
}

impl MessageRole {
    /// Human-readable label used when rendering transcripts.
    pub fn display_label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Agent => "Agent",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Agent => write!(f, "agent"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "agent" => Ok(MessageRole::Agent),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// One turn in a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique message identifier.
    pub id: String,
    /// Parent conversation ID.
    pub conversation_id: String,
    /// Who produced the message.
    pub role: MessageRole,
    /// The message text.
    pub content: String,
    /// Decision metadata. Present only on agent messages produced by the
    /// decision engine; user messages never carry it.
    pub metadata: Option<DecisionMetadata>,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

/// Decision engine metadata attached to an agent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionMetadata {
    /// Classified intent label.
    pub intent: String,
    /// Classification confidence (0.0-1.0).
    pub confidence: f64,
    /// Detected user sentiment.
    pub sentiment: String,
    /// Decided action (resolve, clarify, escalate).
    pub action: String,
    /// Whether this turn escalated the conversation.
    pub is_escalated: bool,
    /// Whether this turn resolved the conversation.
    pub is_resolved: bool,
    /// Wire name of the executed tool, if any.
    pub tool_executed: Option<String>,
    /// The model's internal reasoning, kept for debugging.
    pub reasoning: Option<String>,
    /// Whether retrieved knowledge informed the reply.
    pub rag_sources_used: bool,
}

impl StoredMessage {
    /// Create a user message. User messages never carry decision metadata.
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role: MessageRole::User,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Create an agent message carrying the decision that produced it.
    pub fn agent(
        conversation_id: impl Into<String>,
        content: impl Into<String>,
        metadata: DecisionMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role: MessageRole::Agent,
            content: content.into(),
            metadata: Some(metadata),
            created_at: Utc::now(),
        }
    }
}

/// Known facts about a returning user, surfaced to the engine as memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique profile identifier.
    pub id: String,
    /// Session this profile is associated with.
    pub session_id: String,
    /// Display name, if known.
    pub display_name: Option<String>,
    /// Email address, if known.
    pub email: Option<String>,
    /// Past issue type labels, oldest first.
    pub past_issues: Vec<String>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new active conversation for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            status: ConversationStatus::Active,
            sentiment: None,
            avg_confidence: None,
            is_resolved: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UserProfile {
    /// Create a new profile for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            display_name: None,
            email: None,
            past_issues: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the past issue labels.
    pub fn with_past_issues(mut self, issues: Vec<String>) -> Self {
        self.past_issues = issues;
        self
    }
}

/// Storage trait for conversation persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    // Conversation operations

    /// Create a new conversation.
    async fn create_conversation(&self, conversation: &Conversation) -> StorageResult<()>;
    /// Get a conversation by ID.
    async fn get_conversation(&self, id: &str) -> StorageResult<Option<Conversation>>;
    /// Find the conversation for a session, if one exists.
    async fn find_conversation_by_session(
        &self,
        session_id: &str,
    ) -> StorageResult<Option<Conversation>>;
    /// Update a conversation's status, sentiment, confidence, and flags.
    async fn update_conversation(&self, conversation: &Conversation) -> StorageResult<()>;

    // Message operations

    /// Persist a message.
    async fn create_message(&self, message: &StoredMessage) -> StorageResult<()>;
    /// Get the `limit` most recent messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<StoredMessage>>;
    /// Average confidence across the conversation's agent messages.
    async fn agent_confidence_average(&self, conversation_id: &str)
        -> StorageResult<Option<f64>>;

    // Profile operations

    /// Create a user profile.
    async fn create_profile(&self, profile: &UserProfile) -> StorageResult<()>;
    /// Get the profile associated with a session, if any.
    async fn get_profile_by_session(&self, session_id: &str)
        -> StorageResult<Option<UserProfile>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn conversation_status_round_trip() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::Resolved,
            ConversationStatus::Escalated,
            ConversationStatus::Pending,
        ] {
            let text = status.to_string();
            assert_eq!(ConversationStatus::from_str(&text).unwrap(), status);
        }
        assert!(ConversationStatus::from_str("archived").is_err());
    }

    #[test]
    fn message_role_labels() {
        assert_eq!(MessageRole::User.display_label(), "User");
        assert_eq!(MessageRole::Agent.display_label(), "Agent");
        assert_eq!(MessageRole::from_str("agent").unwrap(), MessageRole::Agent);
    }

    #[test]
    fn user_messages_never_carry_metadata() {
        let message = StoredMessage::user("conv-1", "hello");
        assert_eq!(message.role, MessageRole::User);
        assert!(message.metadata.is_none());
    }

    #[test]
    fn agent_messages_carry_decision_metadata() {
        let metadata = DecisionMetadata {
            intent: "login_issue".to_string(),
            confidence: 0.9,
            sentiment: "neutral".to_string(),
            action: "resolve".to_string(),
            is_escalated: false,
            is_resolved: true,
            tool_executed: None,
            reasoning: Some("clear answer available".to_string()),
            rag_sources_used: true,
        };
        let message = StoredMessage::agent("conv-1", "done", metadata);
        assert_eq!(message.role, MessageRole::Agent);
        let metadata = message.metadata.expect("agent metadata");
        assert_eq!(metadata.action, "resolve");
        assert!(metadata.is_resolved);
    }

    #[test]
    fn new_conversation_defaults() {
        let conversation = Conversation::new("session-1");
        assert_eq!(conversation.status, ConversationStatus::Active);
        assert!(!conversation.is_resolved);
        assert!(conversation.sentiment.is_none());
        assert!(conversation.avg_confidence.is_none());
    }
}

//! Memory and history loading for the decision engine.
//!
//! Both loaders are best-effort: a missing profile, an empty conversation,
//! or a storage failure all yield an empty string. The engine substitutes
//! its own "new user" / "start of conversation" markers.

use tracing::warn;

use crate::storage::{SqliteStorage, Storage};

/// How many of the most recent turns are replayed into the prompt.
const HISTORY_TURNS: u32 = 10;

/// How many past issue types are summarized from the profile.
const PAST_ISSUE_LIMIT: usize = 3;

/// Loads user memory and conversation history out of storage.
#[derive(Clone)]
pub struct ContextLoader {
    storage: SqliteStorage,
}

impl ContextLoader {
    /// Create a new context loader
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Summarize what is known about the user behind a session.
    pub async fn load_memory(&self, session_id: &str) -> String {
        let profile = match self.storage.get_profile_by_session(session_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return String::new(),
            Err(e) => {
                warn!(session_id, error = %e, "Profile lookup failed, continuing without memory");
                return String::new();
            }
        };

        let mut parts = Vec::new();
        if let Some(name) = &profile.display_name {
            parts.push(format!("Name: {}", name));
        }
        if let Some(email) = &profile.email {
            parts.push(format!("Email: {}", email));
        }
        if !profile.past_issues.is_empty() {
            let recent: Vec<&str> = profile
                .past_issues
                .iter()
                .rev()
                .take(PAST_ISSUE_LIMIT)
                .rev()
                .map(|s| s.as_str())
                .collect();
            parts.push(format!("Past issues: {}", recent.join(", ")));
        }

        parts.join("\n")
    }

    /// Render the most recent turns of a conversation, oldest first, as
    /// `User:`/`Agent:` lines.
    pub async fn load_history(&self, conversation_id: Option<&str>) -> String {
        let Some(conversation_id) = conversation_id else {
            return String::new();
        };

        let messages = match self
            .storage
            .recent_messages(conversation_id, HISTORY_TURNS)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(conversation_id, error = %e, "History lookup failed, continuing without it");
                return String::new();
            }
        };

        messages
            .iter()
            .map(|m| format!("{}: {}", m.role.display_label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::{Conversation, StoredMessage, UserProfile};
    use std::path::PathBuf;

    async fn memory_storage() -> SqliteStorage {
        let config = DatabaseConfig {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
        };
        SqliteStorage::new(&config).await.expect("in-memory storage")
    }

    #[tokio::test]
    async fn memory_is_empty_for_unknown_session() {
        let loader = ContextLoader::new(memory_storage().await);
        assert_eq!(loader.load_memory("missing-session").await, "");
    }

    #[tokio::test]
    async fn memory_renders_profile_facts() {
        let storage = memory_storage().await;
        let profile = UserProfile::new("session-1")
            .with_display_name("Ada")
            .with_email("ada@example.com")
            .with_past_issues(vec![
                "login_issue".to_string(),
                "payment_issue".to_string(),
                "refund_request".to_string(),
                "technical_bug".to_string(),
            ]);
        storage.create_profile(&profile).await.unwrap();

        let loader = ContextLoader::new(storage);
        let memory = loader.load_memory("session-1").await;

        assert!(memory.contains("Name: Ada"));
        assert!(memory.contains("Email: ada@example.com"));
        // Only the three most recent issue types survive.
        assert!(memory.contains("Past issues: payment_issue, refund_request, technical_bug"));
        assert!(!memory.contains("login_issue"));
    }

    #[tokio::test]
    async fn history_is_empty_without_a_conversation() {
        let loader = ContextLoader::new(memory_storage().await);
        assert_eq!(loader.load_history(None).await, "");
        assert_eq!(loader.load_history(Some("missing")).await, "");
    }

    #[tokio::test]
    async fn history_renders_turns_oldest_first() {
        let storage = memory_storage().await;
        let conversation = Conversation::new("session-2");
        storage.create_conversation(&conversation).await.unwrap();

        let first = StoredMessage::user(&conversation.id, "I can't log in");
        storage.create_message(&first).await.unwrap();
        let mut second = StoredMessage::user(&conversation.id, "still broken");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        storage.create_message(&second).await.unwrap();

        let loader = ContextLoader::new(storage);
        let history = loader.load_history(Some(&conversation.id)).await;

        assert_eq!(history, "User: I can't log in\nUser: still broken");
    }
}

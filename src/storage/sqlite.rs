use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{
    Conversation, ConversationStatus, DecisionMetadata, MessageRole, Storage, StoredMessage,
    UserProfile,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_conversation(&self, conversation: &Conversation) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, session_id, status, sentiment, avg_confidence, is_resolved, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.session_id)
        .bind(conversation.status.to_string())
        .bind(&conversation.sentiment)
        .bind(conversation.avg_confidence)
        .bind(conversation.is_resolved)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> StorageResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, status, sentiment, avg_confidence, is_resolved, created_at, updated_at
            FROM conversations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_conversation_by_session(
        &self,
        session_id: &str,
    ) -> StorageResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, status, sentiment, avg_confidence, is_resolved, created_at, updated_at
            FROM conversations
            WHERE session_id = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_conversation(&self, conversation: &Conversation) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET status = ?, sentiment = ?, avg_confidence = ?, is_resolved = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(conversation.status.to_string())
        .bind(&conversation.sentiment)
        .bind(conversation.avg_confidence)
        .bind(conversation.is_resolved)
        .bind(conversation.updated_at.to_rfc3339())
        .bind(&conversation.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConversationNotFound {
                conversation_id: conversation.id.clone(),
            });
        }

        Ok(())
    }

    async fn create_message(&self, message: &StoredMessage) -> StorageResult<()> {
        let metadata = message.metadata.as_ref();

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, conversation_id, role, content,
                intent, confidence, sentiment, action,
                is_escalated, is_resolved, tool_executed, reasoning, rag_sources_used,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(metadata.map(|m| m.intent.clone()))
        .bind(metadata.map(|m| m.confidence))
        .bind(metadata.map(|m| m.sentiment.clone()))
        .bind(metadata.map(|m| m.action.clone()))
        .bind(metadata.map(|m| m.is_escalated))
        .bind(metadata.map(|m| m.is_resolved))
        .bind(metadata.and_then(|m| m.tool_executed.clone()))
        .bind(metadata.and_then(|m| m.reasoning.clone()))
        .bind(metadata.map(|m| m.rag_sources_used))
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<StoredMessage>> {
        // Fetch the newest `limit` rows, then restore chronological order.
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, role, content,
                   intent, confidence, sentiment, action,
                   is_escalated, is_resolved, tool_executed, reasoning, rag_sources_used,
                   created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<StoredMessage> = rows.into_iter().map(|r| r.into()).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn agent_confidence_average(
        &self,
        conversation_id: &str,
    ) -> StorageResult<Option<f64>> {
        let average: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(confidence)
            FROM messages
            WHERE conversation_id = ? AND role = 'agent' AND confidence IS NOT NULL
            "#,
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(average)
    }

    async fn create_profile(&self, profile: &UserProfile) -> StorageResult<()> {
        let past_issues =
            serde_json::to_string(&profile.past_issues).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, session_id, display_name, email, past_issues, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.session_id)
        .bind(&profile.display_name)
        .bind(&profile.email)
        .bind(&past_issues)
        .bind(profile.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_profile_by_session(
        &self,
        session_id: &str,
    ) -> StorageResult<Option<UserProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, display_name, email, past_issues, created_at
            FROM user_profiles
            WHERE session_id = ?
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }
}

// Internal row types for SQLx mapping

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    session_id: String,
    status: String,
    sentiment: Option<String>,
    avg_confidence: Option<f64>,
    is_resolved: bool,
    created_at: String,
    updated_at: String,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            status: row.status.parse().unwrap_or(ConversationStatus::Active),
            sentiment: row.sentiment,
            avg_confidence: row.avg_confidence,
            is_resolved: row.is_resolved,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    intent: Option<String>,
    confidence: Option<f64>,
    sentiment: Option<String>,
    action: Option<String>,
    is_escalated: Option<bool>,
    is_resolved: Option<bool>,
    tool_executed: Option<String>,
    reasoning: Option<String>,
    rag_sources_used: Option<bool>,
    created_at: String,
}

impl From<MessageRow> for StoredMessage {
    fn from(row: MessageRow) -> Self {
        // Decision columns are populated together for agent rows; intent is
        // the marker column.
        let metadata = row.intent.map(|intent| DecisionMetadata {
            intent,
            confidence: row.confidence.unwrap_or(0.0),
            sentiment: row.sentiment.unwrap_or_else(|| "neutral".to_string()),
            action: row.action.unwrap_or_else(|| "clarify".to_string()),
            is_escalated: row.is_escalated.unwrap_or(false),
            is_resolved: row.is_resolved.unwrap_or(false),
            tool_executed: row.tool_executed,
            reasoning: row.reasoning,
            rag_sources_used: row.rag_sources_used.unwrap_or(false),
        });

        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            role: row.role.parse().unwrap_or(MessageRole::User),
            content: row.content,
            metadata,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: String,
    session_id: String,
    display_name: Option<String>,
    email: Option<String>,
    past_issues: Option<String>,
    created_at: String,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            display_name: row.display_name,
            email: row.email,
            past_issues: row
                .past_issues
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

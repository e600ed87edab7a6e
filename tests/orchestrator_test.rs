//! Integration tests for the conversation orchestrator.
//!
//! The reasoning backend is stubbed; storage runs in-memory so the full
//! persist-decide-persist-update sequence is exercised.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use support_agent::config::{DatabaseConfig, RequestConfig, RetrievalConfig};
use support_agent::context::ContextLoader;
use support_agent::conversation::{ConversationOrchestrator, TurnNotification};
use support_agent::engine::DecisionEngine;
use support_agent::error::{ProviderError, ProviderResult};
use support_agent::provider::{Completion, EmbeddingBackend, ReasoningBackend};
use support_agent::retrieval::{KnowledgeChunk, KnowledgeRetriever, VectorIndex};
use support_agent::storage::{ConversationStatus, MessageRole, SqliteStorage, Storage};

/// Reasoning backend returning a fixed structured decision.
struct FixedDecision(serde_json::Value);

#[async_trait]
impl ReasoningBackend for FixedDecision {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_message: &str,
    ) -> ProviderResult<Completion> {
        Ok(Completion::Structured(self.0.clone()))
    }
}

/// Reasoning backend that always fails terminally.
struct BrokenBackend;

#[async_trait]
impl ReasoningBackend for BrokenBackend {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_message: &str,
    ) -> ProviderResult<Completion> {
        Err(ProviderError::Api {
            status: 500,
            message: "provider down".to_string(),
        })
    }
}

struct StubEmbedding;

#[async_trait]
impl EmbeddingBackend for StubEmbedding {
    async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
        Ok(vec![0.1; 384])
    }
}

struct EmptyIndex;

#[async_trait]
impl VectorIndex for EmptyIndex {
    async fn query(
        &self,
        _embedding: &[f32],
        _top_k: usize,
        _min_similarity: f64,
    ) -> ProviderResult<Vec<KnowledgeChunk>> {
        Ok(Vec::new())
    }
}

async fn memory_storage() -> SqliteStorage {
    let config = DatabaseConfig {
        path: PathBuf::from(":memory:"),
        max_connections: 1,
    };
    SqliteStorage::new(&config).await.expect("in-memory storage")
}

async fn orchestrator_with(
    storage: SqliteStorage,
    reasoning: Arc<dyn ReasoningBackend>,
) -> ConversationOrchestrator {
    let retriever = KnowledgeRetriever::new(
        Arc::new(StubEmbedding),
        Arc::new(EmptyIndex),
        RetrievalConfig::default(),
    );
    let engine = DecisionEngine::new(
        retriever,
        ContextLoader::new(storage.clone()),
        reasoning,
        RequestConfig {
            timeout_ms: 5000,
            max_attempts: 1,
            retry_delay_ms: 1,
        },
    );
    ConversationOrchestrator::new(storage, engine)
}

fn resolve_decision() -> serde_json::Value {
    json!({
        "intent": "general_query",
        "confidence": 0.92,
        "sentiment": "positive",
        "decision": "resolve",
        "response": "Glad it worked!",
        "reasoning": "user confirmed the fix",
        "tool_to_call": "none"
    })
}

#[tokio::test]
async fn ensure_conversation_is_idempotent_per_session() {
    let storage = memory_storage().await;
    let orchestrator = orchestrator_with(storage, Arc::new(BrokenBackend)).await;

    let first = orchestrator.ensure_conversation("session-1").await.unwrap();
    let second = orchestrator.ensure_conversation("session-1").await.unwrap();
    let other = orchestrator.ensure_conversation("session-2").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_ne!(first.id, other.id);
}

#[tokio::test]
async fn resolving_turn_marks_the_conversation_resolved() {
    let storage = memory_storage().await;
    let orchestrator =
        orchestrator_with(storage.clone(), Arc::new(FixedDecision(resolve_decision()))).await;

    let outcome = orchestrator
        .handle_message("thanks, that worked!", "session-1", None)
        .await
        .unwrap();

    let conversation = storage
        .get_conversation(&outcome.conversation_id)
        .await
        .unwrap()
        .expect("conversation");
    assert_eq!(conversation.status, ConversationStatus::Resolved);
    assert!(conversation.is_resolved);
    assert_eq!(conversation.sentiment.as_deref(), Some("positive"));
    assert_eq!(conversation.avg_confidence, Some(0.92));

    assert_eq!(
        outcome.notifications,
        vec![TurnNotification::Resolved { confidence: 0.92 }]
    );
}

#[tokio::test]
async fn escalating_turn_marks_the_conversation_escalated() {
    let storage = memory_storage().await;
    // Confidence 0.5 forces escalate regardless of the stated action.
    let orchestrator = orchestrator_with(
        storage.clone(),
        Arc::new(FixedDecision(json!({
            "intent": "refund_request",
            "confidence": 0.5,
            "sentiment": "negative",
            "decision": "clarify",
            "response": "Let me get a human to look at this.",
            "reasoning": "low confidence on refund state",
            "tool_to_call": "escalate_to_human",
            "tool_params": {"reason": "refund dispute", "urgency": "high"}
        }))),
    )
    .await;

    let outcome = orchestrator
        .handle_message("I want a refund for order A123", "session-1", None)
        .await
        .unwrap();

    let conversation = storage
        .get_conversation(&outcome.conversation_id)
        .await
        .unwrap()
        .expect("conversation");
    assert_eq!(conversation.status, ConversationStatus::Escalated);
    assert!(!conversation.is_resolved);

    assert_eq!(outcome.reply.tool_executed.as_deref(), Some("escalate_to_human"));
    let tool_result = outcome.reply.tool_result.as_ref().expect("tool result");
    assert_eq!(tool_result["estimated_wait"], "2-5 minutes");

    assert_eq!(outcome.notifications.len(), 2);
    assert!(matches!(
        outcome.notifications[0],
        TurnNotification::Escalated { .. }
    ));
    assert!(matches!(
        outcome.notifications[1],
        TurnNotification::ToolExecuted { .. }
    ));
}

#[tokio::test]
async fn both_turns_are_persisted_with_metadata_only_on_the_agent_turn() {
    let storage = memory_storage().await;
    let orchestrator =
        orchestrator_with(storage.clone(), Arc::new(FixedDecision(resolve_decision()))).await;

    let outcome = orchestrator
        .handle_message("is this fixed now?", "session-1", None)
        .await
        .unwrap();

    let messages = storage
        .recent_messages(&outcome.conversation_id, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);

    let user_turn = messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .expect("user turn");
    assert_eq!(user_turn.content, "is this fixed now?");
    assert!(user_turn.metadata.is_none());

    let agent_turn = messages
        .iter()
        .find(|m| m.role == MessageRole::Agent)
        .expect("agent turn");
    let metadata = agent_turn.metadata.as_ref().expect("agent metadata");
    assert_eq!(metadata.action, "resolve");
    assert_eq!(metadata.intent, "general_query");
    assert!(metadata.is_resolved);
    assert!(!metadata.rag_sources_used);
}

#[tokio::test]
async fn engine_failure_still_persists_the_user_turn() {
    let storage = memory_storage().await;
    let orchestrator = orchestrator_with(storage.clone(), Arc::new(BrokenBackend)).await;

    let outcome = orchestrator
        .handle_message("help", "session-1", None)
        .await
        .unwrap();

    // The reply is the generic fallback, not an error.
    assert_eq!(outcome.reply.fallback, Some(true));
    assert_eq!(outcome.reply.confidence, 0.0);

    let messages = storage
        .recent_messages(&outcome.conversation_id, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "help");
}

#[tokio::test]
async fn average_confidence_runs_across_turns() {
    let storage = memory_storage().await;

    let first = orchestrator_with(
        storage.clone(),
        Arc::new(FixedDecision(json!({
            "intent": "general_query",
            "confidence": 0.9,
            "sentiment": "neutral",
            "decision": "resolve",
            "response": "Here you go.",
            "reasoning": "clear",
            "tool_to_call": "none"
        }))),
    )
    .await;
    first.handle_message("question one", "session-1", None).await.unwrap();

    let second = orchestrator_with(
        storage.clone(),
        Arc::new(FixedDecision(json!({
            "intent": "general_query",
            "confidence": 0.5,
            "sentiment": "neutral",
            "decision": "clarify",
            "response": "Not sure.",
            "reasoning": "vague",
            "tool_to_call": "none"
        }))),
    )
    .await;
    let outcome = second.handle_message("question two", "session-1", None).await.unwrap();

    let conversation = storage
        .get_conversation(&outcome.conversation_id)
        .await
        .unwrap()
        .expect("conversation");
    let average = conversation.avg_confidence.expect("average");
    assert!((average - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn known_conversation_id_hint_is_honored() {
    let storage = memory_storage().await;
    let orchestrator =
        orchestrator_with(storage.clone(), Arc::new(FixedDecision(resolve_decision()))).await;

    let first = orchestrator
        .handle_message("first", "session-1", None)
        .await
        .unwrap();
    let second = orchestrator
        .handle_message("second", "session-1", Some(&first.conversation_id))
        .await
        .unwrap();
    assert_eq!(first.conversation_id, second.conversation_id);

    // An unknown hint falls back to the session's conversation.
    let third = orchestrator
        .handle_message("third", "session-1", Some("no-such-conversation"))
        .await
        .unwrap();
    assert_eq!(first.conversation_id, third.conversation_id);
}

//! # Support Agent
//!
//! An autonomous customer-support decision engine: given a user message it
//! classifies intent and sentiment, retrieves relevant knowledge, and
//! decides whether to resolve, ask for clarification, or escalate to a
//! human, optionally invoking a side-effecting support tool.
//!
//! ## Features
//!
//! - **Decision Engine**: one structured reasoning call per turn with
//!   retry, repair, and deterministic fallback behavior
//! - **Knowledge Retrieval**: embedding + vector similarity search with
//!   degrade-to-empty failure handling
//! - **Memory & History**: user profile facts and recent turns folded
//!   into the prompt
//! - **Tool Registry**: password reset, refund-policy check, ticket
//!   creation, and human escalation
//! - **Conversation Orchestration**: per-turn persistence, status
//!   transitions, and UI notifications
//!
//! ## Architecture
//!
//! ```text
//! HTTP Client → Axum Server → Orchestrator → Decision Engine → OpenAI/Gemini (HTTP)
//!                                  ↓               ↓
//!                             SQLite (State)  Vector Index (HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use support_agent::{Config, AppState};
//! use support_agent::context::ContextLoader;
//! use support_agent::conversation::ConversationOrchestrator;
//! use support_agent::engine::DecisionEngine;
//! use support_agent::retrieval::{HttpVectorIndex, KnowledgeRetriever};
//! use support_agent::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let (reasoning, embeddings) =
//!         support_agent::provider::build_backends(&config.provider, &config.request)?;
//!     let index = Arc::new(HttpVectorIndex::new(&config.retrieval, &config.request)?);
//!     let retriever = KnowledgeRetriever::new(embeddings, index, config.retrieval.clone());
//!     let engine = DecisionEngine::new(
//!         retriever,
//!         ContextLoader::new(storage.clone()),
//!         reasoning,
//!         config.request.clone(),
//!     );
//!     let orchestrator = ConversationOrchestrator::new(storage.clone(), engine);
//!     let state = Arc::new(AppState::new(orchestrator, storage));
//!     support_agent::server::run(&config.server, state).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the service.
pub mod config;
/// Memory and conversation-history loading.
pub mod context;
/// Per-turn conversation orchestration and persistence.
pub mod conversation;
/// The decision engine and its reply types.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// System prompt construction.
pub mod prompts;
/// Reasoning and embedding provider backends.
pub mod provider;
/// Knowledge retrieval over an external vector index.
pub mod retrieval;
/// HTTP server and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;
/// The closed registry of support tools.
pub mod tools;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, SharedState};

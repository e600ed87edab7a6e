//! Reasoning and embedding backends.
//!
//! The engine talks to a hosted model through two narrow traits: one for
//! structured reasoning calls and one for query embeddings. OpenAI and
//! Gemini implementations are provided; which one is built is decided by
//! configuration at startup.

mod gemini;
mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind, RequestConfig};
use crate::error::{ProviderError, ProviderResult};

/// What a reasoning call produced.
///
/// OpenAI returns structured function-call arguments; Gemini returns raw
/// text that should contain a JSON object, possibly wrapped in markdown
/// code fences. Decoding both into a decision happens in the engine.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Already-parsed function-call arguments.
    Structured(serde_json::Value),
    /// Raw completion text expected to contain JSON.
    Text(String),
}

/// A structured reasoning call against a hosted model.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Submit a system prompt plus the user's message and return the raw
    /// completion. Implementations classify HTTP failures into
    /// [`ProviderError`] variants but never retry; retrying is the
    /// engine's job.
    async fn complete(&self, system_prompt: &str, user_message: &str)
        -> ProviderResult<Completion>;
}

/// A query-embedding call against a hosted model.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single query string into the provider's native dimension.
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;
}

/// Build the reasoning and embedding backends selected by configuration.
pub fn build_backends(
    provider: &ProviderConfig,
    request: &RequestConfig,
) -> ProviderResult<(Arc<dyn ReasoningBackend>, Arc<dyn EmbeddingBackend>)> {
    match provider.kind {
        ProviderKind::OpenAi => {
            let backend = Arc::new(OpenAiBackend::new(provider, request)?);
            Ok((backend.clone(), backend))
        }
        ProviderKind::Gemini => {
            let backend = Arc::new(GeminiBackend::new(provider, request)?);
            Ok((backend.clone(), backend))
        }
    }
}

/// Map a non-success HTTP response to a provider error.
///
/// 402 and quota-exhaustion body text are terminal; everything else keeps
/// its status for the caller to classify (429 counts as transient).
pub(crate) fn classify_api_error(status: u16, body: String) -> ProviderError {
    let quota_exhausted = status == 402
        || body.contains("insufficient_quota")
        || body.contains("RESOURCE_EXHAUSTED");
    if quota_exhausted {
        ProviderError::QuotaExceeded {
            status,
            message: body,
        }
    } else {
        ProviderError::Api {
            status,
            message: body,
        }
    }
}

/// Map a reqwest send error, surfacing timeouts distinctly.
pub(crate) fn classify_send_error(error: reqwest::Error, timeout_ms: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout { timeout_ms }
    } else {
        ProviderError::Http(error)
    }
}

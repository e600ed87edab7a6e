//! The autonomous support decision engine.
//!
//! One call to [`DecisionEngine::decide`] runs a full turn: gather
//! knowledge, memory, and history concurrently, submit a structured
//! reasoning request, enforce the decision rule, optionally execute a
//! tool, and return a normalized reply. Every failure path terminates in
//! a valid [`AgentReply`]; the engine never mutates storage and holds no
//! state between turns.

mod decision;

pub use decision::{decide_action, AgentReply, DecisionAction, Intent, RawDecision, Sentiment};

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::RequestConfig;
use crate::context::ContextLoader;
use crate::error::{ProviderError, ProviderResult};
use crate::prompts::build_system_prompt;
use crate::provider::{Completion, ReasoningBackend};
use crate::retrieval::KnowledgeRetriever;
use crate::tools::SupportTool;

/// Drives one support turn from message to decision.
pub struct DecisionEngine {
    retriever: KnowledgeRetriever,
    context: ContextLoader,
    reasoning: Arc<dyn ReasoningBackend>,
    request: RequestConfig,
}

impl DecisionEngine {
    /// Create a new decision engine
    pub fn new(
        retriever: KnowledgeRetriever,
        context: ContextLoader,
        reasoning: Arc<dyn ReasoningBackend>,
        request: RequestConfig,
    ) -> Self {
        Self {
            retriever,
            context,
            reasoning,
            request,
        }
    }

    /// Decide how to handle one user message.
    ///
    /// Never fails: provider exhaustion and malformed output degrade to
    /// fallback or repaired replies.
    pub async fn decide(
        &self,
        message: &str,
        session_id: &str,
        conversation_id: Option<&str>,
    ) -> AgentReply {
        let start = Instant::now();
        let context_timeout = Duration::from_millis(self.request.timeout_ms);

        // The three context sources are independent; fan out and join.
        // A timed-out source degrades to empty context.
        let (chunks, memory, history) = tokio::join!(
            tokio::time::timeout(context_timeout, self.retriever.retrieve(message)),
            tokio::time::timeout(context_timeout, self.context.load_memory(session_id)),
            tokio::time::timeout(context_timeout, self.context.load_history(conversation_id)),
        );
        let chunks = chunks.unwrap_or_else(|_| {
            warn!("Knowledge retrieval timed out, continuing without context");
            Vec::new()
        });
        let memory = memory.unwrap_or_else(|_| {
            warn!("Memory lookup timed out, continuing without it");
            String::new()
        });
        let history = history.unwrap_or_else(|_| {
            warn!("History lookup timed out, continuing without it");
            String::new()
        });

        let rag_sources_used = !chunks.is_empty();
        let knowledge = KnowledgeRetriever::render_context(&chunks);
        let system_prompt = build_system_prompt(&knowledge, &memory, &history);

        debug!(
            session_id,
            rag_chunks = chunks.len(),
            has_memory = !memory.is_empty(),
            has_history = !history.is_empty(),
            "Submitting reasoning request"
        );

        let completion = match self.complete_with_retry(&system_prompt, message).await {
            Ok(completion) => completion,
            Err(e) => {
                error!(session_id, error = %e, "Reasoning call failed, returning fallback");
                return fallback_reply(&e);
            }
        };

        let raw = RawDecision::from_completion(completion);

        // The confidence/sentiment rule is ground truth; the provider's
        // stated action is advisory.
        let confidence = raw.confidence.clamp(0.0, 1.0);
        let action = decide_action(confidence, raw.sentiment);
        if action != raw.decision {
            debug!(
                stated = %raw.decision,
                enforced = %action,
                confidence,
                sentiment = %raw.sentiment,
                "Overriding provider action to match decision rule"
            );
        }

        let (tool_executed, tool_result) = self.run_tool(&raw).await;

        info!(
            session_id,
            intent = %raw.intent,
            confidence,
            sentiment = %raw.sentiment,
            action = %action,
            tool = tool_executed.as_deref().unwrap_or("none"),
            rag_sources_used,
            latency_ms = start.elapsed().as_millis() as i64,
            "Decision completed"
        );

        AgentReply {
            content: raw.response,
            intent: raw.intent,
            confidence,
            sentiment: raw.sentiment,
            action,
            reasoning: Some(raw.reasoning).filter(|r| !r.is_empty()),
            tool_executed,
            tool_result,
            rag_sources_used,
            error: None,
            fallback: None,
        }
    }

    /// Call the reasoning backend, retrying transient failures with
    /// exponential backoff plus jitter up to the attempt cap.
    async fn complete_with_retry(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> ProviderResult<Completion> {
        let max_attempts = self.request.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                let backoff = self.request.retry_delay_ms * 2u64.pow(attempt - 1);
                let jitter = rand::thread_rng().gen_range(0..self.request.retry_delay_ms.max(1));
                let delay = Duration::from_millis(backoff + jitter);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying reasoning request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.reasoning.complete(system_prompt, user_message).await {
                Ok(completion) => return Ok(completion),
                Err(e) => {
                    attempt += 1;
                    if e.is_transient() && attempt < max_attempts {
                        warn!(attempt, error = %e, "Reasoning request failed");
                        continue;
                    }
                    // Distinguish exhausted rate limiting so the fallback
                    // carries its own error code.
                    if e.is_rate_limit() {
                        return Err(ProviderError::RateLimited { attempts: attempt });
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Execute the requested tool, if any. A lookup miss or execution
    /// failure leaves the result empty without disturbing the decision.
    async fn run_tool(&self, raw: &RawDecision) -> (Option<String>, Option<Value>) {
        if raw.tool_to_call.is_empty() || raw.tool_to_call == "none" {
            return (None, None);
        }

        let requested = raw.tool_to_call.clone();
        let Some(tool) = SupportTool::from_wire(&requested) else {
            warn!(tool = %requested, "Reasoning provider requested an unknown tool");
            return (Some(requested), None);
        };

        let params = if raw.tool_params.is_null() {
            json!({})
        } else {
            raw.tool_params.clone()
        };

        match tool.execute(&params).await {
            Ok(result) => {
                info!(tool = %requested, "Tool executed");
                (Some(requested), Some(result))
            }
            Err(e) => {
                error!(tool = %requested, error = %e, "Tool execution failed");
                (Some(requested), None)
            }
        }
    }
}

/// Map a terminal provider error to its deterministic fallback reply.
fn fallback_reply(error: &ProviderError) -> AgentReply {
    match error {
        ProviderError::RateLimited { .. } => AgentReply::degraded(
            "I'm experiencing high demand right now. Please try again in a moment.",
            DecisionAction::Clarify,
            "rate_limited",
        ),
        ProviderError::QuotaExceeded { .. } => AgentReply::degraded(
            "I'm temporarily unavailable. Please try again later or contact support directly.",
            DecisionAction::Escalate,
            "quota_exceeded",
        ),
        other => AgentReply::degraded(
            "I'm sorry, I encountered an error. Please try again.",
            DecisionAction::Clarify,
            other.to_string(),
        )
        .with_fallback_flag(),
    }
}

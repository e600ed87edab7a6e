//! Decision types shared between the engine, the orchestrator, and the
//! HTTP surface, plus the deterministic action rule and the decoding of
//! raw provider output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::Completion;

/// Classified intent of a user message.
///
/// The label set is closed; anything the provider invents folds into
/// `GeneralQuery`. `Error` is reserved for fallback replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    LoginIssue,
    PaymentIssue,
    RefundRequest,
    TechnicalBug,
    FeatureRequest,
    AccountManagement,
    Error,
    #[serde(other)]
    GeneralQuery,
}

impl Intent {
    /// Wire label for the intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::LoginIssue => "login_issue",
            Intent::PaymentIssue => "payment_issue",
            Intent::RefundRequest => "refund_request",
            Intent::TechnicalBug => "technical_bug",
            Intent::FeatureRequest => "feature_request",
            Intent::AccountManagement => "account_management",
            Intent::Error => "error",
            Intent::GeneralQuery => "general_query",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected emotional tone of the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Wire label for the sentiment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the agent decided to do with the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    /// Answer and close out the issue.
    Resolve,
    /// Ask the user for more information.
    Clarify,
    /// Hand the conversation to a human.
    Escalate,
}

impl DecisionAction {
    /// Wire label for the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Resolve => "resolve",
            DecisionAction::Clarify => "clarify",
            DecisionAction::Escalate => "escalate",
        }
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action the confidence/sentiment bands dictate.
///
/// This is the ground truth the engine enforces after every reasoning
/// call, whatever action the provider claimed. Negative sentiment with
/// shaky confidence escalates even inside the clarify band.
pub fn decide_action(confidence: f64, sentiment: Sentiment) -> DecisionAction {
    let confidence = confidence.clamp(0.0, 1.0);
    if confidence < 0.6 {
        DecisionAction::Escalate
    } else if sentiment == Sentiment::Negative && confidence < 0.7 {
        DecisionAction::Escalate
    } else if confidence >= 0.85 {
        DecisionAction::Resolve
    } else {
        DecisionAction::Clarify
    }
}

fn default_tool() -> String {
    "none".to_string()
}

/// The structured payload a reasoning call must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDecision {
    /// Classified intent.
    pub intent: Intent,
    /// Classification confidence, 0.0-1.0.
    pub confidence: f64,
    /// Detected sentiment.
    pub sentiment: Sentiment,
    /// The action the provider chose (advisory; the rule is re-applied).
    #[serde(alias = "action")]
    pub decision: DecisionAction,
    /// The reply to show the user.
    pub response: String,
    /// The provider's internal reasoning.
    #[serde(default)]
    pub reasoning: String,
    /// Wire name of the tool to invoke, or `"none"`.
    #[serde(default = "default_tool")]
    pub tool_to_call: String,
    /// Opaque parameters for the tool.
    #[serde(default)]
    pub tool_params: Value,
}

impl RawDecision {
    /// Decode a provider completion, repairing malformed output instead of
    /// failing. Text completions may be wrapped in markdown code fences.
    pub fn from_completion(completion: Completion) -> Self {
        match completion {
            Completion::Structured(value) => match serde_json::from_value(value.clone()) {
                Ok(decision) => decision,
                Err(_) => {
                    let text = value
                        .get("response")
                        .and_then(Value::as_str)
                        .unwrap_or("I'm not sure how to help with that.")
                        .to_string();
                    Self::repaired(text)
                }
            },
            Completion::Text(text) => {
                let stripped = strip_code_fences(&text);
                match serde_json::from_str(&stripped) {
                    Ok(decision) => decision,
                    Err(_) => Self::repaired(text),
                }
            }
        }
    }

    /// Best-effort decision built from unparseable provider output.
    fn repaired(text: String) -> Self {
        let response = if text.trim().is_empty() {
            "I'm not sure how to help with that.".to_string()
        } else {
            text
        };
        Self {
            intent: Intent::GeneralQuery,
            confidence: 0.5,
            sentiment: Sentiment::Neutral,
            decision: DecisionAction::Clarify,
            response,
            reasoning: "failed to parse structured response".to_string(),
            tool_to_call: default_tool(),
            tool_params: Value::Null,
        }
    }
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// The engine's answer for one turn. Every failure path still produces
/// one of these; nothing raises past `decide`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    /// Reply text shown to the user.
    pub content: String,
    /// Classified intent.
    pub intent: Intent,
    /// Classification confidence, 0.0-1.0.
    pub confidence: f64,
    /// Detected sentiment.
    pub sentiment: Sentiment,
    /// Enforced action.
    pub action: DecisionAction,
    /// Internal reasoning, kept for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Wire name of the requested tool, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_executed: Option<String>,
    /// Result payload of the executed tool; absent on miss or failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    /// Whether retrieved knowledge informed the reply.
    pub rag_sources_used: bool,
    /// Error code when this is a degraded reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when this is the generic error fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

impl AgentReply {
    /// Build a degraded reply with the fallback invariants: zero
    /// confidence, neutral sentiment, `error` intent, no tool, no RAG.
    pub fn degraded(
        content: impl Into<String>,
        action: DecisionAction,
        error: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            intent: Intent::Error,
            confidence: 0.0,
            sentiment: Sentiment::Neutral,
            action,
            reasoning: None,
            tool_executed: None,
            tool_result: None,
            rag_sources_used: false,
            error: Some(error.into()),
            fallback: None,
        }
    }

    /// Mark the reply as the generic error fallback.
    pub fn with_fallback_flag(mut self) -> Self {
        self.fallback = Some(true);
        self
    }
}

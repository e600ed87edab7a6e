use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{classify_api_error, classify_send_error, Completion, EmbeddingBackend, ReasoningBackend};
use crate::config::{ProviderConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};

const CHAT_MODEL: &str = "gpt-4o";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Name of the forced function call that carries the structured decision.
pub const DECISION_FUNCTION: &str = "analyze_and_respond";

/// OpenAI chat-completions + embeddings backend
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend
    pub fn new(provider: &ProviderConfig, request: &RequestConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request.timeout_ms))
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            client,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            timeout_ms: request.timeout_ms,
        })
    }

    /// JSON schema of the decision the model is forced to return.
    fn tool_definitions() -> Value {
        json!([{
            "type": "function",
            "function": {
                "name": DECISION_FUNCTION,
                "description": "Analyze user message and generate structured response with decision",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "intent": {
                            "type": "string",
                            "enum": ["login_issue", "payment_issue", "refund_request", "technical_bug", "feature_request", "account_management", "general_query"],
                            "description": "The classified intent of the user's message"
                        },
                        "confidence": {
                            "type": "number",
                            "description": "Confidence score 0.0-1.0 for the classification"
                        },
                        "sentiment": {
                            "type": "string",
                            "enum": ["positive", "neutral", "negative"],
                            "description": "Detected emotional tone of the user"
                        },
                        "decision": {
                            "type": "string",
                            "enum": ["resolve", "clarify", "escalate"],
                            "description": "Action decision based on confidence: resolve if >=0.85, clarify if 0.6-0.85, escalate if <0.6"
                        },
                        "response": {
                            "type": "string",
                            "description": "The helpful response to send to the user"
                        },
                        "reasoning": {
                            "type": "string",
                            "description": "Internal reasoning for the decision (for logging/debugging)"
                        },
                        "tool_to_call": {
                            "type": "string",
                            "enum": ["reset_password", "check_refund_policy", "create_ticket", "escalate_to_human", "none"],
                            "description": "Tool to execute, or 'none' if no tool needed"
                        },
                        "tool_params": {
                            "type": "object",
                            "description": "Parameters to pass to the tool if tool_to_call is not 'none'"
                        }
                    },
                    "required": ["intent", "confidence", "sentiment", "decision", "response", "reasoning", "tool_to_call"],
                    "additionalProperties": false
                }
            }
        }])
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> ProviderResult<Completion> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: CHAT_MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
            tools: Self::tool_definitions(),
            tool_choice: json!({"type": "function", "function": {"name": DECISION_FUNCTION}}),
        };

        debug!(model = CHAT_MODEL, "Calling OpenAI chat completions");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), error_body));
        }

        let completion: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "Response contained no choices".to_string(),
            })?;

        // Prefer the forced function call; fall back to plain content so
        // the engine can repair a refusal into a clarify decision.
        if let Some(call) = message.tool_calls.and_then(|mut calls| {
            if calls.is_empty() {
                None
            } else {
                Some(calls.remove(0))
            }
        }) {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(arguments) => return Ok(Completion::Structured(arguments)),
                Err(_) => return Ok(Completion::Text(call.function.arguments)),
            }
        }

        Ok(Completion::Text(message.content.unwrap_or_default()))
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = EmbeddingRequest {
            model: EMBEDDING_MODEL.to_string(),
            input: text.replace('\n', " "),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), error_body));
        }

        let embedding: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse embedding response: {}", e),
                })?;

        embedding
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "Embedding response contained no data".to_string(),
            })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    tools: Value,
    tool_choice: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    arguments: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    fn test_config() -> (ProviderConfig, RequestConfig) {
        (
            ProviderConfig {
                kind: ProviderKind::OpenAi,
                api_key: "test_key".to_string(),
                base_url: "https://api.openai.com/".to_string(),
            },
            RequestConfig::default(),
        )
    }

    #[test]
    fn test_backend_creation_trims_base_url() {
        let (provider, request) = test_config();
        let backend = OpenAiBackend::new(&provider, &request).unwrap();
        assert_eq!(backend.base_url, "https://api.openai.com");
    }

    #[test]
    fn tool_definitions_force_decision_schema() {
        let tools = OpenAiBackend::tool_definitions();
        let function = &tools[0]["function"];
        assert_eq!(function["name"], DECISION_FUNCTION);
        let required = function["parameters"]["required"].as_array().unwrap();
        assert!(required.iter().any(|f| f == "confidence"));
        assert!(required.iter().any(|f| f == "tool_to_call"));
    }
}

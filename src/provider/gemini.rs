use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{classify_api_error, classify_send_error, Completion, EmbeddingBackend, ReasoningBackend};
use crate::config::{ProviderConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};

const CHAT_MODEL: &str = "gemini-pro";
const EMBEDDING_MODEL: &str = "embedding-001";

/// Gemini generateContent + embedContent backend.
///
/// Gemini has no forced function calling here; the model is instructed to
/// answer with a JSON object and the completion comes back as text, often
/// wrapped in markdown code fences.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl GeminiBackend {
    /// Create a new Gemini backend
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
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> ProviderResult<Completion> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, CHAT_MODEL, self.api_key
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: format!("{}\n\nUser Message: {}", system_prompt, user_message),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1000,
            },
        };

        debug!(model = CHAT_MODEL, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
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

        let completion: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let text = completion
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "Gemini returned empty response".to_string(),
            })?;

        Ok(Completion::Text(text))
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.base_url, EMBEDDING_MODEL, self.api_key
        );

        let body = EmbedContentRequest {
            model: format!("models/{}", EMBEDDING_MODEL),
            content: Content {
                parts: vec![Part {
                    text: text.replace('\n', " "),
                }],
            },
        };

        let response = self
            .client
            .post(&url)
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

        let embedding: EmbedContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse embedding response: {}", e),
                })?;

        Ok(embedding.embedding.values)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

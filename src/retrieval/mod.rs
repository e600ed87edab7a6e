//! Knowledge retrieval for RAG context.
//!
//! A query is embedded, truncated to the vector index's dimension, and
//! matched against previously ingested documents. Retrieval is strictly
//! best-effort: any failure along the way degrades to "no context", which
//! the engine treats as a normal input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{RequestConfig, RetrievalConfig};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::EmbeddingBackend;

/// A ranked passage returned from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// The passage text.
    pub content: String,
    /// Cosine similarity against the query, 0.0-1.0.
    pub similarity: f64,
    /// Identifier of the source document, when the index reports one.
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Similarity search over an external vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` passages with similarity >= `min_similarity`,
    /// best match first.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> ProviderResult<Vec<KnowledgeChunk>>;
}

/// Vector index reached over HTTP (a `match_documents`-style endpoint).
pub struct HttpVectorIndex {
    client: Client,
    search_url: String,
}

impl HttpVectorIndex {
    /// Create a new HTTP vector index client
    pub fn new(retrieval: &RetrievalConfig, request: &RequestConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request.timeout_ms))
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            client,
            search_url: retrieval.search_url.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f64,
    match_count: usize,
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> ProviderResult<Vec<KnowledgeChunk>> {
        let response = self
            .client
            .post(&self.search_url)
            .json(&MatchRequest {
                query_embedding: embedding,
                match_threshold: min_similarity,
                match_count: top_k,
            })
            .send()
            .await
            .map_err(ProviderError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                message: format!("Failed to parse match response: {}", e),
            })
    }
}

/// Retrieves ranked knowledge passages for a free-text query.
pub struct KnowledgeRetriever {
    embeddings: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl KnowledgeRetriever {
    /// Create a new retriever over an embedding backend and vector index
    pub fn new(
        embeddings: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            config,
        }
    }

    /// Retrieve relevant passages for the query, best match first.
    ///
    /// Never fails: embedding errors, index errors, and empty indexes all
    /// yield an empty result with a logged warning.
    pub async fn retrieve(&self, query: &str) -> Vec<KnowledgeChunk> {
        let mut embedding = match self.embeddings.embed(query).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Query embedding failed, skipping retrieval");
                return Vec::new();
            }
        };

        // The index has a fixed dimension; larger provider embeddings are
        // truncated to fit.
        embedding.truncate(self.config.embedding_dimensions);

        let mut chunks = match self
            .index
            .query(&embedding, self.config.top_k, self.config.min_similarity)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Vector search failed, skipping retrieval");
                return Vec::new();
            }
        };

        // The index is expected to filter and rank, but enforce both here.
        chunks.retain(|c| c.similarity >= self.config.min_similarity);
        chunks.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(self.config.top_k);

        debug!(count = chunks.len(), "Knowledge retrieval completed");
        chunks
    }

    /// Render retrieved chunks into the prompt's knowledge-context block.
    pub fn render_context(chunks: &[KnowledgeChunk]) -> String {
        chunks
            .iter()
            .map(|c| format!("### Content (Similarity: {:.2})\n{}", c.similarity, c.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

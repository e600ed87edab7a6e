//! Integration tests for knowledge retrieval over HTTP.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support_agent::config::{ProviderConfig, ProviderKind, RequestConfig, RetrievalConfig};
use support_agent::provider::OpenAiBackend;
use support_agent::retrieval::{HttpVectorIndex, KnowledgeRetriever, VectorIndex};

fn retrieval_config(search_url: String) -> RetrievalConfig {
    RetrievalConfig {
        search_url,
        ..RetrievalConfig::default()
    }
}

fn request_config() -> RequestConfig {
    RequestConfig {
        timeout_ms: 5000,
        max_attempts: 1,
        retry_delay_ms: 1,
    }
}

/// An embedding response with a vector longer than the index dimension.
fn embedding_response(dimensions: usize) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": [{"embedding": vec![0.25_f32; dimensions]}]
    }))
}

async fn openai_backend(mock_server: &MockServer) -> Arc<OpenAiBackend> {
    let provider = ProviderConfig {
        kind: ProviderKind::OpenAi,
        api_key: "test-api-key".to_string(),
        base_url: mock_server.uri(),
    };
    Arc::new(OpenAiBackend::new(&provider, &request_config()).unwrap())
}

#[tokio::test]
async fn http_index_posts_threshold_and_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/match_documents"))
        .and(body_partial_json(json!({
            "match_threshold": 0.3,
            "match_count": 5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"content": "Refunds take 5 days.", "similarity": 0.82, "document_id": "doc-1"},
            {"content": "Contact billing.", "similarity": 0.44, "document_id": "doc-2"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = retrieval_config(format!("{}/match_documents", mock_server.uri()));
    let index = HttpVectorIndex::new(&config, &request_config()).unwrap();

    let chunks = index.query(&[0.1; 384], 5, 0.3).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "Refunds take 5 days.");
    assert_eq!(chunks[0].document_id.as_deref(), Some("doc-1"));
}

#[tokio::test]
async fn end_to_end_retrieval_ranks_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(embedding_response(1536))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Out of order and partly below threshold; the retriever fixes both.
    Mock::given(method("POST"))
        .and(path("/match_documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"content": "weak match", "similarity": 0.1},
            {"content": "good match", "similarity": 0.7},
            {"content": "best match", "similarity": 0.9}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = retrieval_config(format!("{}/match_documents", mock_server.uri()));
    let index = Arc::new(HttpVectorIndex::new(&config, &request_config()).unwrap());
    let retriever = KnowledgeRetriever::new(openai_backend(&mock_server).await, index, config);

    let chunks = retriever.retrieve("how long do refunds take").await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "best match");
    assert_eq!(chunks[1].content, "good match");
}

#[tokio::test]
async fn same_query_twice_returns_the_same_ranked_set() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(embedding_response(1536))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/match_documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"content": "alpha", "similarity": 0.8},
            {"content": "beta", "similarity": 0.5}
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = retrieval_config(format!("{}/match_documents", mock_server.uri()));
    let index = Arc::new(HttpVectorIndex::new(&config, &request_config()).unwrap());
    let retriever = KnowledgeRetriever::new(openai_backend(&mock_server).await, index, config);

    let first = retriever.retrieve("same query").await;
    let second = retriever.retrieve("same query").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn embedding_endpoint_failure_degrades_to_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("embedding backend down"))
        .mount(&mock_server)
        .await;

    let config = retrieval_config(format!("{}/match_documents", mock_server.uri()));
    let index = Arc::new(HttpVectorIndex::new(&config, &request_config()).unwrap());
    let retriever = KnowledgeRetriever::new(openai_backend(&mock_server).await, index, config);

    assert!(retriever.retrieve("any query").await.is_empty());
}

#[tokio::test]
async fn index_failure_degrades_to_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(embedding_response(1536))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/match_documents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("index offline"))
        .mount(&mock_server)
        .await;

    let config = retrieval_config(format!("{}/match_documents", mock_server.uri()));
    let index = Arc::new(HttpVectorIndex::new(&config, &request_config()).unwrap());
    let retriever = KnowledgeRetriever::new(openai_backend(&mock_server).await, index, config);

    assert!(retriever.retrieve("any query").await.is_empty());
}

#[tokio::test]
async fn empty_index_yields_empty_context() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(embedding_response(1536))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/match_documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = retrieval_config(format!("{}/match_documents", mock_server.uri()));
    let index = Arc::new(HttpVectorIndex::new(&config, &request_config()).unwrap());
    let retriever = KnowledgeRetriever::new(openai_backend(&mock_server).await, index, config);

    let chunks = retriever.retrieve("niche question").await;
    assert!(chunks.is_empty());
    assert_eq!(KnowledgeRetriever::render_context(&chunks), "");
}

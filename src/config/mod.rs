use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

/// Which hosted model backend the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

/// Reasoning/embedding provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration for outbound provider calls
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    /// Total attempts for a reasoning call, including the first one.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

/// Knowledge retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Vector similarity-search endpoint.
    pub search_url: String,
    pub top_k: usize,
    /// Minimum similarity for a chunk to count as relevant. Deliberately
    /// low to favor recall over precision.
    pub min_similarity: f64,
    /// Dimension of the vector index; embeddings are truncated to fit.
    pub embedding_dimensions: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let kind = match env::var("AI_PROVIDER")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => ProviderKind::OpenAi,
            "gemini" => ProviderKind::Gemini,
            other => {
                return Err(AppError::Config {
                    message: format!("Unknown AI_PROVIDER: {} (expected openai or gemini)", other),
                })
            }
        };

        let api_key = env::var("AI_API_KEY")
            .or_else(|_| match kind {
                ProviderKind::OpenAi => env::var("OPENAI_API_KEY"),
                ProviderKind::Gemini => env::var("GEMINI_API_KEY"),
            })
            .map_err(|_| AppError::Config {
                message: "AI_API_KEY is required".to_string(),
            })?;

        let provider = ProviderConfig {
            kind,
            api_key,
            base_url: env::var("AI_BASE_URL").unwrap_or_else(|_| kind.default_base_url().to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/support.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_attempts: env::var("MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        let retrieval = RetrievalConfig {
            search_url: env::var("KNOWLEDGE_SEARCH_URL")
                .unwrap_or_else(|_| "http://localhost:8000/match_documents".to_string()),
            top_k: env::var("RETRIEVAL_TOP_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            min_similarity: env::var("RETRIEVAL_MIN_SIMILARITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.3),
            embedding_dimensions: env::var("EMBEDDING_DIMENSIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(384),
        };

        let server = ServerConfig {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8787".to_string()),
        };

        Ok(Config {
            provider,
            database,
            logging,
            request,
            retrieval,
            server,
        })
    }
}

impl ProviderKind {
    /// Default API base URL for the provider
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_url: "http://localhost:8000/match_documents".to_string(),
            top_k: 5,
            min_similarity: 0.3,
            embedding_dimensions: 384,
        }
    }
}

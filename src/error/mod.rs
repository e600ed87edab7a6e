use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors from the reasoning/embedding providers (OpenAI, Gemini)
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Quota exceeded: {status} - {message}")]
    QuotaExceeded { status: u16, message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether the error is worth retrying (rate limits and network-level
    /// failures). Plain API errors and quota exhaustion are not.
    /// `RateLimited` itself marks retry exhaustion and is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } => true,
            ProviderError::Api { status, .. } => *status == 429,
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether the error is an HTTP 429 rate-limit signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::Api { status: 429, .. })
    }
}

/// Tool execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Execution failed: {message}")]
    Execution { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for tool execution
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Database connection failed: failed to connect");

        let err = StorageError::ConversationNotFound {
            conversation_id: "conv-123".to_string(),
        };
        assert_eq!(err.to_string(), "Conversation not found: conv-123");
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited { attempts: 3 };
        assert_eq!(err.to_string(), "Rate limited after 3 attempts");

        let err = ProviderError::QuotaExceeded {
            status: 402,
            message: "insufficient_quota".to_string(),
        };
        assert_eq!(err.to_string(), "Quota exceeded: 402 - insufficient_quota");

        let err = ProviderError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout { timeout_ms: 100 }.is_transient());
        assert!(ProviderError::Api {
            status: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!ProviderError::RateLimited { attempts: 3 }.is_transient());
        assert!(!ProviderError::QuotaExceeded {
            status: 402,
            message: String::new()
        }
        .is_transient());
        assert!(!ProviderError::Api {
            status: 500,
            message: String::new()
        }
        .is_transient());
        assert!(!ProviderError::InvalidResponse {
            message: String::new()
        }
        .is_transient());
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(ProviderError::Api {
            status: 429,
            message: String::new()
        }
        .is_rate_limit());
        assert!(!ProviderError::Timeout { timeout_ms: 100 }.is_rate_limit());
    }

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::Validation {
            field: "email".to_string(),
            reason: "cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "Validation failed: email - cannot be empty");

        let err = ToolError::UnknownTool {
            name: "delete_account".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown tool: delete_account");
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let storage_err = StorageError::ConversationNotFound {
            conversation_id: "test-123".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }

    #[test]
    fn test_provider_error_conversion_to_app_error() {
        let provider_err = ProviderError::Timeout { timeout_ms: 1000 };
        let app_err: AppError = provider_err.into();
        assert!(matches!(app_err, AppError::Provider(_)));
    }
}

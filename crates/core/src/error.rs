//! Error types for the ferriclaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all ferriclaw operations.
///
/// Tool failures are deliberately absent: tools report errors in-band
/// through `ToolResult` so the model can recover.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Invalid index configuration: {0}")]
    InvalidConfig(String),

    #[error("Collection name cannot be empty")]
    EmptyCollectionName,

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Processing failed: {0}")]
    Processing(String),
}

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Agent {id} is not running (status: {status})")]
    NotRunning { id: String, status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn swarm_error_carries_status() {
        let err = Error::Swarm(SwarmError::NotRunning {
            id: "agent-3".into(),
            status: "completed".into(),
        });
        assert!(err.to_string().contains("agent-3"));
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn knowledge_config_error() {
        let err = KnowledgeError::InvalidConfig("chunk_size must exceed overlap".into());
        assert!(err.to_string().contains("chunk_size"));
    }
}

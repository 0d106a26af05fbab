//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a reasoning backend
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model or deployment not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[cfg(feature = "openai")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<LLMError> for desk_core::Error {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ConfigurationError(msg) => desk_core::Error::InitializationFailed(msg),
            other => desk_core::Error::ProcessingFailed(other.to_string()),
        }
    }
}

impl From<desk_utils::ConfigError> for LLMError {
    fn from(err: desk_utils::ConfigError) -> Self {
        LLMError::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_maps_to_initialization() {
        let err: desk_core::Error = LLMError::ConfigurationError("no key".into()).into();
        assert!(matches!(err, desk_core::Error::InitializationFailed(_)));
    }

    #[test]
    fn test_runtime_errors_map_to_processing() {
        let err: desk_core::Error = LLMError::RateLimitExceeded("slow down".into()).into();
        assert_eq!(
            err.to_string(),
            "Agent processing failed: Rate limit exceeded: slow down"
        );
    }
}

//! Error types for desk-core

use thiserror::Error;

/// Result type alias for desk-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared across the pipeline crates
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Component initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// A pipeline stage failed; the run is aborted
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// A ticker symbol could not be parsed
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Filesystem error while persisting output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any error as the failure of a named stage
    pub fn stage_failed(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_display() {
        let err = Error::stage_failed("Research Analyst", "model unreachable");
        assert_eq!(
            err.to_string(),
            "Stage 'Research Analyst' failed: model unreachable"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

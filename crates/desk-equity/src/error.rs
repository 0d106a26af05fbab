//! Error types for the equity research desk

use thiserror::Error;

/// Failure reported by a market data source.
///
/// Sources run on blocking workers, so every variant carries owned,
/// `Send` data only.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Yahoo Finance chart API error
    #[error("Yahoo Finance error: {0}")]
    Yahoo(String),

    /// Payload did not have the expected shape
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The source answered but had nothing for the request
    #[error("No data: {0}")]
    NoData(String),

    /// The source could not be set up
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for source calls
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Why a report category could not be produced.
///
/// The facade never surfaces these to callers; they are logged and turned
/// into a `Data not available.` block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// Unknown, empty, or unprobeable ticker
    #[error("symbol could not be resolved: {0}")]
    SymbolResolution(String),

    /// The fetch failed, panicked, or returned a malformed payload
    #[error("remote fetch failed: {0}")]
    RemoteFetch(String),

    /// The fetch succeeded with nothing to show
    #[error("empty result")]
    EmptyResult,
}

/// Errors raised while assembling or running the desk
#[derive(Debug, Error)]
pub enum EquityError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Source error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Error from the pipeline or one of its stages
    #[error(transparent)]
    Desk(#[from] desk_core::Error),
}

/// Result type alias for desk operations
pub type Result<T> = std::result::Result<T, EquityError>;

impl From<EquityError> for desk_core::Error {
    fn from(err: EquityError) -> Self {
        match err {
            EquityError::Desk(inner) => inner,
            EquityError::Config(msg) => desk_core::Error::InitializationFailed(msg),
            other => desk_core::Error::ProcessingFailed(other.to_string()),
        }
    }
}

impl From<desk_utils::ConfigError> for EquityError {
    fn from(err: desk_utils::ConfigError) -> Self {
        EquityError::Config(err.to_string())
    }
}

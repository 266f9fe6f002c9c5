//! Error types

use thiserror::Error;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Key {0} holds the wrong kind of value")]
    WrongType(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Upstream source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("Source {0} timed out")]
    Timeout(String),

    #[error("Invalid payload from {source_name}: {reason}")]
    InvalidPayload { source_name: String, reason: String },
}

/// Aggregator errors
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Aggregator already running")]
    AlreadyRunning,
}

impl From<config::ConfigError> for AggregatorError {
    fn from(e: config::ConfigError) -> Self {
        AggregatorError::Config(e.to_string())
    }
}

/// Result type alias
pub type StoreResult<T> = Result<T, StoreError>;
pub type SourceResult<T> = Result<T, SourceError>;
pub type AggregatorResult<T> = Result<T, AggregatorError>;

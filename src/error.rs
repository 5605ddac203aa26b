//! Error types for the Engram actor runtime
//!
//! This module provides structured error handling using thiserror. Store and
//! backend errors propagate unchanged to the worker method that invoked them.

use thiserror::Error;

/// Main error type for Engram operations
#[derive(Error, Debug)]
pub enum EngramError {
    /// Malformed `work` call or malformed entity (e.g. insert with an id set)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown actor or record id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Search request lacks a numeric actor id
    #[error("Search request is missing a numeric actor id")]
    MissingActorId,

    /// Embedding generator returned no vector
    #[error("Embedding generator returned no vector")]
    EmbeddingUnavailable,

    /// Vector index queried or written before `create_indices`
    #[error("Vector index is not initialized")]
    IndexNotInitialized,

    /// Backing store declares itself unable to set arbitrary state
    #[error("Store does not support snapshot restore")]
    RestoreUnsupported,

    /// Snapshot name failed validation
    #[error("Invalid snapshot name: {0}")]
    InvalidSnapshotName(String),

    /// Duplicate registration (e.g. two indexers with the same name)
    #[error("Already loaded: {0}")]
    AlreadyLoaded(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Reasoning engine run failed
    #[error("Engine error: {0}")]
    Engine(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Engram operations
pub type Result<T> = std::result::Result<T, EngramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngramError::NotFound("actor 7".to_string());
        assert_eq!(err.to_string(), "Not found: actor 7");

        let err = EngramError::InvalidSnapshotName("bad name!".to_string());
        assert_eq!(err.to_string(), "Invalid snapshot name: bad name!");
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{");
        assert!(json_err.is_err());

        let engram_err: EngramError = json_err.unwrap_err().into();
        assert!(matches!(engram_err, EngramError::Serialization(_)));
    }
}

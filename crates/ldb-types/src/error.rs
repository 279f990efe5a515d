use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid identifier {input:?}: {reason}")]
    InvalidIdentifier { input: String, reason: String },

    #[error("invalid dataset name {name:?}: {reason}")]
    InvalidDatasetName { name: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

use std::path::PathBuf;

use ldb_types::ObjectHash;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The data object has never been indexed.
    #[error("data object not found: 0x{0}")]
    NotFound(ObjectHash),

    /// The object exists but has no annotation with this version.
    #[error("annotation version {version} not found for 0x{hash}")]
    AnnotationNotFound { hash: ObjectHash, version: u32 },

    /// No annotation payload with this id exists.
    #[error("annotation {id} not found for 0x{hash}")]
    AnnotationIdNotFound { hash: ObjectHash, id: ObjectHash },

    /// The directory is not an LDB instance.
    #[error("not an LDB instance: {0}")]
    NotAnInstance(PathBuf),

    /// A lock file could not be acquired before the timeout.
    #[error("timed out waiting for lock {0}")]
    LockTimeout(PathBuf),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An on-disk file is malformed.
    #[error("corrupt file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// A lock guarding in-memory state was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

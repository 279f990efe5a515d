use ldb_types::{StorageUri, TypeError};

use crate::adapter::Capability;

/// Errors from storage registry and adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The new location is inside, or contains, a registered location.
    #[error("{new} is nested with existing storage location {existing}")]
    NestedLocation { new: String, existing: String },

    /// The location is already registered.
    #[error("storage location {0} already exists")]
    DuplicateLocation(String),

    /// Another location is already read-add.
    #[error("only one storage location may be read-add; {existing} already is")]
    DuplicateReadAdd { existing: String },

    /// The adapter could not verify a required capability.
    #[error("insufficient permissions for {uri}: missing {missing:?}")]
    InsufficientPermission {
        uri: String,
        missing: Vec<Capability>,
    },

    /// No adapter handles this URI scheme.
    #[error("unsupported storage scheme: {0}")]
    UnsupportedScheme(String),

    /// The URI is not a registered storage location.
    #[error("not a registered storage location: {0}")]
    NotRegistered(String),

    /// Nothing exists at the URI.
    #[error("no such file or directory: {0}")]
    NotFound(StorageUri),

    /// An adapter operation exceeded its timeout.
    #[error("{operation} timed out for {uri}")]
    Timeout { uri: String, operation: &'static str },

    #[error(transparent)]
    InvalidUri(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] ldb_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

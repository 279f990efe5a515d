use crate::format::IndexFormat;

/// Errors that abort an indexing run.
///
/// Problems confined to one object (an unreadable file, malformed JSON) are
/// not errors; they are collected as [`crate::IndexFailure`] entries.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Nothing to index at the given URI.
    #[error("no files found at {0}")]
    NoFiles(String),

    /// The files do not have the shape the format expects.
    #[error("files do not match the {format} format: {reason}")]
    UnsupportedFormat { format: IndexFormat, reason: String },

    /// The format name is not known.
    #[error("not a valid indexing format: {0}")]
    UnknownFormat(String),

    /// The target lies outside every registered storage location.
    #[error("{0} is not in a registered storage location")]
    UnregisteredLocation(String),

    /// Unregistered files must be imported but nothing is read-add.
    #[error("no read-add storage location is configured; see 'ldb add-storage --read-add'")]
    NoReadAddLocation,

    #[error(transparent)]
    Storage(#[from] ldb_storage::StorageError),

    #[error(transparent)]
    Store(#[from] ldb_store::StoreError),

    #[error(transparent)]
    Type(#[from] ldb_types::TypeError),
}

/// Result alias for indexing operations.
pub type IndexResult<T> = Result<T, IndexError>;

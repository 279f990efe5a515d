use ldb_types::{ObjectHash, TypeError};

/// Errors from dataset operations.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset not found: ds:{0}")]
    NotFound(String),

    #[error("dataset ds:{name} has no version {version}")]
    VersionNotFound { name: String, version: u32 },

    #[error("dataset ds:{0} has no committed versions")]
    NoVersions(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(ObjectHash),

    #[error("dataset version not found: {0}")]
    DatasetVersionNotFound(ObjectHash),

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] ldb_store::StoreError),
}

/// Result alias for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

use std::path::PathBuf;

/// Errors from workspace operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// The directory holds no `.ldb_workspace`.
    #[error("not a workspace: {0}")]
    NotAWorkspace(PathBuf),

    /// A collection entry could not be parsed.
    #[error("corrupt workspace entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The conflict policy name is not known.
    #[error("unknown annotation conflict policy: {0} (expected \"newest\" or \"incoming\")")]
    UnknownPolicy(String),

    #[error(transparent)]
    Dataset(#[from] ldb_datasets::DatasetError),

    #[error(transparent)]
    Store(#[from] ldb_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

use std::fmt;
use std::path::PathBuf;

use ldb_datasets::DatasetError;
use ldb_indexer::IndexError;
use ldb_query::QueryError;
use ldb_storage::StorageError;
use ldb_store::StoreError;
use ldb_types::TypeError;
use ldb_workspace::{WorkspaceError, WorkspaceStatus};

/// Errors from LDB operations.
#[derive(Debug, thiserror::Error)]
pub enum LdbError {
    /// No usable instance at the resolved location.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `init` was pointed at a directory that already has content.
    #[error("directory is not empty: {}", .0.display())]
    DirectoryNotEmpty(PathBuf),

    /// The workspace has uncommitted changes and `force` was not given.
    #[error("workspace {} has uncommitted changes\n{status}", .path.display())]
    DirtyWorkspace {
        path: PathBuf,
        status: Box<WorkspaceStatus>,
    },

    /// Staging or instantiating into a directory with unrelated content.
    #[error("target is not empty: {} (use force to overwrite)", .0.display())]
    TargetNotEmpty(PathBuf),

    /// The workspace collection equals its parent's.
    #[error("nothing to commit: workspace matches {0}")]
    NothingToCommit(String),

    /// An unindexed local file needs a read-add location to be imported.
    #[error("no read-add storage location is registered")]
    NoReadAddLocation,

    /// A path lies outside registered storage.
    #[error("{0} is not within a registered storage location")]
    UnregisteredLocation(String),

    /// One or more objects could not be copied during instantiate.
    #[error("{count} data object(s) unavailable, first: 0x{first}")]
    ObjectUnavailable { count: usize, first: String },

    /// A command argument could not be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("invalid config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for LDB operations.
pub type LdbResult<T> = Result<T, LdbError>;

/// Coarse classification of [`LdbError`] for callers that map errors to exit
/// codes or user hints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Permission,
    Conflict,
    NotFound,
    DirtyState,
    UnsupportedFormat,
    ObjectUnavailable,
    NothingToCommit,
    NoReadAddLocation,
    UnregisteredLocation,
    InvalidInput,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Permission => "permission",
            Self::Conflict => "conflict",
            Self::NotFound => "not-found",
            Self::DirtyState => "dirty-state",
            Self::UnsupportedFormat => "unsupported-format",
            Self::ObjectUnavailable => "object-unavailable",
            Self::NothingToCommit => "nothing-to-commit",
            Self::NoReadAddLocation => "no-read-add-location",
            Self::UnregisteredLocation => "unregistered-location",
            Self::InvalidInput => "invalid-input",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

impl LdbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Config { .. } => ErrorKind::Configuration,
            Self::DirectoryNotEmpty(_) | Self::TargetNotEmpty(_) | Self::DirtyWorkspace { .. } => {
                ErrorKind::DirtyState
            }
            Self::NothingToCommit(_) => ErrorKind::NothingToCommit,
            Self::NoReadAddLocation => ErrorKind::NoReadAddLocation,
            Self::UnregisteredLocation(_) => ErrorKind::UnregisteredLocation,
            Self::ObjectUnavailable { .. } => ErrorKind::ObjectUnavailable,
            Self::InvalidInput(_) | Self::Type(_) => ErrorKind::InvalidInput,
            Self::Store(e) => store_kind(e),
            Self::Storage(e) => storage_kind(e),
            Self::Dataset(e) => dataset_kind(e),
            Self::Query(e) => match e {
                QueryError::DuplicateFilter(_) => ErrorKind::Conflict,
                QueryError::Store(s) => store_kind(s),
                _ => ErrorKind::InvalidInput,
            },
            Self::Index(e) => match e {
                IndexError::NoFiles(_) => ErrorKind::NotFound,
                IndexError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
                IndexError::UnknownFormat(_) | IndexError::Type(_) => ErrorKind::InvalidInput,
                IndexError::UnregisteredLocation(_) => ErrorKind::UnregisteredLocation,
                IndexError::NoReadAddLocation => ErrorKind::NoReadAddLocation,
                IndexError::Storage(s) => storage_kind(s),
                IndexError::Store(s) => store_kind(s),
            },
            Self::Workspace(e) => match e {
                WorkspaceError::NotAWorkspace(_) => ErrorKind::NotFound,
                WorkspaceError::UnknownPolicy(_) => ErrorKind::Configuration,
                WorkspaceError::Dataset(d) => dataset_kind(d),
                WorkspaceError::Store(s) => store_kind(s),
                WorkspaceError::Corrupt { .. } | WorkspaceError::Io(_) => ErrorKind::Io,
            },
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::NotFound(_)
        | StoreError::AnnotationNotFound { .. }
        | StoreError::AnnotationIdNotFound { .. } => ErrorKind::NotFound,
        StoreError::NotAnInstance(_) => ErrorKind::Configuration,
        _ => ErrorKind::Io,
    }
}

fn storage_kind(e: &StorageError) -> ErrorKind {
    match e {
        StorageError::NestedLocation { .. }
        | StorageError::DuplicateLocation(_)
        | StorageError::DuplicateReadAdd { .. } => ErrorKind::Conflict,
        StorageError::InsufficientPermission { .. } => ErrorKind::Permission,
        StorageError::UnsupportedScheme(_) | StorageError::InvalidUri(_) => ErrorKind::InvalidInput,
        StorageError::NotRegistered(_) | StorageError::NotFound(_) => ErrorKind::NotFound,
        StorageError::Store(s) => store_kind(s),
        StorageError::Timeout { .. } | StorageError::Io(_) => ErrorKind::Io,
    }
}

fn dataset_kind(e: &DatasetError) -> ErrorKind {
    match e {
        DatasetError::InvalidName(_) => ErrorKind::InvalidInput,
        DatasetError::Store(s) => store_kind(s),
        _ => ErrorKind::NotFound,
    }
}

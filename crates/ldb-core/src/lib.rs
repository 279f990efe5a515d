//! User-level operations for LDB.
//!
//! [`Instance`] ties together the object store, dataset repository and
//! storage registry of one instance directory, and exposes the commands of
//! the `ldb` tool as methods.
//!
//! # Instance Resolution
//!
//! [`InstanceConfig::resolve`] picks the instance directory once per command:
//!
//! 1. an explicit directory,
//! 2. the `LDB_DIR` environment variable,
//! 3. `core.ldb_dir` in `~/.ldb/config`,
//! 4. `~/.ldb/private_instance`, created in relaxed mode the first time a
//!    dataset is staged. Every other command needs an existing instance.
//!
//! # Workflow
//!
//! ```text
//! add_storage ─► index ─► stage ─► add / delete / pull ─► commit ─► instantiate
//!                                    ▲                        │
//!                                    └────────────────────────┘
//! ```
//!
//! # Design Rules
//!
//! 1. Mutating workspace operations hold `.ldb_workspace/lock`.
//! 2. Committed dataset versions are never modified.
//! 3. Filters are validated before anything is indexed or written.
//! 4. Per-object failures during indexing and instantiation are collected,
//!    not fatal.

pub mod add;
pub mod commit;
pub mod config;
pub mod datasets;
pub mod error;
pub mod index;
pub mod instance;
pub mod instantiate;
pub mod pull;
mod resolve;
pub mod stage;
pub mod storage;

pub use add::{AddOptions, AddOutcome, ListEntry};
pub use commit::CommitOutcome;
pub use config::{
    current_user, GlobalConfig, InstanceConfig, InstanceSettings, InstanceSource, LDB_DIR_ENV,
};
pub use datasets::{DatasetSummary, VersionSummary};
pub use error::{ErrorKind, LdbError, LdbResult};
pub use instance::Instance;
pub use instantiate::{InstantiateFailure, InstantiateResult};
pub use pull::PullOutcome;
pub use stage::{parse_dataset_arg, StageOutcome};
pub use storage::StorageChange;

// Re-export the types callers need to drive the API.
pub use ldb_datasets::{CollectionDiff, DiffEntry, DiffKind, DiffSummary};
pub use ldb_indexer::{IndexFormat, IndexingResult};
pub use ldb_query::{FilterSpec, Predicate, SimilarityScorer};
pub use ldb_storage::{AdapterSet, RegisterOptions, StorageAdapter, StorageLocation};
pub use ldb_types::{ObjectHash, StorageUri};
pub use ldb_workspace::{ConflictPolicy, WorkspaceStatus};

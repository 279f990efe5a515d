//! Workspace staging area for LDB.
//!
//! A workspace is a directory containing `.ldb_workspace/`, bound to one
//! dataset name. It holds a mutable working copy of a collection that
//! `add` and `del` edit and `commit` snapshots into a new dataset version.
//!
//! # Layout
//!
//! ```text
//! <dir>/.ldb_workspace/
//!   workspace_dataset          {dataset_name, staged_time, parent, tags}
//!   collection/<h3>/<rest>     annotation id, or empty
//!   lock                       held during mutating operations
//! ```
//!
//! # States
//!
//! A workspace is *clean* when its collection equals the collection of its
//! parent version (or is empty when it has no parent) and *dirty* otherwise.

pub mod error;
pub mod merge;
pub mod status;
pub mod workspace;

pub use error::{WorkspaceError, WorkspaceResult};
pub use merge::{merge_entries, ConflictPolicy, MergeOutcome};
pub use status::WorkspaceStatus;
pub use workspace::{Workspace, WorkspaceDataset, WORKSPACE_DIR};

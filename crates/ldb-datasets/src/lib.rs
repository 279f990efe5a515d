//! Datasets for LDB.
//!
//! A dataset is a name plus an ordered list of committed, immutable versions.
//! Each [`DatasetVersion`] pins a [`Collection`]: a mapping from data-object
//! hash to the annotation id selected for it (or none).
//!
//! Collections and dataset versions are content-addressed and write-once.
//! The per-dataset file `datasets/<name>` is the only mutable record, and
//! appending to it is the single publishing write of a commit.

pub mod collection;
pub mod dataset;
pub mod diff;
pub mod error;
pub mod repository;

pub use collection::Collection;
pub use dataset::{CommitInfo, Dataset, DatasetVersion};
pub use diff::{diff_collections, CollectionDiff, DiffEntry, DiffKind, DiffSummary};
pub use error::{DatasetError, DatasetResult};
pub use repository::{CommitRequest, DatasetRepository, ResolvedVersion};

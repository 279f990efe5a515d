//! Content-addressed object store for LDB.
//!
//! This crate owns the on-disk layout of an LDB instance and everything that
//! is keyed by a data object's content hash: object metadata (known physical
//! locations, size, tags, index timestamps) and the versioned annotations
//! attached to each object.
//!
//! # Instance Layout
//!
//! ```text
//! <instance>/
//!   config                      TOML instance configuration
//!   storage                     JSON storage registry
//!   data_object_info/<h3>/<rest>/
//!       meta                    object metadata
//!       current                 current annotation id
//!       annotations/<id>        annotation metadata (version, timestamps)
//!   datasets/<name>             dataset version lists
//!   objects/annotations/<a3>/<rest>/{ldb,user}
//!   objects/collections/<c3>/<rest>
//!   objects/dataset_versions/<v3>/<rest>
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FileObjectStore`]: the instance directory layout above
//! - [`InMemoryObjectStore`]: `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are never deleted; their location sets only grow.
//! 2. Annotation versions are immutable and numbered from 1 without gaps.
//! 3. Every file is written atomically (temp file + rename).
//! 4. Content-addressed files are write-once.
//! 5. Version allocation happens under a per-object lock file.

pub mod error;
pub mod file;
pub mod fs;
pub mod layout;
pub mod lock;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileObjectStore;
pub use layout::InstanceLayout;
pub use lock::LockFile;
pub use memory::InMemoryObjectStore;
pub use object::{
    AnnotationMeta, AnnotationPayload, AnnotationVersion, DataObject, DataObjectMeta, LdbContent,
    ObjectInfo, ObjectLocation, PutAnnotationOutcome, PutObjectOutcome, PutOptions,
};
pub use traits::ObjectStore;

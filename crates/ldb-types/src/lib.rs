//! Foundation types for LDB.
//!
//! Every other LDB crate depends on `ldb-types`. It carries no storage logic,
//! only the value types that flow between components.
//!
//! # Key Types
//!
//! - [`ObjectHash`]: MD5 content address of a data object or annotation
//! - [`ContentHasher`]: streaming hasher producing [`ObjectHash`] values
//! - [`Identifier`]: parsed `0x…` / `ds:name.vN` / `ds:root` / path argument
//! - [`DatasetRef`]: dataset name plus optional version number
//! - [`StorageUri`]: `(protocol, path)` pair for local paths and `scheme://` URIs

pub mod error;
pub mod hash;
pub mod identifier;
pub mod names;
pub mod time;
pub mod uri;

pub use error::TypeError;
pub use hash::{ContentHasher, ObjectHash};
pub use identifier::{DatasetRef, Identifier, DATASET_PREFIX, OBJECT_PREFIX, ROOT_DATASET};
pub use names::validate_dataset_name;
pub use time::{format_timestamp, now_timestamp, parse_timestamp};
pub use uri::{StorageUri, FILE_PROTOCOL};

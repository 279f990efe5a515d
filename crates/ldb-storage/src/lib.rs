//! Storage locations for LDB.
//!
//! LDB never owns the bytes of a data object. It records where they live, and
//! only indexes content inside *registered* storage locations. This crate
//! holds:
//!
//! - [`StorageRegistry`]: the persisted list of registered locations with
//!   their permission class (read-only or read-add) and containment rules
//! - [`StorageAdapter`]: the capability interface `{list, stat, read, write}`
//!   implemented per URI scheme, with [`LocalAdapter`] for the local
//!   filesystem
//! - [`AdapterSet`]: scheme → adapter dispatch
//! - [`BoundedAdapter`]: any adapter with each operation cut off at its
//!   timeout
//!
//! # Registry Rules
//!
//! 1. No two locations of the same protocol may be nested.
//! 2. At most one location is read-add.
//! 3. A location must grant list, stat and read (and write when read-add).

pub mod adapter;
pub mod bounded;
pub mod error;
pub mod local;
pub mod registry;

pub use adapter::{AdapterSet, Capability, CapabilitySet, FileStat, StorageAdapter};
pub use bounded::BoundedAdapter;
pub use error::{StorageError, StorageResult};
pub use local::LocalAdapter;
pub use registry::{RegisterOptions, StorageClass, StorageLocation, StorageRegistry};

//! Indexing for LDB.
//!
//! The indexer walks a storage URI, groups the files it finds into data
//! objects and annotations according to an [`IndexFormat`], hashes every data
//! object and records the results in an [`ldb_store::ObjectStore`].
//!
//! # Formats
//!
//! | Format            | Aliases                                  |
//! |-------------------|------------------------------------------|
//! | `auto`            | `auto-detect`                            |
//! | `strict-pairs`    | `strict`                                 |
//! | `bare-pairs`      | `bare`                                   |
//! | `annotation-only` | `annot`                                  |
//! | `folder-labels`   | `infer`, `tensorflow-inferred`, `imagenet` |
//! | `coco`            |                                          |
//!
//! Each concrete format is a [`FormatStrategy`] selected by
//! [`IndexFormat::strategy`].
//!
//! # Design Rules
//!
//! 1. Shape errors abort the run before anything is written.
//! 2. Per-file problems are collected in [`IndexingResult::failures`] and the
//!    rest of the batch continues.
//! 3. Hashing runs in parallel; writes happen in enumeration order.
//! 4. Re-indexing unchanged content only refreshes timestamps and locations.

pub mod error;
pub mod format;
pub mod formats;
pub mod import;
pub mod indexer;
pub mod result;

pub use error::{IndexError, IndexResult};
pub use format::{AnnotationSource, FormatStrategy, IndexFormat, IndexItem, PlanInput};
pub use import::AUTOIMPORT_DIR;
pub use indexer::{IndexOptions, Indexer, UnregisteredPolicy};
pub use result::{IndexFailure, IndexedObject, IndexingResult};

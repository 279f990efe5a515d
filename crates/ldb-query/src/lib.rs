//! Query and filter pipeline for LDB.
//!
//! `add`, `del` and `list` narrow their candidates through an ordered list of
//! filters. Each filter kind is a [`FilterStage`]; a [`Pipeline`] runs them
//! strictly in the order given, each stage seeing only what the previous one
//! kept.
//!
//! # Filter Kinds
//!
//! | Kind           | Keeps candidates whose…                                 |
//! |----------------|---------------------------------------------------------|
//! | `file`         | object metadata JSON satisfies a predicate              |
//! | `query`        | annotation JSON satisfies a predicate                   |
//! | `tag`          | object carries any of the given tags                    |
//! | `similarity`   | [`SimilarityScorer`] score is at least a threshold      |
//! | `limit`        | position is among the first N                           |
//! | `sample`       | index was drawn in a uniform sample of N                |
//! | `version`      | annotation version equals N                             |
//! | `user_version` | annotation `ldb.user_version` equals V                  |
//!
//! At most one filter of each kind may appear in a pipeline.

pub mod candidate;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod predicate;
pub mod stage;
pub mod stages;

pub use candidate::Candidate;
pub use error::{QueryError, QueryResult};
pub use filter::{FilterKind, FilterSpec};
pub use pipeline::Pipeline;
pub use predicate::Predicate;
pub use stage::{FilterContext, FilterStage, SimilarityScorer};
pub use stages::FieldScorer;

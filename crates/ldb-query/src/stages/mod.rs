//! Built-in filter stages, one per [`crate::FilterKind`].

pub mod predicate;
pub mod selection;
pub mod similarity;
pub mod tag;
pub mod version;

pub use predicate::{FileStage, QueryStage};
pub use selection::{LimitStage, SampleStage};
pub use similarity::{FieldScorer, SimilarityStage};
pub use tag::TagStage;
pub use version::{UserVersionStage, VersionStage};

use crate::candidate::Candidate;
use crate::error::QueryResult;

/// Keep candidates for which `keep` returns `true`, preserving order and
/// stopping at the first error.
pub(crate) fn retain_with<F>(candidates: Vec<Candidate>, mut keep: F) -> QueryResult<Vec<Candidate>>
where
    F: FnMut(&Candidate) -> QueryResult<bool>,
{
    let mut out = Vec::with_capacity(candidates.len());
    for c in candidates {
        if keep(&c)? {
            out.push(c);
        }
    }
    Ok(out)
}

use crate::filter::FilterKind;

/// Errors from building or running a filter pipeline.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The same filter kind was given twice.
    #[error("duplicate filter: --{0} may only be given once")]
    DuplicateFilter(FilterKind),

    /// A predicate expression could not be parsed.
    #[error("invalid expression {input:?} at offset {offset}: {message}")]
    Parse {
        input: String,
        offset: usize,
        message: String,
    },

    /// A filter argument is out of range or malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A similarity filter ran without a scorer.
    #[error("similarity filter requires a scorer")]
    NoScorer,

    /// The scorer failed for a candidate.
    #[error("scorer '{scorer}' failed: {message}")]
    Scorer { scorer: String, message: String },

    #[error(transparent)]
    Store(#[from] ldb_store::StoreError),
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

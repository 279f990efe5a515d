use ldb_store::{AnnotationVersion, DataObject, ObjectStore};

use crate::candidate::Candidate;
use crate::error::QueryResult;
use crate::filter::FilterKind;

// ---------------------------------------------------------------------------
// SimilarityScorer
// ---------------------------------------------------------------------------

/// Scores a data object for the `similarity` filter.
///
/// Embedding models and classifiers live outside LDB and plug in here.
pub trait SimilarityScorer: Send + Sync {
    /// Human-readable name used in errors and logs.
    fn name(&self) -> &str;

    /// Score one object with its pinned annotation. Higher is more similar.
    fn score(&self, object: &DataObject, annotation: Option<&AnnotationVersion>) -> QueryResult<f64>;
}

// ---------------------------------------------------------------------------
// FilterContext
// ---------------------------------------------------------------------------

/// Everything a stage may consult besides the candidates themselves.
pub struct FilterContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub scorer: Option<&'a dyn SimilarityScorer>,
}

impl<'a> FilterContext<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            scorer: None,
        }
    }

    pub fn with_scorer(mut self, scorer: &'a dyn SimilarityScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// The candidate's pinned annotation, if any.
    pub fn annotation(&self, candidate: &Candidate) -> QueryResult<Option<AnnotationVersion>> {
        match &candidate.annotation {
            None => Ok(None),
            Some(id) => Ok(Some(self.store.annotation_by_id(&candidate.hash, id)?)),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterStage trait
// ---------------------------------------------------------------------------

/// One stage of the filter pipeline.
///
/// A stage receives the survivors of the previous stage, in order, and
/// returns the candidates it keeps. Stages never reorder candidates.
pub trait FilterStage: Send + Sync {
    fn kind(&self) -> FilterKind;

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>>;
}

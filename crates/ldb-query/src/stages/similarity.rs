use ldb_store::{AnnotationVersion, DataObject};

use crate::candidate::Candidate;
use crate::error::{QueryError, QueryResult};
use crate::filter::FilterKind;
use crate::predicate::Predicate;
use crate::stage::{FilterContext, FilterStage, SimilarityScorer};

use super::retain_with;

/// `similarity`: scorer result at or above `threshold`.
pub struct SimilarityStage {
    pub threshold: f64,
}

impl FilterStage for SimilarityStage {
    fn kind(&self) -> FilterKind {
        FilterKind::Similarity
    }

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        let scorer = ctx.scorer.ok_or(QueryError::NoScorer)?;
        retain_with(candidates, |c| {
            let object = ctx.store.get_object(&c.hash)?;
            let annotation = ctx.annotation(c)?;
            Ok(scorer.score(&object, annotation.as_ref())? >= self.threshold)
        })
    }
}

/// Scores objects by a numeric field of their annotation, e.g. a score
/// written by an external model. Objects without the field score `0.0`.
pub struct FieldScorer {
    path: Predicate,
}

impl FieldScorer {
    /// `path` uses predicate path syntax, e.g. `scores.cat`.
    pub fn new(path: &str) -> QueryResult<Self> {
        Ok(Self {
            path: Predicate::parse(path)?,
        })
    }
}

impl SimilarityScorer for FieldScorer {
    fn name(&self) -> &str {
        self.path.source()
    }

    fn score(&self, _object: &DataObject, annotation: Option<&AnnotationVersion>) -> QueryResult<f64> {
        let Some(annotation) = annotation else {
            return Ok(0.0);
        };
        Ok(self.path.evaluate(annotation.value()).as_f64().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::populate;
    use ldb_store::InMemoryObjectStore;
    use serde_json::json;

    #[test]
    fn keeps_scores_at_or_above_threshold() {
        let store = InMemoryObjectStore::new();
        let cands = populate(
            &store,
            &[Some(json!({"s": 0.9})), Some(json!({"s": 0.5})), None, Some(json!({"s": 0.2}))],
        );
        let scorer = FieldScorer::new("s").unwrap();
        let ctx = FilterContext::new(&store).with_scorer(&scorer);
        let kept = SimilarityStage { threshold: 0.5 }.apply(cands.clone(), &ctx).unwrap();
        assert_eq!(kept, vec![cands[0], cands[1]]);
    }

    #[test]
    fn missing_scorer_is_an_error() {
        let store = InMemoryObjectStore::new();
        let err = SimilarityStage { threshold: 0.1 }
            .apply(Vec::new(), &FilterContext::new(&store))
            .unwrap_err();
        assert!(matches!(err, QueryError::NoScorer));
    }
}

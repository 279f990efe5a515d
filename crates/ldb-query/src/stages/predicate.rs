use crate::candidate::Candidate;
use crate::error::{QueryError, QueryResult};
use crate::filter::FilterKind;
use crate::predicate::Predicate;
use crate::stage::{FilterContext, FilterStage};

use super::retain_with;

/// `file`: predicate over the data object's metadata.
pub struct FileStage {
    pub predicate: Predicate,
}

impl FilterStage for FileStage {
    fn kind(&self) -> FilterKind {
        FilterKind::File
    }

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        retain_with(candidates, |c| {
            let object = ctx.store.get_object(&c.hash)?;
            let doc = serde_json::to_value(&object.meta)
                .map_err(|e| QueryError::from(ldb_store::StoreError::from(e)))?;
            Ok(self.predicate.matches(&doc))
        })
    }
}

/// `query`: predicate over the pinned annotation. Unannotated objects never
/// match.
pub struct QueryStage {
    pub predicate: Predicate,
}

impl FilterStage for QueryStage {
    fn kind(&self) -> FilterKind {
        FilterKind::Query
    }

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        retain_with(candidates, |c| {
            Ok(ctx
                .annotation(c)?
                .is_some_and(|a| self.predicate.matches(a.value())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::populate;
    use ldb_store::InMemoryObjectStore;
    use serde_json::json;

    #[test]
    fn query_keeps_matching_annotations_in_order() {
        let store = InMemoryObjectStore::new();
        let cands = populate(
            &store,
            &[Some(json!({"class": "i"})), None, Some(json!({"class": "v"})), Some(json!({"class": "i"}))],
        );
        let stage = QueryStage {
            predicate: Predicate::parse("class == 'i'").unwrap(),
        };
        let kept = stage.apply(cands.clone(), &FilterContext::new(&store)).unwrap();
        assert_eq!(kept, vec![cands[0], cands[3]]);
    }

    #[test]
    fn file_predicate_sees_metadata() {
        let store = InMemoryObjectStore::new();
        let cands = populate(&store, &[None, None, None]);
        let stage = FileStage {
            predicate: Predicate::parse("fs.size >= 1 && type == 'png'").unwrap(),
        };
        let kept = stage.apply(cands.clone(), &FilterContext::new(&store)).unwrap();
        assert_eq!(kept, vec![cands[1], cands[2]]);
    }
}

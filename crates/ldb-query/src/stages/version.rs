use serde_json::Value;

use crate::candidate::Candidate;
use crate::error::QueryResult;
use crate::filter::FilterKind;
use crate::stage::{FilterContext, FilterStage};

use super::retain_with;

/// `version`: pinned annotation has this version number.
pub struct VersionStage {
    pub version: u32,
}

impl FilterStage for VersionStage {
    fn kind(&self) -> FilterKind {
        FilterKind::Version
    }

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        retain_with(candidates, |c| {
            Ok(ctx.annotation(c)?.is_some_and(|a| a.version() == self.version))
        })
    }
}

/// `user_version`: pinned annotation's `ldb.user_version` equals a value.
pub struct UserVersionStage {
    pub user_version: Value,
}

impl FilterStage for UserVersionStage {
    fn kind(&self) -> FilterKind {
        FilterKind::UserVersion
    }

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        retain_with(candidates, |c| {
            Ok(ctx.annotation(c)?.is_some_and(|a| {
                a.payload.ldb.user_version.as_ref() == Some(&self.user_version)
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::populate;
    use ldb_store::{AnnotationPayload, InMemoryObjectStore, LdbContent, ObjectStore};
    use serde_json::json;

    #[test]
    fn version_matches_pinned_annotation_not_current() {
        let store = InMemoryObjectStore::new();
        let cands = populate(&store, &[Some(json!(1)), Some(json!(1))]);
        // Object 0 gets a second version; the candidate still pins version 1.
        store
            .put_annotation(&cands[0].hash, &AnnotationPayload::new(json!(2)), None)
            .unwrap();
        let stage = VersionStage { version: 1 };
        let kept = stage.apply(cands.clone(), &FilterContext::new(&store)).unwrap();
        assert_eq!(kept, cands);
        let none = VersionStage { version: 2 }
            .apply(cands, &FilterContext::new(&store))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn user_version_compares_ldb_content() {
        let store = InMemoryObjectStore::new();
        let cands = populate(&store, &[None]);
        let payload = AnnotationPayload {
            ldb: LdbContent {
                user_version: Some(json!(3)),
                schema_version: None,
            },
            user: json!({}),
        };
        let id = store
            .put_annotation(&cands[0].hash, &payload, None)
            .unwrap()
            .annotation
            .id;
        let pinned = vec![Candidate::new(cands[0].hash, Some(id))];
        let ctx = FilterContext::new(&store);
        let hit = UserVersionStage { user_version: json!(3) }.apply(pinned.clone(), &ctx).unwrap();
        assert_eq!(hit.len(), 1);
        let miss = UserVersionStage { user_version: json!(4) }.apply(pinned, &ctx).unwrap();
        assert!(miss.is_empty());
    }
}

use crate::candidate::Candidate;
use crate::error::QueryResult;
use crate::filter::FilterKind;
use crate::stage::{FilterContext, FilterStage};

use super::retain_with;

/// `tag`: object carries any of the tags.
pub struct TagStage {
    pub tags: Vec<String>,
}

impl FilterStage for TagStage {
    fn kind(&self) -> FilterKind {
        FilterKind::Tag
    }

    fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        retain_with(candidates, |c| {
            let object = ctx.store.get_object(&c.hash)?;
            Ok(self.tags.iter().any(|t| object.tags().contains(t)))
        })
    }
}

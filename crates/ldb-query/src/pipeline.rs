use std::collections::BTreeSet;

use tracing::debug;

use crate::candidate::Candidate;
use crate::error::{QueryError, QueryResult};
use crate::filter::{FilterKind, FilterSpec};
use crate::stage::{FilterContext, FilterStage};
use crate::stages::{
    FileStage, LimitStage, QueryStage, SampleStage, SimilarityStage, TagStage, UserVersionStage,
    VersionStage,
};

/// An ordered list of filter stages.
///
/// Stages run strictly in the order their specs were given, so
/// `--query X --limit 5` and `--limit 5 --query X` select different objects.
pub struct Pipeline {
    stages: Vec<Box<dyn FilterStage>>,
}

impl Pipeline {
    /// Build a pipeline, rejecting a second filter of any kind.
    pub fn new(specs: Vec<FilterSpec>) -> QueryResult<Self> {
        let mut seen = BTreeSet::new();
        let mut stages: Vec<Box<dyn FilterStage>> = Vec::with_capacity(specs.len());
        for spec in specs {
            let kind = spec.kind();
            if !seen.insert(kind) {
                return Err(QueryError::DuplicateFilter(kind));
            }
            stages.push(build_stage(spec)?);
        }
        Ok(Self { stages })
    }

    /// A pipeline that keeps everything.
    pub fn empty() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Stage kinds in evaluation order.
    pub fn kinds(&self) -> Vec<FilterKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Run every stage in order.
    pub fn apply(&self, candidates: Vec<Candidate>, ctx: &FilterContext<'_>) -> QueryResult<Vec<Candidate>> {
        let mut current = candidates;
        for stage in &self.stages {
            let before = current.len();
            current = stage.apply(current, ctx)?;
            debug!(filter = %stage.kind(), before, after = current.len(), "filter applied");
        }
        Ok(current)
    }
}

fn build_stage(spec: FilterSpec) -> QueryResult<Box<dyn FilterStage>> {
    Ok(match spec {
        FilterSpec::File(predicate) => Box::new(FileStage { predicate }),
        FilterSpec::Query(predicate) => Box::new(QueryStage { predicate }),
        FilterSpec::Tag(tags) => {
            if tags.is_empty() {
                return Err(QueryError::InvalidFilter("--tag needs at least one tag".into()));
            }
            Box::new(TagStage { tags })
        }
        FilterSpec::Similarity { threshold } => {
            if !threshold.is_finite() {
                return Err(QueryError::InvalidFilter(format!(
                    "similarity threshold must be finite, got {threshold}"
                )));
            }
            Box::new(SimilarityStage { threshold })
        }
        FilterSpec::Limit(n) => Box::new(LimitStage { n }),
        FilterSpec::Sample { n, seed } => Box::new(SampleStage { n, seed }),
        FilterSpec::Version(version) => {
            if version == 0 {
                return Err(QueryError::InvalidFilter("annotation versions start at 1".into()));
            }
            Box::new(VersionStage { version })
        }
        FilterSpec::UserVersion(user_version) => Box::new(UserVersionStage { user_version }),
    })
}

//! Moving workspace members to their newest annotations.

use std::fmt;
use std::path::Path;

use ldb_query::{Candidate, FilterSpec, Pipeline};
use tracing::{debug, info};

use crate::add::staged_candidates;
use crate::error::LdbResult;
use crate::instance::Instance;
use crate::resolve::PathMode;

/// Result of [`Instance::pull`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// Members re-pinned to a newer annotation.
    pub updated: usize,
    /// Members already pinned to the current annotation.
    pub unchanged: usize,
    /// Members whose object has no annotation at all.
    pub missing: usize,
}

impl PullOutcome {
    pub fn changed(&self) -> bool {
        self.updated > 0
    }
}

impl fmt::Display for PullOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Already up-to-date: {:8}\nNew updates:        {:8}\nMissing annotation: {:8}",
            self.unchanged, self.updated, self.missing
        )
    }
}

impl Instance {
    /// Pin workspace members to the current annotation of their object.
    ///
    /// With no identifiers every member is considered; otherwise only the
    /// members the identifiers resolve to. Filters narrow the selection the
    /// same way they do for `delete`. Objects that never had an annotation
    /// keep their entry.
    pub fn pull(&self, dir: &Path, identifiers: &[String], filters: &[FilterSpec]) -> LdbResult<PullOutcome> {
        let pipeline = Pipeline::new(filters.to_vec())?;
        let (ws, _lock) = self.lock_workspace(dir)?;
        let mut collection = ws.collection()?;

        let staged = if identifiers.is_empty() {
            collection
                .iter()
                .map(|(hash, annotation)| Candidate::new(*hash, *annotation))
                .collect()
        } else {
            let resolved = self.resolve_identifiers(identifiers, Some(dir), PathMode::HashOnly)?;
            staged_candidates(&collection, resolved.candidates)
        };
        let selected = pipeline.apply(staged, &self.filter_context())?;

        let store = self.store();
        let mut outcome = PullOutcome::default();
        for candidate in selected {
            let Some(current) = store.get_object(&candidate.hash)?.current_annotation else {
                outcome.missing += 1;
                continue;
            };
            if candidate.annotation == Some(current) {
                outcome.unchanged += 1;
            } else {
                debug!(object = %candidate.hash, annotation = %current, "re-pinned annotation");
                collection.insert(candidate.hash, Some(current));
                outcome.updated += 1;
            }
        }
        if outcome.changed() {
            ws.write_collection(&collection)?;
        }
        info!(
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            missing = outcome.missing,
            "pull finished"
        );
        Ok(outcome)
    }
}

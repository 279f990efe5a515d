//! Adding, deleting, listing and tagging workspace members.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use ldb_datasets::Collection;
use ldb_indexer::{IndexFormat, IndexingResult};
use ldb_query::{Candidate, FilterSpec, Pipeline};
use ldb_types::ObjectHash;
use ldb_workspace::{merge_entries, MergeOutcome, Workspace};
use tracing::{debug, info};

use crate::error::{LdbError, LdbResult};
use crate::instance::Instance;
use crate::resolve::PathMode;

/// Options for [`Instance::add`].
#[derive(Clone, Debug, Default)]
pub struct AddOptions {
    /// Applied in order to the resolved candidates.
    pub filters: Vec<FilterSpec>,
    /// Format used when a path has to be indexed.
    pub format: IndexFormat,
}

impl AddOptions {
    pub fn with_filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = format;
        self
    }
}

/// Result of [`Instance::add`].
#[derive(Clone, Debug, Default)]
pub struct AddOutcome {
    pub merge: MergeOutcome,
    /// Present when a path identifier was indexed.
    pub indexing: Option<IndexingResult>,
    /// Workspace size afterwards.
    pub num_objects: usize,
}

impl fmt::Display for AddOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Added {} data object(s), updated {}, unchanged {}; workspace holds {}",
            self.merge.added, self.merge.updated, self.merge.unchanged, self.num_objects
        )
    }
}

/// One row of [`Instance::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub hash: ObjectHash,
    pub annotation: Option<ObjectHash>,
    pub annotation_version: Option<u32>,
    /// First recorded location of the object.
    pub path: String,
}

impl Instance {
    /// Resolve `identifiers`, filter them and merge the survivors into the
    /// workspace at `dir`.
    ///
    /// Paths are indexed first; unindexed local files outside registered
    /// storage are imported into the read-add location.
    pub fn add(&self, dir: &Path, identifiers: &[String], opts: &AddOptions) -> LdbResult<AddOutcome> {
        if identifiers.is_empty() {
            return Err(LdbError::InvalidInput("nothing to add".into()));
        }
        let pipeline = Pipeline::new(opts.filters.clone())?;
        let (ws, _lock) = self.lock_workspace(dir)?;

        let resolved = self.resolve_identifiers(identifiers, Some(dir), PathMode::Index(opts.format))?;
        let candidates = pipeline.apply(resolved.candidates, &self.filter_context())?;

        let mut collection = ws.collection()?;
        let store = self.store();
        let merge = merge_entries(
            &mut collection,
            candidates.iter().map(|c| (c.hash, c.annotation)),
            self.conflict_policy(),
            |hash, id| store.annotation_by_id(hash, id).map(|a| a.version()),
        )?;
        if merge.changed() {
            ws.write_collection(&collection)?;
        }
        info!(
            added = merge.added,
            updated = merge.updated,
            unchanged = merge.unchanged,
            "add finished"
        );
        Ok(AddOutcome {
            merge,
            indexing: resolved.indexing,
            num_objects: collection.len(),
        })
    }

    /// Remove matching members from the workspace. Returns how many were
    /// removed; identifiers absent from the workspace are ignored.
    ///
    /// Paths are hashed but never indexed.
    pub fn delete(&self, dir: &Path, identifiers: &[String], filters: &[FilterSpec]) -> LdbResult<usize> {
        if identifiers.is_empty() {
            return Err(LdbError::InvalidInput("nothing to delete".into()));
        }
        let pipeline = Pipeline::new(filters.to_vec())?;
        let (ws, _lock) = self.lock_workspace(dir)?;
        let mut collection = ws.collection()?;

        let resolved = self.resolve_identifiers(identifiers, Some(dir), PathMode::HashOnly)?;
        let staged = staged_candidates(&collection, resolved.candidates);
        let doomed = pipeline.apply(staged, &self.filter_context())?;

        for candidate in &doomed {
            collection.remove(&candidate.hash);
        }
        if !doomed.is_empty() {
            ws.write_collection(&collection)?;
        }
        info!(removed = doomed.len(), remaining = collection.len(), "delete finished");
        Ok(doomed.len())
    }

    /// Resolve and filter without modifying anything.
    ///
    /// With no identifiers the workspace at `dir` is listed.
    pub fn list(
        &self,
        dir: Option<&Path>,
        identifiers: &[String],
        filters: &[FilterSpec],
    ) -> LdbResult<Vec<ListEntry>> {
        let candidates = self.select(dir, identifiers, filters)?;
        let store = self.store();
        candidates
            .into_iter()
            .map(|c| -> LdbResult<ListEntry> {
                let object = store.get_object(&c.hash)?;
                let annotation_version = match &c.annotation {
                    Some(id) => Some(store.annotation_by_id(&c.hash, id)?.version()),
                    None => None,
                };
                Ok(ListEntry {
                    hash: c.hash,
                    annotation: c.annotation,
                    annotation_version,
                    path: object
                        .locations()
                        .first()
                        .map(|l| l.to_string())
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Add and remove tags on every matching data object. Returns the
    /// number of objects whose tags changed.
    pub fn tag_objects(
        &self,
        dir: Option<&Path>,
        identifiers: &[String],
        filters: &[FilterSpec],
        add: &[String],
        remove: &[String],
    ) -> LdbResult<usize> {
        let store = self.store();
        let mut changed = 0;
        for candidate in self.select(dir, identifiers, filters)? {
            let object = store.get_object(&candidate.hash)?;
            let mut tags: BTreeSet<String> = object.tags().clone();
            tags.extend(add.iter().cloned());
            for tag in remove {
                tags.remove(tag);
            }
            if tags != *object.tags() {
                store.set_tags(&candidate.hash, &tags)?;
                changed += 1;
            }
        }
        debug!(changed, "tagged data objects");
        Ok(changed)
    }

    /// Read-only resolution shared by `list` and `tag`.
    fn select(
        &self,
        dir: Option<&Path>,
        identifiers: &[String],
        filters: &[FilterSpec],
    ) -> LdbResult<Vec<Candidate>> {
        let pipeline = Pipeline::new(filters.to_vec())?;
        let candidates = if identifiers.is_empty() {
            let dir = dir.ok_or_else(|| {
                LdbError::InvalidInput("no identifiers given and no workspace to list".into())
            })?;
            let collection = Workspace::open(dir)?.collection()?;
            collection
                .iter()
                .map(|(hash, annotation)| Candidate::new(*hash, *annotation))
                .collect()
        } else {
            // Every workspace path, the current one included, lists its
            // staged collection.
            self.resolve_identifiers(identifiers, None, PathMode::Lookup)?.candidates
        };
        Ok(pipeline.apply(candidates, &self.filter_context())?)
    }
}

/// Keep candidates staged in `collection`, pinned to the staged annotation.
pub(crate) fn staged_candidates(collection: &Collection, candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter_map(|c| {
            collection
                .get(&c.hash)
                .map(|annotation| Candidate::new(c.hash, annotation))
        })
        .collect()
}

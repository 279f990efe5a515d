//! Turning command identifiers into `(object, annotation)` candidates.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use ldb_datasets::Collection;
use ldb_indexer::{IndexFormat, IndexingResult};
use ldb_query::Candidate;
use ldb_storage::StorageAdapter;
use ldb_types::{ContentHasher, Identifier, ObjectHash, StorageUri};
use ldb_workspace::Workspace;
use rayon::prelude::*;
use tracing::debug;

use crate::error::LdbResult;
use crate::instance::Instance;

/// How a path identifier is turned into candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PathMode {
    /// Index the files and take the resulting entries.
    Index(IndexFormat),
    /// Hash the files; keep indexed objects with their current annotation.
    Lookup,
    /// Hash the files without consulting the store.
    HashOnly,
}

/// Candidates in enumeration order, first occurrence of each hash wins.
#[derive(Debug, Default)]
pub(crate) struct Resolved {
    pub candidates: Vec<Candidate>,
    pub indexing: Option<IndexingResult>,
}

impl Resolved {
    fn push_all(&mut self, seen: &mut HashSet<ObjectHash>, found: impl IntoIterator<Item = Candidate>) {
        for candidate in found {
            if seen.insert(candidate.hash) {
                self.candidates.push(candidate);
            }
        }
    }
}

impl Instance {
    /// Resolve identifiers for an operation on the workspace at `current`.
    ///
    /// A path naming a workspace other than `current` contributes that
    /// workspace's staged collection.
    pub(crate) fn resolve_identifiers(
        &self,
        identifiers: &[String],
        current: Option<&Path>,
        mode: PathMode,
    ) -> LdbResult<Resolved> {
        let mut resolved = Resolved::default();
        let mut seen = HashSet::new();
        for raw in identifiers {
            let found = match Identifier::parse(raw)? {
                Identifier::Object(hash) => match mode {
                    PathMode::HashOnly => vec![Candidate::new(hash, None)],
                    _ => {
                        let object = self.store().get_object(&hash)?;
                        vec![Candidate::new(hash, object.current_annotation)]
                    }
                },
                Identifier::Dataset(reference) => {
                    collection_candidates(&self.datasets().resolve_collection(&reference)?)
                }
                Identifier::Root => self.root_candidates()?,
                Identifier::Path(path) => match other_workspace(Path::new(&path), current) {
                    Some(ws) => collection_candidates(&ws.collection()?),
                    None => match mode {
                        PathMode::Index(format) => {
                            let result = self.index_for_add(&path, format)?;
                            let found: Vec<_> = result
                                .entries()
                                .map(|(hash, annotation)| Candidate::new(hash, annotation))
                                .collect();
                            resolved
                                .indexing
                                .get_or_insert_with(IndexingResult::default)
                                .extend(result);
                            found
                        }
                        PathMode::Lookup => self.lookup_path(&path)?,
                        PathMode::HashOnly => self
                            .hash_path(&path)?
                            .into_iter()
                            .map(|hash| Candidate::new(hash, None))
                            .collect(),
                    },
                },
            };
            debug!(identifier = %raw, candidates = found.len(), "resolved identifier");
            resolved.push_all(&mut seen, found);
        }
        Ok(resolved)
    }

    /// Every indexed object with its current annotation.
    pub(crate) fn root_candidates(&self) -> LdbResult<Vec<Candidate>> {
        let store = self.store();
        let mut out = Vec::new();
        for hash in store.list_objects()? {
            let object = store.get_object(&hash)?;
            out.push(Candidate::new(hash, object.current_annotation));
        }
        Ok(out)
    }

    /// Hash every non-JSON file under `path`, in listing order.
    pub(crate) fn hash_path(&self, path: &str) -> LdbResult<Vec<ObjectHash>> {
        let uri = StorageUri::parse(path)?;
        let adapter: &dyn StorageAdapter = self.registry().adapters().for_uri(&uri)?.as_ref();
        let files: Vec<StorageUri> = adapter
            .list(&uri)?
            .into_iter()
            .filter(|f| f.extension().as_deref() != Some("json"))
            .collect();
        let hashes: Vec<LdbResult<ObjectHash>> = files
            .par_iter()
            .map(|file| -> LdbResult<ObjectHash> {
                let reader = adapter.open(file)?;
                Ok(ContentHasher::hash_reader(reader)?)
            })
            .collect();
        hashes.into_iter().collect()
    }

    fn lookup_path(&self, path: &str) -> LdbResult<Vec<Candidate>> {
        let mut out = Vec::new();
        for hash in self.hash_path(path)? {
            match self.store().object(&hash)? {
                Some(object) => out.push(Candidate::new(hash, object.current_annotation)),
                None => debug!(%hash, path, "skipping unindexed file"),
            }
        }
        Ok(out)
    }
}

fn collection_candidates(collection: &Collection) -> Vec<Candidate> {
    collection
        .iter()
        .map(|(hash, annotation)| Candidate::new(*hash, *annotation))
        .collect()
}

/// The workspace at `path`, unless it is `current`.
fn other_workspace(path: &Path, current: Option<&Path>) -> Option<Workspace> {
    if !Workspace::exists(path) {
        return None;
    }
    if let Some(current) = current {
        if same_dir(path, current) {
            return None;
        }
    }
    Workspace::open(path).ok()
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

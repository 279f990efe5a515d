//! Staging workspaces and inspecting them.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ldb_datasets::{diff_collections, Collection, CollectionDiff, DatasetError};
use ldb_store::LockFile;
use ldb_types::{validate_dataset_name, DatasetRef, Identifier, DATASET_PREFIX};
use ldb_workspace::{Workspace, WorkspaceDataset, WorkspaceStatus};
use tracing::info;

use crate::error::{LdbError, LdbResult};
use crate::instance::Instance;

/// Result of [`Instance::stage`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageOutcome {
    pub path: PathBuf,
    pub dataset: String,
    /// Version number staged, or `None` for a new dataset.
    pub version: Option<u32>,
    pub num_objects: usize,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "Staged {DATASET_PREFIX}{}.v{v}", self.dataset)?,
            None => write!(f, "Staged new dataset {DATASET_PREFIX}{}", self.dataset)?,
        }
        write!(f, " at {}", self.path.display())
    }
}

/// Parse a `ds:<name>[.v<N>]` argument, rejecting `ds:root`.
pub fn parse_dataset_arg(input: &str) -> LdbResult<DatasetRef> {
    match Identifier::parse(input)? {
        Identifier::Dataset(reference) => Ok(reference),
        Identifier::Root => Err(LdbError::InvalidInput(format!(
            "{input} is not a committed dataset"
        ))),
        _ => Err(LdbError::InvalidInput(format!(
            "expected a dataset identifier like {DATASET_PREFIX}<name>, got {input:?}"
        ))),
    }
}

impl Instance {
    /// Open the workspace at `dir` and take its write lock.
    pub(crate) fn lock_workspace(&self, dir: &Path) -> LdbResult<(Workspace, LockFile)> {
        let ws = Workspace::open(dir)?;
        let lock = ws.lock(self.settings().lock_timeout())?;
        Ok((ws, lock))
    }

    /// Stage `dataset` into `dir`.
    ///
    /// An existing workspace is only replaced when it is clean or `force` is
    /// set. Unknown datasets stage as a new, empty, uncommitted dataset.
    pub fn stage(&self, dataset: &str, dir: &Path, force: bool) -> LdbResult<StageOutcome> {
        let reference = parse_dataset_arg(dataset)?;
        let _lock = if Workspace::exists(dir) {
            let (ws, lock) = self.lock_workspace(dir)?;
            if !force {
                let status = ws.status(self.datasets())?;
                if !status.is_clean() {
                    return Err(LdbError::DirtyWorkspace {
                        path: dir.to_path_buf(),
                        status: Box::new(status),
                    });
                }
            }
            Some(lock)
        } else {
            if !force && has_entries(dir)? {
                return Err(LdbError::TargetNotEmpty(dir.to_path_buf()));
            }
            None
        };

        let repo = self.datasets();
        let has_versions = repo
            .dataset(&reference.name)?
            .is_some_and(|d| !d.versions.is_empty());
        let (meta, collection, version) = if has_versions {
            let resolved = repo.resolve(&reference)?;
            let collection = repo.collection(&resolved.version.collection)?;
            let meta = WorkspaceDataset::new(&resolved.name, Some(resolved.id))
                .with_tags(resolved.version.tags.clone());
            (meta, collection, Some(resolved.number))
        } else {
            if let Some(version) = reference.version {
                return Err(DatasetError::VersionNotFound {
                    name: reference.name,
                    version,
                }
                .into());
            }
            validate_dataset_name(&reference.name)?;
            (WorkspaceDataset::new(&reference.name, None), Collection::new(), None)
        };

        Workspace::create(dir, &meta, &collection)?;
        info!(
            dataset = %reference.name,
            version = ?version,
            path = %dir.display(),
            "staged workspace"
        );
        Ok(StageOutcome {
            path: dir.to_path_buf(),
            dataset: meta.dataset_name,
            version,
            num_objects: collection.len(),
        })
    }

    pub fn status(&self, dir: &Path) -> LdbResult<WorkspaceStatus> {
        Ok(Workspace::open(dir)?.status(self.datasets())?)
    }

    /// Collection named by a diff argument: a dataset reference, `ds:root`,
    /// or a workspace directory.
    fn collection_for(&self, arg: &str) -> LdbResult<Collection> {
        match Identifier::parse(arg)? {
            Identifier::Dataset(reference) => Ok(self.datasets().resolve_collection(&reference)?),
            Identifier::Root => {
                let mut collection = Collection::new();
                for c in self.root_candidates()? {
                    collection.insert(c.hash, c.annotation);
                }
                Ok(collection)
            }
            Identifier::Path(path) => Ok(Workspace::open(path)?.collection()?),
            Identifier::Object(_) => Err(LdbError::InvalidInput(format!(
                "cannot diff a single data object: {arg}"
            ))),
        }
    }

    /// Compare two collections.
    ///
    /// With no arguments the workspace is compared to its parent; with one,
    /// `a` is compared to the workspace.
    pub fn diff(&self, workspace: &Path, a: Option<&str>, b: Option<&str>) -> LdbResult<CollectionDiff> {
        let (old, new) = match (a, b) {
            (Some(a), Some(b)) => (self.collection_for(a)?, self.collection_for(b)?),
            (Some(a), None) => (
                self.collection_for(a)?,
                Workspace::open(workspace)?.collection()?,
            ),
            (None, _) => return Ok(Workspace::open(workspace)?.diff_from_parent(self.datasets())?),
        };
        Ok(diff_collections(&old, &new))
    }

    /// Add and remove tags on the workspace's dataset; they are copied into
    /// the next committed version.
    pub fn tag_workspace(
        &self,
        dir: &Path,
        add: &[String],
        remove: &[String],
    ) -> LdbResult<BTreeSet<String>> {
        let (ws, _lock) = self.lock_workspace(dir)?;
        let mut meta = ws.dataset()?;
        meta.tags.extend(add.iter().cloned());
        for tag in remove {
            meta.tags.remove(tag);
        }
        ws.set_dataset(&meta)?;
        Ok(meta.tags)
    }
}

fn has_entries(dir: &Path) -> LdbResult<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn instance(dir: &TempDir) -> Instance {
        Instance::init(&InstanceConfig::at(dir.path().join("instance")), false).unwrap()
    }

    #[test]
    fn stage_unknown_dataset_is_empty_and_clean() {
        let dir = TempDir::new().unwrap();
        let ldb = instance(&dir);
        let ws = dir.path().join("ws");
        let out = ldb.stage("ds:numerals", &ws, false).unwrap();
        assert_eq!(out.version, None);
        assert_eq!(out.num_objects, 0);
        assert!(ldb.status(&ws).unwrap().is_clean());
        assert!(out.to_string().contains("ds:numerals"));
    }

    #[test]
    fn stage_rejects_bad_arguments() {
        let dir = TempDir::new().unwrap();
        let ldb = instance(&dir);
        let ws = dir.path().join("ws");
        for arg in ["numerals", "ds:root", "ds:bad name"] {
            let err = ldb.stage(arg, &ws, false).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{arg}");
        }
        let err = ldb.stage("ds:numerals.v3", &ws, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn stage_into_unrelated_content_needs_force() {
        let dir = TempDir::new().unwrap();
        let ldb = instance(&dir);
        let ws = dir.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("notes.txt"), b"keep").unwrap();
        assert!(matches!(
            ldb.stage("ds:numerals", &ws, false),
            Err(LdbError::TargetNotEmpty(_))
        ));
        ldb.stage("ds:numerals", &ws, true).unwrap();
        assert!(ws.join("notes.txt").exists());
    }

    #[test]
    fn workspace_tags() {
        let dir = TempDir::new().unwrap();
        let ldb = instance(&dir);
        let ws = dir.path().join("ws");
        ldb.stage("ds:numerals", &ws, false).unwrap();
        let tags = ldb
            .tag_workspace(&ws, &["a".into(), "b".into()], &["b".into()])
            .unwrap();
        assert_eq!(tags, BTreeSet::from(["a".to_string()]));
    }
}

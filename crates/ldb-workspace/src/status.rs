//! Workspace status relative to its parent dataset version.

use std::fmt;
use std::path::PathBuf;

use ldb_datasets::{diff_collections, Collection, CollectionDiff, DatasetRepository, DiffSummary};
use ldb_types::DATASET_PREFIX;

use crate::error::WorkspaceResult;
use crate::workspace::Workspace;

/// Summary printed by `ldb status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceStatus {
    pub path: PathBuf,
    pub dataset_name: String,
    /// Number of the parent version within the dataset, if committed.
    pub parent_version: Option<u32>,
    pub num_objects: usize,
    pub num_annotations: usize,
    /// Changes relative to the parent collection.
    pub diff: DiffSummary,
}

impl WorkspaceStatus {
    /// Whether the collection equals its parent's.
    pub fn is_clean(&self) -> bool {
        self.diff.is_empty()
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset: {DATASET_PREFIX}{}", self.dataset_name)?;
        match self.parent_version {
            Some(v) => writeln!(f, ".v{v}")?,
            None => writeln!(f, " (uncommitted)")?,
        }
        writeln!(f, "Num data objects: {:8}", self.num_objects)?;
        write!(f, "Num annotations:  {:8}", self.num_annotations)?;
        if self.is_clean() {
            write!(f, "\n\nNo changes from parent version")?;
        } else {
            write!(
                f,
                "\n\nUnsaved changes:\n  Additions (+): {:8}\n  Deletions (-): {:8}\n  Modifications (m): {:4}",
                self.diff.additions, self.diff.deletions, self.diff.modifications
            )?;
        }
        Ok(())
    }
}

impl Workspace {
    /// Collection of the parent version, or an empty one when unparented.
    pub fn parent_collection(&self, repo: &DatasetRepository) -> WorkspaceResult<Collection> {
        match self.dataset()?.parent {
            Some(parent) => {
                let version = repo.version(&parent)?;
                Ok(repo.collection(&version.collection)?)
            }
            None => Ok(Collection::new()),
        }
    }

    /// Entries changed since the parent version.
    pub fn diff_from_parent(&self, repo: &DatasetRepository) -> WorkspaceResult<CollectionDiff> {
        let parent = self.parent_collection(repo)?;
        Ok(diff_collections(&parent, &self.collection()?))
    }

    /// A workspace is clean iff its collection equals its parent's.
    pub fn is_clean(&self, repo: &DatasetRepository) -> WorkspaceResult<bool> {
        Ok(self.parent_collection(repo)? == self.collection()?)
    }

    pub fn status(&self, repo: &DatasetRepository) -> WorkspaceResult<WorkspaceStatus> {
        let meta = self.dataset()?;
        let collection = self.collection()?;
        let parent = self.parent_collection(repo)?;
        let parent_version = match meta.parent {
            Some(id) => repo
                .dataset(&meta.dataset_name)?
                .and_then(|d| d.number_of(&id)),
            None => None,
        };
        Ok(WorkspaceStatus {
            path: self.root().to_path_buf(),
            dataset_name: meta.dataset_name,
            parent_version,
            num_objects: collection.len(),
            num_annotations: collection.annotated(),
            diff: diff_collections(&parent, &collection).summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::workspace::WorkspaceDataset;
    use ldb_datasets::{CommitInfo, CommitRequest};
    use ldb_store::InstanceLayout;
    use ldb_types::ContentHasher;
    use tempfile::TempDir;

    fn commit(repo: &DatasetRepository, collection: &Collection) -> ldb_types::ObjectHash {
        repo.commit(CommitRequest {
            name: "numerals",
            collection,
            parent: None,
            tags: BTreeSet::new(),
            info: CommitInfo {
                created_by: "t".into(),
                commit_time: "now".into(),
                commit_message: "first".into(),
            },
        })
        .unwrap()
        .id
    }

    #[test]
    fn clean_against_parent_then_dirty() {
        let instance = TempDir::new().unwrap();
        let repo = DatasetRepository::new(InstanceLayout::create(instance.path()).unwrap());
        let mut collection = Collection::new();
        collection.insert(ContentHasher::hash(b"a"), Some(ContentHasher::hash(b"x")));
        let parent = commit(&repo, &collection);

        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(
            dir.path(),
            &WorkspaceDataset::new("numerals", Some(parent)),
            &collection,
        )
        .unwrap();
        let status = ws.status(&repo).unwrap();
        assert!(status.is_clean());
        assert_eq!(status.parent_version, Some(1));
        assert_eq!(status.num_annotations, 1);

        collection.insert(ContentHasher::hash(b"b"), None);
        ws.write_collection(&collection).unwrap();
        let status = ws.status(&repo).unwrap();
        assert!(!status.is_clean());
        assert_eq!(status.diff.additions, 1);
        assert!(!ws.is_clean(&repo).unwrap());
        assert!(status.to_string().contains("Additions (+):"));
    }

    #[test]
    fn unparented_is_clean_only_when_empty() {
        let instance = TempDir::new().unwrap();
        let repo = DatasetRepository::new(InstanceLayout::create(instance.path()).unwrap());
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(
            dir.path(),
            &WorkspaceDataset::new("fresh", None),
            &Collection::new(),
        )
        .unwrap();
        assert!(ws.is_clean(&repo).unwrap());
        let status = ws.status(&repo).unwrap();
        assert_eq!(status.parent_version, None);
        assert!(status.to_string().contains("uncommitted"));

        let mut c = Collection::new();
        c.insert(ContentHasher::hash(b"a"), None);
        ws.write_collection(&c).unwrap();
        assert!(!ws.is_clean(&repo).unwrap());
    }
}

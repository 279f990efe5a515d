use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ldb_datasets::Collection;
use ldb_store::fs::{read_json, write_json};
use ldb_store::layout::{hash_path, list_hashes};
use ldb_store::LockFile;
use ldb_types::{now_timestamp, ObjectHash};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{WorkspaceError, WorkspaceResult};

/// Name of the directory marking a workspace.
pub const WORKSPACE_DIR: &str = ".ldb_workspace";
const COLLECTION_DIR: &str = "collection";
/// A complete new collection waiting to replace `collection`.
const PENDING_COLLECTION_DIR: &str = "collection.new";
const DATASET_FILE: &str = "workspace_dataset";
const LOCK_FILE: &str = "lock";

/// `.ldb_workspace/workspace_dataset`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDataset {
    pub dataset_name: String,
    pub staged_time: String,
    /// Dataset version the workspace was staged from or last committed as.
    #[serde(default)]
    pub parent: Option<ObjectHash>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl WorkspaceDataset {
    /// Metadata for a freshly staged workspace.
    pub fn new(dataset_name: impl Into<String>, parent: Option<ObjectHash>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            staged_time: now_timestamp(),
            parent,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A directory staged to edit one dataset.
///
/// The collection is stored one file per member under
/// `.ldb_workspace/collection/<h3>/<rest>`; each file holds the member's
/// annotation id in hex, or nothing for an unannotated member.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Whether `dir` holds a workspace.
    pub fn exists(dir: &Path) -> bool {
        dir.join(WORKSPACE_DIR).join(DATASET_FILE).is_file()
    }

    /// Open the workspace in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> WorkspaceResult<Self> {
        let root = dir.into();
        if !Self::exists(&root) {
            return Err(WorkspaceError::NotAWorkspace(root));
        }
        let ws = Self { root };
        ws.recover()?;
        Ok(ws)
    }

    /// Create or overwrite the workspace in `dir`.
    pub fn create(
        dir: impl Into<PathBuf>,
        dataset: &WorkspaceDataset,
        collection: &Collection,
    ) -> WorkspaceResult<Self> {
        let ws = Self { root: dir.into() };
        fs::create_dir_all(ws.meta_dir())?;
        ws.write_collection(collection)?;
        ws.set_dataset(dataset)?;
        debug!(
            path = %ws.root.display(),
            dataset = %dataset.dataset_name,
            members = collection.len(),
            "workspace staged"
        );
        Ok(ws)
    }

    /// The directory holding `.ldb_workspace`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn meta_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    fn collection_dir(&self) -> PathBuf {
        self.meta_dir().join(COLLECTION_DIR)
    }

    fn pending_collection_dir(&self) -> PathBuf {
        self.meta_dir().join(PENDING_COLLECTION_DIR)
    }

    /// Finish a collection swap interrupted between its last two renames.
    ///
    /// A pending collection next to an existing one is from a swap that never
    /// started and is left for the next write to discard.
    fn recover(&self) -> WorkspaceResult<()> {
        let target = self.collection_dir();
        let pending = self.pending_collection_dir();
        if target.exists() || !pending.exists() {
            return Ok(());
        }
        warn!(path = %self.root.display(), "completing interrupted collection update");
        swap_in(&pending, &target)
    }

    /// Take the workspace's write lock.
    pub fn lock(&self, timeout: Duration) -> WorkspaceResult<LockFile> {
        Ok(LockFile::acquire(self.meta_dir().join(LOCK_FILE), timeout)?)
    }

    pub fn dataset(&self) -> WorkspaceResult<WorkspaceDataset> {
        Ok(read_json(&self.meta_dir().join(DATASET_FILE))?)
    }

    pub fn set_dataset(&self, dataset: &WorkspaceDataset) -> WorkspaceResult<()> {
        write_json(&self.meta_dir().join(DATASET_FILE), dataset)?;
        Ok(())
    }

    /// The staged collection.
    pub fn collection(&self) -> WorkspaceResult<Collection> {
        self.recover()?;
        let dir = self.collection_dir();
        let mut collection = Collection::new();
        for hash in list_hashes(&dir)? {
            let path = hash_path(&dir, &hash);
            let text = fs::read_to_string(&path)?;
            let text = text.trim();
            let annotation = if text.is_empty() {
                None
            } else {
                Some(
                    ObjectHash::from_hex(text).map_err(|e| WorkspaceError::Corrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?,
                )
            };
            collection.insert(hash, annotation);
        }
        Ok(collection)
    }

    /// Replace the staged collection.
    ///
    /// The new tree is built in a temporary directory and renamed to
    /// `collection.new`. Only then is the old tree moved aside and the new one
    /// renamed into place. A crash between those two renames leaves a
    /// complete `collection.new` that [`Workspace::open`] swaps in.
    pub fn write_collection(&self, collection: &Collection) -> WorkspaceResult<()> {
        let meta = self.meta_dir();
        fs::create_dir_all(&meta)?;
        self.recover()?;
        let pending = self.pending_collection_dir();
        if pending.exists() {
            fs::remove_dir_all(&pending)?;
        }
        let staging = tempfile::Builder::new()
            .prefix(".collection-")
            .tempdir_in(&meta)?;
        for (hash, annotation) in collection.iter() {
            let path = hash_path(staging.path(), hash);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = annotation.map(|a| a.to_hex()).unwrap_or_default();
            fs::write(&path, content)?;
        }

        fs::rename(staging.path(), &pending)?;

        let target = self.collection_dir();
        let trash = tempfile::Builder::new().prefix(".trash-").tempdir_in(&meta)?;
        if target.exists() {
            fs::rename(&target, trash.path().join(COLLECTION_DIR))?;
        }
        swap_in(&pending, &target)?;
        // `trash` removes the previous collection when dropped.
        Ok(())
    }
}

fn swap_in(pending: &Path, target: &Path) -> WorkspaceResult<()> {
    match fs::rename(pending, target) {
        Ok(()) => Ok(()),
        // Another process completed the swap first.
        Err(e) if e.kind() == io::ErrorKind::NotFound && target.exists() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_types::ContentHasher;
    use tempfile::TempDir;

    fn sample() -> Collection {
        let mut c = Collection::new();
        c.insert(ContentHasher::hash(b"a"), Some(ContentHasher::hash(b"ann")));
        c.insert(ContentHasher::hash(b"b"), None);
        c
    }

    #[test]
    fn create_and_reopen() {
        let dir = TempDir::new().unwrap();
        assert!(!Workspace::exists(dir.path()));
        let meta = WorkspaceDataset::new("numerals", None);
        Workspace::create(dir.path(), &meta, &sample()).unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        assert_eq!(ws.dataset().unwrap(), meta);
        assert_eq!(ws.collection().unwrap(), sample());
    }

    #[test]
    fn collection_files_use_hash_layout() {
        let dir = TempDir::new().unwrap();
        let meta = WorkspaceDataset::new("d", None);
        let ws = Workspace::create(dir.path(), &meta, &sample()).unwrap();
        let a = ContentHasher::hash(b"a").to_hex();
        let file = ws
            .root()
            .join(WORKSPACE_DIR)
            .join("collection")
            .join(&a[..3])
            .join(&a[3..]);
        assert_eq!(
            fs::read_to_string(file).unwrap(),
            ContentHasher::hash(b"ann").to_hex()
        );
    }

    #[test]
    fn rewrite_replaces_members() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(dir.path(), &WorkspaceDataset::new("d", None), &sample())
            .unwrap();
        let mut smaller = sample();
        smaller.remove(&ContentHasher::hash(b"a"));
        ws.write_collection(&smaller).unwrap();
        assert_eq!(ws.collection().unwrap(), smaller);

        let leftovers: Vec<_> = fs::read_dir(dir.path().join(WORKSPACE_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn interrupted_swap_is_completed_on_open() {
        let dir = TempDir::new().unwrap();
        Workspace::create(dir.path(), &WorkspaceDataset::new("d", None), &sample()).unwrap();
        let meta = dir.path().join(WORKSPACE_DIR);
        // Old tree moved aside, new tree not yet renamed into place.
        fs::rename(meta.join(COLLECTION_DIR), meta.join(PENDING_COLLECTION_DIR)).unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        assert!(meta.join(COLLECTION_DIR).is_dir());
        assert!(!meta.join(PENDING_COLLECTION_DIR).exists());
        assert_eq!(ws.collection().unwrap(), sample());
    }

    #[test]
    fn pending_tree_beside_a_collection_is_discarded() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(dir.path(), &WorkspaceDataset::new("d", None), &sample())
            .unwrap();
        let meta = dir.path().join(WORKSPACE_DIR);
        let stray = hash_path(&meta.join(PENDING_COLLECTION_DIR), &ContentHasher::hash(b"z"));
        fs::create_dir_all(stray.parent().unwrap()).unwrap();
        fs::write(&stray, "").unwrap();

        let ws2 = Workspace::open(dir.path()).unwrap();
        assert_eq!(ws2.collection().unwrap(), sample());

        let mut smaller = sample();
        smaller.remove(&ContentHasher::hash(b"b"));
        ws.write_collection(&smaller).unwrap();
        assert_eq!(ws.collection().unwrap(), smaller);
        assert!(!meta.join(PENDING_COLLECTION_DIR).exists());
    }

    #[test]
    fn open_missing_workspace_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Workspace::open(dir.path()),
            Err(WorkspaceError::NotAWorkspace(_))
        ));
    }

    #[test]
    fn lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(dir.path(), &WorkspaceDataset::new("d", None), &sample())
            .unwrap();
        let _held = ws.lock(Duration::from_millis(50)).unwrap();
        assert!(ws.lock(Duration::from_millis(30)).is_err());
    }
}

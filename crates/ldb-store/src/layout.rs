//! Instance directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use ldb_types::ObjectHash;

use crate::error::{StoreError, StoreResult};

/// Number of leading hex characters used as the fan-out directory.
const FANOUT: usize = 3;

/// Paths inside an LDB instance directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceLayout {
    root: PathBuf,
}

impl InstanceLayout {
    pub const DATA_OBJECT_INFO: &'static str = "data_object_info";
    pub const DATASETS: &'static str = "datasets";
    pub const OBJECTS: &'static str = "objects";
    pub const ANNOTATIONS: &'static str = "annotations";
    pub const COLLECTIONS: &'static str = "collections";
    pub const DATASET_VERSIONS: &'static str = "dataset_versions";
    pub const CONFIG: &'static str = "config";
    pub const STORAGE: &'static str = "storage";

    /// Wrap an existing directory without checking it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open `root`, failing if it does not look like an instance.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let layout = Self::new(root);
        if !layout.is_instance() {
            return Err(StoreError::NotAnInstance(layout.root));
        }
        Ok(layout)
    }

    /// Create the directory skeleton under `root`.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let layout = Self::new(root);
        for dir in layout.required_dirs() {
            fs::create_dir_all(dir)?;
        }
        Ok(layout)
    }

    fn required_dirs(&self) -> [PathBuf; 5] {
        [
            self.data_object_info_dir(),
            self.datasets_dir(),
            self.annotations_dir(),
            self.collections_dir(),
            self.dataset_versions_dir(),
        ]
    }

    /// Whether every required directory exists.
    pub fn is_instance(&self) -> bool {
        self.required_dirs().iter().all(|d| d.is_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_object_info_dir(&self) -> PathBuf {
        self.root.join(Self::DATA_OBJECT_INFO)
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.root.join(Self::DATASETS)
    }

    pub fn annotations_dir(&self) -> PathBuf {
        self.root.join(Self::OBJECTS).join(Self::ANNOTATIONS)
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.root.join(Self::OBJECTS).join(Self::COLLECTIONS)
    }

    pub fn dataset_versions_dir(&self) -> PathBuf {
        self.root.join(Self::OBJECTS).join(Self::DATASET_VERSIONS)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(Self::CONFIG)
    }

    pub fn storage_file(&self) -> PathBuf {
        self.root.join(Self::STORAGE)
    }

    /// `data_object_info/<h3>/<rest>`
    pub fn object_dir(&self, hash: &ObjectHash) -> PathBuf {
        hash_path(&self.data_object_info_dir(), hash)
    }

    /// `objects/annotations/<a3>/<rest>`
    pub fn annotation_payload_dir(&self, id: &ObjectHash) -> PathBuf {
        hash_path(&self.annotations_dir(), id)
    }

    /// `objects/collections/<c3>/<rest>`
    pub fn collection_file(&self, id: &ObjectHash) -> PathBuf {
        hash_path(&self.collections_dir(), id)
    }

    /// `objects/dataset_versions/<v3>/<rest>`
    pub fn dataset_version_file(&self, id: &ObjectHash) -> PathBuf {
        hash_path(&self.dataset_versions_dir(), id)
    }

    /// `datasets/<name>`
    pub fn dataset_file(&self, name: &str) -> PathBuf {
        self.datasets_dir().join(name)
    }
}

/// Split a hash into `<base>/<first 3 hex>/<remaining hex>`.
pub fn hash_path(base: &Path, hash: &ObjectHash) -> PathBuf {
    let hex = hash.to_hex();
    let (head, tail) = hex.split_at(FANOUT);
    base.join(head).join(tail)
}

/// Inverse of [`hash_path`]: rebuild a hash from its two path components.
pub fn hash_from_parts(head: &str, tail: &str) -> Option<ObjectHash> {
    if head.len() != FANOUT {
        return None;
    }
    ObjectHash::from_hex(&format!("{head}{tail}")).ok()
}

/// Enumerate every hash stored under a fan-out directory, sorted.
pub fn list_hashes(base: &Path) -> StoreResult<Vec<ObjectHash>> {
    let mut out = Vec::new();
    let heads = match fs::read_dir(base) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };
    for head in heads {
        let head = head?;
        if !head.file_type()?.is_dir() {
            continue;
        }
        let head_name = head.file_name().to_string_lossy().into_owned();
        for tail in fs::read_dir(head.path())? {
            let tail = tail?;
            let tail_name = tail.file_name().to_string_lossy().into_owned();
            if let Some(hash) = hash_from_parts(&head_name, &tail_name) {
                out.push(hash);
            }
        }
    }
    out.sort();
    Ok(out)
}

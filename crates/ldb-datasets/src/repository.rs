use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

use ldb_store::fs::{read_json_opt, write_json, write_once};
use ldb_store::lock::DEFAULT_LOCK_TIMEOUT;
use ldb_store::{InstanceLayout, LockFile};
use ldb_types::{validate_dataset_name, DatasetRef, ObjectHash};
use tracing::{debug, info};

use crate::collection::Collection;
use crate::dataset::{CommitInfo, Dataset, DatasetVersion};
use crate::error::{DatasetError, DatasetResult};

/// A dataset version located by name and number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub name: String,
    pub number: u32,
    pub id: ObjectHash,
    pub version: DatasetVersion,
}

/// Input to [`DatasetRepository::commit`].
#[derive(Clone, Debug)]
pub struct CommitRequest<'a> {
    pub name: &'a str,
    pub collection: &'a Collection,
    pub parent: Option<ObjectHash>,
    pub tags: BTreeSet<String>,
    pub info: CommitInfo,
}

/// File-backed dataset repository inside an instance directory.
#[derive(Clone, Debug)]
pub struct DatasetRepository {
    layout: InstanceLayout,
    lock_timeout: Duration,
}

impl DatasetRepository {
    pub fn new(layout: InstanceLayout) -> Self {
        Self {
            layout,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Every dataset, sorted by name.
    pub fn datasets(&self) -> DatasetResult<Vec<Dataset>> {
        let dir = self.layout.datasets_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ldb_store::StoreError::from(e).into()),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ldb_store::StoreError::from)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Lock and temp files never pass name validation.
            if validate_dataset_name(&name).is_err() {
                continue;
            }
            if let Some(ds) = self.dataset(&name)? {
                out.push(ds);
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> DatasetResult<Option<Dataset>> {
        validate_dataset_name(name)?;
        Ok(read_json_opt(&self.layout.dataset_file(name))?)
    }

    /// Look up a dataset by name, failing if it does not exist.
    pub fn require(&self, name: &str) -> DatasetResult<Dataset> {
        self.dataset(name)?
            .ok_or_else(|| DatasetError::NotFound(name.to_string()))
    }

    pub fn version(&self, id: &ObjectHash) -> DatasetResult<DatasetVersion> {
        read_json_opt(&self.layout.dataset_version_file(id))?
            .ok_or(DatasetError::DatasetVersionNotFound(*id))
    }

    pub fn collection(&self, id: &ObjectHash) -> DatasetResult<Collection> {
        read_json_opt(&self.layout.collection_file(id))?
            .ok_or(DatasetError::CollectionNotFound(*id))
    }

    /// Store a collection, returning its id.
    pub fn put_collection(&self, collection: &Collection) -> DatasetResult<ObjectHash> {
        let id = collection.id()?;
        write_once(&self.layout.collection_file(&id), &collection.to_bytes()?)?;
        Ok(id)
    }

    /// Resolve `ds:<name>` or `ds:<name>.v<N>`.
    pub fn resolve(&self, reference: &DatasetRef) -> DatasetResult<ResolvedVersion> {
        let dataset = self.require(&reference.name)?;
        let number = match reference.version {
            Some(n) => n,
            None if dataset.versions.is_empty() => {
                return Err(DatasetError::NoVersions(reference.name.clone()))
            }
            None => dataset.latest_number(),
        };
        let id = dataset
            .version_id(number)
            .ok_or_else(|| DatasetError::VersionNotFound {
                name: reference.name.clone(),
                version: number,
            })?;
        Ok(ResolvedVersion {
            name: dataset.name,
            number,
            id,
            version: self.version(&id)?,
        })
    }

    /// Collection pinned by a dataset reference.
    pub fn resolve_collection(&self, reference: &DatasetRef) -> DatasetResult<Collection> {
        let resolved = self.resolve(reference)?;
        self.collection(&resolved.version.collection)
    }

    /// Append a new version to dataset `req.name`, creating the dataset if
    /// needed.
    ///
    /// The version number is allocated under `datasets/<name>.lock`, so two
    /// concurrent commits to the same dataset get consecutive numbers.
    pub fn commit(&self, req: CommitRequest<'_>) -> DatasetResult<ResolvedVersion> {
        validate_dataset_name(req.name)?;
        let collection_id = self.put_collection(req.collection)?;

        let lock_path = self
            .layout
            .datasets_dir()
            .join(format!("{}.lock", req.name));
        let _lock = LockFile::acquire(lock_path, self.lock_timeout)?;

        let mut dataset = self.dataset(req.name)?.unwrap_or_else(|| {
            Dataset::new(
                req.name,
                req.info.created_by.clone(),
                req.info.commit_time.clone(),
            )
        });
        let number = dataset.latest_number() + 1;
        let version = DatasetVersion {
            version: number,
            parent: req.parent,
            collection: collection_id,
            tags: req.tags,
            commit_info: req.info,
        };
        let id = version.id()?;
        write_once(&self.layout.dataset_version_file(&id), &version.to_bytes()?)?;
        debug!(dataset = req.name, %id, "dataset version written");

        dataset.versions.push(id);
        write_json(&self.layout.dataset_file(req.name), &dataset)?;
        info!(dataset = req.name, version = number, "committed dataset version");

        Ok(ResolvedVersion {
            name: dataset.name,
            number,
            id,
            version,
        })
    }

    /// Remove a dataset's record. Its versions and collections stay in the
    /// object directories.
    pub fn delete(&self, name: &str) -> DatasetResult<()> {
        let path = self.layout.dataset_file(name);
        if self.dataset(name)?.is_none() {
            return Err(DatasetError::NotFound(name.to_string()));
        }
        fs::remove_file(path).map_err(ldb_store::StoreError::from)?;
        info!(dataset = name, "deleted dataset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_types::ContentHasher;

    fn setup() -> (tempfile::TempDir, DatasetRepository) {
        let dir = tempfile::tempdir().unwrap();
        let layout = InstanceLayout::create(dir.path().join("inst")).unwrap();
        (dir, DatasetRepository::new(layout))
    }

    fn info(msg: &str) -> CommitInfo {
        CommitInfo {
            created_by: "tester".into(),
            commit_time: ldb_types::now_timestamp(),
            commit_message: msg.into(),
        }
    }

    fn coll(items: &[&str]) -> Collection {
        items
            .iter()
            .map(|s| (ContentHasher::hash(s.as_bytes()), None))
            .collect()
    }

    fn commit(repo: &DatasetRepository, name: &str, c: &Collection, parent: Option<ObjectHash>) -> ResolvedVersion {
        repo.commit(CommitRequest {
            name,
            collection: c,
            parent,
            tags: BTreeSet::new(),
            info: info("m"),
        })
        .unwrap()
    }

    #[test]
    fn two_commits_give_distinct_versions() {
        let (_dir, repo) = setup();
        let v1 = commit(&repo, "numerals", &coll(&["1"]), None);
        let v2 = commit(&repo, "numerals", &coll(&["1", "2"]), Some(v1.id));
        assert_eq!(v1.number, 1);
        assert_eq!(v2.number, 2);
        assert_ne!(v1.id, v2.id);
        assert_eq!(v2.version.parent, Some(v1.id));

        let r1 = repo.resolve(&DatasetRef::at("numerals", 1)).unwrap();
        let latest = repo.resolve(&DatasetRef::latest("numerals")).unwrap();
        assert_eq!(r1.id, v1.id);
        assert_eq!(latest.id, v2.id);
        assert_eq!(repo.collection(&r1.version.collection).unwrap(), coll(&["1"]));
        assert_eq!(
            repo.resolve_collection(&DatasetRef::latest("numerals")).unwrap().len(),
            2
        );
    }

    #[test]
    fn unknown_references_fail() {
        let (_dir, repo) = setup();
        assert!(matches!(
            repo.resolve(&DatasetRef::latest("nope")),
            Err(DatasetError::NotFound(_))
        ));
        commit(&repo, "ds", &coll(&[]), None);
        assert!(matches!(
            repo.resolve(&DatasetRef::at("ds", 2)),
            Err(DatasetError::VersionNotFound { version: 2, .. })
        ));
    }

    #[test]
    fn datasets_are_listed_by_name_and_skip_lock_files() {
        let (_dir, repo) = setup();
        commit(&repo, "zeta", &coll(&["a"]), None);
        commit(&repo, "alpha", &coll(&["b"]), None);
        fs::write(repo.layout.datasets_dir().join("stale.lock"), b"1").unwrap();
        let names: Vec<String> = repo.datasets().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn committed_version_files_are_write_once() {
        let (_dir, repo) = setup();
        let v1 = commit(&repo, "ds", &coll(&["a"]), None);
        let path = repo.layout.dataset_version_file(&v1.id);
        let before = fs::read(&path).unwrap();
        commit(&repo, "ds", &coll(&["a", "b"]), Some(v1.id));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(repo.version(&v1.id).unwrap().version, 1);
    }

    #[test]
    fn concurrent_commits_get_gapless_numbers() {
        let (_dir, repo) = setup();
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let repo = repo.clone();
                std::thread::spawn(move || {
                    commit(&repo, "shared", &coll(&[&i.to_string()]), None).number
                })
            })
            .collect();
        let mut numbers: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        numbers.sort();
        assert_eq!(numbers, (1..=6).collect::<Vec<_>>());
        assert_eq!(repo.require("shared").unwrap().versions.len(), 6);
    }

    #[test]
    fn delete_removes_dataset_record() {
        let (_dir, repo) = setup();
        commit(&repo, "gone", &coll(&["a"]), None);
        repo.delete("gone").unwrap();
        assert!(repo.dataset("gone").unwrap().is_none());
        assert!(matches!(repo.delete("gone"), Err(DatasetError::NotFound(_))));
    }
}

use std::collections::BTreeSet;

use ldb_indexer::{IndexError, IndexFormat, IndexOptions, Indexer, IndexingResult, UnregisteredPolicy};
use ldb_types::StorageUri;

use crate::error::{LdbError, LdbResult};
use crate::instance::Instance;

impl Instance {
    /// Index storage paths into the object store.
    ///
    /// Paths outside registered storage are rejected unless the instance is
    /// relaxed, in which case they are indexed in place.
    pub fn index(
        &self,
        paths: &[String],
        format: IndexFormat,
        tags: BTreeSet<String>,
    ) -> LdbResult<IndexingResult> {
        let policy = if self.is_relaxed() {
            UnregisteredPolicy::InPlace
        } else {
            UnregisteredPolicy::Reject
        };
        let options = IndexOptions::new(self.user())
            .with_format(format)
            .with_policy(policy)
            .with_tags(tags);
        let uris = paths
            .iter()
            .map(|p| StorageUri::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.run_indexer(&uris, options)
    }

    /// Index one path on behalf of `add`.
    ///
    /// Unregistered local files are imported into the read-add location, or
    /// indexed in place on a relaxed instance.
    pub(crate) fn index_for_add(&self, path: &str, format: IndexFormat) -> LdbResult<IndexingResult> {
        let policy = if self.is_relaxed() {
            UnregisteredPolicy::InPlace
        } else {
            UnregisteredPolicy::Import
        };
        let options = IndexOptions::new(self.user())
            .with_format(format)
            .with_policy(policy);
        self.run_indexer(&[StorageUri::parse(path)?], options)
    }

    fn run_indexer(&self, uris: &[StorageUri], options: IndexOptions) -> LdbResult<IndexingResult> {
        Indexer::new(self.store(), self.registry(), options)
            .index_all(uris)
            .map_err(|e| match e {
                IndexError::NoReadAddLocation => LdbError::NoReadAddLocation,
                IndexError::UnregisteredLocation(path) => LdbError::UnregisteredLocation(path),
                other => other.into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use crate::error::ErrorKind;
    use ldb_storage::RegisterOptions;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, Instance) {
        let dir = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        fs::write(data.path().join("a.txt"), b"alpha").unwrap();
        fs::write(data.path().join("a.json"), br#"{"class": "a"}"#).unwrap();
        let ldb = Instance::init(&InstanceConfig::at(dir.path().join("i")), false).unwrap();
        (dir, data, ldb)
    }

    #[test]
    fn unregistered_paths_are_rejected() {
        let (_dir, data, ldb) = setup();
        let path = data.path().to_string_lossy().into_owned();
        let err = ldb.index(&[path], IndexFormat::Auto, BTreeSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnregisteredLocation);
        assert!(matches!(err, LdbError::UnregisteredLocation(_)));
    }

    #[test]
    fn registered_paths_are_indexed() {
        let (_dir, data, mut ldb) = setup();
        let path = data.path().to_string_lossy().into_owned();
        ldb.add_storage(&path, &RegisterOptions::default()).unwrap();
        let result = ldb
            .index(&[path], IndexFormat::StrictPairs, BTreeSet::from(["train".to_string()]))
            .unwrap();
        assert_eq!(result.new_objects(), 1);
        assert_eq!(result.new_annotations(), 1);
        let hash = result.objects[0].hash;
        assert!(ldb.store().get_object(&hash).unwrap().tags().contains("train"));
    }
}

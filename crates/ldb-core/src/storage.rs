//! Storage location management.

use ldb_storage::{RegisterOptions, StorageLocation};
use ldb_types::StorageUri;
use tracing::info;

use crate::error::LdbResult;
use crate::instance::Instance;

/// What [`Instance::add_storage`] did.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageChange {
    Added(StorageLocation),
    /// The location was already registered; its read-add flag was set.
    Updated(StorageLocation),
}

impl StorageChange {
    pub fn location(&self) -> &StorageLocation {
        match self {
            Self::Added(l) | Self::Updated(l) => l,
        }
    }
}

impl Instance {
    /// Register a storage location.
    ///
    /// Re-adding a registered location with `read_add` set promotes it to
    /// the read-add location. Any other re-add is a duplicate.
    pub fn add_storage(&mut self, uri: &str, opts: &RegisterOptions) -> LdbResult<StorageChange> {
        let uri = StorageUri::parse(uri)?;
        let existing = self
            .registry()
            .locations()
            .iter()
            .find(|l| l.uri() == uri)
            .map(|l| l.read_and_add);
        if existing == Some(false) && opts.read_add {
            let location = self.registry_mut().update(&uri, true)?;
            info!(location = %uri, "storage location promoted to read-add");
            return Ok(StorageChange::Updated(location));
        }
        Ok(StorageChange::Added(self.registry_mut().register(&uri, opts)?))
    }

    /// Set or clear the read-add flag of a registered location.
    pub fn update_storage(&mut self, uri: &str, read_add: bool) -> LdbResult<StorageLocation> {
        let uri = StorageUri::parse(uri)?;
        Ok(self.registry_mut().update(&uri, read_add)?)
    }

    /// Remove a registered location. Objects indexed from it stay indexed.
    pub fn remove_storage(&mut self, uri: &str) -> LdbResult<StorageLocation> {
        let uri = StorageUri::parse(uri)?;
        let removed = self.registry_mut().unregister(&uri)?;
        info!(location = %uri, "storage location removed");
        Ok(removed)
    }

    pub fn storage_locations(&self) -> &[StorageLocation] {
        self.registry().locations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use crate::error::ErrorKind;
    use ldb_storage::StorageClass;
    use tempfile::TempDir;

    fn instance(dir: &TempDir) -> Instance {
        Instance::init(&InstanceConfig::at(dir.path().join("instance")), false).unwrap()
    }

    #[test]
    fn re_adding_with_read_add_promotes() {
        let dir = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        let path = storage.path().to_string_lossy().into_owned();
        let mut ldb = instance(&dir);

        let added = ldb.add_storage(&path, &RegisterOptions::default()).unwrap();
        assert_eq!(added.location().class(), StorageClass::ReadOnly);

        let updated = ldb.add_storage(&path, &RegisterOptions::read_add()).unwrap();
        assert!(matches!(updated, StorageChange::Updated(_)));
        assert_eq!(ldb.storage_locations().len(), 1);
        assert!(ldb.registry().read_add_location().is_some());

        let err = ldb.add_storage(&path, &RegisterOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn registry_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        let path = storage.path().to_string_lossy().into_owned();
        let config = InstanceConfig::at(dir.path().join("instance"));
        let mut ldb = Instance::init(&config, false).unwrap();
        ldb.add_storage(&path, &RegisterOptions::read_add()).unwrap();

        let mut reopened = Instance::open(&config).unwrap();
        assert_eq!(reopened.storage_locations().len(), 1);
        reopened.update_storage(&path, false).unwrap();
        reopened.remove_storage(&path).unwrap();
        assert!(Instance::open(&config).unwrap().storage_locations().is_empty());
    }
}

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ldb_types::StorageUri;
use serde::{Deserialize, Serialize};

use crate::bounded::BoundedAdapter;
use crate::error::{StorageError, StorageResult};
use crate::local::LocalAdapter;

/// Default timeout for a single adapter operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One operation a storage backend may allow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    List,
    Stat,
    Read,
    Write,
}

/// Capabilities verified for a URI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub list: bool,
    pub stat: bool,
    pub read: bool,
    pub write: bool,
}

impl CapabilitySet {
    /// What a read-only location needs.
    pub const READ: Self = Self {
        list: true,
        stat: true,
        read: true,
        write: false,
    };

    /// Everything, as a read-add location needs.
    pub const FULL: Self = Self {
        list: true,
        stat: true,
        read: true,
        write: true,
    };

    pub fn has(&self, cap: Capability) -> bool {
        match cap {
            Capability::List => self.list,
            Capability::Stat => self.stat,
            Capability::Read => self.read,
            Capability::Write => self.write,
        }
    }

    /// Capabilities set in `required` but not in `self`.
    pub fn missing(&self, required: &CapabilitySet) -> Vec<Capability> {
        [
            Capability::List,
            Capability::Stat,
            Capability::Read,
            Capability::Write,
        ]
        .into_iter()
        .filter(|c| required.has(*c) && !self.has(*c))
        .collect()
    }
}

/// Result of [`StorageAdapter::stat`].
#[derive(Clone, Debug, PartialEq)]
pub struct FileStat {
    pub uri: StorageUri,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub mtime: Option<f64>,
    pub is_dir: bool,
}

/// Access to one kind of storage, selected by URI scheme.
///
/// Adapters receive fully parsed URIs whose protocol matches
/// [`StorageAdapter::protocol`].
pub trait StorageAdapter: Send + Sync {
    /// Scheme handled by this adapter, e.g. `"file"` or `"gs"`.
    fn protocol(&self) -> &str;

    /// Upper bound for a single operation.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Every file under `uri`, recursively, sorted. Hidden entries (any path
    /// component starting with `.` below `uri`) are skipped. A file URI lists
    /// itself.
    fn list(&self, uri: &StorageUri) -> StorageResult<Vec<StorageUri>>;

    fn stat(&self, uri: &StorageUri) -> StorageResult<FileStat>;

    fn read(&self, uri: &StorageUri) -> StorageResult<Vec<u8>>;

    fn write(&self, uri: &StorageUri, data: &[u8]) -> StorageResult<()>;

    /// Which capabilities the backend grants for `uri`.
    fn probe(&self, uri: &StorageUri) -> StorageResult<CapabilitySet>;

    /// Streaming reader over the content of `uri`.
    fn open(&self, uri: &StorageUri) -> StorageResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read(uri)?)))
    }

    fn exists(&self, uri: &StorageUri) -> bool {
        self.stat(uri).is_ok()
    }

    /// Copy `uri` to a local file, replacing it atomically.
    fn copy_to_local(&self, uri: &StorageUri, dest: &Path) -> StorageResult<()> {
        let data = self.read(uri)?;
        ldb_store::fs::write_atomic(dest, &data)?;
        Ok(())
    }
}

/// Scheme → adapter table.
#[derive(Clone)]
pub struct AdapterSet {
    adapters: BTreeMap<String, Arc<dyn StorageAdapter>>,
}

impl AdapterSet {
    /// A set holding only the local filesystem adapter.
    pub fn new() -> Self {
        let mut set = Self::empty();
        set.register(Arc::new(LocalAdapter::new()));
        set
    }

    pub fn empty() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// Add or replace the adapter for its protocol.
    pub fn register(&mut self, adapter: Arc<dyn StorageAdapter>) {
        self.adapters.insert(adapter.protocol().to_string(), adapter);
    }

    /// Builder form of [`AdapterSet::register`].
    pub fn with(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, protocol: &str) -> StorageResult<&Arc<dyn StorageAdapter>> {
        self.adapters
            .get(protocol)
            .ok_or_else(|| StorageError::UnsupportedScheme(protocol.to_string()))
    }

    /// Adapter for a URI's scheme.
    pub fn for_uri(&self, uri: &StorageUri) -> StorageResult<&Arc<dyn StorageAdapter>> {
        self.get(&uri.protocol)
    }

    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Adapter for a URI's scheme with every operation bounded by its
    /// timeout.
    pub fn bounded_for(&self, uri: &StorageUri) -> StorageResult<BoundedAdapter> {
        Ok(BoundedAdapter::new(Arc::clone(self.for_uri(uri)?)))
    }

    /// Probe `uri`, giving up after the adapter's timeout.
    pub fn probe(&self, uri: &StorageUri) -> StorageResult<CapabilitySet> {
        self.bounded_for(uri)?.probe(uri)
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("protocols", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct SlowAdapter;

    impl StorageAdapter for SlowAdapter {
        fn protocol(&self) -> &str {
            "slow"
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
        fn list(&self, _: &StorageUri) -> StorageResult<Vec<StorageUri>> {
            Ok(Vec::new())
        }
        fn stat(&self, uri: &StorageUri) -> StorageResult<FileStat> {
            Err(StorageError::NotFound(uri.clone()))
        }
        fn read(&self, uri: &StorageUri) -> StorageResult<Vec<u8>> {
            Err(StorageError::NotFound(uri.clone()))
        }
        fn write(&self, _: &StorageUri, _: &[u8]) -> StorageResult<()> {
            Ok(())
        }
        fn probe(&self, _: &StorageUri) -> StorageResult<CapabilitySet> {
            thread::sleep(Duration::from_millis(500));
            Ok(CapabilitySet::FULL)
        }
    }

    #[test]
    fn missing_capabilities() {
        let have = CapabilitySet {
            list: true,
            stat: true,
            read: false,
            write: false,
        };
        assert_eq!(
            have.missing(&CapabilitySet::FULL),
            vec![Capability::Read, Capability::Write]
        );
        assert!(CapabilitySet::FULL.missing(&CapabilitySet::READ).is_empty());
    }

    #[test]
    fn unknown_scheme_is_unsupported() {
        let set = AdapterSet::new();
        let uri = StorageUri::parse("s3://bucket").unwrap();
        assert!(matches!(
            set.for_uri(&uri),
            Err(StorageError::UnsupportedScheme(p)) if p == "s3"
        ));
        assert_eq!(set.protocols().collect::<Vec<_>>(), vec!["file"]);
    }

    #[test]
    fn probe_times_out() {
        let set = AdapterSet::empty().with(Arc::new(SlowAdapter));
        let uri = StorageUri::parse("slow://x").unwrap();
        assert!(matches!(
            set.probe(&uri),
            Err(StorageError::Timeout { operation: "probe", .. })
        ));
    }
}

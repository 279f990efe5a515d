use std::collections::BTreeMap;
use std::path::PathBuf;

use ldb_store::fs::{read_json_opt, write_json};
use ldb_types::StorageUri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::adapter::{AdapterSet, CapabilitySet};
use crate::error::{StorageError, StorageResult};

/// A registered storage location as persisted in `<instance>/storage`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub path: String,
    pub protocol: String,
    #[serde(default)]
    pub fs_id: String,
    #[serde(default)]
    pub read_access_verified: bool,
    #[serde(default)]
    pub write_access_verified: bool,
    #[serde(default)]
    pub read_and_add: bool,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl StorageLocation {
    pub fn uri(&self) -> StorageUri {
        StorageUri {
            protocol: self.protocol.clone(),
            path: self.path.clone(),
        }
    }

    /// Whether `uri` is this location or lies beneath it.
    pub fn contains(&self, uri: &StorageUri) -> bool {
        uri.is_within(&self.uri())
    }

    pub fn class(&self) -> StorageClass {
        if self.read_and_add {
            StorageClass::ReadAdd
        } else {
            StorageClass::ReadOnly
        }
    }
}

/// How LDB may use a URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    /// Inside a registered location; may be indexed.
    ReadOnly,
    /// Inside the read-add location; may be indexed and written.
    ReadAdd,
    /// Outside every registered location.
    Unregistered,
}

/// Options for [`StorageRegistry::register`].
#[derive(Clone, Debug, Default)]
pub struct RegisterOptions {
    pub read_add: bool,
    /// Replace registered locations nested below the new one.
    pub force: bool,
    /// Adapter options stored with the location.
    pub options: BTreeMap<String, Value>,
}

impl RegisterOptions {
    pub fn read_add() -> Self {
        Self {
            read_add: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    locations: Vec<StorageLocation>,
}

/// The set of registered storage locations.
#[derive(Debug)]
pub struct StorageRegistry {
    path: Option<PathBuf>,
    adapters: AdapterSet,
    locations: Vec<StorageLocation>,
}

impl StorageRegistry {
    /// Load the registry persisted at `path` (empty if the file is missing).
    pub fn load(path: impl Into<PathBuf>, adapters: AdapterSet) -> StorageResult<Self> {
        let path = path.into();
        let file: StorageFile = read_json_opt(&path)?.unwrap_or_default();
        Ok(Self {
            path: Some(path),
            adapters,
            locations: file.locations,
        })
    }

    /// A registry that is never written to disk.
    pub fn in_memory(adapters: AdapterSet) -> Self {
        Self {
            path: None,
            adapters,
            locations: Vec::new(),
        }
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    pub fn locations(&self) -> &[StorageLocation] {
        &self.locations
    }

    /// The read-add location, if one is registered.
    pub fn read_add_location(&self) -> Option<&StorageLocation> {
        self.locations.iter().find(|l| l.read_and_add)
    }

    /// The registered location containing `uri`.
    pub fn containing(&self, uri: &StorageUri) -> Option<&StorageLocation> {
        self.locations.iter().find(|l| l.contains(uri))
    }

    /// Classify `uri` by the location that contains it.
    pub fn resolve(&self, uri: &StorageUri) -> StorageClass {
        self.containing(uri)
            .map(StorageLocation::class)
            .unwrap_or(StorageClass::Unregistered)
    }

    /// Register a new storage location.
    ///
    /// Conflicts with existing locations are checked before the adapter is
    /// asked to verify capabilities, so no I/O happens for rejected URIs.
    pub fn register(
        &mut self,
        uri: &StorageUri,
        opts: &RegisterOptions,
    ) -> StorageResult<StorageLocation> {
        let mut children = Vec::new();
        for (idx, loc) in self.locations.iter().enumerate() {
            let existing = loc.uri();
            if existing == *uri {
                return Err(StorageError::DuplicateLocation(uri.to_string()));
            }
            if uri.is_within(&existing) {
                return Err(StorageError::NestedLocation {
                    new: uri.to_string(),
                    existing: existing.to_string(),
                });
            }
            if existing.is_within(uri) {
                if !opts.force {
                    return Err(StorageError::NestedLocation {
                        new: uri.to_string(),
                        existing: existing.to_string(),
                    });
                }
                children.push(idx);
            }
        }
        // A replaced read-add child passes the flag on to its parent.
        let read_add = opts.read_add || children.iter().any(|i| self.locations[*i].read_and_add);
        if read_add {
            if let Some(current) = self
                .locations
                .iter()
                .enumerate()
                .find(|(i, l)| l.read_and_add && !children.contains(i))
            {
                return Err(StorageError::DuplicateReadAdd {
                    existing: current.1.uri().to_string(),
                });
            }
        }

        let caps = self.verify(uri, read_add)?;
        let location = StorageLocation {
            path: uri.path.clone(),
            protocol: uri.protocol.clone(),
            fs_id: String::new(),
            read_access_verified: caps.read,
            write_access_verified: caps.write,
            read_and_add: read_add,
            options: opts.options.clone(),
        };

        for idx in children.into_iter().rev() {
            let removed = self.locations.remove(idx);
            info!(location = %removed.uri(), "replaced nested storage location");
        }
        self.locations.push(location.clone());
        self.save()?;
        info!(location = %uri, read_add, "registered storage location");
        Ok(location)
    }

    /// Set or clear the read-add flag of a registered location.
    pub fn update(&mut self, uri: &StorageUri, read_add: bool) -> StorageResult<StorageLocation> {
        let idx = self.index_of(uri)?;
        if read_add {
            if let Some(other) = self
                .locations
                .iter()
                .enumerate()
                .find(|(i, l)| *i != idx && l.read_and_add)
            {
                return Err(StorageError::DuplicateReadAdd {
                    existing: other.1.uri().to_string(),
                });
            }
            let caps = self.verify(uri, true)?;
            self.locations[idx].write_access_verified = caps.write;
        }
        self.locations[idx].read_and_add = read_add;
        self.save()?;
        Ok(self.locations[idx].clone())
    }

    /// Remove a registered location. Indexed objects are unaffected.
    pub fn unregister(&mut self, uri: &StorageUri) -> StorageResult<StorageLocation> {
        let idx = self.index_of(uri)?;
        let removed = self.locations.remove(idx);
        self.save()?;
        Ok(removed)
    }

    fn index_of(&self, uri: &StorageUri) -> StorageResult<usize> {
        self.locations
            .iter()
            .position(|l| l.uri() == *uri)
            .ok_or_else(|| StorageError::NotRegistered(uri.to_string()))
    }

    fn verify(&self, uri: &StorageUri, read_add: bool) -> StorageResult<CapabilitySet> {
        let caps = self.adapters.probe(uri)?;
        let required = if read_add {
            CapabilitySet::FULL
        } else {
            CapabilitySet::READ
        };
        let missing = caps.missing(&required);
        if !missing.is_empty() {
            return Err(StorageError::InsufficientPermission {
                uri: uri.to_string(),
                missing,
            });
        }
        if !read_add && caps.write {
            warn!(location = %uri, "read-only storage location is writable");
        }
        Ok(caps)
    }

    fn save(&self) -> StorageResult<()> {
        if let Some(path) = &self.path {
            let file = StorageFile {
                locations: self.locations.clone(),
            };
            write_json(path, &file)?;
        }
        Ok(())
    }
}

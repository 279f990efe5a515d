use std::collections::BTreeSet;

use ldb_types::{ContentHasher, ObjectHash, StorageUri};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// One physical location of a data object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation {
    #[serde(default)]
    pub fs_id: String,
    pub protocol: String,
    pub path: String,
}

impl ObjectLocation {
    /// Build a location from a parsed URI.
    pub fn from_uri(uri: &StorageUri, fs_id: impl Into<String>) -> Self {
        Self {
            fs_id: fs_id.into(),
            protocol: uri.protocol.clone(),
            path: uri.path.clone(),
        }
    }

    /// The location as a URI.
    pub fn uri(&self) -> StorageUri {
        StorageUri {
            protocol: self.protocol.clone(),
            path: self.path.clone(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.uri().fmt(f)
    }
}

/// Filesystem facts captured when an object is indexed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(flatten)]
    pub location: ObjectLocation,
    pub size: u64,
    /// Seconds since the Unix epoch, when the backend reports it.
    #[serde(default)]
    pub mtime: Option<f64>,
}

impl ObjectInfo {
    /// Lowercased file extension of the location, or `""`.
    pub fn file_type(&self) -> String {
        self.location.uri().extension().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Data objects
// ---------------------------------------------------------------------------

/// Persistent metadata of a data object (`data_object_info/<h>/meta`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataObjectMeta {
    #[serde(rename = "type")]
    pub file_type: String,
    pub first_indexed: String,
    pub last_indexed: String,
    pub last_indexed_by: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub alternate_paths: Vec<ObjectLocation>,
    pub fs: ObjectInfo,
}

impl DataObjectMeta {
    /// Metadata for a newly indexed object.
    pub fn new(info: &ObjectInfo, indexed_by: &str, now: &str) -> Self {
        Self {
            file_type: info.file_type(),
            first_indexed: now.to_string(),
            last_indexed: now.to_string(),
            last_indexed_by: indexed_by.to_string(),
            tags: BTreeSet::new(),
            alternate_paths: vec![info.location.clone()],
            fs: info.clone(),
        }
    }

    /// Record another sighting of the object. Returns `true` if a new location
    /// was added.
    pub fn touch(&mut self, info: &ObjectInfo, opts: &PutOptions, now: &str) -> bool {
        self.last_indexed = now.to_string();
        self.last_indexed_by = opts.indexed_by.clone();
        if !opts.record_location || self.alternate_paths.contains(&info.location) {
            return false;
        }
        self.alternate_paths.push(info.location.clone());
        true
    }
}

/// A data object as returned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct DataObject {
    pub hash: ObjectHash,
    pub meta: DataObjectMeta,
    /// Id of the current annotation, if the object has one.
    pub current_annotation: Option<ObjectHash>,
}

impl DataObject {
    /// Every recorded physical location, in the order they were seen.
    pub fn locations(&self) -> &[ObjectLocation] {
        &self.meta.alternate_paths
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.meta.tags
    }
}

/// Options for [`crate::ObjectStore::put_object`].
#[derive(Clone, Debug)]
pub struct PutOptions {
    /// Add the location to the object's location set.
    ///
    /// New objects always record their first location.
    pub record_location: bool,
    /// User recorded as `last_indexed_by`.
    pub indexed_by: String,
}

impl PutOptions {
    pub fn new(indexed_by: impl Into<String>) -> Self {
        Self {
            record_location: true,
            indexed_by: indexed_by.into(),
        }
    }

    /// Index without adding the location to the object's location set.
    pub fn without_location(mut self) -> Self {
        self.record_location = false;
        self
    }
}

/// Result of [`crate::ObjectStore::put_object`].
#[derive(Clone, Debug)]
pub struct PutObjectOutcome {
    pub object: DataObject,
    /// The hash was not known before.
    pub created: bool,
    /// A new location was added to a known object.
    pub location_added: bool,
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// LDB-side half of an annotation payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LdbContent {
    pub user_version: Option<Value>,
    pub schema_version: Option<Value>,
}

/// Annotation content as stored under `objects/annotations/<id>/{ldb,user}`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationPayload {
    pub ldb: LdbContent,
    pub user: Value,
}

impl AnnotationPayload {
    /// Payload with default LDB-side content.
    pub fn new(user: Value) -> Self {
        Self {
            ldb: LdbContent::default(),
            user,
        }
    }

    /// Encoded `(ldb, user)` bytes.
    pub fn encode(&self) -> StoreResult<(Vec<u8>, Vec<u8>)> {
        Ok((serde_json::to_vec(&self.ldb)?, serde_json::to_vec(&self.user)?))
    }

    /// Content address of the payload: MD5 over the ldb bytes then the user
    /// bytes.
    pub fn id(&self) -> StoreResult<ObjectHash> {
        let (ldb, user) = self.encode()?;
        Ok(ContentHasher::hash_parts(&[&ldb, &user]))
    }

    /// The payload as one JSON document: `{"ldb": …, "user": …}`.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "ldb": {
                "user_version": self.ldb.user_version,
                "schema_version": self.ldb.schema_version,
            },
            "user": self.user,
        })
    }
}

/// Per-object annotation metadata (`data_object_info/<h>/annotations/<id>`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMeta {
    pub version: u32,
    pub first_indexed_time: String,
    pub last_indexed_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// An immutable annotation version of one data object.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationVersion {
    pub object: ObjectHash,
    pub id: ObjectHash,
    pub meta: AnnotationMeta,
    pub payload: AnnotationPayload,
}

impl AnnotationVersion {
    pub fn version(&self) -> u32 {
        self.meta.version
    }

    /// User annotation JSON.
    pub fn value(&self) -> &Value {
        &self.payload.user
    }
}

/// Result of [`crate::ObjectStore::put_annotation`].
#[derive(Clone, Debug)]
pub struct PutAnnotationOutcome {
    pub annotation: AnnotationVersion,
    /// A new version number was allocated.
    pub created: bool,
    /// The object's current annotation changed.
    pub current_changed: bool,
}

/// What `put_annotation` has to do for a payload id.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AnnotationPlan {
    /// The payload is already the current annotation.
    Unchanged,
    /// The payload equals an older version, which becomes current again.
    Repin,
    /// The payload is new and gets this version number.
    NewVersion(u32),
}

/// Decide how to record annotation `id` given what the object already has.
pub(crate) fn plan_annotation(
    current: Option<&ObjectHash>,
    existing: &[ObjectHash],
    id: &ObjectHash,
) -> AnnotationPlan {
    if current == Some(id) {
        AnnotationPlan::Unchanged
    } else if existing.contains(id) {
        AnnotationPlan::Repin
    } else {
        AnnotationPlan::NewVersion(existing.len() as u32 + 1)
    }
}

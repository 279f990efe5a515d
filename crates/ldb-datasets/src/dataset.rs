use std::collections::BTreeSet;

use ldb_types::{ContentHasher, ObjectHash};
use serde::{Deserialize, Serialize};

use crate::error::DatasetResult;

/// Per-dataset record (`datasets/<name>`): the ordered version ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub created_by: String,
    pub created: String,
    /// Version ids; version `n` is at index `n - 1`.
    #[serde(default)]
    pub versions: Vec<ObjectHash>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>, created: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_by: created_by.into(),
            created: created.into(),
            versions: Vec::new(),
        }
    }

    /// Number of the latest version, `0` if none.
    pub fn latest_number(&self) -> u32 {
        self.versions.len() as u32
    }

    /// Id of version `number` (1-based).
    pub fn version_id(&self, number: u32) -> Option<ObjectHash> {
        let idx = (number as usize).checked_sub(1)?;
        self.versions.get(idx).copied()
    }

    /// Number of the version with id `id`.
    pub fn number_of(&self, id: &ObjectHash) -> Option<u32> {
        self.versions
            .iter()
            .position(|v| v == id)
            .map(|i| i as u32 + 1)
    }
}

/// Who committed a version, when, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub created_by: String,
    pub commit_time: String,
    pub commit_message: String,
}

/// Immutable record of one committed dataset version
/// (`objects/dataset_versions/<id>`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub version: u32,
    pub parent: Option<ObjectHash>,
    pub collection: ObjectHash,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub commit_info: CommitInfo,
}

impl DatasetVersion {
    pub fn to_bytes(&self) -> DatasetResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ldb_store::StoreError::from(e).into())
    }

    /// Content address of the version record.
    pub fn id(&self) -> DatasetResult<ObjectHash> {
        Ok(ContentHasher::hash(&self.to_bytes()?))
    }
}

use std::collections::BTreeSet;

use ldb_datasets::DatasetVersion;
use ldb_types::{DatasetRef, ObjectHash};

use crate::error::LdbResult;
use crate::instance::Instance;

/// One row of [`Instance::list_datasets`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetSummary {
    pub name: String,
    pub latest: u32,
    pub created_by: String,
    pub created: String,
    /// Commit time of the latest version.
    pub updated: String,
    pub num_objects: usize,
    pub num_annotations: usize,
    pub tags: BTreeSet<String>,
}

/// One version of a dataset's history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionSummary {
    pub number: u32,
    pub id: ObjectHash,
    pub version: DatasetVersion,
}

impl Instance {
    /// Every committed dataset with its latest version, sorted by name.
    pub fn list_datasets(&self) -> LdbResult<Vec<DatasetSummary>> {
        let repo = self.datasets();
        let mut out = Vec::new();
        for dataset in repo.datasets()? {
            if dataset.versions.is_empty() {
                continue;
            }
            let resolved = repo.resolve(&DatasetRef::latest(&dataset.name))?;
            let collection = repo.collection(&resolved.version.collection)?;
            out.push(DatasetSummary {
                latest: resolved.number,
                updated: resolved.version.commit_info.commit_time.clone(),
                tags: resolved.version.tags.clone(),
                num_objects: collection.len(),
                num_annotations: collection.annotated(),
                name: dataset.name,
                created_by: dataset.created_by,
                created: dataset.created,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Every version of `name`, oldest first.
    pub fn dataset_history(&self, name: &str) -> LdbResult<Vec<VersionSummary>> {
        let repo = self.datasets();
        let dataset = repo.require(name)?;
        dataset
            .versions
            .iter()
            .enumerate()
            .map(|(i, id)| -> LdbResult<VersionSummary> {
                Ok(VersionSummary {
                    number: i as u32 + 1,
                    id: *id,
                    version: repo.version(id)?,
                })
            })
            .collect()
    }

    /// Forget a dataset. Its versions and collections stay addressable by id.
    pub fn delete_dataset(&self, name: &str) -> LdbResult<()> {
        Ok(self.datasets().delete(name)?)
    }
}

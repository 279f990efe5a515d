use std::fmt;
use std::path::Path;

use ldb_datasets::{Collection, CommitInfo, CommitRequest};
use ldb_types::{now_timestamp, ObjectHash, DATASET_PREFIX};
use tracing::info;

use crate::error::{LdbError, LdbResult};
use crate::instance::Instance;

/// Result of [`Instance::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitOutcome {
    pub dataset: String,
    pub version: u32,
    /// Id of the new dataset version.
    pub id: ObjectHash,
    pub num_objects: usize,
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Committed {DATASET_PREFIX}{}.v{}", self.dataset, self.version)
    }
}

impl Instance {
    /// Snapshot the workspace at `dir` as the next version of its dataset.
    ///
    /// Fails with [`LdbError::NothingToCommit`] when the workspace is clean.
    /// Afterwards the workspace is clean against the new version.
    pub fn commit(&self, dir: &Path, message: &str) -> LdbResult<CommitOutcome> {
        let (ws, _lock) = self.lock_workspace(dir)?;
        let mut meta = ws.dataset()?;
        let collection = ws.collection()?;
        if collection == ws.parent_collection(self.datasets())? {
            let label = match &meta.parent {
                Some(id) => self
                    .datasets()
                    .dataset(&meta.dataset_name)?
                    .and_then(|d| d.number_of(id))
                    .map(|n| format!("{DATASET_PREFIX}{}.v{n}", meta.dataset_name)),
                None => None,
            };
            return Err(LdbError::NothingToCommit(
                label.unwrap_or_else(|| format!("{DATASET_PREFIX}{}", meta.dataset_name)),
            ));
        }
        self.check_entries(&collection)?;

        let resolved = self.datasets().commit(CommitRequest {
            name: &meta.dataset_name,
            collection: &collection,
            parent: meta.parent,
            tags: meta.tags.clone(),
            info: CommitInfo {
                created_by: self.user().to_string(),
                commit_time: now_timestamp(),
                commit_message: message.to_string(),
            },
        })?;

        meta.parent = Some(resolved.id);
        meta.staged_time = now_timestamp();
        ws.set_dataset(&meta)?;
        info!(
            dataset = %resolved.name,
            version = resolved.number,
            objects = collection.len(),
            "workspace committed"
        );
        Ok(CommitOutcome {
            dataset: resolved.name,
            version: resolved.number,
            id: resolved.id,
            num_objects: collection.len(),
        })
    }

    /// Every member must name an indexed object and one of its annotations.
    fn check_entries(&self, collection: &Collection) -> LdbResult<()> {
        let store = self.store();
        for (hash, annotation) in collection.iter() {
            store.get_object(hash)?;
            if let Some(id) = annotation {
                store.annotation_by_id(hash, id)?;
            }
        }
        Ok(())
    }
}

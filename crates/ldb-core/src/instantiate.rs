//! Materializing a workspace collection as files.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ldb_storage::{StorageAdapter, StorageClass};
use ldb_store::fs::write_atomic;
use ldb_store::DataObject;
use ldb_types::{ObjectHash, StorageUri};
use ldb_workspace::{Workspace, WORKSPACE_DIR};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{LdbError, LdbResult};
use crate::instance::Instance;

/// An object that could not be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstantiateFailure {
    pub hash: ObjectHash,
    pub reason: String,
}

impl fmt::Display for InstantiateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}: {}", self.hash, self.reason)
    }
}

/// Result of [`Instance::instantiate`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstantiateResult {
    pub target: PathBuf,
    pub objects: usize,
    pub annotations: usize,
    pub failures: Vec<InstantiateFailure>,
}

impl InstantiateResult {
    /// Turn collected failures into [`LdbError::ObjectUnavailable`].
    pub fn ensure_complete(self) -> LdbResult<Self> {
        match self.failures.first() {
            None => Ok(self),
            Some(first) => Err(LdbError::ObjectUnavailable {
                count: self.failures.len(),
                first: first.hash.to_hex(),
            }),
        }
    }
}

impl fmt::Display for InstantiateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instantiated data objects: {:6}\nInstantiated annotations:  {:6}",
            self.objects, self.annotations
        )?;
        if !self.failures.is_empty() {
            write!(f, "\nFailures: {}", self.failures.len())?;
            for failure in &self.failures {
                write!(f, "\n  {failure}")?;
            }
        }
        Ok(())
    }
}

impl Instance {
    /// Copy every member of the workspace at `dir` into `target`.
    ///
    /// Each object lands at `<target>/<hash>.<ext>` and its pinned annotation
    /// at `<target>/<hash>.json`. `target` must be empty, or hold only a
    /// workspace, unless `force` is set. Objects that cannot be read from any
    /// recorded location, or whose copy overruns the adapter timeout, are
    /// reported in [`InstantiateResult::failures`].
    pub fn instantiate(&self, dir: &Path, target: &Path, force: bool) -> LdbResult<InstantiateResult> {
        let collection = Workspace::open(dir)?.collection()?;
        if !force && !is_instantiable(target)? {
            return Err(LdbError::TargetNotEmpty(target.to_path_buf()));
        }
        fs::create_dir_all(target)?;

        let entries: Vec<(ObjectHash, Option<ObjectHash>)> =
            collection.iter().map(|(h, a)| (*h, *a)).collect();
        let outcomes: Vec<Result<bool, InstantiateFailure>> = entries
            .par_iter()
            .map(|(hash, annotation)| {
                self.instantiate_one(hash, annotation.as_ref(), target)
                    .map_err(|reason| InstantiateFailure {
                        hash: *hash,
                        reason,
                    })
            })
            .collect();

        let mut result = InstantiateResult {
            target: target.to_path_buf(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(annotated) => {
                    result.objects += 1;
                    if annotated {
                        result.annotations += 1;
                    }
                }
                Err(failure) => {
                    warn!(hash = %failure.hash, reason = %failure.reason, "object unavailable");
                    result.failures.push(failure);
                }
            }
        }
        info!(
            target = %target.display(),
            objects = result.objects,
            annotations = result.annotations,
            failures = result.failures.len(),
            "instantiate finished"
        );
        Ok(result)
    }

    /// Write one object and its annotation. Returns whether an annotation
    /// was written.
    fn instantiate_one(
        &self,
        hash: &ObjectHash,
        annotation: Option<&ObjectHash>,
        target: &Path,
    ) -> Result<bool, String> {
        let store = self.store();
        let object = store.get_object(hash).map_err(|e| e.to_string())?;
        let name = match object.meta.file_type.as_str() {
            "" => hash.to_hex(),
            ext => format!("{}.{ext}", hash.to_hex()),
        };
        self.copy_object(&object, &target.join(name))?;

        let Some(id) = annotation else {
            return Ok(false);
        };
        let version = store.annotation_by_id(hash, id).map_err(|e| e.to_string())?;
        let mut text = serde_json::to_string_pretty(version.value()).map_err(|e| e.to_string())?;
        text.push('\n');
        write_atomic(&target.join(format!("{}.json", hash.to_hex())), text.as_bytes())
            .map_err(|e| e.to_string())?;
        Ok(true)
    }

    /// Copy from the first readable location: registered read-only storage,
    /// then read-add storage, then anything else recorded.
    fn copy_object(&self, object: &DataObject, dest: &Path) -> Result<(), String> {
        let registry = self.registry();
        let mut sources: Vec<StorageUri> = object.locations().iter().map(|l| l.uri()).collect();
        sources.sort_by_key(|uri| match registry.resolve(uri) {
            StorageClass::ReadOnly => 0,
            StorageClass::ReadAdd => 1,
            StorageClass::Unregistered => 2,
        });

        let mut last_error = String::from("no recorded location");
        for uri in &sources {
            let copied = registry
                .adapters()
                .bounded_for(uri)
                .and_then(|adapter| adapter.copy_to_local(uri, dest));
            match copied {
                Ok(()) => {
                    debug!(from = %uri, to = %dest.display(), "copied data object");
                    return Ok(());
                }
                Err(e) => {
                    debug!(from = %uri, error = %e, "location unavailable");
                    last_error = e.to_string();
                }
            }
        }
        Err(last_error)
    }
}

/// Empty, missing, or holding nothing but a workspace.
fn is_instantiable(target: &Path) -> LdbResult<bool> {
    let entries = match fs::read_dir(target) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        if entry?.file_name() != WORKSPACE_DIR {
            return Ok(false);
        }
    }
    Ok(true)
}

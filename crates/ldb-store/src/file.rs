use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ldb_types::{now_timestamp, ObjectHash};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::fs::{read_json, read_json_opt, read_string_opt, write_atomic, write_json, write_once};
use crate::layout::{list_hashes, InstanceLayout};
use crate::lock::{LockFile, DEFAULT_LOCK_TIMEOUT};
use crate::object::{
    plan_annotation, AnnotationMeta, AnnotationPayload, AnnotationPlan, AnnotationVersion,
    DataObject, DataObjectMeta, LdbContent, ObjectInfo, PutAnnotationOutcome, PutObjectOutcome,
    PutOptions,
};
use crate::traits::ObjectStore;

const META: &str = "meta";
const CURRENT: &str = "current";
const ANNOTATIONS: &str = "annotations";
const LOCK: &str = "lock";
const LDB_PART: &str = "ldb";
const USER_PART: &str = "user";

/// Object store backed by an instance directory.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    layout: InstanceLayout,
    lock_timeout: Duration,
}

impl FileObjectStore {
    pub fn new(layout: InstanceLayout) -> Self {
        Self {
            layout,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override how long to wait for a per-object lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &InstanceLayout {
        &self.layout
    }

    fn lock(&self, hash: &ObjectHash) -> StoreResult<LockFile> {
        LockFile::acquire(self.layout.object_dir(hash).join(LOCK), self.lock_timeout)
    }

    fn read_meta(&self, hash: &ObjectHash) -> StoreResult<Option<DataObjectMeta>> {
        read_json_opt(&self.layout.object_dir(hash).join(META))
    }

    fn read_current(&self, hash: &ObjectHash) -> StoreResult<Option<ObjectHash>> {
        let path = self.layout.object_dir(hash).join(CURRENT);
        let Some(raw) = read_string_opt(&path)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        ObjectHash::from_hex(raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                path,
                reason: e.to_string(),
            })
    }

    /// `(id, meta)` for every annotation of `hash`, unordered.
    fn read_annotation_metas(&self, hash: &ObjectHash) -> StoreResult<Vec<(ObjectHash, AnnotationMeta)>> {
        let dir = self.layout.object_dir(hash).join(ANNOTATIONS);
        let entries = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Temp files from interrupted writes are not annotation ids.
            let Ok(id) = ObjectHash::from_hex(&name) else {
                continue;
            };
            out.push((id, read_json(&entry.path())?));
        }
        Ok(out)
    }

    fn read_payload(&self, id: &ObjectHash) -> StoreResult<AnnotationPayload> {
        let dir = self.layout.annotation_payload_dir(id);
        let ldb: LdbContent = read_json(&dir.join(LDB_PART))?;
        let user = read_json(&dir.join(USER_PART))?;
        Ok(AnnotationPayload { ldb, user })
    }

    fn write_payload(&self, id: &ObjectHash, payload: &AnnotationPayload) -> StoreResult<()> {
        let dir = self.layout.annotation_payload_dir(id);
        let (ldb, user) = payload.encode()?;
        write_once(&dir.join(LDB_PART), &ldb)?;
        write_once(&dir.join(USER_PART), &user)?;
        Ok(())
    }

    fn annotation_meta_path(&self, hash: &ObjectHash, id: &ObjectHash) -> PathBuf {
        self.layout
            .object_dir(hash)
            .join(ANNOTATIONS)
            .join(id.to_hex())
    }
}

fn write_current(dir: &Path, id: &ObjectHash) -> StoreResult<()> {
    write_atomic(&dir.join(CURRENT), id.to_hex().as_bytes())
}

impl ObjectStore for FileObjectStore {
    fn put_object(
        &self,
        hash: &ObjectHash,
        info: &ObjectInfo,
        opts: &PutOptions,
    ) -> StoreResult<PutObjectOutcome> {
        let _lock = self.lock(hash)?;
        let now = now_timestamp();
        let meta_path = self.layout.object_dir(hash).join(META);
        let (meta, created, location_added) = match self.read_meta(hash)? {
            None => (DataObjectMeta::new(info, &opts.indexed_by, &now), true, true),
            Some(mut meta) => {
                let added = meta.touch(info, opts, &now);
                (meta, false, added)
            }
        };
        write_json(&meta_path, &meta)?;
        debug!(%hash, created, location_added, "object recorded");
        Ok(PutObjectOutcome {
            object: DataObject {
                hash: *hash,
                meta,
                current_annotation: self.read_current(hash)?,
            },
            created,
            location_added,
        })
    }

    fn put_annotation(
        &self,
        hash: &ObjectHash,
        payload: &AnnotationPayload,
        source: Option<&str>,
    ) -> StoreResult<PutAnnotationOutcome> {
        if self.read_meta(hash)?.is_none() {
            return Err(StoreError::NotFound(*hash));
        }
        let id = payload.id()?;
        let _lock = self.lock(hash)?;
        let current = self.read_current(hash)?;
        let metas = self.read_annotation_metas(hash)?;
        let ids: Vec<ObjectHash> = metas.iter().map(|(id, _)| *id).collect();
        let object_dir = self.layout.object_dir(hash);

        let plan = plan_annotation(current.as_ref(), &ids, &id);
        let (meta, created, current_changed) = match plan {
            AnnotationPlan::Unchanged | AnnotationPlan::Repin => {
                let meta = metas
                    .into_iter()
                    .find(|(existing, _)| *existing == id)
                    .map(|(_, m)| m)
                    .ok_or(StoreError::AnnotationIdNotFound { hash: *hash, id })?;
                let repin = plan == AnnotationPlan::Repin;
                if repin {
                    write_current(&object_dir, &id)?;
                }
                (meta, false, repin)
            }
            AnnotationPlan::NewVersion(version) => {
                let now = now_timestamp();
                let meta = AnnotationMeta {
                    version,
                    first_indexed_time: now.clone(),
                    last_indexed_time: now,
                    source: source.map(str::to_string),
                };
                self.write_payload(&id, payload)?;
                write_json(&self.annotation_meta_path(hash, &id), &meta)?;
                write_current(&object_dir, &id)?;
                (meta, true, true)
            }
        };
        debug!(%hash, annotation = %id, version = meta.version, created, "annotation recorded");
        Ok(PutAnnotationOutcome {
            annotation: AnnotationVersion {
                object: *hash,
                id,
                meta,
                payload: payload.clone(),
            },
            created,
            current_changed,
        })
    }

    fn object(&self, hash: &ObjectHash) -> StoreResult<Option<DataObject>> {
        let Some(meta) = self.read_meta(hash)? else {
            return Ok(None);
        };
        Ok(Some(DataObject {
            hash: *hash,
            meta,
            current_annotation: self.read_current(hash)?,
        }))
    }

    fn annotation_versions(&self, hash: &ObjectHash) -> StoreResult<Vec<AnnotationVersion>> {
        if self.read_meta(hash)?.is_none() {
            return Err(StoreError::NotFound(*hash));
        }
        let mut out = Vec::new();
        for (id, meta) in self.read_annotation_metas(hash)? {
            out.push(AnnotationVersion {
                object: *hash,
                id,
                meta,
                payload: self.read_payload(&id)?,
            });
        }
        out.sort_by_key(|a| a.version());
        Ok(out)
    }

    fn annotation_by_id(&self, hash: &ObjectHash, id: &ObjectHash) -> StoreResult<AnnotationVersion> {
        let path = self.annotation_meta_path(hash, id);
        let Some(meta) = read_json_opt::<AnnotationMeta>(&path)? else {
            return Err(StoreError::AnnotationIdNotFound {
                hash: *hash,
                id: *id,
            });
        };
        Ok(AnnotationVersion {
            object: *hash,
            id: *id,
            meta,
            payload: self.read_payload(id)?,
        })
    }

    fn list_objects(&self) -> StoreResult<Vec<ObjectHash>> {
        let mut hashes = list_hashes(&self.layout.data_object_info_dir())?;
        // A directory without `meta` belongs to an object still being created.
        hashes.retain(|h| self.layout.object_dir(h).join(META).is_file());
        Ok(hashes)
    }

    fn set_tags(&self, hash: &ObjectHash, tags: &BTreeSet<String>) -> StoreResult<DataObject> {
        let _lock = self.lock(hash)?;
        let mut meta = self.read_meta(hash)?.ok_or(StoreError::NotFound(*hash))?;
        meta.tags = tags.clone();
        write_json(&self.layout.object_dir(hash).join(META), &meta)?;
        Ok(DataObject {
            hash: *hash,
            meta,
            current_annotation: self.read_current(hash)?,
        })
    }
}

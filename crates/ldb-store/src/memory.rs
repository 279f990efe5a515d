use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ldb_types::{now_timestamp, ObjectHash};

use crate::error::{StoreError, StoreResult};
use crate::object::{
    plan_annotation, AnnotationMeta, AnnotationPayload, AnnotationPlan, AnnotationVersion,
    DataObject, DataObjectMeta, ObjectInfo, PutAnnotationOutcome, PutObjectOutcome, PutOptions,
};
use crate::traits::ObjectStore;

#[derive(Clone, Debug)]
struct Entry {
    meta: DataObjectMeta,
    current: Option<ObjectHash>,
    /// Ordered by version number.
    annotations: Vec<AnnotationVersion>,
}

impl Entry {
    fn to_object(&self, hash: &ObjectHash) -> DataObject {
        DataObject {
            hash: *hash,
            meta: self.meta.clone(),
            current_annotation: self.current,
        }
    }
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All state is held behind a `RwLock`, so
/// version allocation is serialized by the write lock.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectHash, Entry>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of data objects currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<ObjectHash, Entry>>> {
        self.objects.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<ObjectHash, Entry>>> {
        self.objects.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put_object(
        &self,
        hash: &ObjectHash,
        info: &ObjectInfo,
        opts: &PutOptions,
    ) -> StoreResult<PutObjectOutcome> {
        let now = now_timestamp();
        let mut map = self.write()?;
        let (created, location_added) = match map.get_mut(hash) {
            Some(entry) => (false, entry.meta.touch(info, opts, &now)),
            None => {
                map.insert(
                    *hash,
                    Entry {
                        meta: DataObjectMeta::new(info, &opts.indexed_by, &now),
                        current: None,
                        annotations: Vec::new(),
                    },
                );
                (true, true)
            }
        };
        let object = map
            .get(hash)
            .map(|e| e.to_object(hash))
            .ok_or(StoreError::NotFound(*hash))?;
        Ok(PutObjectOutcome {
            object,
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
        let id = payload.id()?;
        let mut map = self.write()?;
        let entry = map.get_mut(hash).ok_or(StoreError::NotFound(*hash))?;
        let ids: Vec<ObjectHash> = entry.annotations.iter().map(|a| a.id).collect();

        let plan = plan_annotation(entry.current.as_ref(), &ids, &id);
        let (annotation, created) = match plan {
            AnnotationPlan::Unchanged | AnnotationPlan::Repin => {
                let existing = entry
                    .annotations
                    .iter()
                    .find(|a| a.id == id)
                    .cloned()
                    .ok_or(StoreError::AnnotationIdNotFound { hash: *hash, id })?;
                (existing, false)
            }
            AnnotationPlan::NewVersion(version) => {
                let now = now_timestamp();
                let annotation = AnnotationVersion {
                    object: *hash,
                    id,
                    meta: AnnotationMeta {
                        version,
                        first_indexed_time: now.clone(),
                        last_indexed_time: now,
                        source: source.map(str::to_string),
                    },
                    payload: payload.clone(),
                };
                entry.annotations.push(annotation.clone());
                (annotation, true)
            }
        };
        let current_changed = plan != AnnotationPlan::Unchanged;
        entry.current = Some(id);
        Ok(PutAnnotationOutcome {
            annotation,
            created,
            current_changed,
        })
    }

    fn object(&self, hash: &ObjectHash) -> StoreResult<Option<DataObject>> {
        Ok(self.read()?.get(hash).map(|e| e.to_object(hash)))
    }

    fn annotation_versions(&self, hash: &ObjectHash) -> StoreResult<Vec<AnnotationVersion>> {
        self.read()?
            .get(hash)
            .map(|e| e.annotations.clone())
            .ok_or(StoreError::NotFound(*hash))
    }

    fn list_objects(&self) -> StoreResult<Vec<ObjectHash>> {
        let mut hashes: Vec<ObjectHash> = self.read()?.keys().copied().collect();
        hashes.sort();
        Ok(hashes)
    }

    fn set_tags(&self, hash: &ObjectHash, tags: &BTreeSet<String>) -> StoreResult<DataObject> {
        let mut map = self.write()?;
        let entry = map.get_mut(hash).ok_or(StoreError::NotFound(*hash))?;
        entry.meta.tags = tags.clone();
        Ok(entry.to_object(hash))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectLocation;
    use ldb_types::ContentHasher;
    use serde_json::json;
    use std::sync::Arc;

    fn info(path: &str) -> ObjectInfo {
        ObjectInfo {
            location: ObjectLocation {
                fs_id: String::new(),
                protocol: "file".into(),
                path: path.into(),
            },
            size: 1,
            mtime: None,
        }
    }

    #[test]
    fn reindexing_same_bytes_keeps_one_object() {
        let store = InMemoryObjectStore::new();
        let h = ContentHasher::hash(b"same");
        let opts = PutOptions::new("u");
        store.put_object(&h, &info("/a"), &opts).unwrap();
        store.put_object(&h, &info("/a"), &opts).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_object(&h).unwrap().locations().len(), 1);
    }

    #[test]
    fn current_annotation_follows_puts() {
        let store = InMemoryObjectStore::new();
        let h = ContentHasher::hash(b"x");
        store.put_object(&h, &info("/x"), &PutOptions::new("u")).unwrap();
        assert!(store.annotation(&h, None).unwrap().is_none());

        let a = AnnotationPayload::new(json!({"v": "a"}));
        let b = AnnotationPayload::new(json!({"v": "b"}));
        store.put_annotation(&h, &a, None).unwrap();
        store.put_annotation(&h, &b, None).unwrap();
        let (obj, ann) = store.get(&h, None).unwrap();
        assert_eq!(ann.unwrap().version(), 2);
        assert_eq!(obj.current_annotation, Some(b.id().unwrap()));

        let repinned = store.put_annotation(&h, &a, None).unwrap();
        assert!(repinned.current_changed);
        assert_eq!(store.annotation(&h, None).unwrap().unwrap().version(), 1);
    }

    #[test]
    fn concurrent_puts_allocate_distinct_versions() {
        let store = Arc::new(InMemoryObjectStore::new());
        let h = ContentHasher::hash(b"shared");
        store.put_object(&h, &info("/s"), &PutOptions::new("u")).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .put_annotation(&h, &AnnotationPayload::new(json!(i)), None)
                        .unwrap()
                        .annotation
                        .version()
                })
            })
            .collect();
        let mut versions: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        versions.sort();
        assert_eq!(versions, (1..=8).collect::<Vec<_>>());
    }
}

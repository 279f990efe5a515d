use std::collections::{BTreeSet, HashSet};

use ldb_storage::{StorageAdapter, StorageClass, StorageRegistry};
use ldb_store::{AnnotationPayload, DataObject, ObjectInfo, ObjectLocation, ObjectStore, PutOptions};
use ldb_types::{ContentHasher, ObjectHash, StorageUri, OBJECT_PREFIX};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{IndexError, IndexResult};
use crate::format::{AnnotationSource, IndexFormat, IndexItem, PlanInput};
use crate::formats::{annotation_uri_for, is_json};
use crate::import::{import_base, import_destination};
use crate::result::{IndexFailure, IndexedObject, IndexingResult};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do with data files outside every registered storage location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnregisteredPolicy {
    /// Fail with [`IndexError::UnregisteredLocation`].
    #[default]
    Reject,
    /// Copy unknown local files into the read-add location; already indexed
    /// ones are used without recording their location. Remote files are
    /// rejected.
    Import,
    /// Index every file where it is.
    InPlace,
}

/// Settings for one [`Indexer`].
#[derive(Clone, Debug)]
pub struct IndexOptions {
    pub format: IndexFormat,
    pub unregistered: UnregisteredPolicy,
    /// Tags added to every indexed object.
    pub tags: BTreeSet<String>,
    /// User recorded as `last_indexed_by`.
    pub indexed_by: String,
}

impl IndexOptions {
    pub fn new(indexed_by: impl Into<String>) -> Self {
        Self {
            format: IndexFormat::Auto,
            unregistered: UnregisteredPolicy::Reject,
            tags: BTreeSet::new(),
            indexed_by: indexed_by.into(),
        }
    }

    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_policy(mut self, policy: UnregisteredPolicy) -> Self {
        self.unregistered = policy;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

// ---------------------------------------------------------------------------
// Prepared items
// ---------------------------------------------------------------------------

struct PreparedAnnotation {
    value: Value,
    source: StorageUri,
    /// The annotation lives in its own file that travels with the object.
    is_file: bool,
}

struct PreparedObject {
    data: StorageUri,
    hash: ObjectHash,
    size: u64,
    mtime: Option<f64>,
    annotation: Option<PreparedAnnotation>,
}

enum Prepared {
    Object(PreparedObject),
    Annotation {
        hash: ObjectHash,
        value: Value,
        source: StorageUri,
    },
}

enum ItemError {
    /// Report and continue with the next item.
    Failed(IndexFailure),
    /// Abort the run.
    Fatal(IndexError),
}

/// Where an object gets recorded.
struct Placement {
    location: StorageUri,
    record_location: bool,
    annotation_source: Option<StorageUri>,
}

// ---------------------------------------------------------------------------
// Indexer
// ---------------------------------------------------------------------------

/// Enumerates storage, hashes objects and records them in an object store.
///
/// A run has three phases:
///
/// 1. **Plan**: list files and group them into items with the format
///    strategy. Nothing is read except format-level files such as a COCO
///    document.
/// 2. **Prepare**: hash data files and parse annotation files, in parallel.
/// 3. **Write**: import unregistered files when asked to and record objects
///    and annotations, one item at a time in enumeration order.
///
/// Shape errors abort before anything is written. Problems with a single file
/// are collected in [`IndexingResult::failures`], including adapter calls
/// that overrun [`StorageAdapter::timeout`].
pub struct Indexer<'a> {
    store: &'a dyn ObjectStore,
    registry: &'a StorageRegistry,
    options: IndexOptions,
}

impl<'a> Indexer<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        registry: &'a StorageRegistry,
        options: IndexOptions,
    ) -> Self {
        Self {
            store,
            registry,
            options,
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Index several targets, concatenating their results.
    pub fn index_all(&self, uris: &[StorageUri]) -> IndexResult<IndexingResult> {
        let mut result = IndexingResult::default();
        for uri in uris {
            result.extend(self.index(uri)?);
        }
        Ok(result)
    }

    /// Index one directory or file.
    ///
    /// A data file given directly is indexed together with its `.json`
    /// sibling when one exists.
    pub fn index(&self, uri: &StorageUri) -> IndexResult<IndexingResult> {
        let bounded = self.registry.adapters().bounded_for(uri)?;
        let adapter: &dyn StorageAdapter = &bounded;
        let stat = adapter.stat(uri)?;
        let mut files = adapter.list(uri)?;
        if !stat.is_dir && !is_json(uri) {
            let sibling = annotation_uri_for(uri);
            if adapter.exists(&sibling) {
                files.push(sibling);
            }
        }
        if files.is_empty() {
            return Err(IndexError::NoFiles(uri.to_string()));
        }
        let (annotations, data): (Vec<_>, Vec<_>) = files.into_iter().partition(is_json);

        let format = self.options.format.detect(&data, &annotations);
        let strategy = format.strategy();
        let items = strategy.plan(&PlanInput {
            root: uri,
            root_is_dir: stat.is_dir,
            data: &data,
            annotations: &annotations,
            adapter,
        })?;
        info!(target = %uri, %format, items = items.len(), "indexing");
        self.check_locations(&items)?;

        let prepared: Vec<Result<Prepared, ItemError>> = items
            .par_iter()
            .map(|item| self.prepare(adapter, item))
            .collect();

        let mut result = IndexingResult::default();
        let mut ready = Vec::with_capacity(prepared.len());
        for item in prepared {
            match item {
                Ok(p) => ready.push(p),
                Err(ItemError::Fatal(e)) => return Err(e),
                Err(ItemError::Failed(f)) => {
                    warn!(uri = %f.uri, reason = %f.reason, "skipping item");
                    result.failures.push(f);
                }
            }
        }

        let placements = self.place(&ready)?;
        for (item, placement) in ready.into_iter().zip(placements) {
            let outcome = match item {
                Prepared::Object(obj) => self.write_object(adapter, obj, placement),
                Prepared::Annotation {
                    hash,
                    value,
                    source,
                } => self.write_annotation(hash, value, &source),
            };
            match outcome {
                Ok(indexed) => result.objects.push(indexed),
                Err(f) => {
                    warn!(uri = %f.uri, reason = %f.reason, "failed to index item");
                    result.failures.push(f);
                }
            }
        }
        info!(
            target = %uri,
            objects = result.found_objects(),
            new_objects = result.new_objects(),
            new_annotations = result.new_annotations(),
            failures = result.failures.len(),
            "indexing finished"
        );
        Ok(result)
    }

    /// Reject unregistered data files the policy does not allow.
    fn check_locations(&self, items: &[IndexItem]) -> IndexResult<()> {
        for item in items {
            let IndexItem::Object { data, .. } = item else {
                continue;
            };
            if self.registry.resolve(data) != StorageClass::Unregistered {
                continue;
            }
            let allowed = match self.options.unregistered {
                UnregisteredPolicy::Reject => false,
                UnregisteredPolicy::Import => data.is_local(),
                UnregisteredPolicy::InPlace => true,
            };
            if !allowed {
                return Err(IndexError::UnregisteredLocation(data.to_string()));
            }
        }
        Ok(())
    }

    fn prepare(&self, adapter: &dyn StorageAdapter, item: &IndexItem) -> Result<Prepared, ItemError> {
        match item {
            IndexItem::Object { data, annotation } => {
                let failed = |e: &dyn std::fmt::Display| ItemError::Failed(IndexFailure::new(data, e));
                let stat = adapter.stat(data).map_err(|e| failed(&e))?;
                let reader = adapter.open(data).map_err(|e| failed(&e))?;
                let hash = ContentHasher::hash_reader(reader).map_err(|e| failed(&e))?;
                let annotation = match annotation {
                    None => None,
                    Some(AnnotationSource::File(file)) => Some(PreparedAnnotation {
                        value: read_json(adapter, file)?,
                        source: file.clone(),
                        is_file: true,
                    }),
                    Some(AnnotationSource::Inline { value, origin }) => Some(PreparedAnnotation {
                        value: value.clone(),
                        source: origin.clone(),
                        is_file: false,
                    }),
                };
                debug!(object = %data, %hash, "hashed");
                Ok(Prepared::Object(PreparedObject {
                    data: data.clone(),
                    hash,
                    size: stat.size,
                    mtime: stat.mtime,
                    annotation,
                }))
            }
            IndexItem::AnnotationFile(file) => {
                let mut doc = read_json(adapter, file)?;
                let unsupported = |reason: &str| {
                    ItemError::Fatal(IndexError::UnsupportedFormat {
                        format: IndexFormat::AnnotationOnly,
                        reason: format!("{file}: {reason}"),
                    })
                };
                let id = doc
                    .pointer("/ldb_meta/data_object_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| unsupported("missing ldb_meta.data_object_id"))?;
                let hash = ObjectHash::from_hex(id.strip_prefix(OBJECT_PREFIX).unwrap_or(id))
                    .map_err(|e| unsupported(&e.to_string()))?;
                let value = doc
                    .get_mut("annotation")
                    .map(Value::take)
                    .ok_or_else(|| unsupported("missing annotation"))?;
                Ok(Prepared::Annotation {
                    hash,
                    value,
                    source: file.clone(),
                })
            }
        }
    }

    /// Decide where each prepared object is recorded, importing nothing yet.
    ///
    /// Content seen twice in one batch is imported once; later copies are
    /// treated like already indexed objects.
    fn place(&self, ready: &[Prepared]) -> IndexResult<Vec<Option<Placement>>> {
        let mut base = None;
        let mut importing = HashSet::new();
        let mut placements = Vec::with_capacity(ready.len());
        for item in ready {
            let Prepared::Object(obj) = item else {
                placements.push(None);
                continue;
            };
            let annotation_source = obj.annotation.as_ref().map(|a| a.source.clone());
            let unregistered = self.registry.resolve(&obj.data) == StorageClass::Unregistered;
            let placement = if !unregistered || self.options.unregistered != UnregisteredPolicy::Import {
                Placement {
                    location: obj.data.clone(),
                    record_location: true,
                    annotation_source,
                }
            } else if self.store.contains(&obj.hash)? || !importing.insert(obj.hash) {
                Placement {
                    location: obj.data.clone(),
                    record_location: false,
                    annotation_source,
                }
            } else {
                if base.is_none() {
                    let read_add = self
                        .registry
                        .read_add_location()
                        .ok_or(IndexError::NoReadAddLocation)?;
                    base = Some(import_base(&read_add.uri()));
                }
                let base = base.as_ref().ok_or(IndexError::NoReadAddLocation)?;
                Placement {
                    location: import_destination(base, &obj.data),
                    record_location: true,
                    annotation_source: obj.annotation.as_ref().map(|a| {
                        if a.is_file {
                            import_destination(base, &a.source)
                        } else {
                            a.source.clone()
                        }
                    }),
                }
            };
            placements.push(Some(placement));
        }
        Ok(placements)
    }

    /// Copy an unregistered file (and its annotation file) to its import
    /// destination.
    fn import(
        &self,
        adapter: &dyn StorageAdapter,
        obj: &PreparedObject,
        placement: &Placement,
    ) -> IndexResult<()> {
        let dest_adapter = self.registry.adapters().bounded_for(&placement.location)?;
        let bytes = adapter.read(&obj.data)?;
        dest_adapter.write(&placement.location, &bytes)?;
        if let (Some(ann), Some(dest)) = (&obj.annotation, &placement.annotation_source) {
            if ann.is_file && *dest != ann.source {
                let bytes = adapter.read(&ann.source)?;
                dest_adapter.write(dest, &bytes)?;
            }
        }
        info!(from = %obj.data, to = %placement.location, "imported into read-add storage");
        Ok(())
    }

    fn write_object(
        &self,
        adapter: &dyn StorageAdapter,
        obj: PreparedObject,
        placement: Option<Placement>,
    ) -> Result<IndexedObject, IndexFailure> {
        let data = obj.data.clone();
        self.try_write_object(adapter, obj, placement)
            .map_err(|e| IndexFailure::new(&data, e))
    }

    fn try_write_object(
        &self,
        adapter: &dyn StorageAdapter,
        obj: PreparedObject,
        placement: Option<Placement>,
    ) -> IndexResult<IndexedObject> {
        let placement = placement.unwrap_or(Placement {
            location: obj.data.clone(),
            record_location: true,
            annotation_source: obj.annotation.as_ref().map(|a| a.source.clone()),
        });
        if placement.location != obj.data {
            self.import(adapter, &obj, &placement)?;
        }

        let fs_id = self
            .registry
            .containing(&placement.location)
            .map(|l| l.fs_id.clone())
            .unwrap_or_default();
        let info = ObjectInfo {
            location: ObjectLocation::from_uri(&placement.location, fs_id),
            size: obj.size,
            mtime: obj.mtime,
        };
        let mut opts = PutOptions::new(self.options.indexed_by.clone());
        if !placement.record_location {
            opts = opts.without_location();
        }
        let put = self.store.put_object(&obj.hash, &info, &opts)?;

        let mut annotation = put.object.current_annotation;
        let mut new_annotation = false;
        let found_annotation = obj.annotation.is_some();
        if let Some(ann) = obj.annotation {
            let source = placement.annotation_source.unwrap_or(ann.source).to_string();
            let outcome =
                self.store
                    .put_annotation(&obj.hash, &AnnotationPayload::new(ann.value), Some(&source))?;
            annotation = Some(outcome.annotation.id);
            new_annotation = outcome.created;
        }
        self.apply_tags(&put.object)?;

        Ok(IndexedObject {
            hash: obj.hash,
            annotation,
            found_object: true,
            found_annotation,
            new_object: put.created,
            new_annotation,
        })
    }

    fn write_annotation(
        &self,
        hash: ObjectHash,
        value: Value,
        source: &StorageUri,
    ) -> Result<IndexedObject, IndexFailure> {
        let failed = |e: &dyn std::fmt::Display| IndexFailure::new(source, e);
        let object = match self.store.object(&hash) {
            Ok(Some(object)) => object,
            Ok(None) => {
                return Err(failed(&format!(
                    "data object not found: {OBJECT_PREFIX}{hash}"
                )))
            }
            Err(e) => return Err(failed(&e)),
        };
        let source_str = source.to_string();
        let outcome = self
            .store
            .put_annotation(&hash, &AnnotationPayload::new(value), Some(&source_str))
            .map_err(|e| failed(&e))?;
        self.apply_tags(&object).map_err(|e| failed(&e))?;
        Ok(IndexedObject {
            hash,
            annotation: Some(outcome.annotation.id),
            found_object: false,
            found_annotation: true,
            new_object: false,
            new_annotation: outcome.created,
        })
    }

    fn apply_tags(&self, object: &DataObject) -> IndexResult<()> {
        if self.options.tags.is_subset(object.tags()) {
            return Ok(());
        }
        let tags = object.tags() | &self.options.tags;
        self.store.set_tags(&object.hash, &tags)?;
        Ok(())
    }
}

fn read_json(adapter: &dyn StorageAdapter, file: &StorageUri) -> Result<Value, ItemError> {
    let bytes = adapter
        .read(file)
        .map_err(|e| ItemError::Failed(IndexFailure::new(file, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ItemError::Failed(IndexFailure::new(
            file,
            format!("unable to parse JSON annotation: {e}"),
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use ldb_storage::{AdapterSet, RegisterOptions};
    use ldb_store::InMemoryObjectStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn uri(p: &Path) -> StorageUri {
        StorageUri::local(p).unwrap()
    }

    fn write(path: &Path, data: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn registry_for(dir: &Path) -> StorageRegistry {
        let mut reg = StorageRegistry::in_memory(AdapterSet::new());
        reg.register(&uri(dir), &RegisterOptions::default()).unwrap();
        reg
    }

    // -----------------------------------------------------------------------
    // Pair formats
    // -----------------------------------------------------------------------

    #[test]
    fn strict_pairs_index_annotated_objects() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("a.json"), br#"{"class": "i"}"#);
        write(&dir.path().join("b.png"), b"bbb");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let opts = IndexOptions::new("tester").with_format(IndexFormat::StrictPairs);
        let indexer = Indexer::new(&store, &reg, opts);

        let result = indexer.index(&uri(dir.path())).unwrap();
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.new_objects(), 1);
        assert_eq!(result.new_annotations(), 1);
        let hash = ContentHasher::hash(b"aaa");
        assert_eq!(result.objects[0].hash, hash);
        let ann = store.annotation(&hash, None).unwrap().unwrap();
        assert_eq!(ann.version(), 1);
        assert_eq!(ann.value(), &json!({"class": "i"}));
        assert!(!store.contains(&ContentHasher::hash(b"bbb")).unwrap());
    }

    #[test]
    fn auto_indexes_unannotated_objects() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("b.png"), b"bbb");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("tester"));

        let result = indexer.index(&uri(dir.path())).unwrap();
        assert_eq!(result.new_objects(), 2);
        assert_eq!(result.new_annotations(), 0);
        assert!(result.failures.is_empty());
        for data in [b"aaa", b"bbb"] {
            let hash = ContentHasher::hash(data);
            assert!(store.contains(&hash).unwrap());
            assert!(store.annotation(&hash, None).unwrap().is_none());
        }
        assert!(result.objects.iter().all(|o| o.annotation.is_none()));
    }

    #[test]
    fn reindexing_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("a.json"), br#"{"class": "i"}"#);
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("tester"));

        indexer.index(&uri(dir.path())).unwrap();
        let second = indexer.index(&uri(dir.path())).unwrap();
        assert_eq!(second.new_objects(), 0);
        assert_eq!(second.new_annotations(), 0);
        assert_eq!(store.len(), 1);
        let hash = ContentHasher::hash(b"aaa");
        assert_eq!(store.annotation_versions(&hash).unwrap().len(), 1);
    }

    #[test]
    fn changed_annotation_adds_version() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("a.json"), br#"{"class": "i"}"#);
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("tester"));
        indexer.index(&uri(dir.path())).unwrap();

        write(&dir.path().join("a.json"), br#"{"class": "v"}"#);
        let result = indexer.index(&uri(dir.path())).unwrap();
        assert_eq!(result.new_annotations(), 1);
        let hash = ContentHasher::hash(b"aaa");
        assert_eq!(store.annotation(&hash, None).unwrap().unwrap().version(), 2);
    }

    #[test]
    fn single_file_picks_up_sibling_annotation() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("a.json"), br#"{"k": 1}"#);
        write(&dir.path().join("other.png"), b"zzz");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("tester"));

        let result = indexer.index(&uri(&dir.path().join("a.png"))).unwrap();
        assert_eq!(result.objects.len(), 1);
        assert!(result.objects[0].found_annotation);
    }

    #[test]
    fn bad_json_is_collected_not_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("a.json"), b"{not json");
        write(&dir.path().join("b.png"), b"bbb");
        write(&dir.path().join("b.json"), b"{}");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("tester"));

        let result = indexer.index(&uri(dir.path())).unwrap();
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].uri.ends_with("a.json"));
    }

    #[test]
    fn tags_are_added() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let opts = IndexOptions::new("tester")
            .with_format(IndexFormat::BarePairs)
            .with_tags(["train"]);
        let indexer = Indexer::new(&store, &reg, opts);
        indexer.index(&uri(dir.path())).unwrap();
        let obj = store.get_object(&ContentHasher::hash(b"aaa")).unwrap();
        assert!(obj.tags().contains("train"));
    }

    // -----------------------------------------------------------------------
    // Other formats
    // -----------------------------------------------------------------------

    #[test]
    fn annotation_only_requires_indexed_object() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let bare = IndexOptions::new("t").with_format(IndexFormat::BarePairs);
        Indexer::new(&store, &reg, bare).index(&uri(dir.path())).unwrap();

        let hash = ContentHasher::hash(b"aaa");
        let annots = dir.path().join("annots");
        let doc = json!({"ldb_meta": {"data_object_id": hash.to_hex()}, "annotation": {"x": 1}});
        write(&annots.join("a.json"), doc.to_string().as_bytes());
        let unknown = json!({
            "ldb_meta": {"data_object_id": ContentHasher::hash(b"nope").to_hex()},
            "annotation": {}
        });
        write(&annots.join("b.json"), unknown.to_string().as_bytes());

        let indexer = Indexer::new(&store, &reg, IndexOptions::new("t"));
        let result = indexer.index(&uri(&annots)).unwrap();
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(
            store.annotation(&hash, None).unwrap().unwrap().value(),
            &json!({"x": 1})
        );
    }

    #[test]
    fn annotation_only_shape_error_aborts() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.json"), br#"{"annotation": {}}"#);
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("t"));
        let err = indexer.index(&uri(dir.path())).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFormat { .. }));
    }

    #[test]
    fn folder_labels_infer_from_directories() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("cat/1.png"), b"c1");
        write(&dir.path().join("dog/1.png"), b"d1");
        let store = InMemoryObjectStore::new();
        let reg = registry_for(dir.path());
        let opts = IndexOptions::new("t").with_format(IndexFormat::FolderLabels);
        let result = Indexer::new(&store, &reg, opts).index(&uri(dir.path())).unwrap();
        assert_eq!(result.new_annotations(), 2);
        let ann = store
            .annotation(&ContentHasher::hash(b"d1"), None)
            .unwrap()
            .unwrap();
        assert_eq!(ann.value(), &json!({"label": "dog"}));
    }

    // -----------------------------------------------------------------------
    // Unregistered locations
    // -----------------------------------------------------------------------

    #[test]
    fn unregistered_rejected_by_default() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.png"), b"aaa");
        write(&dir.path().join("a.json"), b"{}");
        let store = InMemoryObjectStore::new();
        let reg = StorageRegistry::in_memory(AdapterSet::new());
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("t"));
        let err = indexer.index(&uri(dir.path())).unwrap_err();
        assert!(matches!(err, IndexError::UnregisteredLocation(_)));
    }

    #[test]
    fn import_copies_into_read_add_location() {
        let storage = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(&outside.path().join("a.png"), b"aaa");
        write(&outside.path().join("a.json"), br#"{"n": 1}"#);
        let store = InMemoryObjectStore::new();
        let mut reg = StorageRegistry::in_memory(AdapterSet::new());
        reg.register(&uri(storage.path()), &RegisterOptions::read_add())
            .unwrap();
        let opts = IndexOptions::new("t").with_policy(UnregisteredPolicy::Import);
        let indexer = Indexer::new(&store, &reg, opts);

        let result = indexer.index(&uri(outside.path())).unwrap();
        assert_eq!(result.new_objects(), 1);
        let obj = store.get_object(&ContentHasher::hash(b"aaa")).unwrap();
        let location = obj.locations()[0].uri();
        assert!(location.is_within(&uri(storage.path())));
        assert!(location.path.contains(crate::import::AUTOIMPORT_DIR));
        assert_eq!(fs::read(&location.path).unwrap(), b"aaa");

        // Known hashes are not copied again.
        let again = indexer.index(&uri(outside.path())).unwrap();
        assert_eq!(again.new_objects(), 0);
        let obj = store.get_object(&ContentHasher::hash(b"aaa")).unwrap();
        assert_eq!(obj.locations().len(), 1);
    }

    #[test]
    fn identical_files_in_one_batch_are_imported_once() {
        let storage = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(&outside.path().join("a.png"), b"same");
        write(&outside.path().join("copy.png"), b"same");
        let store = InMemoryObjectStore::new();
        let mut reg = StorageRegistry::in_memory(AdapterSet::new());
        reg.register(&uri(storage.path()), &RegisterOptions::read_add())
            .unwrap();
        let opts = IndexOptions::new("t").with_policy(UnregisteredPolicy::Import);

        let result = Indexer::new(&store, &reg, opts)
            .index(&uri(outside.path()))
            .unwrap();
        assert_eq!(result.objects.len(), 2);
        assert_eq!(result.new_objects(), 1);
        assert!(result.failures.is_empty());
        let obj = store.get_object(&ContentHasher::hash(b"same")).unwrap();
        assert_eq!(obj.locations().len(), 1);
        assert!(obj.locations()[0].uri().path.ends_with("a.png"));
        assert_eq!(count_files(&storage.path().join(crate::import::AUTOIMPORT_DIR)), 1);
    }

    fn count_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                if path.is_dir() { count_files(&path) } else { 1 }
            })
            .sum()
    }

    #[test]
    fn import_without_read_add_fails() {
        let outside = TempDir::new().unwrap();
        write(&outside.path().join("a.png"), b"aaa");
        write(&outside.path().join("a.json"), b"{}");
        let store = InMemoryObjectStore::new();
        let reg = StorageRegistry::in_memory(AdapterSet::new());
        let opts = IndexOptions::new("t").with_policy(UnregisteredPolicy::Import);
        let err = Indexer::new(&store, &reg, opts)
            .index(&uri(outside.path()))
            .unwrap_err();
        assert!(matches!(err, IndexError::NoReadAddLocation));
        assert!(store.is_empty());
    }

    #[test]
    fn in_place_indexes_where_found() {
        let outside = TempDir::new().unwrap();
        write(&outside.path().join("a.png"), b"aaa");
        write(&outside.path().join("a.json"), b"{}");
        let store = InMemoryObjectStore::new();
        let reg = StorageRegistry::in_memory(AdapterSet::new());
        let opts = IndexOptions::new("t").with_policy(UnregisteredPolicy::InPlace);
        Indexer::new(&store, &reg, opts)
            .index(&uri(outside.path()))
            .unwrap();
        let obj = store.get_object(&ContentHasher::hash(b"aaa")).unwrap();
        assert!(obj.locations()[0].uri().is_within(&uri(outside.path())));
    }

    // -----------------------------------------------------------------------
    // Timeouts
    // -----------------------------------------------------------------------

    /// Remote bucket whose `stuck*` objects never answer in time.
    struct Sluggish;

    impl Sluggish {
        fn bucket() -> StorageUri {
            StorageUri::parse("slow://bucket").unwrap()
        }
    }

    impl StorageAdapter for Sluggish {
        fn protocol(&self) -> &str {
            "slow"
        }
        fn timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(50)
        }
        fn list(&self, uri: &StorageUri) -> ldb_storage::StorageResult<Vec<StorageUri>> {
            Ok(vec![uri.join("fast.png"), uri.join("stuck.png")])
        }
        fn stat(&self, uri: &StorageUri) -> ldb_storage::StorageResult<ldb_storage::FileStat> {
            Ok(ldb_storage::FileStat {
                uri: uri.clone(),
                size: 4,
                mtime: None,
                is_dir: *uri == Self::bucket(),
            })
        }
        fn read(&self, uri: &StorageUri) -> ldb_storage::StorageResult<Vec<u8>> {
            if uri.path.ends_with("stuck.png") {
                std::thread::sleep(std::time::Duration::from_millis(500));
            }
            Ok(uri.path.as_bytes().to_vec())
        }
        fn write(&self, _: &StorageUri, _: &[u8]) -> ldb_storage::StorageResult<()> {
            Ok(())
        }
        fn probe(&self, _: &StorageUri) -> ldb_storage::StorageResult<ldb_storage::CapabilitySet> {
            Ok(ldb_storage::CapabilitySet::FULL)
        }
    }

    #[test]
    fn stalled_object_is_a_failure_not_a_hang() {
        let store = InMemoryObjectStore::new();
        let mut reg =
            StorageRegistry::in_memory(AdapterSet::new().with(std::sync::Arc::new(Sluggish)));
        reg.register(&Sluggish::bucket(), &RegisterOptions::default())
            .unwrap();
        let indexer = Indexer::new(&store, &reg, IndexOptions::new("t"));

        let result = indexer.index(&Sluggish::bucket()).unwrap();
        assert_eq!(result.new_objects(), 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].uri.ends_with("stuck.png"));
        assert!(result.failures[0].reason.contains("timed out"));
        assert!(store.contains(&ContentHasher::hash(b"bucket/fast.png")).unwrap());
    }
}

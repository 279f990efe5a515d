use std::collections::BTreeSet;

use ldb_types::ObjectHash;

use crate::error::{StoreError, StoreResult};
use crate::object::{
    AnnotationPayload, AnnotationVersion, DataObject, ObjectInfo, PutAnnotationOutcome,
    PutObjectOutcome, PutOptions,
};

/// Store of data-object metadata and their annotation versions.
///
/// All implementations must satisfy these invariants:
/// - A data object is never removed; its location set only grows.
/// - `put_object` is idempotent per `(hash, location)`.
/// - Annotation versions are numbered from 1 per object without gaps and are
///   immutable once written.
/// - An annotation is only accepted for a known data object.
/// - Version allocation is atomic per object, also across processes for
///   file-backed stores.
pub trait ObjectStore: Send + Sync {
    /// Record that `hash` was found at `info.location`.
    ///
    /// Unknown hashes create a new data object. Known hashes refresh their
    /// `last_indexed` fields and gain the location when
    /// `opts.record_location` is set.
    fn put_object(
        &self,
        hash: &ObjectHash,
        info: &ObjectInfo,
        opts: &PutOptions,
    ) -> StoreResult<PutObjectOutcome>;

    /// Attach an annotation payload to `hash`.
    ///
    /// A payload equal to the current annotation is a no-op. A payload equal
    /// to an older version makes that version current again. Anything else is
    /// stored as the next version and becomes current.
    fn put_annotation(
        &self,
        hash: &ObjectHash,
        payload: &AnnotationPayload,
        source: Option<&str>,
    ) -> StoreResult<PutAnnotationOutcome>;

    /// Look up a data object. Returns `Ok(None)` if it was never indexed.
    fn object(&self, hash: &ObjectHash) -> StoreResult<Option<DataObject>>;

    /// Every annotation version of `hash`, ordered by version number.
    fn annotation_versions(&self, hash: &ObjectHash) -> StoreResult<Vec<AnnotationVersion>>;

    /// Hashes of every indexed object, sorted.
    fn list_objects(&self) -> StoreResult<Vec<ObjectHash>>;

    /// Replace the tag set of a data object.
    fn set_tags(&self, hash: &ObjectHash, tags: &BTreeSet<String>) -> StoreResult<DataObject>;

    /// Look up a data object, failing with `NotFound` if unknown.
    fn get_object(&self, hash: &ObjectHash) -> StoreResult<DataObject> {
        self.object(hash)?.ok_or(StoreError::NotFound(*hash))
    }

    /// Whether `hash` has been indexed.
    fn contains(&self, hash: &ObjectHash) -> StoreResult<bool> {
        Ok(self.object(hash)?.is_some())
    }

    /// Annotation `version` of `hash`, or its current annotation when
    /// `version` is `None`.
    ///
    /// Returns `Ok(None)` only for an object without a current annotation.
    fn annotation(
        &self,
        hash: &ObjectHash,
        version: Option<u32>,
    ) -> StoreResult<Option<AnnotationVersion>> {
        let object = self.get_object(hash)?;
        match version {
            None => match object.current_annotation {
                None => Ok(None),
                Some(id) => self.annotation_by_id(hash, &id).map(Some),
            },
            Some(v) => self
                .annotation_versions(hash)?
                .into_iter()
                .find(|a| a.version() == v)
                .map(Some)
                .ok_or(StoreError::AnnotationNotFound {
                    hash: *hash,
                    version: v,
                }),
        }
    }

    /// Annotation of `hash` whose payload id is `id`.
    fn annotation_by_id(&self, hash: &ObjectHash, id: &ObjectHash) -> StoreResult<AnnotationVersion> {
        self.annotation_versions(hash)?
            .into_iter()
            .find(|a| a.id == *id)
            .ok_or(StoreError::AnnotationIdNotFound {
                hash: *hash,
                id: *id,
            })
    }

    /// A data object together with the requested annotation version.
    fn get(
        &self,
        hash: &ObjectHash,
        version: Option<u32>,
    ) -> StoreResult<(DataObject, Option<AnnotationVersion>)> {
        let object = self.get_object(hash)?;
        let annotation = self.annotation(hash, version)?;
        Ok((object, annotation))
    }
}

use std::collections::BTreeMap;

use ldb_types::{ContentHasher, ObjectHash};
use serde::{Deserialize, Serialize};

use crate::error::DatasetResult;

/// Membership of a dataset version or workspace: data object hash → the
/// annotation id pinned for it, `None` for an object without annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    entries: BTreeMap<ObjectHash, Option<ObjectHash>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &ObjectHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// The pinned annotation id of `hash`; outer `None` if not a member.
    pub fn get(&self, hash: &ObjectHash) -> Option<Option<ObjectHash>> {
        self.entries.get(hash).copied()
    }

    /// Insert or update an entry. Returns `true` if the collection changed.
    pub fn insert(&mut self, hash: ObjectHash, annotation: Option<ObjectHash>) -> bool {
        self.entries.insert(hash, annotation) != Some(annotation)
    }

    /// Remove an entry. Returns `true` if it was present.
    pub fn remove(&mut self, hash: &ObjectHash) -> bool {
        self.entries.remove(hash).is_some()
    }

    /// Entries in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectHash, &Option<ObjectHash>)> {
        self.entries.iter()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &ObjectHash> {
        self.entries.keys()
    }

    /// Number of members with an annotation.
    pub fn annotated(&self) -> usize {
        self.entries.values().filter(|a| a.is_some()).count()
    }

    /// Canonical JSON encoding.
    pub fn to_bytes(&self) -> DatasetResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ldb_store::StoreError::from(e).into())
    }

    /// Content address of the collection.
    pub fn id(&self) -> DatasetResult<ObjectHash> {
        Ok(ContentHasher::hash(&self.to_bytes()?))
    }
}

impl FromIterator<(ObjectHash, Option<ObjectHash>)> for Collection {
    fn from_iter<I: IntoIterator<Item = (ObjectHash, Option<ObjectHash>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Collection {
    type Item = (ObjectHash, Option<ObjectHash>);
    type IntoIter = std::collections::btree_map::IntoIter<ObjectHash, Option<ObjectHash>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> ObjectHash {
        ContentHasher::hash(s.as_bytes())
    }

    #[test]
    fn insert_reports_changes() {
        let mut c = Collection::new();
        assert!(c.insert(h("a"), None));
        assert!(!c.insert(h("a"), None));
        assert!(c.insert(h("a"), Some(h("ann"))));
        assert!(!c.insert(h("a"), Some(h("ann"))));
        assert_eq!(c.get(&h("a")), Some(Some(h("ann"))));
        assert_eq!(c.annotated(), 1);
        assert!(c.remove(&h("a")));
        assert!(!c.remove(&h("a")));
        assert!(c.is_empty());
    }

    #[test]
    fn id_ignores_insertion_order() {
        let a: Collection = [(h("1"), None), (h("2"), Some(h("x")))].into_iter().collect();
        let b: Collection = [(h("2"), Some(h("x"))), (h("1"), None)].into_iter().collect();
        assert_eq!(a.id().unwrap(), b.id().unwrap());
        assert_ne!(a.id().unwrap(), Collection::new().id().unwrap());
    }

    #[test]
    fn json_shape_is_hash_map() {
        let c: Collection = [(h("1"), None)].into_iter().collect();
        let v: serde_json::Value = serde_json::from_slice(&c.to_bytes().unwrap()).unwrap();
        assert!(v[h("1").to_hex()].is_null());
    }
}

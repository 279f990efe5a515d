//! Collection-level diff: compare two collections entry by entry.

use ldb_types::ObjectHash;

use crate::collection::Collection;

/// How an entry differs between two collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffKind {
    /// Present only in the new collection.
    Addition,
    /// Present only in the old collection.
    Deletion,
    /// Present in both with different annotations.
    Modification,
}

/// A single changed entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    pub hash: ObjectHash,
    pub kind: DiffKind,
    /// Annotation in the old collection (outer `None` when absent).
    pub old: Option<Option<ObjectHash>>,
    /// Annotation in the new collection (outer `None` when absent).
    pub new: Option<Option<ObjectHash>>,
}

/// Counts per [`DiffKind`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub deletions: usize,
    pub modifications: usize,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.deletions == 0 && self.modifications == 0
    }
}

/// The result of comparing two collections, in hash order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionDiff {
    pub entries: Vec<DiffEntry>,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut s = DiffSummary::default();
        for e in &self.entries {
            match e.kind {
                DiffKind::Addition => s.additions += 1,
                DiffKind::Deletion => s.deletions += 1,
                DiffKind::Modification => s.modifications += 1,
            }
        }
        s
    }
}

/// Compare `old` against `new`.
pub fn diff_collections(old: &Collection, new: &Collection) -> CollectionDiff {
    let mut entries = Vec::new();
    let mut old_iter = old.iter().map(|(h, a)| (*h, *a)).peekable();
    let mut new_iter = new.iter().map(|(h, a)| (*h, *a)).peekable();
    loop {
        match (old_iter.peek().copied(), new_iter.peek().copied()) {
            (None, None) => break,
            (Some((oh, oa)), None) => {
                entries.push(deletion(oh, oa));
                old_iter.next();
            }
            (None, Some((nh, na))) => {
                entries.push(addition(nh, na));
                new_iter.next();
            }
            (Some((oh, oa)), Some((nh, na))) => {
                if oh < nh {
                    entries.push(deletion(oh, oa));
                    old_iter.next();
                } else if nh < oh {
                    entries.push(addition(nh, na));
                    new_iter.next();
                } else {
                    if oa != na {
                        entries.push(DiffEntry {
                            hash: oh,
                            kind: DiffKind::Modification,
                            old: Some(oa),
                            new: Some(na),
                        });
                    }
                    old_iter.next();
                    new_iter.next();
                }
            }
        }
    }
    CollectionDiff { entries }
}

fn addition(hash: ObjectHash, annotation: Option<ObjectHash>) -> DiffEntry {
    DiffEntry {
        hash,
        kind: DiffKind::Addition,
        old: None,
        new: Some(annotation),
    }
}

fn deletion(hash: ObjectHash, annotation: Option<ObjectHash>) -> DiffEntry {
    DiffEntry {
        hash,
        kind: DiffKind::Deletion,
        old: Some(annotation),
        new: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_types::ContentHasher;

    fn h(s: &str) -> ObjectHash {
        ContentHasher::hash(s.as_bytes())
    }

    #[test]
    fn identical_collections_have_no_diff() {
        let c: Collection = [(h("a"), Some(h("x"))), (h("b"), None)].into_iter().collect();
        assert!(diff_collections(&c, &c).is_empty());
    }

    #[test]
    fn detects_each_kind() {
        let old: Collection = [(h("keep"), None), (h("gone"), None), (h("mod"), Some(h("v1")))]
            .into_iter()
            .collect();
        let new: Collection = [(h("keep"), None), (h("new"), None), (h("mod"), Some(h("v2")))]
            .into_iter()
            .collect();
        let diff = diff_collections(&old, &new);
        let s = diff.summary();
        assert_eq!(
            s,
            DiffSummary {
                additions: 1,
                deletions: 1,
                modifications: 1
            }
        );
        let m = diff
            .entries
            .iter()
            .find(|e| e.kind == DiffKind::Modification)
            .unwrap();
        assert_eq!(m.hash, h("mod"));
        assert_eq!(m.old, Some(Some(h("v1"))));
        assert_eq!(m.new, Some(Some(h("v2"))));
    }

    #[test]
    fn entries_are_in_hash_order() {
        let old = Collection::new();
        let new: Collection = (0..20).map(|i| (h(&i.to_string()), None)).collect();
        let diff = diff_collections(&old, &new);
        let hashes: Vec<_> = diff.entries.iter().map(|e| e.hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
        assert_eq!(diff.summary().additions, 20);
    }
}

use std::fmt;

use ldb_types::ObjectHash;

/// Outcome for one successfully indexed item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedObject {
    pub hash: ObjectHash,
    /// The annotation the item carried, or the object's current annotation
    /// when it carried none.
    pub annotation: Option<ObjectHash>,
    /// A data file was found for this item.
    pub found_object: bool,
    /// An annotation was found for this item.
    pub found_annotation: bool,
    /// The hash was not indexed before.
    pub new_object: bool,
    /// A new annotation version was allocated.
    pub new_annotation: bool,
}

/// A per-item problem that did not stop the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexFailure {
    pub uri: String,
    pub reason: String,
}

impl IndexFailure {
    pub fn new(uri: impl ToString, reason: impl ToString) -> Self {
        Self {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for IndexFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.uri, self.reason)
    }
}

/// Everything an indexing run did, in enumeration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexingResult {
    pub objects: Vec<IndexedObject>,
    pub failures: Vec<IndexFailure>,
}

impl IndexingResult {
    pub fn found_objects(&self) -> usize {
        self.objects.iter().filter(|o| o.found_object).count()
    }

    pub fn found_annotations(&self) -> usize {
        self.objects.iter().filter(|o| o.found_annotation).count()
    }

    pub fn new_objects(&self) -> usize {
        self.objects.iter().filter(|o| o.new_object).count()
    }

    pub fn new_annotations(&self) -> usize {
        self.objects.iter().filter(|o| o.new_annotation).count()
    }

    /// `(hash, annotation)` of every indexed item.
    pub fn entries(&self) -> impl Iterator<Item = (ObjectHash, Option<ObjectHash>)> + '_ {
        self.objects.iter().map(|o| (o.hash, o.annotation))
    }

    /// Fold another run into this one.
    pub fn extend(&mut self, other: IndexingResult) {
        self.objects.extend(other.objects);
        self.failures.extend(other.failures);
    }
}

impl fmt::Display for IndexingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Finished indexing:")?;
        writeln!(f, "  Found data objects: {:9}", self.found_objects())?;
        writeln!(f, "  Found annotations:  {:9}", self.found_annotations())?;
        writeln!(f, "  New data objects:   {:9}", self.new_objects())?;
        write!(f, "  New annotations:    {:9}", self.new_annotations())?;
        if !self.failures.is_empty() {
            write!(f, "\n  Failures:           {:9}", self.failures.len())?;
        }
        Ok(())
    }
}

use ldb_types::ObjectHash;

/// One collection entry moving through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub hash: ObjectHash,
    /// Pinned annotation id, `None` for an unannotated object.
    pub annotation: Option<ObjectHash>,
}

impl Candidate {
    pub fn new(hash: ObjectHash, annotation: Option<ObjectHash>) -> Self {
        Self { hash, annotation }
    }
}

impl From<(ObjectHash, Option<ObjectHash>)> for Candidate {
    fn from((hash, annotation): (ObjectHash, Option<ObjectHash>)) -> Self {
        Self { hash, annotation }
    }
}

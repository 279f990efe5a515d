use std::fmt;

use serde_json::Value;

use crate::predicate::Predicate;

/// The kind of a filter. A pipeline holds at most one filter per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKind {
    File,
    Query,
    Tag,
    Similarity,
    Limit,
    Sample,
    Version,
    UserVersion,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Query => "query",
            Self::Tag => "tag",
            Self::Similarity => "similarity",
            Self::Limit => "limit",
            Self::Sample => "sample",
            Self::Version => "version",
            Self::UserVersion => "user-version",
        };
        f.write_str(name)
    }
}

/// A filter as requested by the user, before it becomes a stage.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterSpec {
    /// Predicate over the data object's metadata JSON.
    File(Predicate),
    /// Predicate over the pinned annotation's user JSON.
    Query(Predicate),
    /// Object carries any of these tags.
    Tag(Vec<String>),
    /// Scorer result at or above the threshold.
    Similarity { threshold: f64 },
    /// The first N candidates.
    Limit(usize),
    /// A uniform random subset of N candidates, in their original order.
    Sample { n: usize, seed: Option<u64> },
    /// Pinned annotation has this version number.
    Version(u32),
    /// Pinned annotation's `ldb.user_version` equals this value.
    UserVersion(Value),
}

impl FilterSpec {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::File(_) => FilterKind::File,
            Self::Query(_) => FilterKind::Query,
            Self::Tag(_) => FilterKind::Tag,
            Self::Similarity { .. } => FilterKind::Similarity,
            Self::Limit(_) => FilterKind::Limit,
            Self::Sample { .. } => FilterKind::Sample,
            Self::Version(_) => FilterKind::Version,
            Self::UserVersion(_) => FilterKind::UserVersion,
        }
    }
}

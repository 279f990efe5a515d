//! Merging incoming `(object, annotation)` pairs into a collection.

use std::fmt;
use std::str::FromStr;

use ldb_datasets::Collection;
use ldb_types::ObjectHash;
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// Which annotation wins when an incoming entry names an object the
/// collection already holds with a different annotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// The higher annotation version wins; any annotation beats none.
    #[default]
    Newest,
    /// The incoming annotation always wins.
    Incoming,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Newest => "newest",
            Self::Incoming => "incoming",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "incoming" => Ok(Self::Incoming),
            other => Err(WorkspaceError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Counts from [`merge_entries`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Union `incoming` into `collection`.
///
/// `version_of(object, annotation)` returns the version number of an
/// annotation id; it is only called to settle conflicts under
/// [`ConflictPolicy::Newest`].
pub fn merge_entries<I, F, E>(
    collection: &mut Collection,
    incoming: I,
    policy: ConflictPolicy,
    mut version_of: F,
) -> Result<MergeOutcome, E>
where
    I: IntoIterator<Item = (ObjectHash, Option<ObjectHash>)>,
    F: FnMut(&ObjectHash, &ObjectHash) -> Result<u32, E>,
{
    let mut outcome = MergeOutcome::default();
    for (hash, annotation) in incoming {
        let replace = match collection.get(&hash) {
            None => {
                collection.insert(hash, annotation);
                outcome.added += 1;
                continue;
            }
            Some(existing) if existing == annotation => false,
            Some(existing) => match policy {
                ConflictPolicy::Incoming => true,
                ConflictPolicy::Newest => match (existing, annotation) {
                    (None, Some(_)) => true,
                    (Some(_), None) => false,
                    (Some(old), Some(new)) => version_of(&hash, &new)? > version_of(&hash, &old)?,
                    (None, None) => false,
                },
            },
        };
        if replace {
            collection.insert(hash, annotation);
            outcome.updated += 1;
        } else {
            outcome.unchanged += 1;
        }
    }
    Ok(outcome)
}

//! Command argument identifiers.
//!
//! Operations such as `add`, `del` and `list` accept a mix of:
//!
//! - `0x<hex>`: a single data object by content hash
//! - `ds:<name>` / `ds:<name>.v<N>`: a dataset, latest or a specific version
//! - `ds:root`: every indexed object with its current annotation
//! - anything else: a filesystem path or storage URI
//!
//! Whether a path names another workspace directory is a filesystem question
//! and is answered by the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::ObjectHash;
use crate::names::validate_dataset_name;

/// Prefix of dataset identifiers.
pub const DATASET_PREFIX: &str = "ds:";

/// Prefix of object-hash identifiers.
pub const OBJECT_PREFIX: &str = "0x";

/// Reserved dataset name standing for all indexed objects.
pub const ROOT_DATASET: &str = "root";

/// A dataset name with an optional version number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRef {
    pub name: String,
    /// `None` means the latest committed version.
    pub version: Option<u32>,
}

impl DatasetRef {
    /// Reference to the latest version of `name`.
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Reference to a specific version of `name`.
    pub fn at(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }

    /// Parse the part after `ds:`.
    pub fn parse(body: &str) -> Result<Self, TypeError> {
        let (name, version) = match body.rsplit_once(".v") {
            Some((name, digits)) if !digits.is_empty() => {
                let v: u32 = digits.parse().map_err(|_| TypeError::InvalidIdentifier {
                    input: format!("{DATASET_PREFIX}{body}"),
                    reason: format!("invalid version number {digits:?}"),
                })?;
                if v == 0 {
                    return Err(TypeError::InvalidIdentifier {
                        input: format!("{DATASET_PREFIX}{body}"),
                        reason: "versions start at 1".into(),
                    });
                }
                (name, Some(v))
            }
            _ => (body, None),
        };
        validate_dataset_name(name)?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "{DATASET_PREFIX}{}.v{v}", self.name),
            None => write!(f, "{DATASET_PREFIX}{}", self.name),
        }
    }
}

/// A parsed command argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    Object(ObjectHash),
    Dataset(DatasetRef),
    Root,
    Path(String),
}

impl Identifier {
    /// Classify a raw argument.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        if let Some(body) = input.strip_prefix(DATASET_PREFIX) {
            if body == ROOT_DATASET {
                return Ok(Self::Root);
            }
            return DatasetRef::parse(body).map(Self::Dataset);
        }
        if let Some(hex) = input.strip_prefix(OBJECT_PREFIX) {
            return ObjectHash::from_hex(hex)
                .map(Self::Object)
                .map_err(|e| TypeError::InvalidIdentifier {
                    input: input.to_string(),
                    reason: e.to_string(),
                });
        }
        if input.is_empty() {
            return Err(TypeError::InvalidIdentifier {
                input: input.to_string(),
                reason: "empty identifier".into(),
            });
        }
        Ok(Self::Path(input.to_string()))
    }

    /// Whether this identifier refers to filesystem or storage content.
    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(h) => write!(f, "{OBJECT_PREFIX}{h}"),
            Self::Dataset(d) => d.fmt(f),
            Self::Root => write!(f, "{DATASET_PREFIX}{ROOT_DATASET}"),
            Self::Path(p) => f.write_str(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ContentHasher;

    #[test]
    fn parse_object_hash() {
        let h = ContentHasher::hash(b"x");
        let id = Identifier::parse(&format!("0x{h}")).unwrap();
        assert_eq!(id, Identifier::Object(h));
    }

    #[test]
    fn parse_short_hash_fails() {
        assert!(Identifier::parse("0xabc").is_err());
    }

    #[test]
    fn parse_dataset_latest_and_version() {
        assert_eq!(
            Identifier::parse("ds:numerals").unwrap(),
            Identifier::Dataset(DatasetRef::latest("numerals"))
        );
        assert_eq!(
            Identifier::parse("ds:numerals.v2").unwrap(),
            Identifier::Dataset(DatasetRef::at("numerals", 2))
        );
    }

    #[test]
    fn parse_root() {
        assert_eq!(Identifier::parse("ds:root").unwrap(), Identifier::Root);
    }

    #[test]
    fn reject_version_zero_and_garbage() {
        assert!(Identifier::parse("ds:numerals.v0").is_err());
        assert!(Identifier::parse("ds:numerals.vx").is_err());
        assert!(Identifier::parse("ds:").is_err());
    }

    #[test]
    fn anything_else_is_a_path() {
        assert_eq!(
            Identifier::parse("./data/cat.png").unwrap(),
            Identifier::Path("./data/cat.png".into())
        );
        assert!(Identifier::parse("gs://bucket/a").unwrap().is_path());
        assert!(Identifier::parse("").is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn dataset_refs_display_and_parse_back(
                name in "[a-z][a-z0-9_-]{0,20}",
                version in proptest::option::of(1u32..10_000),
            ) {
                prop_assume!(name != "root");
                let r = DatasetRef { name, version };
                let parsed = Identifier::parse(&r.to_string()).unwrap();
                prop_assert_eq!(parsed, Identifier::Dataset(r));
            }
        }
    }
}

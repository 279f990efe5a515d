//! Storage URIs.
//!
//! A storage URI is a protocol plus a path. Plain paths use the `file`
//! protocol; anything of the form `<scheme>://<rest>` uses `<scheme>`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Protocol used for local filesystem paths.
pub const FILE_PROTOCOL: &str = "file";

/// A parsed `(protocol, path)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageUri {
    pub protocol: String,
    pub path: String,
}

impl StorageUri {
    /// Parse a user-supplied URI or path.
    ///
    /// Local paths are made absolute relative to the current directory but
    /// are not canonicalized, so they need not exist.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        if input.is_empty() {
            return Err(TypeError::InvalidIdentifier {
                input: input.to_string(),
                reason: "empty storage URI".into(),
            });
        }
        if let Some((scheme, rest)) = input.split_once("://") {
            let valid_scheme = !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
            if !valid_scheme {
                return Err(TypeError::InvalidIdentifier {
                    input: input.to_string(),
                    reason: format!("invalid scheme {scheme:?}"),
                });
            }
            if scheme == FILE_PROTOCOL {
                return Self::local(Path::new(rest));
            }
            return Ok(Self {
                protocol: scheme.to_ascii_lowercase(),
                path: rest.trim_end_matches('/').to_string(),
            });
        }
        Self::local(Path::new(input))
    }

    /// Build a `file` URI from a local path.
    pub fn local(path: &Path) -> Result<Self, TypeError> {
        let abs = std::path::absolute(path).map_err(|e| TypeError::InvalidIdentifier {
            input: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut s = normalize(&abs).to_string_lossy().into_owned();
        while s.len() > 1 && s.ends_with(std::path::MAIN_SEPARATOR) {
            s.pop();
        }
        Ok(Self {
            protocol: FILE_PROTOCOL.to_string(),
            path: s,
        })
    }

    /// Whether this URI names the local filesystem.
    pub fn is_local(&self) -> bool {
        self.protocol == FILE_PROTOCOL
    }

    /// Local path, if this is a `file` URI.
    pub fn as_local_path(&self) -> Option<PathBuf> {
        self.is_local().then(|| PathBuf::from(&self.path))
    }

    /// Append a relative, `/`-separated path.
    pub fn join(&self, rel: &str) -> Self {
        let rel = rel.trim_start_matches('/');
        if rel.is_empty() {
            return self.clone();
        }
        let path = if self.is_local() {
            let mut p = PathBuf::from(&self.path);
            p.extend(rel.split('/'));
            p.to_string_lossy().into_owned()
        } else {
            format!("{}/{}", self.path, rel)
        };
        Self {
            protocol: self.protocol.clone(),
            path,
        }
    }

    /// Whether `self` equals `prefix` or lies beneath it, comparing whole path
    /// components.
    pub fn is_within(&self, prefix: &StorageUri) -> bool {
        if self.protocol != prefix.protocol {
            return false;
        }
        if self.is_local() {
            return Path::new(&self.path).starts_with(&prefix.path);
        }
        let mine: Vec<&str> = self.path.split('/').filter(|c| !c.is_empty()).collect();
        let theirs: Vec<&str> = prefix.path.split('/').filter(|c| !c.is_empty()).collect();
        mine.len() >= theirs.len() && mine[..theirs.len()] == theirs[..]
    }

    /// Last path component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .rsplit(['/', std::path::MAIN_SEPARATOR])
            .find(|c| !c.is_empty())
    }

    /// Lowercased extension of the last path component, without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}://{}", self.protocol, self.path)
        }
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cloud_uri() {
        let uri = StorageUri::parse("gs://bucket/a/b/").unwrap();
        assert_eq!(uri.protocol, "gs");
        assert_eq!(uri.path, "bucket/a/b");
        assert_eq!(uri.to_string(), "gs://bucket/a/b");
    }

    #[test]
    fn parse_local_path_is_absolute() {
        let uri = StorageUri::parse("some/rel/../dir").unwrap();
        assert!(uri.is_local());
        assert!(Path::new(&uri.path).is_absolute());
        assert!(uri.path.ends_with("some/dir") || uri.path.ends_with("some\\dir"));
    }

    #[test]
    fn file_scheme_is_local() {
        let uri = StorageUri::parse("file:///tmp/data").unwrap();
        assert!(uri.is_local());
        assert!(uri.path.ends_with("data"));
    }

    #[test]
    fn within_respects_component_boundaries() {
        let a = StorageUri::parse("gs://a").unwrap();
        let ab = StorageUri::parse("gs://a/b").unwrap();
        let abc = StorageUri::parse("gs://abc").unwrap();
        assert!(ab.is_within(&a));
        assert!(a.is_within(&a));
        assert!(!abc.is_within(&a));
        assert!(!a.is_within(&ab));
        let s3 = StorageUri::parse("s3://a/b").unwrap();
        assert!(!s3.is_within(&a));
    }

    #[test]
    fn join_and_extension() {
        let base = StorageUri::parse("gs://bucket").unwrap();
        let child = base.join("dir/Cat.PNG");
        assert_eq!(child.to_string(), "gs://bucket/dir/Cat.PNG");
        assert_eq!(child.extension().as_deref(), Some("png"));
        assert_eq!(child.file_name(), Some("Cat.PNG"));
        assert_eq!(base.join("").to_string(), "gs://bucket");
        assert_eq!(StorageUri::parse("gs://b/.hidden").unwrap().extension(), None);
    }

    #[test]
    fn reject_empty_and_bad_scheme() {
        assert!(StorageUri::parse("").is_err());
        assert!(StorageUri::parse("g s://x").is_err());
    }
}

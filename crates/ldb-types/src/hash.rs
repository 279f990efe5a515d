use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Read buffer size used when hashing files.
const CHUNK_SIZE: usize = 1 << 20;

/// Content-addressed identifier for a data object or annotation payload.
///
/// An `ObjectHash` is the MD5 digest of the bytes it names. It serializes as a
/// 32-character lowercase hex string so it can be used directly as a JSON map
/// key in collection files.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHash([u8; 16]);

impl ObjectHash {
    /// Width of the digest in bytes.
    pub const LEN: usize = 16;

    /// Create an `ObjectHash` from a pre-computed digest.
    pub const fn from_digest(digest: [u8; 16]) -> Self {
        Self(digest)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != Self::LEN {
            return Err(TypeError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.short_hex())
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// MD5 content hasher.
///
/// Data objects are hashed over their raw bytes. Annotation payloads are hashed
/// over the concatenation of their LDB-side and user-side JSON encodings, see
/// [`ContentHasher::hash_parts`].
pub struct ContentHasher;

impl ContentHasher {
    /// Hash a byte slice.
    pub fn hash(data: &[u8]) -> ObjectHash {
        Self::hash_parts(&[data])
    }

    /// Hash several byte slices as if they were concatenated.
    pub fn hash_parts(parts: &[&[u8]]) -> ObjectHash {
        let mut hasher = Md5::new();
        for part in parts {
            hasher.update(part);
        }
        finish(hasher)
    }

    /// Hash everything readable from `reader`, one chunk at a time.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ObjectHash> {
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(finish(hasher))
    }

    /// Hash a JSON value using its compact encoding.
    pub fn hash_json<T: Serialize>(value: &T) -> Result<ObjectHash, TypeError> {
        let data =
            serde_json::to_vec(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::hash(&data))
    }

    /// Verify that data produces the expected hash.
    pub fn verify(data: &[u8], expected: &ObjectHash) -> bool {
        Self::hash(data) == *expected
    }
}

fn finish(hasher: Md5) -> ObjectHash {
    let out = hasher.finalize();
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&out);
    ObjectHash(arr)
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::Error;

/// SHA-256 object id used for content addressing
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// zero hash (useful as sentinel)
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// split into (first 2 hex chars, remaining 62) for the object layout
    pub fn to_path_components(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }

    /// hash of already-encoded bytes (trees and commits)
    pub fn of_encoded(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..12])
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// symlink mode constant for deterministic hashing
pub const SYMLINK_MODE: u32 = 0o120777;

/// compute blob hash over (uid, gid, mode, content)
///
/// layout: uid, gid and mode as 4 bytes LE each, then the content.
/// mtime is not hashed.
pub fn compute_blob_hash(uid: u32, gid: u32, mode: u32, content: &[u8]) -> Hash {
    let mut hasher = BlobHasher::new(uid, gid, mode);
    hasher.update(content);
    hasher.finalize()
}

/// hash for a symlink, the target being the content
pub fn compute_symlink_hash(uid: u32, gid: u32, target: &str) -> Hash {
    compute_blob_hash(uid, gid, SYMLINK_MODE, target.as_bytes())
}

/// streaming blob hasher for file content
pub struct BlobHasher {
    hasher: Sha256,
}

impl BlobHasher {
    pub fn new(uid: u32, gid: u32, mode: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(uid.to_le_bytes());
        hasher.update(gid.to_le_bytes());
        hasher.update(mode.to_le_bytes());
        Self { hasher }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

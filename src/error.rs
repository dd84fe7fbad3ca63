use std::path::PathBuf;

use crate::Hash;

/// error type for cache and store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object store not found at {0}")]
    NoRepo(PathBuf),

    #[error("object store already exists at {0}")]
    RepoExists(PathBuf),

    #[error("unsupported object store at {path}: {reason}")]
    UnsupportedRepo { path: PathBuf, reason: String },

    #[error("cache is not open")]
    NotOpen,

    #[error("no stage looked up before commit")]
    NoStage,

    #[error("no cache commit to compare against")]
    NoCommit,

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("symlink target is not valid utf-8: {0}")]
    InvalidSymlinkTarget(PathBuf),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("lock contention on object store")]
    LockContention,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

impl Error {
    /// true for lookups that should degrade to a cache miss
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::RefNotFound(_) | Error::ObjectNotFound(_) => true,
            Error::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub mod blob;
pub mod commit;
pub mod tree;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::fs::fsync_dir;
use crate::hash::Hash;
use crate::repo::Repo;

pub use blob::{blob_exists, blob_path, hash_file, read_blob, write_blob, write_blob_streaming};
pub use commit::{commit_exists, read_commit, write_commit};
pub use tree::{read_tree, tree_exists, write_tree};

/// result of writing an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub hash: Hash,
    /// path of the object file if this write created it, None if it already existed
    pub created: Option<PathBuf>,
}

impl Stored {
    fn existing(hash: Hash) -> Self {
        Self {
            hash,
            created: None,
        }
    }
}

/// fresh temp path inside the store
fn tmp_object_path(repo: &Repo) -> PathBuf {
    repo.tmp_path().join(uuid::Uuid::new_v4().to_string())
}

/// move a finished temp file into place; the temp file is removed on failure
fn install(repo: &Repo, tmp_path: &Path, final_path: &Path) -> Result<()> {
    let parent = final_path.parent().ok_or_else(|| Error::Io {
        path: final_path.to_path_buf(),
        source: std::io::Error::other("object path has no parent"),
    })?;

    let placed = fs::create_dir_all(parent)
        .with_path(parent)
        .and_then(|()| fs::rename(tmp_path, final_path).with_path(final_path));
    if let Err(e) = placed {
        let _ = fs::remove_file(tmp_path);
        return Err(e);
    }

    if repo.fsync_enabled() {
        fsync_dir(parent)?;
    }
    Ok(())
}

/// store cbor+zstd encoded bytes under `dir`, keyed by the hash of those bytes
fn store_encoded(repo: &Repo, dir: &Path, compressed: &[u8]) -> Result<Stored> {
    let hash = Hash::of_encoded(compressed);

    let (prefix, rest) = hash.to_path_components();
    let final_path = dir.join(prefix).join(rest);

    // dedup: if the object already exists, we're done
    if final_path.exists() {
        return Ok(Stored::existing(hash));
    }

    let tmp_path = tmp_object_path(repo);
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(compressed).with_path(&tmp_path)?;
        if repo.fsync_enabled() {
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
    }

    install(repo, &tmp_path, &final_path)?;

    Ok(Stored {
        hash,
        created: Some(final_path),
    })
}

/// read and verify an encoded object
fn load_encoded(path: &Path, hash: &Hash) -> Result<Vec<u8>> {
    let compressed = fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    if Hash::of_encoded(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    zstd::decode_all(&compressed[..]).with_path(path)
}

/// serialize to cbor and compress with zstd (level 3)
fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(value, &mut cbor_bytes)?;
    zstd::encode_all(&cbor_bytes[..], 3).with_path("<zstd>")
}

use std::path::PathBuf;

use crate::error::Result;
use crate::hash::Hash;
use crate::object::{encode, load_encoded, store_encoded, Stored};
use crate::repo::Repo;
use crate::types::Commit;

/// write a commit to the object store
///
/// commits are serialized as CBOR, then zstd compressed.
/// the hash is computed over the compressed bytes.
pub fn write_commit(repo: &Repo, commit: &Commit) -> Result<Stored> {
    let compressed = encode(commit)?;
    store_encoded(repo, &repo.commits_path(), &compressed)
}

/// read a commit from the object store
pub fn read_commit(repo: &Repo, hash: &Hash) -> Result<Commit> {
    let cbor_bytes = load_encoded(&commit_path(repo, hash), hash)?;
    Ok(ciborium::from_reader(&cbor_bytes[..])?)
}

pub fn commit_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.commits_path().join(dir).join(file)
}

pub fn commit_exists(repo: &Repo, hash: &Hash) -> bool {
    commit_path(repo, hash).exists()
}

use std::path::PathBuf;

use crate::error::Result;
use crate::hash::Hash;
use crate::object::{encode, load_encoded, store_encoded, Stored};
use crate::repo::Repo;
use crate::types::Tree;

/// write a tree to the object store
///
/// trees are serialized as CBOR, then zstd compressed.
/// the hash is computed over the compressed bytes.
pub fn write_tree(repo: &Repo, tree: &Tree) -> Result<Stored> {
    let compressed = encode(tree)?;
    store_encoded(repo, &repo.trees_path(), &compressed)
}

/// read a tree from the object store
pub fn read_tree(repo: &Repo, hash: &Hash) -> Result<Tree> {
    let cbor_bytes = load_encoded(&tree_path(repo, hash), hash)?;
    Ok(ciborium::from_reader(&cbor_bytes[..])?)
}

pub fn tree_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.trees_path().join(dir).join(file)
}

pub fn tree_exists(repo: &Repo, hash: &Hash) -> bool {
    tree_path(repo, hash).exists()
}

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use tracing::warn;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{read_symlink_target, DevInoCache, FileMetadata, FileType};
use crate::hash::{compute_symlink_hash, Hash, SYMLINK_MODE};
use crate::object::{hash_file, read_tree};
use crate::repo::Repo;
use crate::transaction::Transaction;
use crate::types::{EntryKind, Tree, TreeEntry};

/// verdict of a tree-writer filter for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Allow,
    Skip,
}

/// filter applied to every entry below the scanned root
///
/// receives the `/`-separated path relative to the root and the entry's
/// metadata. skipping a directory skips everything below it.
pub type TreeFilter<'a> = &'a dyn Fn(&str, &FileMetadata) -> FilterResult;

/// in-memory directory tree, keyed by entry name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutableTree {
    entries: BTreeMap<String, MutableEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutableEntry {
    /// regular file or symlink
    Leaf(EntryKind),
    Directory {
        uid: u32,
        gid: u32,
        mode: u32,
        tree: MutableTree,
    },
}

impl MutableEntry {
    pub fn is_directory(&self) -> bool {
        matches!(self, MutableEntry::Directory { .. })
    }
}

impl MutableTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// load a stored tree and all its subtrees
    pub fn load(repo: &Repo, tree_hash: &Hash) -> Result<Self> {
        let tree = read_tree(repo, tree_hash)?;
        let mut entries = BTreeMap::new();

        for entry in tree.entries() {
            let value = match &entry.kind {
                EntryKind::Directory {
                    hash,
                    uid,
                    gid,
                    mode,
                } => MutableEntry::Directory {
                    uid: *uid,
                    gid: *gid,
                    mode: *mode,
                    tree: Self::load(repo, hash)?,
                },
                kind => MutableEntry::Leaf(kind.clone()),
            };
            entries.insert(entry.name.clone(), value);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &MutableEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&MutableEntry> {
        self.entries.get(name)
    }

    /// look up a `/`-separated path
    pub fn lookup(&self, path: &str) -> Option<&MutableEntry> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut current = self.entries.get(first)?;
        for part in parts {
            match current {
                MutableEntry::Directory { tree, .. } => current = tree.entries.get(part)?,
                MutableEntry::Leaf(_) => return None,
            }
        }
        Some(current)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: MutableEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// scan a directory into a mutable tree
///
/// with a transaction, regular files and symlinks are written as blobs;
/// without one only their hashes are computed. regular files whose
/// (dev, ino) is in `devino` reuse the recorded hash without reading
/// content. devices, fifos and sockets are skipped.
pub fn write_directory_to_mtree(
    root: &Path,
    mut txn: Option<&mut Transaction<'_>>,
    filter: Option<TreeFilter<'_>>,
    devino: &DevInoCache,
) -> Result<MutableTree> {
    scan_dir(root, "", &mut txn, filter, devino)
}

fn scan_dir(
    dir: &Path,
    prefix: &str,
    txn: &mut Option<&mut Transaction<'_>>,
    filter: Option<TreeFilter<'_>>,
    devino: &DevInoCache,
) -> Result<MutableTree> {
    let mut mtree = MutableTree::new();

    let mut dir_entries: Vec<_> = fs::read_dir(dir)
        .with_path(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(dir)?;
    dir_entries.sort_by_key(|e| e.file_name());

    for entry in dir_entries {
        let path = entry.path();
        let name = entry
            .file_name()
            .into_string()
            .map_err(|raw| {
                Error::InvalidEntryName(format!("not utf-8: {}", dir.join(raw).display()))
            })?;
        let logical_path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };

        let meta = FileMetadata::from_path(&path)?;

        if let Some(filter) = filter {
            if filter(&logical_path, &meta) == FilterResult::Skip {
                continue;
            }
        }

        let value = match meta.file_type {
            FileType::Regular => {
                let hash = match devino.get(meta.dev, meta.ino) {
                    Some(hash) => hash,
                    None => match txn.as_deref_mut() {
                        Some(txn) => {
                            let mut file = File::open(&path).with_path(&path)?;
                            txn.write_blob_streaming(&mut file, meta.uid, meta.gid, meta.mode)?
                        }
                        None => hash_file(&path, meta.uid, meta.gid, meta.mode)?,
                    },
                };

                MutableEntry::Leaf(EntryKind::Regular {
                    hash,
                    size: meta.size,
                    uid: meta.uid,
                    gid: meta.gid,
                    mode: meta.mode,
                })
            }

            FileType::Symlink => {
                let target = read_symlink_target(&path)?;

                // symlink hash: target is content, mode is always SYMLINK_MODE
                let hash = match txn.as_deref_mut() {
                    Some(txn) => {
                        txn.write_blob(target.as_bytes(), meta.uid, meta.gid, SYMLINK_MODE)?
                    }
                    None => compute_symlink_hash(meta.uid, meta.gid, &target),
                };

                MutableEntry::Leaf(EntryKind::Symlink {
                    hash,
                    uid: meta.uid,
                    gid: meta.gid,
                })
            }

            FileType::Directory => MutableEntry::Directory {
                uid: meta.uid,
                gid: meta.gid,
                mode: meta.mode,
                tree: scan_dir(&path, &logical_path, txn, filter, devino)?,
            },

            FileType::Special => {
                warn!(path = %logical_path, "skipping special file");
                continue;
            }
        };

        mtree.insert(name, value);
    }

    Ok(mtree)
}

/// write a mutable tree and its subtrees, returning the root tree id
///
/// leaves must already be in the store, i.e. the tree was scanned with a
/// transaction or loaded from the store.
pub fn write_mtree(txn: &mut Transaction<'_>, mtree: &MutableTree) -> Result<Hash> {
    let mut entries = Vec::with_capacity(mtree.len());

    for (name, entry) in mtree.entries() {
        let kind = match entry {
            MutableEntry::Leaf(kind) => kind.clone(),
            MutableEntry::Directory {
                uid,
                gid,
                mode,
                tree,
            } => EntryKind::Directory {
                hash: write_mtree(txn, tree)?,
                uid: *uid,
                gid: *gid,
                mode: *mode,
            },
        };
        entries.push(TreeEntry::new(name, kind));
    }

    txn.write_tree(&Tree::new(entries)?)
}

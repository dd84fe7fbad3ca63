use std::fs::{self, Permissions};
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};
use std::path::Path;

use crate::error::{IoResultExt, Result};
use crate::fs::{apply_metadata, create_symlink, remove_existing, DevInoCache};
use crate::hash::Hash;
use crate::object::{blob_path, read_blob, read_commit, read_tree};
use crate::repo::Repo;
use crate::types::{EntryKind, Tree};

/// how checked out files relate to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutMode {
    /// copy file data and apply recorded ownership and permissions
    #[default]
    None,
    /// hardlink regular files to their blobs, ownership stays with the store
    User,
}

/// checkout options
///
/// checkouts always merge into `dest`: existing files at a checked out
/// path are replaced, existing directories are merged into, and paths not
/// present in the commit are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOptions {
    pub mode: CheckoutMode,
}

impl CheckoutOptions {
    pub fn new(mode: CheckoutMode) -> Self {
        Self { mode }
    }
}

/// checkout the tree of `commit` into `dest`
///
/// in user mode every hardlinked blob's (dev, ino) is recorded in `devino`.
pub fn checkout_commit(
    repo: &Repo,
    commit: &Hash,
    dest: &Path,
    opts: CheckoutOptions,
    devino: &mut DevInoCache,
) -> Result<()> {
    let commit = read_commit(repo, commit)?;
    let tree = read_tree(repo, &commit.tree)?;

    ensure_directory(dest)?;
    checkout_tree(repo, &tree, dest, &opts, devino)
}

/// checkout a tree to a directory (recursive helper)
fn checkout_tree(
    repo: &Repo,
    tree: &Tree,
    target: &Path,
    opts: &CheckoutOptions,
    devino: &mut DevInoCache,
) -> Result<()> {
    for entry in tree.entries() {
        let entry_path = target.join(&entry.name);

        match &entry.kind {
            EntryKind::Regular {
                hash,
                uid,
                gid,
                mode,
                ..
            } => {
                remove_existing(&entry_path)?;
                let blob = blob_path(repo, hash);

                match opts.mode {
                    CheckoutMode::User => {
                        fs::hard_link(&blob, &entry_path).with_path(&entry_path)?;
                        let meta = fs::metadata(&blob).with_path(&blob)?;
                        devino.insert(meta.dev(), meta.ino(), *hash);
                    }
                    CheckoutMode::None => {
                        fs::copy(&blob, &entry_path).with_path(&entry_path)?;
                        apply_metadata(&entry_path, *uid, *gid, *mode)?;
                    }
                }
            }

            EntryKind::Symlink { hash, uid, gid } => {
                // symlink blob contains the target path as content
                let target_bytes = read_blob(repo, hash)?;
                let link_target = String::from_utf8_lossy(&target_bytes);

                match opts.mode {
                    CheckoutMode::User => {
                        remove_existing(&entry_path)?;
                        symlink(link_target.as_ref(), &entry_path).with_path(&entry_path)?;
                    }
                    CheckoutMode::None => create_symlink(&entry_path, &link_target, *uid, *gid)?,
                }
            }

            EntryKind::Directory {
                hash,
                uid,
                gid,
                mode,
            } => {
                ensure_directory(&entry_path)?;

                let subtree = read_tree(repo, hash)?;
                checkout_tree(repo, &subtree, &entry_path, opts, devino)?;

                // apply directory metadata after contents are created
                match opts.mode {
                    CheckoutMode::User => {
                        fs::set_permissions(&entry_path, Permissions::from_mode(mode & 0o7777))
                            .with_path(&entry_path)?
                    }
                    CheckoutMode::None => apply_metadata(&entry_path, *uid, *gid, *mode)?,
                }
            }
        }
    }

    Ok(())
}

/// make `path` a directory, replacing a non-directory in the way
fn ensure_directory(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => {
            remove_existing(path)?;
            fs::create_dir(path).with_path(path)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(path).with_path(path)
        }
        Err(e) => Err(e).with_path(path),
    }
}

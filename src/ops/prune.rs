use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{read_commit, read_tree};
use crate::refs::{list_refs, read_ref};
use crate::repo::Repo;
use crate::types::EntryKind;

/// prune statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// objects in the store before pruning
    pub objects_total: usize,
    pub objects_pruned: usize,
    pub bytes_pruned: u64,
}

#[derive(Default)]
struct Reachable {
    blobs: HashSet<Hash>,
    trees: HashSet<Hash>,
    commits: HashSet<Hash>,
}

/// delete every object not reachable from a ref
///
/// reachability follows commit parents; a parent that is no longer in
/// the store ends the chain.
pub fn prune(repo: &Repo) -> Result<PruneStats> {
    let _lock = repo.lock()?;

    // mark phase: collect all reachable objects
    let mut reachable = Reachable::default();
    for ref_name in list_refs(repo, None)? {
        let commit_hash = read_ref(repo, &ref_name)?;
        mark_commit(repo, &commit_hash, &mut reachable)?;
    }

    // sweep phase: remove unmarked objects
    let mut stats = PruneStats::default();
    sweep_objects(&repo.blobs_path(), &reachable.blobs, &mut stats)?;
    sweep_objects(&repo.trees_path(), &reachable.trees, &mut stats)?;
    sweep_objects(&repo.commits_path(), &reachable.commits, &mut stats)?;

    debug!(
        total = stats.objects_total,
        pruned = stats.objects_pruned,
        bytes = stats.bytes_pruned,
        "pruned object store"
    );
    Ok(stats)
}

/// mark a commit and its ancestry
fn mark_commit(repo: &Repo, commit_hash: &Hash, reachable: &mut Reachable) -> Result<()> {
    let mut next = Some(*commit_hash);
    let mut first = true;

    while let Some(hash) = next {
        // avoid re-processing
        if !reachable.commits.insert(hash) {
            return Ok(());
        }

        let commit = match read_commit(repo, &hash) {
            Ok(commit) => commit,
            Err(Error::ObjectNotFound(_)) if !first => {
                reachable.commits.remove(&hash);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        mark_tree(repo, &commit.tree, reachable)?;
        next = commit.parent;
        first = false;
    }

    Ok(())
}

/// recursively mark a tree and all its reachable objects
fn mark_tree(repo: &Repo, tree_hash: &Hash, reachable: &mut Reachable) -> Result<()> {
    if !reachable.trees.insert(*tree_hash) {
        return Ok(());
    }

    let tree = read_tree(repo, tree_hash)?;

    for entry in tree.entries() {
        match &entry.kind {
            EntryKind::Regular { hash, .. } | EntryKind::Symlink { hash, .. } => {
                reachable.blobs.insert(*hash);
            }
            EntryKind::Directory { hash, .. } => {
                mark_tree(repo, hash, reachable)?;
            }
        }
    }

    Ok(())
}

/// sweep a directory, removing objects not in the reachable set
fn sweep_objects(dir: &Path, reachable: &HashSet<Hash>, stats: &mut PruneStats) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in WalkDir::new(dir).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;

        if !entry.file_type().is_file() {
            continue;
        }

        // reconstruct hash from path: objects/type/XX/YYYYYY...
        let path = entry.path();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let parent_name = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");

        let Ok(hash) = Hash::from_hex(&format!("{}{}", parent_name, file_name)) else {
            continue;
        };

        stats.objects_total += 1;
        if !reachable.contains(&hash) {
            let meta = fs::symlink_metadata(path).with_path(path)?;
            fs::remove_file(path).with_path(path)?;
            stats.bytes_pruned += meta.len();
            stats.objects_pruned += 1;
        }
    }

    // clean up empty fan-out directories
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_dir() {
            // fails while the directory still holds objects
            let _ = fs::remove_dir(entry.path());
        }
    }

    Ok(())
}

fn walk_error(dir: &Path, e: walkdir::Error) -> Error {
    Error::Io {
        path: dir.to_path_buf(),
        source: e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("walkdir error")),
    }
}

use crate::error::Result;
use crate::hash::Hash;
use crate::ops::mtree::{MutableEntry, MutableTree};
use crate::repo::Repo;
use crate::types::DiffResult;

/// compare two stored trees; a missing `from` is the empty tree
pub fn diff_trees(repo: &Repo, from: Option<&Hash>, to: &Hash) -> Result<DiffResult> {
    if from == Some(to) {
        return Ok(DiffResult::default());
    }

    let a = match from {
        Some(hash) => MutableTree::load(repo, hash)?,
        None => MutableTree::new(),
    };
    let b = MutableTree::load(repo, to)?;

    Ok(diff_mtrees(&a, &b))
}

/// compare two in-memory trees
///
/// a new directory reports itself and everything below it as added, a
/// removed directory reports only itself. leaves whose blob id differs
/// are modified; an entry that changes type is removed and added.
pub fn diff_mtrees(a: &MutableTree, b: &MutableTree) -> DiffResult {
    let mut result = DiffResult::default();
    diff_dirs(a, b, "", &mut result);
    result.sort();
    result
}

fn diff_dirs(a: &MutableTree, b: &MutableTree, prefix: &str, result: &mut DiffResult) {
    for (name, old) in a.entries() {
        let path = join(prefix, name);

        match (old, b.get(name)) {
            (_, None) => result.removed.push(path),

            (MutableEntry::Directory { tree: t1, .. }, Some(MutableEntry::Directory { tree: t2, .. })) => {
                diff_dirs(t1, t2, &path, result);
            }

            (MutableEntry::Leaf(k1), Some(MutableEntry::Leaf(k2)))
                if k1.type_name() == k2.type_name() =>
            {
                if k1.hash() != k2.hash() {
                    result.modified.push(path);
                }
            }

            // type changed
            (_, Some(new)) => {
                result.removed.push(path.clone());
                add_recursive(new, path, result);
            }
        }
    }

    for (name, new) in b.entries() {
        if a.get(name).is_none() {
            add_recursive(new, join(prefix, name), result);
        }
    }
}

fn add_recursive(entry: &MutableEntry, path: String, result: &mut DiffResult) {
    if let MutableEntry::Directory { tree, .. } = entry {
        for (name, child) in tree.entries() {
            add_recursive(child, join(&path, name), result);
        }
    }
    result.added.push(path);
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

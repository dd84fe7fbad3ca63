use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fs::{fsync_dir, fsync_file, remove_existing};
use crate::hash::Hash;
use crate::object::{self, Stored};
use crate::refs;
use crate::repo::{Repo, RepoLock};
use crate::types::{Commit, Tree};

/// a batch of object writes and ref updates
///
/// objects land in the store as they are written; ref updates are held
/// back until `commit`. `abort` (or dropping an unfinished transaction)
/// removes every object this transaction created and applies no ref
/// change. the store lock is held for the lifetime of the transaction.
pub struct Transaction<'r> {
    repo: &'r Repo,
    _lock: RepoLock,
    created: Vec<PathBuf>,
    refs: BTreeMap<String, Option<Hash>>,
    finished: bool,
}

impl Repo {
    /// start a transaction, taking the store lock
    pub fn prepare_transaction(&self) -> Result<Transaction<'_>> {
        let lock = self.lock()?;
        Ok(Transaction {
            repo: self,
            _lock: lock,
            created: Vec::new(),
            refs: BTreeMap::new(),
            finished: false,
        })
    }
}

impl<'r> Transaction<'r> {
    pub fn repo(&self) -> &'r Repo {
        self.repo
    }

    pub fn write_blob(&mut self, content: &[u8], uid: u32, gid: u32, mode: u32) -> Result<Hash> {
        let stored = object::write_blob(self.repo, content, uid, gid, mode)?;
        Ok(self.track(stored))
    }

    pub fn write_blob_streaming<R: Read>(
        &mut self,
        reader: &mut R,
        uid: u32,
        gid: u32,
        mode: u32,
    ) -> Result<Hash> {
        let stored = object::write_blob_streaming(self.repo, reader, uid, gid, mode)?;
        Ok(self.track(stored))
    }

    pub fn write_tree(&mut self, tree: &Tree) -> Result<Hash> {
        let stored = object::write_tree(self.repo, tree)?;
        Ok(self.track(stored))
    }

    pub fn write_commit(&mut self, commit: &Commit) -> Result<Hash> {
        let stored = object::write_commit(self.repo, commit)?;
        Ok(self.track(stored))
    }

    /// stage a ref update; None deletes the ref on commit
    pub fn set_ref(&mut self, name: &str, target: Option<&Hash>) -> Result<()> {
        refs::validate_ref_name(name)?;
        self.refs.insert(name.to_string(), target.copied());
        Ok(())
    }

    /// number of objects this transaction added to the store
    pub fn objects_written(&self) -> usize {
        self.created.len()
    }

    /// make written objects durable and apply staged ref updates
    pub fn commit(mut self) -> Result<()> {
        if !self.repo.fsync_enabled() {
            self.sync_created()?;
        }
        // objects are durable from here on; a failed ref write leaves them for prune
        self.finished = true;

        let updates = std::mem::take(&mut self.refs);
        for (name, target) in &updates {
            match target {
                Some(hash) => refs::write_ref(self.repo, name, hash)?,
                None => match refs::delete_ref(self.repo, name) {
                    Ok(()) | Err(Error::RefNotFound(_)) => {}
                    Err(e) => return Err(e),
                },
            }
        }

        debug!(
            objects = self.created.len(),
            refs = updates.len(),
            "transaction committed"
        );
        self.created.clear();
        Ok(())
    }

    /// drop staged ref updates and remove the objects written so far
    pub fn abort(mut self) -> Result<()> {
        self.rollback()
    }

    fn track(&mut self, stored: Stored) -> Hash {
        if let Some(path) = stored.created {
            self.created.push(path);
        }
        stored.hash
    }

    fn sync_created(&self) -> Result<()> {
        let mut dirs: BTreeSet<&Path> = BTreeSet::new();
        for path in &self.created {
            fsync_file(path)?;
            if let Some(parent) = path.parent() {
                dirs.insert(parent);
            }
        }
        for dir in dirs {
            fsync_dir(dir)?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.finished = true;
        self.refs.clear();

        let count = self.created.len();
        for path in self.created.drain(..) {
            remove_existing(&path)?;
        }
        debug!(objects = count, "transaction aborted");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.rollback() {
                warn!(error = %e, "failed to roll back transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{blob_exists, commit_exists};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_commit_applies_refs() {
        let (_dir, repo) = test_repo();

        let mut txn = repo.prepare_transaction().unwrap();
        let tree = txn.write_tree(&Tree::empty()).unwrap();
        let commit = txn
            .write_commit(&Commit::with_timestamp(tree, None, "s", "b", 0))
            .unwrap();
        txn.set_ref("app/init", Some(&commit)).unwrap();

        // refs are not visible before commit
        assert!(!refs::ref_exists(&repo, "app/init"));
        txn.commit().unwrap();

        assert_eq!(refs::read_ref(&repo, "app/init").unwrap(), commit);
    }

    #[test]
    fn test_set_ref_none_deletes() {
        let (_dir, repo) = test_repo();
        refs::write_ref(&repo, "app/old", &Hash::ZERO).unwrap();

        let mut txn = repo.prepare_transaction().unwrap();
        txn.set_ref("app/old", None).unwrap();
        txn.set_ref("app/never-existed", None).unwrap();
        txn.commit().unwrap();

        assert!(!refs::ref_exists(&repo, "app/old"));
    }

    #[test]
    fn test_abort_removes_objects() {
        let (_dir, repo) = test_repo();

        let mut txn = repo.prepare_transaction().unwrap();
        let blob = txn.write_blob(b"content", 0, 0, 0o100644).unwrap();
        let commit = txn
            .write_commit(&Commit::with_timestamp(Hash::ZERO, None, "s", "b", 0))
            .unwrap();
        txn.set_ref("app/stage", Some(&commit)).unwrap();
        txn.abort().unwrap();

        assert!(!blob_exists(&repo, &blob));
        assert!(!commit_exists(&repo, &commit));
        assert!(!refs::ref_exists(&repo, "app/stage"));
    }

    #[test]
    fn test_abort_keeps_preexisting_objects() {
        let (_dir, repo) = test_repo();
        let existing = object::write_blob(&repo, b"shared", 0, 0, 0o100644)
            .unwrap()
            .hash;

        let mut txn = repo.prepare_transaction().unwrap();
        assert_eq!(txn.write_blob(b"shared", 0, 0, 0o100644).unwrap(), existing);
        assert_eq!(txn.objects_written(), 0);
        txn.abort().unwrap();

        assert!(blob_exists(&repo, &existing));
    }

    #[test]
    fn test_drop_rolls_back() {
        let (_dir, repo) = test_repo();

        let blob = {
            let mut txn = repo.prepare_transaction().unwrap();
            let blob = txn.write_blob(b"dropped", 0, 0, 0o100644).unwrap();
            txn.set_ref("app/stage", Some(&blob)).unwrap();
            blob
        };

        assert!(!blob_exists(&repo, &blob));
        assert!(!refs::ref_exists(&repo, "app/stage"));
    }

    #[test]
    fn test_transaction_holds_lock() {
        let (_dir, repo) = test_repo();

        let txn = repo.prepare_transaction().unwrap();
        assert!(matches!(repo.prepare_transaction(), Err(Error::LockContention)));
        txn.commit().unwrap();

        assert!(repo.prepare_transaction().is_ok());
    }

    #[test]
    fn test_commit_with_fsync_disabled() {
        let (_dir, mut repo) = test_repo();
        repo.set_disable_fsync(true);

        let mut txn = repo.prepare_transaction().unwrap();
        let blob = txn.write_blob(b"late sync", 0, 0, 0o100644).unwrap();
        txn.set_ref("app/x", Some(&blob)).unwrap();
        txn.commit().unwrap();

        assert!(blob_exists(&repo, &blob));
        assert_eq!(refs::read_ref(&repo, "app/x").unwrap(), blob);
    }
}

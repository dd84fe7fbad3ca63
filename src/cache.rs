use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::context::BuildContext;
use crate::error::{Error, IoResultExt, Result};
use crate::fs::{remove_existing, zero_mtime, DevInoCache, FileMetadata, FileType};
use crate::hash::Hash;
use crate::object::read_commit;
use crate::ops::{
    checkout_commit, diff_mtrees, diff_trees, prune, write_directory_to_mtree, write_mtree,
    CheckoutMode, CheckoutOptions, FilterResult, MutableTree, PruneStats,
};
use crate::refs;
use crate::repo::Repo;
use crate::transaction::Transaction;
use crate::types::{Commit, DiffResult};

/// ids written by a stage commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCommit {
    /// snapshot of the whole working tree, chained to the previous stage
    pub full: Hash,
    /// only the files this stage created, no parent
    pub delta: Hash,
}

/// ref name of a stage: `branch/` followed by the escaped stage name
///
/// bytes in `[A-Za-z0-9._-]` are kept, every other byte is written as
/// lowercase hex without padding.
pub fn stage_ref_name(branch: &str, stage: &str) -> String {
    format!("{}/{}", branch, escape_stage(stage))
}

fn escape_stage(stage: &str) -> String {
    let mut escaped = String::with_capacity(stage.len());
    for b in stage.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            escaped.push(b as char);
        } else {
            escaped.push_str(&format!("{:x}", b));
        }
    }
    escaped
}

/// build-stage cache for one application build
///
/// each stage is looked up by the fingerprint accumulated so far. hits
/// only move the "last good" pointer; the first miss checks the last
/// good commit out into the working directory and turns lookups off for
/// the rest of the run. from then on every stage is built and committed.
pub struct StageCache<C: BuildContext> {
    context: C,
    app_dir: PathBuf,
    branch: String,
    stage: Option<String>,
    checksum: Checksum,
    /// escaped names of stages cached before this run and not looked up yet
    unused_stages: BTreeSet<String>,
    last_parent: Option<Hash>,
    repo: Option<Repo>,
    disabled: bool,
    devino_cache: DevInoCache,
}

impl<C: BuildContext> StageCache<C> {
    pub fn new(context: C, app_dir: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            context,
            app_dir: app_dir.into(),
            branch: branch.into(),
            stage: None,
            checksum: Checksum::new(),
            unused_stages: BTreeSet::new(),
            last_parent: None,
            repo: None,
            disabled: false,
            devino_cache: DevInoCache::new(),
        }
    }

    /// open (or create) the store and record the stages cached so far
    pub fn open(&mut self) -> Result<()> {
        let mut repo = Repo::open_or_create(self.context.cache_dir())?;

        // checkouts are transient; transactions sync what they wrote on commit
        repo.set_disable_fsync(true);

        // older caches used the branch itself as ref, which would shadow the stage refs
        if refs::ref_exists(&repo, &self.branch) {
            refs::delete_ref(&repo, &self.branch)?;
            debug!(branch = %self.branch, "removed legacy branch ref");
        }

        self.unused_stages = refs::list_refs(&repo, Some(&self.branch))?
            .into_iter()
            .collect();
        debug!(
            branch = %self.branch,
            stages = self.unused_stages.len(),
            "opened stage cache"
        );

        self.repo = Some(repo);
        Ok(())
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn checksum_mut(&mut self) -> &mut Checksum {
        &mut self.checksum
    }

    /// stage of the most recent lookup
    pub fn current_stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    /// last commit known to match the working directory's build history
    pub fn last_commit(&self) -> Option<&Hash> {
        self.last_parent.as_ref()
    }

    fn repo(&self) -> Result<&Repo> {
        self.repo.as_ref().ok_or(Error::NotOpen)
    }

    /// look up `stage` under the current fingerprint
    ///
    /// returns true on a hit. the first miss materializes the last hit
    /// in the working directory and disables all further lookups.
    pub fn lookup(&mut self, stage: &str) -> Result<bool> {
        self.stage = Some(stage.to_string());
        self.unused_stages.remove(&escape_stage(stage));

        if self.disabled {
            return Ok(false);
        }

        let ref_name = stage_ref_name(&self.branch, stage);
        let current = self.checksum.current();

        if let Some(commit) = self.matching_commit(&ref_name, &current)? {
            debug!(stage, commit = %commit, "cache hit");
            self.last_parent = Some(commit);
            return Ok(true);
        }

        if let Some(parent) = self.last_parent {
            info!(stage, "cache miss, checking out last cache hit");
            self.checkout(&parent, true)?;
        } else {
            debug!(stage, "cache miss");
        }

        // don't use the cache any more after the first miss
        self.disabled = true;
        Ok(false)
    }

    /// commit the ref points at if its subject equals `fingerprint`
    fn matching_commit(&self, ref_name: &str, fingerprint: &str) -> Result<Option<Hash>> {
        let repo = self.repo()?;

        let commit = match refs::resolve_ref(repo, ref_name) {
            Ok(Some(commit)) => commit,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!(ref_name, error = %e, "unable to resolve stage ref");
                return Ok(None);
            }
        };

        match read_commit(repo, &commit) {
            Ok(c) if c.subject == fingerprint => Ok(Some(commit)),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!(commit = %commit, error = %e, "unable to load cached commit");
                Ok(None)
            }
        }
    }

    /// true once lookups are off and the working directory holds the build
    pub fn has_checkout(&self) -> bool {
        self.disabled
    }

    /// make sure the working directory is materialized
    ///
    /// when every stage so far was a hit, nothing has been checked out
    /// yet; do it now and stop using the cache.
    pub fn ensure_checkout(&mut self) -> Result<()> {
        if self.has_checkout() {
            return Ok(());
        }

        if let Some(parent) = self.last_parent {
            info!("everything cached, checking out from cache");
            self.checkout(&parent, true)?;
        }

        self.disabled = true;
        Ok(())
    }

    pub fn disable_lookups(&mut self) {
        self.disabled = true;
    }

    fn checkout_mode(&self) -> CheckoutMode {
        // hardlinks into the store are only safe under a copy-on-write overlay
        if self.context.overlay_active() {
            CheckoutMode::User
        } else {
            CheckoutMode::None
        }
    }

    fn checkout(&mut self, commit: &Hash, clear: bool) -> Result<()> {
        let mode = self.checkout_mode();
        let repo = self.repo.as_ref().ok_or(Error::NotOpen)?;

        if clear {
            remove_existing(&self.app_dir)?;
            fs::create_dir_all(&self.app_dir).with_path(&self.app_dir)?;
        }

        checkout_commit(
            repo,
            commit,
            &self.app_dir,
            CheckoutOptions::new(mode),
            &mut self.devino_cache,
        )?;

        if mode == CheckoutMode::None {
            zero_mtime(&self.app_dir)?;
        }
        Ok(())
    }

    /// commit the working directory as the current stage
    ///
    /// writes a full snapshot (parent = last good, subject = fingerprint,
    /// body = `message`) that the stage ref points at, plus a parentless
    /// delta holding only files that are not hardlinks into the store.
    pub fn commit(&mut self, message: &str) -> Result<StageCommit> {
        let stage = self.stage.clone().ok_or(Error::NoStage)?;
        let repo = self.repo.as_ref().ok_or(Error::NotOpen)?;

        info!(stage = %stage, "committing stage to cache");

        // mtimes are normalized so cached and rebuilt trees look the same
        zero_mtime(&self.app_dir)?;

        let fingerprint = self.checksum.current();
        let ref_name = stage_ref_name(&self.branch, &stage);

        let mut txn = repo.prepare_transaction()?;
        let written = write_stage(
            &mut txn,
            &self.app_dir,
            &self.devino_cache,
            self.last_parent,
            &fingerprint,
            message,
            &ref_name,
        );
        let ids = match written {
            Ok(ids) => ids,
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "failed to abort transaction");
                }
                return Err(e);
            }
        };
        txn.commit()?;

        debug!(full = %ids.full, delta = %ids.delta, "cache commit written");

        if self.context.use_hardlink_checkout() {
            debug!("checking out delta commit");
            self.checkout(&ids.delta, false)?;
        }

        self.last_parent = Some(ids.full);
        Ok(ids)
    }

    /// changes in the working directory since the last good commit
    pub fn outstanding_changes(&self) -> Result<DiffResult> {
        let repo = self.repo()?;
        let last = self.last_parent.ok_or(Error::NoCommit)?;

        let commit = read_commit(repo, &last)?;
        let cached = MutableTree::load(repo, &commit.tree)?;
        let live = write_directory_to_mtree(&self.app_dir, None, None, &self.devino_cache)?;

        Ok(diff_mtrees(&cached, &live))
    }

    /// paths added or modified between the `init` and `finish` stages
    pub fn all_changes(&self) -> Result<Vec<String>> {
        branch_changes(self.repo()?, &self.branch)
    }

    /// paths added or modified by the last good stage relative to its parent
    pub fn last_stage_changes(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let last = self.last_parent.ok_or(Error::NoCommit)?;

        let commit = read_commit(repo, &last)?;
        let parent_tree = match &commit.parent {
            Some(parent) => Some(read_commit(repo, parent)?.tree),
            None => None,
        };

        Ok(diff_trees(repo, parent_tree.as_ref(), &commit.tree)?.changed_paths())
    }

    /// drop refs of stages not looked up this run, then prune the store
    pub fn gc(&mut self) -> Result<PruneStats> {
        let repo = self.repo.as_ref().ok_or(Error::NotOpen)?;

        for unused in std::mem::take(&mut self.unused_stages) {
            let ref_name = format!("{}/{}", self.branch, unused);
            debug!(ref_name = %ref_name, "removing unused ref");

            if let Err(e) = refs::delete_ref(repo, &ref_name) {
                warn!(ref_name = %ref_name, error = %e, "failed to remove unused ref");
            }
        }

        info!("pruning cache");
        let stats = prune(repo)?;
        info!(
            total = stats.objects_total,
            pruned = stats.objects_pruned,
            bytes = stats.bytes_pruned,
            "pruned cache"
        );
        Ok(stats)
    }
}

/// paths added or modified between the `init` and `finish` stages of `branch`
///
/// only reads the store, so it works without a session.
pub fn branch_changes(repo: &Repo, branch: &str) -> Result<Vec<String>> {
    let init = stage_tree(repo, branch, "init")?;
    let finish = stage_tree(repo, branch, "finish")?;

    Ok(diff_trees(repo, Some(&init), &finish)?.changed_paths())
}

fn stage_tree(repo: &Repo, branch: &str, stage: &str) -> Result<Hash> {
    let ref_name = stage_ref_name(branch, stage);
    let commit = refs::resolve_ref(repo, &ref_name)?.ok_or(Error::RefNotFound(ref_name))?;
    Ok(read_commit(repo, &commit)?.tree)
}

/// write both commits of a stage inside `txn`
fn write_stage(
    txn: &mut Transaction<'_>,
    app_dir: &Path,
    devino: &DevInoCache,
    parent: Option<Hash>,
    fingerprint: &str,
    message: &str,
    ref_name: &str,
) -> Result<StageCommit> {
    let mtree = write_directory_to_mtree(app_dir, Some(&mut *txn), None, devino)?;
    let root = write_mtree(txn, &mtree)?;
    let full = txn.write_commit(&Commit::with_timestamp(root, parent, fingerprint, message, 0))?;
    txn.set_ref(ref_name, Some(&full))?;

    // hardlinks point into the store, so only unlinked files are new
    let only_new = |path: &str, meta: &FileMetadata| match meta.file_type {
        FileType::Directory => FilterResult::Allow,
        FileType::Regular if meta.nlink == 1 => {
            debug!(path, "allowing non-hardlinked file");
            FilterResult::Allow
        }
        _ => FilterResult::Skip,
    };
    let delta_mtree =
        write_directory_to_mtree(app_dir, Some(&mut *txn), Some(&only_new), devino)?;
    let delta_root = write_mtree(txn, &delta_mtree)?;
    let delta = txn.write_commit(&Commit::with_timestamp(
        delta_root,
        None,
        fingerprint,
        message,
        0,
    ))?;

    Ok(StageCommit { full, delta })
}

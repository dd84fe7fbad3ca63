//! stagecache - incremental build-stage cache
//!
//! caches each stage of a multi-stage build as a commit in a local
//! content-addressed filesystem store. a stage's identity is a fingerprint
//! of everything that went into it; a later run with the same fingerprint
//! restores the stage from the store instead of rebuilding it.
//!
//! # Core concepts
//!
//! - **Fingerprint**: SHA-256 over a typed, ordered stream of build inputs ([`Checksum`])
//! - **Stage ref**: `branch/escaped-stage-name`, pointing at the stage's full commit
//! - **Full commit**: the whole working directory after a stage, parent = previous stage,
//!   subject = fingerprint
//! - **Delta commit**: only the files a stage created, no parent
//! - **Blob / Tree**: content-addressed file data and directory listings (CBOR + zstd)
//!
//! # Hash format
//!
//! blob hash = SHA256(uid | gid | mode | content)
//!
//! tree and commit hashes are SHA256 over their compressed encoding.
//!
//! # Example usage
//!
//! ```no_run
//! use stagecache::{CacheConfig, StageCache};
//!
//! let config = CacheConfig::new("/build/.cache");
//! let mut cache = StageCache::new(config, "/build/app", "x86_64-org.example.App");
//! cache.open().unwrap();
//!
//! cache.checksum_mut().add_str(Some("build-options"));
//! if !cache.lookup("init").unwrap() {
//!     // build the stage into /build/app, then
//!     cache.commit("Initialized app").unwrap();
//! }
//!
//! cache.ensure_checkout().unwrap();
//! cache.gc().unwrap();
//! ```

mod cache;
mod checksum;
mod config;
mod context;
mod error;
mod hash;
mod object;
mod refs;
mod repo;
mod transaction;

pub mod fs;
pub mod ops;
pub mod types;

pub use cache::{branch_changes, stage_ref_name, StageCache, StageCommit};
pub use checksum::Checksum;
pub use config::{CacheConfig, Config, RepoMode, STORE_VERSION};
pub use context::BuildContext;
pub use error::{Error, Result};
pub use hash::{compute_blob_hash, Hash};
pub use object::{
    blob_exists, blob_path, commit_exists, read_blob, read_commit, read_tree, tree_exists,
    Stored,
};
pub use refs::{delete_ref, list_refs, read_ref, ref_exists, resolve_ref, write_ref};
pub use repo::{Repo, RepoLock};
pub use transaction::Transaction;
pub use types::{Commit, DiffResult, EntryKind, Tree, TreeEntry};

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::config::{Config, STORE_VERSION};
use crate::error::{Error, IoResultExt, Result};

/// a local bare-user object store
pub struct Repo {
    path: PathBuf,
    config: Config,
    fsync: bool,
}

impl Repo {
    /// initialize a new store at the given path
    pub fn init(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        for sub in ["objects/blobs", "objects/trees", "objects/commits", "refs/heads", "tmp"] {
            let dir = path.join(sub);
            fs::create_dir_all(&dir).with_path(&dir)?;
        }

        let config = Config::default();
        config.save(&config_path)?;
        debug!(path = %path.display(), "initialized object store");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            fsync: true,
        })
    }

    /// open an existing store
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;
        if config.version != STORE_VERSION {
            return Err(Error::UnsupportedRepo {
                path: path.to_path_buf(),
                reason: format!("format version {}", config.version),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            config,
            fsync: true,
        })
    }

    /// open the store, creating it (and its parent directories) first if missing
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.join("config.toml").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// skip per-object fsync; transactions then sync what they wrote on commit
    pub fn set_disable_fsync(&mut self, disable: bool) {
        self.fsync = !disable;
    }

    pub fn fsync_enabled(&self) -> bool {
        self.fsync
    }

    pub fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.objects_path().join("blobs")
    }

    pub fn trees_path(&self) -> PathBuf {
        self.objects_path().join("trees")
    }

    pub fn commits_path(&self) -> PathBuf {
        self.objects_path().join("commits")
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs/heads")
    }

    /// scratch space for atomic writes
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.join(".lock")
    }

    /// acquire exclusive lock on the store
    /// returns a guard that releases the lock on drop
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| Error::LockContention)?;

        Ok(RepoLock { _flock: flock })
    }
}

/// guard that holds the store lock until dropped
pub struct RepoLock {
    _flock: Flock<File>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repo_init() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("cache");

        let repo = Repo::init(&repo_path).unwrap();

        assert!(repo_path.join("objects/blobs").is_dir());
        assert!(repo_path.join("objects/trees").is_dir());
        assert!(repo_path.join("objects/commits").is_dir());
        assert!(repo_path.join("refs/heads").is_dir());
        assert!(repo_path.join("tmp").is_dir());
        assert!(repo_path.join("config.toml").is_file());
        assert!(repo.fsync_enabled());
    }

    #[test]
    fn test_repo_init_already_exists() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("cache");

        Repo::init(&repo_path).unwrap();
        assert!(matches!(Repo::init(&repo_path), Err(Error::RepoExists(_))));
    }

    #[test]
    fn test_repo_open_not_found() {
        let dir = tempdir().unwrap();
        let result = Repo::open(&dir.path().join("nonexistent"));
        assert!(matches!(result, Err(Error::NoRepo(_))));
    }

    #[test]
    fn test_open_or_create_nested_path() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("build/.cache/stages");

        let repo = Repo::open_or_create(&repo_path).unwrap();
        assert_eq!(repo.path(), repo_path);

        // second call opens the existing store
        let reopened = Repo::open_or_create(&repo_path).unwrap();
        assert_eq!(reopened.config(), repo.config());
    }

    #[test]
    fn test_open_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("cache");
        Repo::init(&repo_path).unwrap();

        let mut config = Config::load(&repo_path.join("config.toml")).unwrap();
        config.version = 99;
        config.save(&repo_path.join("config.toml")).unwrap();

        assert!(matches!(
            Repo::open(&repo_path),
            Err(Error::UnsupportedRepo { .. })
        ));
    }

    #[test]
    fn test_repo_lock() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("cache")).unwrap();

        let lock = repo.lock().unwrap();
        assert!(matches!(repo.lock(), Err(Error::LockContention)));

        drop(lock);
        assert!(repo.lock().is_ok());
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::BuildContext;
use crate::error::{IoResultExt, Result};

/// current on-disk format of the object store
pub const STORE_VERSION: u32 = 1;

/// object store configuration stored in config.toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub mode: RepoMode,
}

/// how objects are owned on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoMode {
    /// objects belong to the invoking user; real ownership lives in tree entries
    BareUser,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            mode: RepoMode::BareUser,
        }
    }
}

/// build-side settings the cache consults
///
/// ```toml
/// cache_dir = "/var/tmp/build/.cache"
/// overlay_active = true
/// hardlink_checkout = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// object store location
    pub cache_dir: PathBuf,
    /// a copy-on-write overlay protects checkouts, so hardlinks are safe
    #[serde(default)]
    pub overlay_active: bool,
    /// re-checkout the delta commit after each stage commit
    #[serde(default)]
    pub hardlink_checkout: bool,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            overlay_active: false,
            hardlink_checkout: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

impl BuildContext for CacheConfig {
    fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn overlay_active(&self) -> bool {
        self.overlay_active
    }

    fn use_hardlink_checkout(&self) -> bool {
        self.hardlink_checkout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_config_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("bare-user"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_cache_config_defaults() {
        let config: CacheConfig = toml::from_str(r#"cache_dir = "/tmp/cache""#).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert!(!config.overlay_active());
        assert!(!config.use_hardlink_checkout());
    }

    #[test]
    fn test_cache_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.toml");

        let mut config = CacheConfig::new(dir.path().join("cache"));
        config.overlay_active = true;
        config.hardlink_checkout = true;
        config.save(&path).unwrap();

        let loaded = CacheConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.overlay_active());
    }
}

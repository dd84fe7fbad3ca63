use std::fs::{self, File, Permissions};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use nix::unistd::{chown, Gid, Uid};

use crate::error::{Error, IoResultExt, Result};

/// remove whatever is at `path`, if anything (directories recursively)
pub fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).with_path(path),
        Ok(_) => fs::remove_file(path).with_path(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_path(path),
    }
}

/// create a symlink, replacing any existing entry
pub fn create_symlink(path: &Path, target: &str, uid: u32, gid: u32) -> Result<()> {
    remove_existing(path)?;
    symlink(target, path).with_path(path)?;

    // can't set mode on symlinks; ownership only when it differs from ours
    if !is_current_owner(uid, gid) {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid)).with_path(path)?;
    }

    Ok(())
}

/// apply ownership and mode to an existing path
pub fn apply_metadata(path: &Path, uid: u32, gid: u32, mode: u32) -> Result<()> {
    // skip chown when it matches the current user, it would fail unprivileged otherwise
    if !is_current_owner(uid, gid) {
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid))).map_err(|e| {
            Error::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(e),
            }
        })?;
    }

    // mode last (might remove write permission)
    fs::set_permissions(path, Permissions::from_mode(mode & 0o7777)).with_path(path)?;

    Ok(())
}

fn is_current_owner(uid: u32, gid: u32) -> bool {
    uid == nix::unistd::getuid().as_raw() && gid == nix::unistd::getgid().as_raw()
}

/// sync a file to disk
pub fn fsync_file(path: &Path) -> Result<()> {
    let file = File::open(path).with_path(path)?;
    file.sync_all().with_path(path)
}

/// sync a directory to disk
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)
}

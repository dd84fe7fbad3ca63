use std::path::Path;

use nix::sys::stat::lutimes;
use nix::sys::time::TimeVal;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// modification time every cached file carries (seconds since epoch)
pub const SENTINEL_MTIME: i64 = 0;

/// set atime and mtime of a single entry to the sentinel, not following symlinks
pub fn set_sentinel_mtime(path: &Path) -> Result<()> {
    let t = TimeVal::new(SENTINEL_MTIME as _, 0);
    lutimes(path, &t, &t).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: std::io::Error::from(e),
    })
}

/// reset the mtime of `root` and everything below it to the sentinel
///
/// children are visited before their directory so touching them does
/// not bump the directory's mtime afterwards.
pub fn zero_mtime(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::Io {
                path,
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walkdir error")),
            }
        })?;
        set_sentinel_mtime(entry.path())?;
    }
    Ok(())
}

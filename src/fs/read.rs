use std::fs::{self, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};

/// file type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    /// devices, fifos and sockets; never stored in the cache
    Special,
}

impl FileType {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        if ft.is_file() {
            FileType::Regular
        } else if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::Special
        }
    }
}

/// metadata for a filesystem entry
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub file_type: FileType,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub size: u64,
    /// inode number (for the dev/ino cache)
    pub ino: u64,
    pub dev: u64,
    /// number of hard links
    pub nlink: u64,
}

impl FileMetadata {
    /// read metadata from path (does not follow symlinks)
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::symlink_metadata(path).with_path(path)?;
        Ok(Self::from_std_metadata(&meta))
    }

    pub fn from_std_metadata(meta: &Metadata) -> Self {
        Self {
            file_type: FileType::from_metadata(meta),
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            size: meta.len(),
            ino: meta.ino(),
            dev: meta.dev(),
            nlink: meta.nlink(),
        }
    }
}

/// read symlink target; targets that are not utf-8 are rejected
pub fn read_symlink_target(path: &Path) -> Result<String> {
    let target = fs::read_link(path).with_path(path)?;
    target
        .into_os_string()
        .into_string()
        .map_err(|_| Error::InvalidSymlinkTarget(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_file_types() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        let subdir = dir.path().join("subdir");
        let link = dir.path().join("link");
        fs::write(&file, "content").unwrap();
        fs::create_dir(&subdir).unwrap();
        symlink(&file, &link).unwrap();

        assert_eq!(FileMetadata::from_path(&file).unwrap().file_type, FileType::Regular);
        assert_eq!(FileMetadata::from_path(&subdir).unwrap().file_type, FileType::Directory);
        assert_eq!(FileMetadata::from_path(&link).unwrap().file_type, FileType::Symlink);
    }

    #[test]
    fn test_metadata_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let meta = FileMetadata::from_path(&path).unwrap();
        assert_eq!(meta.mode & 0o777, 0o640);
        assert_eq!(meta.size, 7);
    }

    #[test]
    fn test_read_symlink_target() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink("../lib/libfoo.so.1", &link).unwrap();

        assert_eq!(read_symlink_target(&link).unwrap(), "../lib/libfoo.so.1");
    }

    #[test]
    fn test_read_symlink_target_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink(OsStr::from_bytes(b"lib\xff.so"), &link).unwrap();

        assert!(matches!(
            read_symlink_target(&link),
            Err(Error::InvalidSymlinkTarget(p)) if p == link
        ));
    }

    #[test]
    fn test_nlink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();
        assert_eq!(FileMetadata::from_path(&path).unwrap().nlink, 1);

        fs::hard_link(&path, dir.path().join("link")).unwrap();
        let meta = FileMetadata::from_path(&path).unwrap();
        assert_eq!(meta.nlink, 2);
        assert_eq!(meta.ino, fs::symlink_metadata(dir.path().join("link")).unwrap().ino());
    }
}

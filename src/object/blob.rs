use std::fs::{self, File, Permissions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::fs::set_sentinel_mtime;
use crate::hash::{compute_blob_hash, BlobHasher, Hash};
use crate::object::{install, tmp_object_path, Stored};
use crate::repo::Repo;

/// write a blob to the object store
///
/// the hash covers uid, gid, mode and content. the stored file keeps the
/// permission bits of `mode` and the sentinel mtime; ownership lives in
/// the tree entry, so hardlink checkouts share the store's owner.
pub fn write_blob(repo: &Repo, content: &[u8], uid: u32, gid: u32, mode: u32) -> Result<Stored> {
    let hash = compute_blob_hash(uid, gid, mode, content);
    let final_path = blob_path(repo, &hash);

    // deduplication: if blob already exists, we're done
    if final_path.exists() {
        return Ok(Stored::existing(hash));
    }

    let tmp_path = tmp_object_path(repo);
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(content).with_path(&tmp_path)?;
        if repo.fsync_enabled() {
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
    }

    finish_blob(repo, &tmp_path, &final_path, mode)?;

    Ok(Stored {
        hash,
        created: Some(final_path),
    })
}

/// write a blob with streaming content (for large files)
pub fn write_blob_streaming<R: Read>(
    repo: &Repo,
    reader: &mut R,
    uid: u32,
    gid: u32,
    mode: u32,
) -> Result<Stored> {
    // for streaming, we need to write to temp first, then compute hash
    let tmp_path = tmp_object_path(repo);

    let mut hasher = BlobHasher::new(uid, gid, mode);
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).with_path(&tmp_path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp_file.write_all(&buf[..n]).with_path(&tmp_path)?;
        }
        if repo.fsync_enabled() {
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
    }

    let hash = hasher.finalize();
    let final_path = blob_path(repo, &hash);

    // dedup check
    if final_path.exists() {
        fs::remove_file(&tmp_path).with_path(&tmp_path)?;
        return Ok(Stored::existing(hash));
    }

    finish_blob(repo, &tmp_path, &final_path, mode)?;

    Ok(Stored {
        hash,
        created: Some(final_path),
    })
}

/// compute the blob hash of a file on disk without storing it
pub fn hash_file(path: &Path, uid: u32, gid: u32, mode: u32) -> Result<Hash> {
    let mut file = File::open(path).with_path(path)?;
    let mut hasher = BlobHasher::new(uid, gid, mode);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).with_path(path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn finish_blob(repo: &Repo, tmp_path: &Path, final_path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(tmp_path, Permissions::from_mode(mode & 0o7777)).with_path(tmp_path)?;
    set_sentinel_mtime(tmp_path)?;
    install(repo, tmp_path, final_path)
}

/// get the filesystem path to a blob
pub fn blob_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.blobs_path().join(dir).join(file)
}

/// check if a blob exists in the object store
pub fn blob_exists(repo: &Repo, hash: &Hash) -> bool {
    blob_path(repo, hash).exists()
}

/// read blob content
pub fn read_blob(repo: &Repo, hash: &Hash) -> Result<Vec<u8>> {
    let path = blob_path(repo, hash);
    fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io { path, source: e }
        }
    })
}

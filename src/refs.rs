use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// write a ref (create or update)
///
/// ref_name can contain slashes for hierarchical refs like "app-branch/stage-name"
pub fn write_ref(repo: &Repo, ref_name: &str, hash: &Hash) -> Result<()> {
    validate_ref_name(ref_name)?;

    let ref_path = ref_path(repo, ref_name);

    // ensure parent directories exist
    if let Some(parent) = ref_path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    // atomic write: temp -> fsync -> rename
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        writeln!(tmp_file, "{}", hash.to_hex()).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, &ref_path).with_path(&ref_path)?;

    if let Some(parent) = ref_path.parent() {
        let dir = File::open(parent).with_path(parent)?;
        dir.sync_all().with_path(parent)?;
    }

    Ok(())
}

/// read a ref
pub fn read_ref(repo: &Repo, ref_name: &str) -> Result<Hash> {
    let ref_path = ref_path(repo, ref_name);

    // a directory at the ref path means only deeper refs exist
    if ref_path.is_dir() {
        return Err(Error::RefNotFound(ref_name.to_string()));
    }

    let content = fs::read_to_string(&ref_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(ref_name.to_string())
        } else {
            Error::Io {
                path: ref_path.clone(),
                source: e,
            }
        }
    })?;

    Hash::from_hex(content.trim())
}

/// resolve a ref to the commit it points at, None if it does not exist
pub fn resolve_ref(repo: &Repo, ref_name: &str) -> Result<Option<Hash>> {
    match read_ref(repo, ref_name) {
        Ok(hash) => Ok(Some(hash)),
        Err(Error::RefNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// delete a ref
pub fn delete_ref(repo: &Repo, ref_name: &str) -> Result<()> {
    let ref_path = ref_path(repo, ref_name);

    fs::remove_file(&ref_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(ref_name.to_string())
        } else {
            Error::Io {
                path: ref_path,
                source: e,
            }
        }
    })
}

/// list refs, optionally only those below `prefix`
///
/// with a prefix, returned names are relative to it: refs "app/a" and
/// "app/b" listed under "app" come back as "a" and "b". a ref named
/// exactly like the prefix is not below it and is not returned.
pub fn list_refs(repo: &Repo, prefix: Option<&str>) -> Result<Vec<String>> {
    let base = match prefix {
        Some(p) => repo.refs_path().join(p.trim_end_matches('/')),
        None => repo.refs_path(),
    };
    let mut refs = Vec::new();

    if base.is_dir() {
        collect_refs(&base, &base, &mut refs)?;
    }

    refs.sort();
    Ok(refs)
}

/// check if a ref exists
pub fn ref_exists(repo: &Repo, ref_name: &str) -> bool {
    ref_path(repo, ref_name).is_file()
}

/// get filesystem path for a ref
fn ref_path(repo: &Repo, ref_name: &str) -> PathBuf {
    repo.refs_path().join(ref_name)
}

/// recursively collect refs from directory
fn collect_refs(base: &Path, dir: &Path, refs: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();

        if path.is_dir() {
            collect_refs(base, &path, refs)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(base) {
                refs.push(rel.to_string_lossy().to_string());
            }
        }
    }
    Ok(())
}

/// validate ref name
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("empty ref name".to_string()));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot start or end with '/': {}",
            name
        )));
    }

    if name.contains("//") {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain '//': {}",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain null byte: {}",
            name
        )));
    }

    // check for path traversal
    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRef(format!(
                "ref name cannot contain '.' or '..': {}",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    fn hash(c: char) -> Hash {
        Hash::from_hex(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn test_write_and_read_ref() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "app/build-init", &hash('a')).unwrap();
        assert_eq!(read_ref(&repo, "app/build-init").unwrap(), hash('a'));
    }

    #[test]
    fn test_overwrite_ref() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "myref", &hash('1')).unwrap();
        write_ref(&repo, "myref", &hash('2')).unwrap();

        assert_eq!(read_ref(&repo, "myref").unwrap(), hash('2'));
    }

    #[test]
    fn test_delete_ref() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "test/ref", &Hash::ZERO).unwrap();
        assert!(ref_exists(&repo, "test/ref"));

        delete_ref(&repo, "test/ref").unwrap();
        assert!(!ref_exists(&repo, "test/ref"));
        assert!(matches!(
            delete_ref(&repo, "test/ref"),
            Err(Error::RefNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_missing_ref() {
        let (_dir, repo) = test_repo();

        assert_eq!(resolve_ref(&repo, "nonexistent").unwrap(), None);
        assert!(matches!(
            read_ref(&repo, "nonexistent"),
            Err(Error::RefNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_directory_is_missing() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "app/stage", &Hash::ZERO).unwrap();
        assert_eq!(resolve_ref(&repo, "app").unwrap(), None);
        assert!(!ref_exists(&repo, "app"));
    }

    #[test]
    fn test_list_refs() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "a/b/c", &Hash::ZERO).unwrap();
        write_ref(&repo, "x/y", &Hash::ZERO).unwrap();
        write_ref(&repo, "single", &Hash::ZERO).unwrap();

        assert_eq!(list_refs(&repo, None).unwrap(), vec!["a/b/c", "single", "x/y"]);
    }

    #[test]
    fn test_list_refs_with_prefix() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "app/init", &Hash::ZERO).unwrap();
        write_ref(&repo, "app/build-foo", &Hash::ZERO).unwrap();
        write_ref(&repo, "other/init", &Hash::ZERO).unwrap();

        assert_eq!(
            list_refs(&repo, Some("app")).unwrap(),
            vec!["build-foo", "init"]
        );
        assert_eq!(list_refs(&repo, Some("app/")).unwrap().len(), 2);
        assert!(list_refs(&repo, Some("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_list_prefix_that_is_a_ref() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "app", &Hash::ZERO).unwrap();
        assert!(list_refs(&repo, Some("app")).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_ref_names() {
        assert!(validate_ref_name("").is_err());
        assert!(validate_ref_name("/start").is_err());
        assert!(validate_ref_name("end/").is_err());
        assert!(validate_ref_name("double//slash").is_err());
        assert!(validate_ref_name("with/./dot").is_err());
        assert!(validate_ref_name("with/../dotdot").is_err());
        assert!(validate_ref_name("with\0null").is_err());

        assert!(validate_ref_name("simple").is_ok());
        assert!(validate_ref_name("app/build-%2f").is_ok());
    }
}

//! Remote file storage abstraction and its local-directory implementation.
//!
//! Paths are absolute, `/`-separated storage paths such as
//! `/Applications/blueprint/config.yml`, independent of the host OS.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::core::location::parent_of;
use crate::error::{Error, Result};

/// One child of a listed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
}

/// Remote filesystem used by installations.
///
/// Missing files and folders are reported as [`Error::NotFound`], which is
/// the only failure callers recover from.
pub trait Storage: Send + Sync {
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Fails with [`Error::NotFound`] when the parent folder is missing.
    fn write(&self, path: &str, bytes: &[u8], overwrite: bool) -> Result<()>;

    /// Creates `path` and all missing ancestors.
    fn mkdirs(&self, path: &str) -> Result<()>;

    fn list(&self, path: &str) -> Result<Vec<Entry>>;

    /// Deletes a file or folder. A non-empty folder needs `recursive`.
    fn delete(&self, path: &str, recursive: bool) -> Result<()>;

    /// Identity of the caller, used to resolve per-user installations.
    fn current_identity(&self) -> Result<String>;
}

/// Storage backed by a directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    identity: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, identity: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            identity: identity.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::IllegalState(format!("unsupported storage path {path:?}")));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found(path: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |err| {
        if err.kind() == ErrorKind::NotFound {
            Error::NotFound(path.to_string())
        } else {
            Error::Io(err)
        }
    }
}

impl Storage for LocalStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let local = self.resolve(path)?;
        if local.is_dir() {
            return Err(Error::IllegalState(format!("{path} is a folder")));
        }
        fs::read(&local).map_err(not_found(path))
    }

    fn write(&self, path: &str, bytes: &[u8], overwrite: bool) -> Result<()> {
        let local = self.resolve(path)?;
        let parent = parent_of(path);
        if !self.resolve(parent)?.is_dir() {
            return Err(Error::NotFound(parent.to_string()));
        }
        if !overwrite && local.exists() {
            return Err(Error::IllegalState(format!("{path} already exists")));
        }
        debug!(path, bytes = bytes.len(), "write");
        fs::write(&local, bytes)?;
        Ok(())
    }

    fn mkdirs(&self, path: &str) -> Result<()> {
        debug!(path, "mkdirs");
        fs::create_dir_all(self.resolve(path)?)?;
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<Entry>> {
        let local = self.resolve(path)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&local).map_err(not_found(path))? {
            let entry = entry?;
            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let local = self.resolve(path)?;
        if local == self.root {
            return Err(Error::IllegalState("refusing to delete the storage root".to_string()));
        }
        let metadata = fs::symlink_metadata(&local).map_err(not_found(path))?;
        debug!(path, recursive, "delete");
        if !metadata.is_dir() {
            fs::remove_file(&local)?;
        } else if recursive {
            fs::remove_dir_all(&local)?;
        } else if fs::read_dir(&local)?.next().is_some() {
            return Err(Error::IllegalState(format!("{path} is not empty")));
        } else {
            fs::remove_dir(&local)?;
        }
        Ok(())
    }

    fn current_identity(&self) -> Result<String> {
        Ok(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, LocalStorage) {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = LocalStorage::new(temp.path(), "me@example.com");
        (temp, storage)
    }

    #[test]
    fn write_requires_existing_parent() {
        let (_temp, storage) = storage();
        let err = storage
            .write("/Applications/bp/config.yml", b"x", true)
            .expect_err("missing parent");
        assert!(err.is_not_found(), "{err}");
        storage.mkdirs("/Applications/bp").expect("mkdirs");
        storage
            .write("/Applications/bp/config.yml", b"x", true)
            .expect("write");
        assert_eq!(storage.read("/Applications/bp/config.yml").expect("read"), b"x");
    }

    #[test]
    fn write_without_overwrite_keeps_existing() {
        let (_temp, storage) = storage();
        storage.mkdirs("/a").expect("mkdirs");
        storage.write("/a/f.json", b"1", false).expect("first");
        assert!(storage.write("/a/f.json", b"2", false).is_err());
        assert_eq!(storage.read("/a/f.json").expect("read"), b"1");
    }

    #[test]
    fn list_reports_kinds_sorted_by_name() {
        let (_temp, storage) = storage();
        storage.mkdirs("/Users/b/.bp").expect("mkdirs");
        storage.mkdirs("/Users/a").expect("mkdirs");
        storage.write("/Users/c.txt", b"", true).expect("write");
        let entries = storage.list("/Users").expect("list");
        let names: Vec<(&str, bool)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.is_directory))
            .collect();
        assert_eq!(names, vec![("a", true), ("b", true), ("c.txt", false)]);
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (_temp, storage) = storage();
        assert!(storage.read("/nope.json").expect_err("read").is_not_found());
        assert!(storage.list("/Users").expect_err("list").is_not_found());
    }

    #[test]
    fn delete_needs_recursive_for_non_empty_folders() {
        let (_temp, storage) = storage();
        storage.mkdirs("/Applications/bp/wheels").expect("mkdirs");
        storage
            .write("/Applications/bp/wheels/bp.whl", b"w", true)
            .expect("write");
        let err = storage.delete("/Applications/bp", false).expect_err("not empty");
        assert!(matches!(err, Error::IllegalState(_)), "{err}");
        storage.delete("/Applications/bp/wheels/bp.whl", false).expect("file");
        storage.delete("/Applications/bp", true).expect("recursive");
        assert!(storage.list("/Applications").expect("list").is_empty());
        assert!(storage.delete("/Applications/bp", true).expect_err("gone").is_not_found());
        assert!(storage.delete("/", true).is_err());
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let (_temp, storage) = storage();
        let err = storage.read("/Users/../../etc/passwd").expect_err("traversal");
        assert!(matches!(err, Error::IllegalState(_)), "{err}");
    }
}

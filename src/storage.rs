//! Persisted last-known version
//!
//! One string per client: the version it last acknowledged. Absent means the
//! client has never established a baseline.

use crate::errors::{UpdateError, UpdateResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait VersionStore: Send + Sync {
    fn load(&self) -> UpdateResult<Option<String>>;

    fn save(&self, version: &str) -> UpdateResult<()>;

    fn clear(&self) -> UpdateResult<()>;
}

impl<T: VersionStore + ?Sized> VersionStore for Arc<T> {
    fn load(&self) -> UpdateResult<Option<String>> {
        (**self).load()
    }

    fn save(&self, version: &str) -> UpdateResult<()> {
        (**self).save(version)
    }

    fn clear(&self) -> UpdateResult<()> {
        (**self).clear()
    }
}

/// Stores the version as a single line in a file.
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    path: PathBuf,
}

impl FileVersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VersionStore for FileVersionStore {
    fn load(&self) -> UpdateResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            // only the newline written by `save` is stripped; identifiers are opaque
            Ok(content) => Ok(Some(
                content.strip_suffix('\n').unwrap_or(&content).to_string(),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(UpdateError::io(format!("reading {}", self.path.display()), e)),
        }
    }

    fn save(&self, version: &str) -> UpdateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| UpdateError::io(format!("creating {}", parent.display()), e))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, format!("{version}\n"))
            .map_err(|e| UpdateError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| UpdateError::io(format!("replacing {}", self.path.display()), e))
    }

    fn clear(&self) -> UpdateResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UpdateError::io(format!("removing {}", self.path.display()), e)),
        }
    }
}

/// In-process store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    value: Mutex<Option<String>>,
    unavailable: bool,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(version: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(version.into())),
            unavailable: false,
        }
    }

    /// A store whose every operation fails, like blocked browser storage.
    pub fn unavailable() -> Self {
        Self {
            value: Mutex::new(None),
            unavailable: true,
        }
    }

    fn slot(&self) -> UpdateResult<std::sync::MutexGuard<'_, Option<String>>> {
        if self.unavailable {
            return Err(UpdateError::storage("memory store disabled"));
        }
        self.value
            .lock()
            .map_err(|_| UpdateError::internal("memory store lock poisoned"))
    }
}

impl VersionStore for MemoryVersionStore {
    fn load(&self) -> UpdateResult<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, version: &str) -> UpdateResult<()> {
        *self.slot()? = Some(version.to_string());
        Ok(())
    }

    fn clear(&self) -> UpdateResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let store = FileVersionStore::new(dir.path().join("nested").join("last_known_version"));

        assert_eq!(store.load().unwrap(), None);

        store.save("build-1000").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("build-1000"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn file_store_keeps_surrounding_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVersionStore::new(dir.path().join("state"));

        for version in [" build-1 ", "build-1\t", "", "  "] {
            store.save(version).unwrap();
            assert_eq!(store.load().unwrap().as_deref(), Some(version));
        }
    }

    #[test]
    fn only_a_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let store = FileVersionStore::new(&path);
        assert_eq!(store.load().unwrap(), None);

        fs::write(&path, "").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn unavailable_memory_store_errors() {
        let store = MemoryVersionStore::unavailable();
        assert!(store.load().is_err());
        assert!(store.save("x").is_err());
        assert!(store.clear().is_err());
    }
}

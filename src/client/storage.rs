//! Storage tiers for the mirror cache.
//!
//! A [`StorageArea`] is a flat string → string map, the same shape as a
//! browser's `localStorage`. Two implementations ship: an in-memory session
//! tier and a durable tier persisted to a JSON file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::cache::mutex_lock;

const SOURCE: &str = "client::storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file `{path}` is not a JSON object: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait StorageArea: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Session tier: lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(mutex_lock(&self.items, SOURCE, "get_item").get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        mutex_lock(&self.items, SOURCE, "set_item").insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        mutex_lock(&self.items, SOURCE, "remove_item").remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(mutex_lock(&self.items, SOURCE, "keys")
            .keys()
            .cloned()
            .collect())
    }
}

/// Durable tier: the whole map is rewritten to `path` on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Format {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        let encoded = serde_json::to_vec_pretty(items).map_err(|source| StorageError::Format {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, encoded).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl StorageArea for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(mutex_lock(&self.items, SOURCE, "get_item").get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = mutex_lock(&self.items, SOURCE, "set_item");
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = mutex_lock(&self.items, SOURCE, "remove_item");
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(mutex_lock(&self.items, SOURCE, "keys")
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1").expect("set");
        assert_eq!(storage.get_item("a").expect("get"), Some("1".to_string()));
        assert_eq!(storage.keys().expect("keys"), vec!["a".to_string()]);

        storage.remove_item("a").expect("remove");
        assert_eq!(storage.get_item("a").expect("get"), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mirror").join("cache.json");

        let storage = FileStorage::open(&path).expect("open");
        storage.set_item("site:footer", "{}").expect("set");
        drop(storage);

        let reopened = FileStorage::open(&path).expect("reopen");
        assert_eq!(
            reopened.get_item("site:footer").expect("get"),
            Some("{}".to_string())
        );
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").expect("write");

        let err = FileStorage::open(&path).expect_err("corrupt file");
        assert!(matches!(err, StorageError::Format { .. }));
    }
}

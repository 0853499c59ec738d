//! Storage backends.
//!
//! `StorageBackend` is the seam between the cache manager and whatever holds
//! the entries. `MemoryStore` is the process-local implementation: one
//! LRU-bounded map plus its tag index, guarded by a single lock so every
//! operation is atomic with respect to the index.

use std::sync::RwLock;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::keys::{CacheKey, Tag};
use super::lock::{rw_read, rw_write};
use super::tags::TagIndex;

const SOURCE: &str = "cache::store";
const METRIC_STORE_EVICT: &str = "sitecache_store_evict_total";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry could not be encoded: {0}")]
    Encoding(String),
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Observability snapshot. Sizes are approximate and never enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub approximate_size_bytes: usize,
    pub capacity: usize,
}

/// Key → entry store with tag-based bulk deletion.
///
/// Implementations must be safe to share between request handlers. A missing
/// key is `Ok(None)`, never an error.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, BackendError>;

    /// Store an entry, replacing any previous entry for the same key.
    async fn set(&self, entry: CacheEntry) -> Result<(), BackendError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &CacheKey) -> Result<bool, BackendError>;

    /// Remove every entry carrying `tag`; returns how many were removed.
    async fn delete_by_tag(&self, tag: &Tag) -> Result<usize, BackendError>;

    async fn clear(&self) -> Result<usize, BackendError>;

    async fn stats(&self) -> Result<StoreStats, BackendError>;
}

struct MemoryInner {
    entries: LruCache<CacheKey, CacheEntry>,
    tags: TagIndex,
    bytes: usize,
}

impl MemoryInner {
    fn forget(&mut self, key: &CacheKey, entry: &CacheEntry) {
        self.bytes = self.bytes.saturating_sub(entry.size_bytes());
        self.tags.unregister(key);
    }
}

/// In-process store bounded by `max_entries` with LRU eviction.
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                entries: LruCache::new(config.max_entries_non_zero()),
                tags: TagIndex::new(),
                bytes: 0,
            }),
        }
    }

    /// Keys currently carrying `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> Vec<CacheKey> {
        let mut keys: Vec<_> = rw_read(&self.inner, SOURCE, "keys_for_tag")
            .tags
            .keys_for_tag(tag)
            .into_iter()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, BackendError> {
        // LRU promotion needs the write side.
        Ok(rw_write(&self.inner, SOURCE, "get")
            .entries
            .get(key)
            .cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), BackendError> {
        let mut guard = rw_write(&self.inner, SOURCE, "set");
        let inner = &mut *guard;

        let key = entry.key.clone();
        let size = entry.size_bytes();
        inner.tags.register(&key, &entry.tags);

        if let Some((displaced_key, displaced)) = inner.entries.push(key.clone(), entry) {
            if displaced_key == key {
                inner.bytes = inner.bytes.saturating_sub(displaced.size_bytes());
            } else {
                inner.forget(&displaced_key, &displaced);
                counter!(METRIC_STORE_EVICT).increment(1);
                debug!(evicted = %displaced_key, "Evicted least recently used entry");
            }
        }
        inner.bytes += size;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, BackendError> {
        let mut inner = rw_write(&self.inner, SOURCE, "delete");
        match inner.entries.pop(key) {
            Some(entry) => {
                inner.forget(key, &entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_tag(&self, tag: &Tag) -> Result<usize, BackendError> {
        let mut guard = rw_write(&self.inner, SOURCE, "delete_by_tag");
        let inner = &mut *guard;

        let keys = inner.tags.take_tag(tag);
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.entries.pop(&key) {
                inner.bytes = inner.bytes.saturating_sub(entry.size_bytes());
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, BackendError> {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.tags.clear();
        inner.bytes = 0;
        Ok(removed)
    }

    async fn stats(&self) -> Result<StoreStats, BackendError> {
        let inner = rw_read(&self.inner, SOURCE, "stats");
        Ok(StoreStats {
            count: inner.entries.len(),
            approximate_size_bytes: inner.bytes,
            capacity: inner.entries.cap().get(),
        })
    }
}

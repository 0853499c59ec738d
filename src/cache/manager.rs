//! Cache manager: read path, stale-while-revalidate and invalidation.
//!
//! The manager is the only component that creates or refreshes entries. It
//! degrades every backend failure to "nothing cached" so that a broken cache
//! can never turn a working origin into an error.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::hash::{BuildHasher, RandomState};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use super::clock::Clock;
use super::config::CacheConfig;
use super::entry::{CacheEntry, Freshness};
use super::inflight::{InFlightRefreshes, RefreshGuard};
use super::keys::{CacheKey, Tag};
use super::store::{StorageBackend, StoreStats};

const METRIC_LOOKUP: &str = "sitecache_lookup_total";
const METRIC_REFRESH: &str = "sitecache_refresh_total";
const METRIC_REFRESH_MS: &str = "sitecache_refresh_ms";
const METRIC_BACKEND_ERROR: &str = "sitecache_backend_error_total";
const METRIC_INVALIDATED: &str = "sitecache_invalidated_total";
const METRIC_STORE_ENTRIES: &str = "sitecache_store_entries";

const KEY_GENERATION_SLOTS: usize = 256;

/// How a read was answered. Rendered as the `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    /// Served past its TTL while a refresh runs in the background.
    Stale,
    Miss,
    /// Caching was skipped entirely (zero TTL or cache disabled).
    Bypass,
}

impl CacheStatus {
    pub fn as_header(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }

    /// True when the payload came out of the cache.
    pub fn is_hit(self) -> bool {
        matches!(self, CacheStatus::Hit | CacheStatus::Stale)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_header())
    }
}

/// Raw lookup result before any stale-while-revalidate decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Fresh(CacheEntry),
    Stale(CacheEntry),
    Miss,
}

/// Value handed back to a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub value: Bytes,
    pub status: CacheStatus,
    pub stored_at: OffsetDateTime,
    pub ttl_seconds: u64,
}

impl CachedValue {
    fn from_entry(entry: CacheEntry, status: CacheStatus) -> Self {
        Self {
            value: entry.value,
            status,
            stored_at: entry.stored_at,
            ttl_seconds: entry.ttl_seconds,
        }
    }
}

/// Write options: TTL plus the tags used for bulk invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub ttl_seconds: u64,
    pub tags: BTreeSet<Tag>,
}

impl SetOptions {
    pub fn ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            tags: BTreeSet::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub in_flight_refreshes: usize,
}

/// Snapshot of the invalidation counters covering one key, taken before an
/// origin fetch.
///
/// A fill started before an invalidation that could cover its key must not
/// write its result after it. Invalidating a key only moves the counter slot
/// that key hashes to, so fills of unrelated keys survive it (barring a slot
/// collision). Tag invalidations and clears move the shared counter, which
/// every snapshot includes, because the tags a fill will carry are not known
/// when the snapshot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    shared: u64,
    key: u64,
}

struct Generations {
    shared: AtomicU64,
    slots: Box<[AtomicU64]>,
    hasher: RandomState,
}

impl Generations {
    fn new() -> Self {
        Self {
            shared: AtomicU64::new(0),
            slots: (0..KEY_GENERATION_SLOTS).map(|_| AtomicU64::new(0)).collect(),
            hasher: RandomState::new(),
        }
    }

    fn slot(&self, key: &CacheKey) -> &AtomicU64 {
        let index = self.hasher.hash_one(key) as usize % self.slots.len();
        &self.slots[index]
    }

    fn snapshot(&self, key: &CacheKey) -> Generation {
        Generation {
            shared: self.shared.load(Ordering::SeqCst),
            key: self.slot(key).load(Ordering::SeqCst),
        }
    }

    fn bump_key(&self, key: &CacheKey) {
        self.slot(key).fetch_add(1, Ordering::SeqCst);
    }

    fn bump_all(&self) {
        self.shared.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    inflight: InFlightRefreshes,
    generations: Arc<Generations>,
}

impl CacheManager {
    pub fn new(
        config: CacheConfig,
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            backend,
            clock,
            inflight: InFlightRefreshes::new(),
            generations: Arc::new(Generations::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Look up `key` and classify it. Entries past the stale window (or past
    /// their TTL when stale-while-revalidate is off) are deleted here.
    pub async fn lookup(&self, key: &CacheKey) -> Lookup {
        if !self.config.enabled {
            return Lookup::Miss;
        }

        let entry = match self.backend.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Lookup::Miss,
            Err(err) => {
                counter!(METRIC_BACKEND_ERROR, "op" => "get").increment(1);
                warn!(key = %key, error = %err, "Cache backend read failed; treating as miss");
                return Lookup::Miss;
            }
        };

        let window = if self.config.stale_while_revalidate {
            self.config.stale_window()
        } else {
            Duration::ZERO
        };

        match entry.freshness(self.clock.now(), window) {
            Freshness::Fresh => Lookup::Fresh(entry),
            Freshness::Stale => Lookup::Stale(entry),
            Freshness::Expired => {
                if let Err(err) = self.backend.delete(key).await {
                    counter!(METRIC_BACKEND_ERROR, "op" => "delete").increment(1);
                    warn!(key = %key, error = %err, "Failed to drop expired entry");
                }
                debug!(key = %key, "Dropped expired entry");
                Lookup::Miss
            }
        }
    }

    /// Read path with stale-while-revalidate.
    ///
    /// Returns `None` on a miss; the caller fetches from the origin and calls
    /// [`CacheManager::fill`]. A stale entry is returned immediately and
    /// `refresh` is spawned in the background, at most once per key at a time.
    #[instrument(skip(self, refresh), fields(key = %key))]
    pub async fn get<F, Fut, E>(&self, key: &CacheKey, refresh: F) -> Option<CachedValue>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        match self.lookup(key).await {
            Lookup::Fresh(entry) => {
                counter!(METRIC_LOOKUP, "outcome" => "hit").increment(1);
                Some(CachedValue::from_entry(entry, CacheStatus::Hit))
            }
            Lookup::Stale(entry) => {
                counter!(METRIC_LOOKUP, "outcome" => "stale").increment(1);
                self.spawn_refresh(&entry, refresh);
                Some(CachedValue::from_entry(entry, CacheStatus::Stale))
            }
            Lookup::Miss => {
                counter!(METRIC_LOOKUP, "outcome" => "miss").increment(1);
                None
            }
        }
    }

    /// Fresh-only read; never triggers a refresh.
    pub async fn get_fresh(&self, key: &CacheKey) -> Option<CachedValue> {
        match self.lookup(key).await {
            Lookup::Fresh(entry) => Some(CachedValue::from_entry(entry, CacheStatus::Hit)),
            Lookup::Stale(_) | Lookup::Miss => None,
        }
    }

    pub async fn set(&self, key: CacheKey, value: Bytes, options: SetOptions) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(
            key,
            value,
            self.clock.now(),
            options.ttl_seconds,
            options.tags,
        );
        write_entry(self.backend.as_ref(), entry).await;
    }

    /// Serialize `value` as JSON and store it. Encoding failures are logged
    /// and nothing is stored.
    pub async fn set_json<T: Serialize>(&self, key: CacheKey, value: &T, options: SetOptions) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, Bytes::from(bytes), options).await,
            Err(err) => warn!(key = %key, error = %err, "Could not encode cache value"),
        }
    }

    /// Current invalidation generation for `key`. Take it before an origin
    /// fetch and pass it to [`CacheManager::fill`] with the same key.
    pub fn generation(&self, key: &CacheKey) -> Generation {
        self.generations.snapshot(key)
    }

    /// Store the result of an origin fetch unless an invalidation covering
    /// `key` happened since `since` was taken. Returns whether the value was
    /// stored.
    pub async fn fill(
        &self,
        since: Generation,
        key: CacheKey,
        value: Bytes,
        options: SetOptions,
    ) -> bool {
        if self.generation(&key) != since {
            debug!(key = %key, "Skipping fill that raced an invalidation");
            return false;
        }
        self.set(key, value, options).await;
        self.config.enabled
    }

    /// Remove one key. Returns whether an entry was present.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.generations.bump_key(key);
        match self.backend.delete(key).await {
            Ok(removed) => {
                if removed {
                    counter!(METRIC_INVALIDATED, "by" => "key").increment(1);
                }
                removed
            }
            Err(err) => {
                counter!(METRIC_BACKEND_ERROR, "op" => "delete").increment(1);
                warn!(key = %key, error = %err, "Cache invalidation by key failed");
                false
            }
        }
    }

    /// Remove every entry tagged `tag`. Returns how many were removed.
    pub async fn invalidate_by_tag(&self, tag: &Tag) -> usize {
        self.generations.bump_all();
        match self.backend.delete_by_tag(tag).await {
            Ok(removed) => {
                counter!(METRIC_INVALIDATED, "by" => "tag").increment(removed as u64);
                removed
            }
            Err(err) => {
                counter!(METRIC_BACKEND_ERROR, "op" => "delete_by_tag").increment(1);
                warn!(tag = %tag, error = %err, "Cache invalidation by tag failed");
                0
            }
        }
    }

    pub async fn clear(&self) -> usize {
        self.generations.bump_all();
        match self.backend.clear().await {
            Ok(removed) => {
                info!(removed, "Cache cleared");
                removed
            }
            Err(err) => {
                counter!(METRIC_BACKEND_ERROR, "op" => "clear").increment(1);
                warn!(error = %err, "Cache clear failed");
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let store = match self.backend.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                counter!(METRIC_BACKEND_ERROR, "op" => "stats").increment(1);
                warn!(error = %err, "Cache stats unavailable");
                StoreStats::default()
            }
        };
        gauge!(METRIC_STORE_ENTRIES).set(store.count as f64);
        CacheStats {
            store,
            in_flight_refreshes: self.inflight.len(),
        }
    }

    /// Whether a background refresh is currently running for `key`.
    pub fn is_refreshing(&self, key: &CacheKey) -> bool {
        self.inflight.contains(key)
    }

    fn spawn_refresh<F, Fut, E>(&self, stale: &CacheEntry, refresh: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let Some(guard) = self.inflight.try_acquire(&stale.key) else {
            debug!(key = %stale.key, "Refresh already in flight");
            return;
        };

        let task = RefreshTask {
            guard,
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            generations: Arc::clone(&self.generations),
            started_generation: self.generation(&stale.key),
            timeout: self.config.refresh_timeout(),
            ttl_seconds: stale.ttl_seconds,
            tags: stale.tags.clone(),
        };
        tokio::spawn(task.run(refresh));
    }
}

/// Everything a detached refresh needs. Owning the guard ties the in-flight
/// marker to the task's lifetime.
struct RefreshTask {
    guard: RefreshGuard,
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    generations: Arc<Generations>,
    started_generation: Generation,
    timeout: Duration,
    ttl_seconds: u64,
    tags: BTreeSet<Tag>,
}

impl RefreshTask {
    async fn run<F, Fut, E>(self, refresh: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let started_at = Instant::now();
        let key = self.guard.key().clone();

        let outcome = match tokio::time::timeout(self.timeout, refresh()).await {
            Ok(Ok(value)) => {
                if self.generations.snapshot(&key) != self.started_generation {
                    debug!(key = %key, "Discarding refresh that raced an invalidation");
                    "discarded"
                } else {
                    let entry = CacheEntry::new(
                        key.clone(),
                        value,
                        self.clock.now(),
                        self.ttl_seconds,
                        self.tags,
                    );
                    if write_entry(self.backend.as_ref(), entry).await {
                        debug!(key = %key, "Background refresh stored");
                        "ok"
                    } else {
                        "failed"
                    }
                }
            }
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "Background refresh failed; keeping stale entry");
                "failed"
            }
            Err(_) => {
                warn!(
                    key = %key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Background refresh timed out; keeping stale entry"
                );
                "timeout"
            }
        };

        counter!(METRIC_REFRESH, "outcome" => outcome).increment(1);
        histogram!(METRIC_REFRESH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        drop(self.guard);
    }
}

async fn write_entry(backend: &dyn StorageBackend, entry: CacheEntry) -> bool {
    let key = entry.key.clone();
    match backend.set(entry).await {
        Ok(()) => true,
        Err(err) => {
            counter!(METRIC_BACKEND_ERROR, "op" => "set").increment(1);
            warn!(key = %key, error = %err, "Cache backend write failed; value not cached");
            false
        }
    }
}

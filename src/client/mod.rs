//! Client-side mirror cache.
//!
//! Independent TTL cache for consumers of the sitecache API, modelled on a
//! browser's `localStorage`/`sessionStorage` pair. It never talks to the
//! server cache: invalidations reach it only through its own TTLs or explicit
//! calls. Every failure degrades to a miss or a no-op.

mod pattern;
mod storage;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{Clock, SystemClock};

pub use pattern::glob_to_regex;
pub use storage::{FileStorage, MemoryStorage, StorageArea, StorageError};

/// Which storage area an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Survives restarts.
    Durable,
    /// Cleared with the process.
    Session,
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Tier::Durable => "durable",
            Tier::Session => "session",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry<T> {
    value: T,
    /// Unix milliseconds.
    stored_at: i64,
    ttl_seconds: u64,
}

impl<T> StoredEntry<T> {
    fn is_fresh(&self, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(self.ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        now_ms < self.stored_at.saturating_add(ttl_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub count: usize,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    pub durable: TierStats,
    pub session: TierStats,
}

pub struct MirrorCache {
    namespace: String,
    clock: Arc<dyn Clock>,
    durable: Option<Box<dyn StorageArea>>,
    session: Option<Box<dyn StorageArea>>,
}

impl MirrorCache {
    /// A cache with no tiers attached. Add them with
    /// [`MirrorCache::with_durable`] and [`MirrorCache::with_session`].
    pub fn new(namespace: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            namespace: namespace.into(),
            clock,
            durable: None,
            session: None,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new("disabled", Arc::new(SystemClock))
    }

    pub fn with_durable(mut self, storage: impl StorageArea + 'static) -> Self {
        self.durable = Some(Box::new(storage));
        self
    }

    pub fn with_session(mut self, storage: impl StorageArea + 'static) -> Self {
        self.session = Some(Box::new(storage));
        self
    }

    /// Read `key`, checking the session tier before the durable one. Expired
    /// or unreadable entries are removed and reported absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        [Tier::Session, Tier::Durable]
            .into_iter()
            .find_map(|tier| self.get_from(tier, key))
    }

    /// Store in the durable tier.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        self.set_in(Tier::Durable, key, value, ttl_seconds);
    }

    pub fn set_in<T: Serialize>(&self, tier: Tier, key: &str, value: &T, ttl_seconds: u64) {
        let Some(storage) = self.area(tier) else {
            return;
        };

        let entry = StoredEntry {
            value,
            stored_at: self.now_ms(),
            ttl_seconds,
        };
        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "Mirror cache could not encode value");
                return;
            }
        };

        if let Err(err) = storage.set_item(&self.namespaced(key), &encoded) {
            warn!(key, tier = tier.as_str(), error = %err, "Mirror cache write failed");
        }
    }

    /// Remove `key` from both tiers.
    pub fn invalidate(&self, key: &str) {
        let full = self.namespaced(key);
        for (tier, storage) in self.areas() {
            if let Err(err) = storage.remove_item(&full) {
                warn!(key, tier = tier.as_str(), error = %err, "Mirror cache remove failed");
            }
        }
    }

    /// Remove every key matching `pattern` (`*` and `?` wildcards) from both
    /// tiers. Returns the number of stored entries removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let matcher = match glob_to_regex(pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                warn!(pattern, error = %err, "Invalid mirror cache pattern");
                return 0;
            }
        };
        self.remove_where(|key| matcher.is_match(key))
    }

    /// Remove every entry in this namespace. Keys outside it are untouched.
    pub fn clear(&self) -> usize {
        self.remove_where(|_| true)
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats {
            durable: self.tier_stats(Tier::Durable),
            session: self.tier_stats(Tier::Session),
        }
    }

    fn get_from<T: DeserializeOwned>(&self, tier: Tier, key: &str) -> Option<T> {
        let storage = self.area(tier)?;
        let full = self.namespaced(key);

        let raw = match storage.get_item(&full) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, tier = tier.as_str(), error = %err, "Mirror cache read failed");
                return None;
            }
        };

        let entry = match serde_json::from_str::<StoredEntry<T>>(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, tier = tier.as_str(), error = %err, "Dropping corrupt mirror entry");
                self.remove_quietly(storage, &full);
                return None;
            }
        };

        if entry.is_fresh(self.now_ms()) {
            Some(entry.value)
        } else {
            debug!(key, tier = tier.as_str(), "Mirror entry expired");
            self.remove_quietly(storage, &full);
            None
        }
    }

    fn remove_where(&self, mut predicate: impl FnMut(&str) -> bool) -> usize {
        let mut removed = 0;
        for (tier, storage) in self.areas() {
            let keys = match storage.keys() {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(tier = tier.as_str(), error = %err, "Mirror cache key listing failed");
                    continue;
                }
            };
            for full in keys {
                let Some(key) = self.strip_namespace(&full) else {
                    continue;
                };
                if !predicate(key) {
                    continue;
                }
                match storage.remove_item(&full) {
                    Ok(()) => removed += 1,
                    Err(err) => {
                        warn!(key, tier = tier.as_str(), error = %err, "Mirror cache remove failed");
                    }
                }
            }
        }
        removed
    }

    fn tier_stats(&self, tier: Tier) -> TierStats {
        let Some(storage) = self.area(tier) else {
            return TierStats::default();
        };
        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(tier = tier.as_str(), error = %err, "Mirror cache stats unavailable");
                return TierStats::default();
            }
        };

        keys.into_iter()
            .filter(|full| self.strip_namespace(full).is_some())
            .fold(TierStats::default(), |mut stats, full| {
                let value_len = storage
                    .get_item(&full)
                    .ok()
                    .flatten()
                    .map_or(0, |value| value.len());
                stats.count += 1;
                stats.size_bytes += full.len() + value_len;
                stats
            })
    }

    fn remove_quietly(&self, storage: &dyn StorageArea, full: &str) {
        if let Err(err) = storage.remove_item(full) {
            warn!(key = full, error = %err, "Mirror cache remove failed");
        }
    }

    fn area(&self, tier: Tier) -> Option<&dyn StorageArea> {
        match tier {
            Tier::Durable => self.durable.as_deref(),
            Tier::Session => self.session.as_deref(),
        }
    }

    fn areas(&self) -> impl Iterator<Item = (Tier, &dyn StorageArea)> {
        [Tier::Durable, Tier::Session]
            .into_iter()
            .filter_map(|tier| self.area(tier).map(|storage| (tier, storage)))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    fn strip_namespace<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.namespace.as_str())?.strip_prefix(':')
    }

    fn now_ms(&self) -> i64 {
        i64::try_from(self.clock.now().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
    }
}

//! Cache configuration.
//!
//! Controls the server-side store bound and the stale-while-revalidate
//! behavior via the `[cache]` section of `sitecache.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_MAX_ENTRIES: usize = 1000;
const DEFAULT_STALE_WINDOW_SECS: u64 = 3600;
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

/// Cache configuration from `sitecache.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch. When off, every lookup misses and nothing is stored.
    pub enabled: bool,
    /// Maximum entries held by the in-memory store before LRU eviction.
    pub max_entries: usize,
    /// Serve stale entries while a background refresh runs.
    pub stale_while_revalidate: bool,
    /// How long past its TTL a stale entry may still be served.
    pub stale_window_seconds: u64,
    /// Upper bound on a single background refresh.
    pub refresh_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            stale_while_revalidate: true,
            stale_window_seconds: DEFAULT_STALE_WINDOW_SECS,
            refresh_timeout_seconds: DEFAULT_REFRESH_TIMEOUT_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries.get(),
            stale_while_revalidate: settings.stale_while_revalidate,
            stale_window_seconds: settings.stale_window.as_secs(),
            refresh_timeout_seconds: settings.refresh_timeout.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Returns the entry bound as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn stale_window(&self) -> Duration {
        Duration::from_secs(self.stale_window_seconds)
    }

    /// Refresh timeout, never shorter than one second.
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_seconds.max(1))
    }
}

//! sitecache core.
//!
//! Read-through caching for CMS content with TTLs, stale-while-revalidate and
//! tag-based invalidation.
//!
//! - [`CacheManager`] owns the entry lifecycle on top of a [`StorageBackend`].
//! - [`InvalidationBus`] turns content changes and manual requests into
//!   key and tag deletions.
//! - [`policy_for`] maps a resource class to its TTL and `Cache-Control`.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 1000
//! stale_while_revalidate = true
//! stale_window_seconds = 3600
//! refresh_timeout_seconds = 30
//! ```

mod bus;
mod clock;
mod config;
mod deps;
mod entry;
mod events;
mod inflight;
mod keys;
mod lock;
mod manager;
mod planner;
mod policy;
mod store;
mod tags;

pub(crate) use lock::mutex_lock;

pub use bus::{Ack, InvalidationBus, InvalidationRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use deps::Dependencies;
pub use entry::{CacheEntry, Freshness};
pub use events::{CacheEvent, ContentChange, Epoch, EventKind, EventSequence};
pub use inflight::{InFlightRefreshes, RefreshGuard};
pub use keys::{CacheKey, GLOBALS_NAMESPACE, READ_MARKER, Tag};
pub use manager::{
    CacheManager, CacheStats, CacheStatus, CachedValue, Generation, Lookup, SetOptions,
};
pub use planner::InvalidationPlan;
pub use policy::{CachePolicy, Environment, PolicySettings, ResourceClass, policy_for};
pub use store::{BackendError, MemoryStore, StorageBackend, StoreStats};
pub use tags::TagIndex;

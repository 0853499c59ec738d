//! Stored cache entries and their freshness rules.

use std::collections::BTreeSet;
use std::time::Duration;

use bytes::Bytes;
use time::OffsetDateTime;

use super::keys::{CacheKey, Tag};

/// Where an entry sits on its expiry timeline at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < stored_at + ttl`.
    Fresh,
    /// Past the TTL but still inside the stale window.
    Stale,
    /// Past the stale window; must be dropped.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Serialized payload, returned byte-for-byte.
    pub value: Bytes,
    pub stored_at: OffsetDateTime,
    pub ttl_seconds: u64,
    pub tags: BTreeSet<Tag>,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        value: Bytes,
        stored_at: OffsetDateTime,
        ttl_seconds: u64,
        tags: BTreeSet<Tag>,
    ) -> Self {
        Self {
            key,
            value,
            stored_at,
            ttl_seconds,
            tags,
        }
    }

    /// Instant the entry stops being fresh. `None` when the TTL is too large
    /// to represent, which is treated as "never".
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        let ttl = i64::try_from(self.ttl_seconds).ok()?;
        self.stored_at.checked_add(time::Duration::seconds(ttl))
    }

    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_none_or(|expires| now < expires)
    }

    pub fn freshness(&self, now: OffsetDateTime, stale_window: Duration) -> Freshness {
        let Some(expires) = self.expires_at() else {
            return Freshness::Fresh;
        };
        if now < expires {
            return Freshness::Fresh;
        }

        let window = time::Duration::try_from(stale_window).unwrap_or(time::Duration::MAX);
        match expires.checked_add(window) {
            Some(stale_until) if now >= stale_until => Freshness::Expired,
            _ => Freshness::Stale,
        }
    }

    /// Approximate footprint: key plus serialized payload length.
    pub fn size_bytes(&self) -> usize {
        self.key.as_str().len() + self.value.len()
    }
}

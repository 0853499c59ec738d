use std::sync::Arc;

use dashmap::DashMap;

use super::keys::CacheKey;

/// Tracks keys that currently have a background refresh running.
///
/// Single-process only: each manager owns its own set.
#[derive(Default, Clone)]
pub struct InFlightRefreshes {
    keys: Arc<DashMap<CacheKey, ()>>,
}

impl InFlightRefreshes {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
        }
    }

    /// Claim the refresh slot for `key`. Returns `None` when another caller
    /// already holds it.
    pub fn try_acquire(&self, key: &CacheKey) -> Option<RefreshGuard> {
        use dashmap::mapref::entry::Entry;

        match self.keys.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(RefreshGuard {
                    key: key.clone(),
                    keys: Arc::clone(&self.keys),
                })
            }
            Entry::Occupied(_) => None,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Releases the refresh slot when dropped, whatever the refresh outcome.
pub struct RefreshGuard {
    key: CacheKey,
    keys: Arc<DashMap<CacheKey, ()>>,
}

impl RefreshGuard {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

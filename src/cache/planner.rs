//! Invalidation plan generation.
//!
//! Merges a batch of cache events into the set of keys and tags to drop.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::deps::Dependencies;
use super::events::{CacheEvent, ContentChange, EventKind};
use super::keys::{CacheKey, Tag};

/// Keys and tags to delete. Duplicates across events merge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub keys: BTreeSet<CacheKey>,
    pub tags: BTreeSet<Tag>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ keys: {}, tags: {} }}",
            self.keys.len(),
            self.tags.len()
        )
    }
}

impl InvalidationPlan {
    /// Merge events into a plan, skipping repeated event ids.
    pub fn from_events(events: Vec<CacheEvent>, deps: &Dependencies) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            match event.kind {
                EventKind::ContentChanged(change) => plan.add_change(&change, deps),
                EventKind::KeysInvalidated(keys) => plan.keys.extend(keys),
                EventKind::TagInvalidated(tag) => {
                    plan.tags.insert(tag);
                }
            }
        }

        plan
    }

    pub fn from_changes<'a>(
        changes: impl IntoIterator<Item = &'a ContentChange>,
        deps: &Dependencies,
    ) -> Self {
        let mut plan = Self::default();
        for change in changes {
            plan.add_change(change, deps);
        }
        plan
    }

    /// A change to collection `c` drops tag `c`, key `api-c-read`, the
    /// document key when a slug is known, and every dependent tag. A global
    /// `g` drops tag `g` and key `api-globals-g-read`.
    fn add_change(&mut self, change: &ContentChange, deps: &Dependencies) {
        let name = change.collection.as_str();

        self.tags.insert(Tag::from(name));
        if change.global {
            self.keys.insert(CacheKey::global(name));
        } else {
            self.keys.insert(CacheKey::listing(name));
            if let Some(slug) = change.slug.as_deref().filter(|slug| !slug.is_empty()) {
                self.keys.insert(CacheKey::document(name, slug));
            }
        }
        self.tags.extend(deps.dependent_tags(name));
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.tags.is_empty()
    }
}

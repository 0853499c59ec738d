//! Bidirectional tag index.
//!
//! Tracks which keys carry which tags so a tag can be invalidated without the
//! caller enumerating keys. The index has no locking of its own; it lives
//! under the same lock as the entries it describes.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::keys::{CacheKey, Tag};

/// Tracks tag → keys and key → tags mappings.
#[derive(Debug, Default)]
pub struct TagIndex {
    tag_to_keys: HashMap<Tag, HashSet<CacheKey>>,
    key_to_tags: HashMap<CacheKey, BTreeSet<Tag>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tags of a key, replacing whatever it carried before.
    pub fn register(&mut self, key: &CacheKey, tags: &BTreeSet<Tag>) {
        self.unregister(key);
        if tags.is_empty() {
            return;
        }

        for tag in tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.key_to_tags.insert(key.clone(), tags.clone());
    }

    /// Forget a key. Tags left without keys disappear with it.
    pub fn unregister(&mut self, key: &CacheKey) {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    /// Remove a tag and return every key that carried it.
    ///
    /// The returned keys are fully unregistered, including their other tags,
    /// since the caller is about to delete the entries.
    pub fn take_tag(&mut self, tag: &Tag) -> HashSet<CacheKey> {
        let keys = self.tag_to_keys.remove(tag).unwrap_or_default();
        for key in &keys {
            self.unregister(key);
        }
        keys
    }

    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<CacheKey> {
        self.tag_to_keys.get(tag).cloned().unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &CacheKey) -> BTreeSet<Tag> {
        self.key_to_tags.get(key).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_tags.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> BTreeSet<Tag> {
        names.iter().map(|name| Tag::from(*name)).collect()
    }

    #[test]
    fn register_and_lookup() {
        let mut index = TagIndex::new();
        let key = CacheKey::listing("blogs");
        index.register(&key, &tags(&["blogs"]));

        assert!(index.keys_for_tag(&Tag::from("blogs")).contains(&key));
        assert_eq!(index.tags_for_key(&key), tags(&["blogs"]));
    }

    #[test]
    fn re_register_replaces_tags() {
        let mut index = TagIndex::new();
        let key = CacheKey::listing("blogs");
        index.register(&key, &tags(&["blogs", "home"]));
        index.register(&key, &tags(&["blogs"]));

        assert!(index.keys_for_tag(&Tag::from("home")).is_empty());
        assert_eq!(index.tag_count(), 1);
    }

    #[test]
    fn unregister_drops_orphaned_tags() {
        let mut index = TagIndex::new();
        let key = CacheKey::listing("footer");
        index.register(&key, &tags(&["footer"]));

        index.unregister(&key);
        assert_eq!(index.key_count(), 0);
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn take_tag_returns_all_tagged_keys() {
        let mut index = TagIndex::new();
        let listing = CacheKey::listing("blogs");
        let post = CacheKey::document("blogs", "hello");
        let footer = CacheKey::listing("footer");
        index.register(&listing, &tags(&["blogs"]));
        index.register(&post, &tags(&["blogs", "home"]));
        index.register(&footer, &tags(&["footer"]));

        let taken = index.take_tag(&Tag::from("blogs"));
        assert_eq!(taken.len(), 2);
        assert!(taken.contains(&listing));
        assert!(taken.contains(&post));

        // `home` only referenced the taken post, so it goes too.
        assert!(index.keys_for_tag(&Tag::from("home")).is_empty());
        assert!(index.keys_for_tag(&Tag::from("footer")).contains(&footer));
    }

    #[test]
    fn untagged_keys_are_not_tracked() {
        let mut index = TagIndex::new();
        index.register(&CacheKey::from("job-123"), &BTreeSet::new());
        assert_eq!(index.key_count(), 0);
    }
}

//! Collection dependency edges.
//!
//! Some cached responses embed other collections (a blog listing embeds its
//! categories). An edge `categories -> [blogs]` means a change to
//! `categories` must also invalidate everything tagged `blogs`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::keys::Tag;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map<I, K, V, D>(map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = D>,
        D: Into<String>,
    {
        let mut deps = Self::new();
        for (source, dependents) in map {
            let source = source.into();
            for dependent in dependents {
                deps.add(source.clone(), dependent);
            }
        }
        deps
    }

    /// Record that `dependent` embeds `source`.
    pub fn add(&mut self, source: impl Into<String>, dependent: impl Into<String>) {
        let source = source.into();
        let dependent = dependent.into();
        if source == dependent {
            return;
        }
        self.edges.entry(source).or_default().insert(dependent);
    }

    /// Tags to drop when `collection` changes, excluding `collection` itself.
    /// Follows edges transitively; cycles are tolerated.
    pub fn dependent_tags(&self, collection: &str) -> BTreeSet<Tag> {
        let mut seen = BTreeSet::new();
        let mut pending: VecDeque<&str> = VecDeque::from([collection]);

        while let Some(current) = pending.pop_front() {
            let Some(dependents) = self.edges.get(current) else {
                continue;
            };
            for dependent in dependents {
                if dependent != collection && seen.insert(dependent.as_str()) {
                    pending.push_back(dependent.as_str());
                }
            }
        }

        seen.into_iter().map(Tag::from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_dependents() {
        let deps = Dependencies::from_map([("categories", vec!["blogs"])]);
        assert_eq!(
            deps.dependent_tags("categories"),
            BTreeSet::from([Tag::from("blogs")])
        );
        assert!(deps.dependent_tags("blogs").is_empty());
    }

    #[test]
    fn transitive_and_cyclic_edges() {
        let deps = Dependencies::from_map([
            ("media", vec!["categories"]),
            ("categories", vec!["blogs", "media"]),
        ]);
        assert_eq!(
            deps.dependent_tags("media"),
            BTreeSet::from([Tag::from("blogs"), Tag::from("categories")])
        );
    }

    #[test]
    fn self_edges_are_ignored() {
        let mut deps = Dependencies::new();
        deps.add("blogs", "blogs");
        assert!(deps.is_empty());
    }
}

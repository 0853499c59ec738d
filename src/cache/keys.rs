//! Cache key and tag definitions.
//!
//! Keys are opaque strings derived from a logical resource name plus the
//! parameters that discriminate one resource identity from another.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key segment reserved for globals.
pub const GLOBALS_NAMESPACE: &str = "globals";

/// Marker separating the resource name from the rest of a route key.
pub const READ_MARKER: &str = "-read";

/// Identifies one cached resource.
///
/// Built by [`CacheKey::listing`], [`CacheKey::document`] or
/// [`CacheKey::global`] for routes, or from any string for manual
/// invalidation. Route keys stay unambiguous only while resource names never
/// contain `-read` and collection names never start with `globals-`; request
/// validation enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key for a collection listing: `api-{resource}-read`.
    pub fn listing(resource: &str) -> Self {
        Self(format!("api-{resource}-read"))
    }

    /// Key for a global: `api-globals-{name}-read`.
    pub fn global(name: &str) -> Self {
        Self(format!("api-{GLOBALS_NAMESPACE}-{name}-read"))
    }

    /// Key for a single document: `api-{resource}-read-{slug}`.
    pub fn document(resource: &str, slug: &str) -> Self {
        Self(format!("api-{resource}-read-{slug}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Bulk-invalidation label attached to entries at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

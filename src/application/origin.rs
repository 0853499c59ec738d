//! Origin seam: where cached content comes from.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::cache::{CacheKey, GLOBALS_NAMESPACE, READ_MARKER, ResourceClass, Tag};

use super::error::AppError;

/// One addressable piece of CMS content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRequest {
    Listing { collection: String },
    Document { collection: String, slug: String },
    Global { name: String },
}

impl ResourceRequest {
    pub fn listing(collection: &str) -> Result<Self, AppError> {
        Ok(Self::Listing {
            collection: validate_collection(collection)?,
        })
    }

    pub fn document(collection: &str, slug: &str) -> Result<Self, AppError> {
        Ok(Self::Document {
            collection: validate_collection(collection)?,
            slug: validate_segment("slug", slug)?,
        })
    }

    pub fn global(name: &str) -> Result<Self, AppError> {
        Ok(Self::Global {
            name: validate_resource_name("global", name)?,
        })
    }

    pub fn class(&self) -> ResourceClass {
        match self {
            ResourceRequest::Listing { .. } => ResourceClass::Listing,
            ResourceRequest::Document { .. } => ResourceClass::Document,
            ResourceRequest::Global { .. } => ResourceClass::Global,
        }
    }

    /// Collection or global name; also the invalidation tag.
    pub fn resource(&self) -> &str {
        match self {
            ResourceRequest::Listing { collection } | ResourceRequest::Document { collection, .. } => {
                collection
            }
            ResourceRequest::Global { name } => name,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        match self {
            ResourceRequest::Listing { collection } => CacheKey::listing(collection),
            ResourceRequest::Document { collection, slug } => CacheKey::document(collection, slug),
            ResourceRequest::Global { name } => CacheKey::global(name),
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::from(self.resource())
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRequest::Listing { collection } => write!(f, "collection `{collection}`"),
            ResourceRequest::Document { collection, slug } => {
                write!(f, "`{collection}` document `{slug}`")
            }
            ResourceRequest::Global { name } => write!(f, "global `{name}`"),
        }
    }
}

/// Names become part of cache keys and origin URLs, so only slug-safe
/// characters are accepted.
fn validate_segment(field: &'static str, value: &str) -> Result<String, AppError> {
    let valid = !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(value.to_string())
    } else {
        Err(AppError::validation(format!(
            "{field} `{value}` must be 1-128 characters of [A-Za-z0-9_-]"
        )))
    }
}

/// Resource names end at the first `-read` of a route key, so they may not
/// contain one themselves.
fn validate_resource_name(field: &'static str, value: &str) -> Result<String, AppError> {
    let value = validate_segment(field, value)?;
    if value.contains(READ_MARKER) {
        return Err(AppError::validation(format!(
            "{field} `{value}` must not contain `{READ_MARKER}`"
        )));
    }
    Ok(value)
}

fn validate_collection(value: &str) -> Result<String, AppError> {
    let value = validate_resource_name("collection", value)?;
    if value
        .strip_prefix(GLOBALS_NAMESPACE)
        .is_some_and(|rest| rest.starts_with('-'))
    {
        return Err(AppError::validation(format!(
            "collection `{value}` must not start with `{GLOBALS_NAMESPACE}-`"
        )));
    }
    Ok(value)
}

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("{resource} not found at origin")]
    NotFound { resource: String },
    #[error("origin answered {status} for {resource}")]
    Status { status: u16, resource: String },
    #[error("origin unreachable: {0}")]
    Transport(String),
    #[error("origin did not answer within {after:?}")]
    Timeout { after: Duration },
    #[error("origin response invalid: {0}")]
    InvalidResponse(String),
}

impl OriginError {
    pub fn not_found(request: &ResourceRequest) -> Self {
        Self::NotFound {
            resource: request.to_string(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            OriginError::NotFound { .. } => "not_found",
            OriginError::Status { .. } => "status",
            OriginError::Transport(_) => "transport",
            OriginError::Timeout { .. } => "timeout",
            OriginError::InvalidResponse(_) => "invalid",
        }
    }
}

/// Source of truth for content. Returns the serialized JSON payload.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Bytes, OriginError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_tags() {
        let listing = ResourceRequest::listing("blogs").expect("valid");
        assert_eq!(listing.cache_key(), CacheKey::from("api-blogs-read"));
        assert_eq!(listing.tag(), Tag::from("blogs"));
        assert_eq!(listing.class(), ResourceClass::Listing);

        let document = ResourceRequest::document("blogs", "hello-world").expect("valid");
        assert_eq!(
            document.cache_key(),
            CacheKey::from("api-blogs-read-hello-world")
        );
        assert_eq!(document.tag(), Tag::from("blogs"));

        let global = ResourceRequest::global("footer").expect("valid");
        assert_eq!(global.cache_key(), CacheKey::from("api-globals-footer-read"));
        assert_eq!(global.class(), ResourceClass::Global);
    }

    #[test]
    fn route_keys_never_overlap() {
        // `blogs-read` + `x` and `blogs` + `read-x` would both render as
        // `api-blogs-read-read-x`.
        assert!(ResourceRequest::document("blogs-read", "x").is_err());
        let document = ResourceRequest::document("blogs", "read-x").expect("valid");
        assert_eq!(document.cache_key(), CacheKey::from("api-blogs-read-read-x"));

        assert!(ResourceRequest::listing("blogs-read-x").is_err());
        assert!(ResourceRequest::global("footer-read").is_err());

        // A global and a collection with the same name keep separate entries.
        let global = ResourceRequest::global("footer").expect("valid");
        let listing = ResourceRequest::listing("footer").expect("valid");
        assert_ne!(global.cache_key(), listing.cache_key());

        // `globals-footer` as a collection would shadow the `footer` global.
        assert!(ResourceRequest::listing("globals-footer").is_err());
        assert!(ResourceRequest::document("globals-footer", "x").is_err());
        let globals = ResourceRequest::listing("globals").expect("plain name is fine");
        assert_eq!(globals.cache_key(), CacheKey::from("api-globals-read"));
        assert!(ResourceRequest::listing("globalstats").is_ok());
    }

    #[test]
    fn rejects_unsafe_segments() {
        assert!(ResourceRequest::listing("").is_err());
        assert!(ResourceRequest::listing("blogs?depth=9").is_err());
        assert!(ResourceRequest::document("blogs", "../etc").is_err());
        assert!(ResourceRequest::global(&"x".repeat(129)).is_err());
    }

    #[test]
    fn display_names_the_resource() {
        let document = ResourceRequest::document("blogs", "hello").expect("valid");
        assert_eq!(document.to_string(), "`blogs` document `hello`");
        let err = OriginError::not_found(&document);
        assert_eq!(err.to_string(), "`blogs` document `hello` not found at origin");
        assert_eq!(err.outcome(), "not_found");
    }
}

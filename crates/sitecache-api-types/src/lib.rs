//! Wire types shared by the sitecache server and `sitecache-cli`.
//!
//! Field names are camelCase on the wire to match the CMS webhook payloads.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/cache/invalidate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    #[serde(default)]
    pub keys: Vec<String>,
    /// Tag to invalidate in bulk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub success: bool,
    pub invalidated: usize,
    pub pattern: Option<String>,
}

/// Content operation reported by the CMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentOperation {
    Create,
    Update,
    Delete,
}

impl ContentOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentOperation::Create => "create",
            ContentOperation::Update => "update",
            ContentOperation::Delete => "delete",
        }
    }
}

/// Body of `POST /api/hooks/content-change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChangeRequest {
    /// Collection slug, or global slug when `global` is set.
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub operation: ContentOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChangeResponse {
    pub success: bool,
    pub invalidated: usize,
}

/// Body of `GET /api/cache/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub count: usize,
    pub approximate_size_bytes: usize,
    pub capacity: usize,
    pub in_flight_refreshes: usize,
}

//! Cache events.
//!
//! Every invalidation, whether it comes from the CMS webhook or an operator,
//! is recorded as an event before it is planned and applied.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use sitecache_api_types::ContentOperation;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::keys::{CacheKey, Tag};

/// Monotonic sequence number within this process.
pub type Epoch = u64;

/// A create/update/delete on a watched CMS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// Collection slug, or the global slug when `global` is set.
    pub collection: String,
    pub document_id: Option<String>,
    pub operation: ContentOperation,
    pub slug: Option<String>,
    pub global: bool,
}

impl ContentChange {
    pub fn collection(
        collection: impl Into<String>,
        operation: ContentOperation,
        slug: Option<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            document_id: None,
            operation,
            slug,
            global: false,
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            document_id: None,
            operation: ContentOperation::Update,
            slug: None,
            global: true,
        }
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }
}

impl fmt::Display for ContentChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.global { "global" } else { "collection" };
        write!(f, "{} {kind} `{}`", self.operation.as_str(), self.collection)?;
        if let Some(slug) = &self.slug {
            write!(f, " slug `{slug}`")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ContentChanged(ContentChange),
    KeysInvalidated(Vec<CacheKey>),
    TagInvalidated(Tag),
}

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier, logged so an invalidation can be traced end to end.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Assigns epochs to events and logs them as they are recorded.
#[derive(Debug, Default)]
pub struct EventSequence {
    epoch_counter: AtomicU64,
}

impl EventSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn record(&self, kind: EventKind) -> CacheEvent {
        let event = CacheEvent::new(kind, self.next_epoch());
        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            timestamp = %event.timestamp,
            "Cache event recorded"
        );
        event
    }
}

//! Invalidation bus.
//!
//! Single entry point for every cache deletion. Requests are recorded as
//! events, planned, and applied to the backend before the call returns.
//! Client mirrors and CDN edges are not notified; they revalidate on their
//! own TTL.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::deps::Dependencies;
use super::events::{ContentChange, EventKind, EventSequence};
use super::keys::{CacheKey, Tag};
use super::manager::CacheManager;
use super::planner::InvalidationPlan;

const METRIC_INVALIDATION_MS: &str = "sitecache_invalidation_ms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationRequest {
    Keys(Vec<CacheKey>),
    Tag(Tag),
}

/// Acknowledgement returned to the caller once deletions are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// Entries actually removed from the backend.
    pub invalidated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

pub struct InvalidationBus {
    manager: Arc<CacheManager>,
    dependencies: Dependencies,
    sequence: EventSequence,
}

impl InvalidationBus {
    pub fn new(manager: Arc<CacheManager>, dependencies: Dependencies) -> Self {
        Self {
            manager,
            dependencies,
            sequence: EventSequence::new(),
        }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Handle a CMS content-change callback.
    #[instrument(skip(self), fields(change = %change))]
    pub async fn on_content_change(&self, change: ContentChange) -> Ack {
        self.dispatch(EventKind::ContentChanged(change)).await
    }

    /// Handle a manual invalidation by keys or by tag.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, request: InvalidationRequest) -> Ack {
        let kind = match request {
            InvalidationRequest::Keys(keys) => EventKind::KeysInvalidated(keys),
            InvalidationRequest::Tag(tag) => EventKind::TagInvalidated(tag),
        };
        self.dispatch(kind).await
    }

    async fn dispatch(&self, kind: EventKind) -> Ack {
        if !self.manager.is_enabled() {
            debug!(event_kind = ?kind, "Invalidation skipped: cache disabled");
            return Ack::default();
        }

        let event = self.sequence.record(kind);
        let event_id = event.id;
        let plan = InvalidationPlan::from_events(vec![event], &self.dependencies);
        let mut ack = self.apply(&plan).await;
        ack.event_id = Some(event_id);
        ack
    }

    /// Apply a plan: tags first, then any keys the tags did not cover.
    pub async fn apply(&self, plan: &InvalidationPlan) -> Ack {
        if !self.manager.is_enabled() || plan.is_empty() {
            return Ack::default();
        }

        let started_at = Instant::now();
        let mut invalidated = 0;
        for tag in &plan.tags {
            invalidated += self.manager.invalidate_by_tag(tag).await;
        }
        for key in &plan.keys {
            if self.manager.invalidate(key).await {
                invalidated += 1;
            }
        }

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_INVALIDATION_MS).record(elapsed_ms);
        info!(plan = %plan, invalidated, elapsed_ms, "Invalidation applied");

        Ack {
            invalidated,
            event_id: None,
        }
    }
}

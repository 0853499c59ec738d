//! HTTP surface: cached reads, invalidation, the CMS webhook and stats.

mod cache;
mod content;
mod hooks;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::application::content::ContentService;
use crate::cache::InvalidationBus;

pub use content::{X_CACHE, etag_for};

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentService>,
    pub bus: Arc<InvalidationBus>,
    /// Bearer secret for write endpoints; `None` leaves them open.
    pub secret: Option<Arc<str>>,
}

impl HttpState {
    pub fn new(
        content: Arc<ContentService>,
        bus: Arc<InvalidationBus>,
        secret: Option<String>,
    ) -> Self {
        Self {
            content,
            bus,
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let reads = Router::new()
        .route("/api/globals/{global}/read", get(content::read_global))
        .route("/api/{collection}/read", get(content::read_listing))
        .route("/api/{collection}/read/{slug}", get(content::read_document))
        .route("/api/cache/stats", get(cache::stats));

    let writes = Router::new()
        .route("/api/cache/invalidate", post(cache::invalidate))
        .route("/api/cache", delete(cache::clear))
        .route("/api/hooks/content-change", post(hooks::content_change))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_secret,
        ));

    Router::new()
        .merge(reads)
        .merge(writes)
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

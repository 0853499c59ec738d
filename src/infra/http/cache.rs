//! Operator endpoints: manual invalidation, stats and clear.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use sitecache_api_types::{CacheStatsResponse, InvalidateRequest, InvalidateResponse};
use tracing::info;

use crate::application::error::HttpError;
use crate::cache::{CacheKey, InvalidationRequest, Tag};

use super::HttpState;

const SOURCE: &str = "infra::http::cache";

/// Invalidate each listed key, then the tag named by `pattern` if present.
/// A request carrying neither succeeds with nothing invalidated.
pub async fn invalidate(
    State(state): State<HttpState>,
    payload: Result<Json<InvalidateRequest>, JsonRejection>,
) -> Result<Json<InvalidateResponse>, HttpError> {
    let Json(request) = payload.map_err(|rejection| json_error(&rejection))?;

    let pattern = request.pattern.filter(|pattern| !pattern.trim().is_empty());

    let mut invalidated = 0;
    if !request.keys.is_empty() {
        let keys = request.keys.into_iter().map(CacheKey::from).collect();
        invalidated += state
            .bus
            .invalidate(InvalidationRequest::Keys(keys))
            .await
            .invalidated;
    }
    if let Some(pattern) = &pattern {
        invalidated += state
            .bus
            .invalidate(InvalidationRequest::Tag(Tag::from(pattern.as_str())))
            .await
            .invalidated;
    }

    info!(invalidated, pattern = pattern.as_deref().unwrap_or(""), "Manual invalidation");
    Ok(Json(InvalidateResponse {
        success: true,
        invalidated,
        pattern,
    }))
}

pub async fn stats(State(state): State<HttpState>) -> Json<CacheStatsResponse> {
    let stats = state.bus.manager().stats().await;
    Json(CacheStatsResponse {
        count: stats.store.count,
        approximate_size_bytes: stats.store.approximate_size_bytes,
        capacity: stats.store.capacity,
        in_flight_refreshes: stats.in_flight_refreshes,
    })
}

pub async fn clear(State(state): State<HttpState>) -> impl IntoResponse {
    state.bus.manager().clear().await;
    StatusCode::NO_CONTENT
}

pub(super) fn json_error(rejection: &JsonRejection) -> HttpError {
    HttpError::new(
        SOURCE,
        rejection.status(),
        "Invalid JSON body",
        rejection.body_text(),
    )
}

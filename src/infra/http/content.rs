//! Cached read endpoints.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::application::content::ContentResponse;
use crate::application::error::AppError;
use crate::application::origin::ResourceRequest;

use super::HttpState;

pub const X_CACHE: &str = "x-cache";

pub async fn read_listing(
    State(state): State<HttpState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let request = ResourceRequest::listing(&collection)?;
    let content = state.content.read(request).await?;
    Ok(content_response(content, &headers))
}

pub async fn read_document(
    State(state): State<HttpState>,
    Path((collection, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let request = ResourceRequest::document(&collection, &slug)?;
    let content = state.content.read(request).await?;
    Ok(content_response(content, &headers))
}

pub async fn read_global(
    State(state): State<HttpState>,
    Path(global): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let request = ResourceRequest::global(&global)?;
    let content = state.content.read(request).await?;
    Ok(content_response(content, &headers))
}

/// Strong validator over the payload bytes.
pub fn etag_for(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("\"{}\"", hex::encode(hasher.finalize().to_vec()))
}

fn content_response(content: ContentResponse, request_headers: &HeaderMap) -> Response {
    let etag = etag_for(&content.body);
    let not_modified = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|candidates| {
            candidates
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == etag || candidate == "*")
        });

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            content.body,
        )
            .into_response()
    };

    let headers = response.headers_mut();
    headers.insert(X_CACHE, HeaderValue::from_static(content.status.as_header()));
    if let Ok(value) = HeaderValue::from_str(&content.cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    response
}

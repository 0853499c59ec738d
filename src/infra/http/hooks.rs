//! CMS webhook: called after every create/update/delete on watched content.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use sitecache_api_types::{ContentChangeRequest, ContentChangeResponse};

use crate::application::error::{AppError, HttpError};
use crate::cache::ContentChange;

use super::HttpState;
use super::cache::json_error;

pub async fn content_change(
    State(state): State<HttpState>,
    payload: Result<Json<ContentChangeRequest>, JsonRejection>,
) -> Result<Json<ContentChangeResponse>, HttpError> {
    let Json(request) = payload.map_err(|rejection| json_error(&rejection))?;
    let change = into_change(request).map_err(|err| {
        HttpError::new(
            "infra::http::hooks",
            err.status_code(),
            "Invalid content change",
            err.to_string(),
        )
    })?;

    let ack = state.bus.on_content_change(change).await;
    Ok(Json(ContentChangeResponse {
        success: true,
        invalidated: ack.invalidated,
    }))
}

fn into_change(request: ContentChangeRequest) -> Result<ContentChange, AppError> {
    let collection = request.collection.trim();
    if collection.is_empty() {
        return Err(AppError::validation("collection must not be empty"));
    }

    let mut change = if request.global {
        ContentChange::global(collection)
    } else {
        let slug = request.slug.filter(|slug| !slug.trim().is_empty());
        ContentChange::collection(collection, request.operation, slug)
    };
    change.operation = request.operation;
    if let Some(id) = request.document_id {
        change = change.with_document_id(id);
    }
    Ok(change)
}

#[cfg(test)]
mod tests {
    use sitecache_api_types::ContentOperation;

    use super::*;

    #[test]
    fn blank_slug_is_dropped() {
        let change = into_change(ContentChangeRequest {
            collection: " blogs ".to_string(),
            document_id: Some("42".to_string()),
            operation: ContentOperation::Update,
            slug: Some("  ".to_string()),
            global: false,
        })
        .expect("valid");
        assert_eq!(change.collection, "blogs");
        assert_eq!(change.slug, None);
        assert_eq!(change.document_id.as_deref(), Some("42"));
    }

    #[test]
    fn empty_collection_is_rejected() {
        let err = into_change(ContentChangeRequest {
            collection: String::new(),
            document_id: None,
            operation: ContentOperation::Delete,
            slug: None,
            global: false,
        })
        .expect_err("invalid");
        assert!(matches!(err, AppError::Validation(_)));
    }
}

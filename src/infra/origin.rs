//! HTTP origin backed by a headless CMS REST API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use tracing::debug;

use crate::application::origin::{Origin, OriginError, ResourceRequest};
use crate::config::OriginSettings;

use super::error::InfraError;

pub struct HttpOrigin {
    client: Client,
    base: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOrigin {
    pub fn new(settings: &OriginSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("sitecache/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            base: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })
    }

    pub fn url_for(&self, request: &ResourceRequest) -> Result<Url, OriginError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| OriginError::transport("origin base URL cannot carry a path"))?;
            segments.pop_if_empty().push("api");
            match request {
                ResourceRequest::Listing { collection }
                | ResourceRequest::Document { collection, .. } => {
                    segments.push(collection);
                }
                ResourceRequest::Global { name } => {
                    segments.push("globals").push(name);
                }
            }
        }

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            if let ResourceRequest::Document { slug, .. } = request {
                query
                    .append_pair("where[slug][equals]", slug)
                    .append_pair("limit", "1");
            }
            query.append_pair("depth", "1");
        }
        Ok(url)
    }

    fn map_transport(&self, err: reqwest::Error) -> OriginError {
        if err.is_timeout() {
            OriginError::Timeout {
                after: self.timeout,
            }
        } else {
            OriginError::transport(err.to_string())
        }
    }
}

/// A slug query answers with a paginated `{ "docs": [...] }` envelope; the
/// cached payload is the single matching document.
fn first_document(request: &ResourceRequest, body: &[u8]) -> Result<Bytes, OriginError> {
    let envelope: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| OriginError::invalid_response(err.to_string()))?;
    let docs = envelope
        .get("docs")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| OriginError::invalid_response("missing `docs` array"))?;
    let first = docs.first().ok_or_else(|| OriginError::not_found(request))?;
    let encoded =
        serde_json::to_vec(first).map_err(|err| OriginError::invalid_response(err.to_string()))?;
    Ok(Bytes::from(encoded))
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Bytes, OriginError> {
        let url = self.url_for(request)?;
        debug!(url = %url, "Fetching from origin");

        let mut builder = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header(header::AUTHORIZATION, format!("users API-Key {key}"));
        }

        let response = builder.send().await.map_err(|err| self.map_transport(err))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(OriginError::not_found(request));
        }
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
                resource: request.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| self.map_transport(err))?;

        match request {
            ResourceRequest::Document { .. } => first_document(request, &body),
            ResourceRequest::Listing { .. } | ResourceRequest::Global { .. } => {
                serde_json::from_slice::<serde::de::IgnoredAny>(&body)
                    .map_err(|err| OriginError::invalid_response(err.to_string()))?;
                Ok(body)
            }
        }
    }
}

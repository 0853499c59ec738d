//! Read-through orchestration: policy, then cache, then origin.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, instrument};

use crate::cache::{CacheManager, CacheStatus, PolicySettings, SetOptions, policy_for};

use super::error::AppError;
use super::origin::{Origin, OriginError, ResourceRequest};

const METRIC_ORIGIN_FETCH: &str = "sitecache_origin_fetch_total";
const METRIC_ORIGIN_FETCH_MS: &str = "sitecache_origin_fetch_ms";

/// Payload plus the caching metadata the HTTP layer turns into headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResponse {
    pub body: Bytes,
    pub status: CacheStatus,
    pub cache_control: String,
}

pub struct ContentService {
    manager: Arc<CacheManager>,
    origin: Arc<dyn Origin>,
    policy: PolicySettings,
}

impl ContentService {
    pub fn new(manager: Arc<CacheManager>, origin: Arc<dyn Origin>, policy: PolicySettings) -> Self {
        Self {
            manager,
            origin,
            policy,
        }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    #[instrument(skip(self), fields(resource = %request))]
    pub async fn read(&self, request: ResourceRequest) -> Result<ContentResponse, AppError> {
        let policy = policy_for(self.policy.environment, request.class(), &self.policy);

        if policy.bypasses_cache() || !self.manager.is_enabled() {
            let body = fetch_from_origin(self.origin.as_ref(), &request).await?;
            return Ok(ContentResponse {
                body,
                status: CacheStatus::Bypass,
                cache_control: policy.cache_control,
            });
        }

        let key = request.cache_key();
        let refresh = {
            let origin = Arc::clone(&self.origin);
            let request = request.clone();
            move || async move { fetch_from_origin(origin.as_ref(), &request).await }
        };

        if let Some(cached) = self.manager.get(&key, refresh).await {
            return Ok(ContentResponse {
                body: cached.value,
                status: cached.status,
                cache_control: policy.cache_control,
            });
        }

        let generation = self.manager.generation(&key);
        let body = fetch_from_origin(self.origin.as_ref(), &request).await?;
        let stored = self
            .manager
            .fill(
                generation,
                key,
                body.clone(),
                SetOptions::ttl(policy.ttl_seconds).tag(request.tag()),
            )
            .await;
        debug!(stored, "Origin response fetched on miss");

        Ok(ContentResponse {
            body,
            status: CacheStatus::Miss,
            cache_control: policy.cache_control,
        })
    }
}

async fn fetch_from_origin(
    origin: &dyn Origin,
    request: &ResourceRequest,
) -> Result<Bytes, OriginError> {
    let started_at = Instant::now();
    let result = origin.fetch(request).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.outcome(),
    };
    counter!(METRIC_ORIGIN_FETCH, "outcome" => outcome).increment(1);
    histogram!(METRIC_ORIGIN_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{CacheConfig, Environment, ManualClock, MemoryStore};

    #[derive(Default)]
    struct CountingOrigin {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Origin for CountingOrigin {
        async fn fetch(&self, request: &ResourceRequest) -> Result<Bytes, OriginError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match request {
                ResourceRequest::Document { slug, .. } if slug == "missing" => {
                    Err(OriginError::not_found(request))
                }
                _ => Ok(Bytes::from(format!(r#"{{"call":{call}}}"#))),
            }
        }
    }

    fn service(policy: PolicySettings) -> (ContentService, Arc<CountingOrigin>, Arc<ManualClock>) {
        let config = CacheConfig::default();
        let clock = Arc::new(ManualClock::at_epoch());
        let manager = Arc::new(CacheManager::new(
            config.clone(),
            Arc::new(MemoryStore::new(&config)),
            clock.clone(),
        ));
        let origin = Arc::new(CountingOrigin::default());
        (
            ContentService::new(manager, origin.clone(), policy),
            origin,
            clock,
        )
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let (service, origin, _) = service(PolicySettings::default());
        let request = ResourceRequest::listing("blogs").expect("valid");

        let first = service.read(request.clone()).await.expect("read");
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(
            first.cache_control,
            "public, max-age=0, s-maxage=60, stale-while-revalidate=120"
        );

        let second = service.read(request).await.expect("read");
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.body, first.body);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn development_bypasses_cache() {
        let (service, origin, _) = service(PolicySettings {
            environment: Environment::Development,
            ..Default::default()
        });
        let request = ResourceRequest::global("footer").expect("valid");

        for _ in 0..2 {
            let response = service.read(request.clone()).await.expect("read");
            assert_eq!(response.status, CacheStatus::Bypass);
        }
        assert_eq!(origin.calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.manager().stats().await.store.count, 0);
    }

    #[tokio::test]
    async fn stale_read_returns_old_body_then_refreshes() {
        let (service, origin, clock) = service(PolicySettings::default());
        let request = ResourceRequest::listing("blogs").expect("valid");
        let first = service.read(request.clone()).await.expect("read");

        clock.advance(Duration::from_secs(61));
        let stale = service.read(request.clone()).await.expect("read");
        assert_eq!(stale.status, CacheStatus::Stale);
        assert_eq!(stale.body, first.body);

        for _ in 0..100 {
            if origin.calls.load(Ordering::SeqCst) == 2
                && !service.manager().is_refreshing(&request.cache_key())
            {
                break;
            }
            tokio::task::yield_now().await;
        }
        let refreshed = service.read(request).await.expect("read");
        assert_eq!(refreshed.status, CacheStatus::Hit);
        assert_eq!(refreshed.body, Bytes::from_static(br#"{"call":2}"#));
    }

    #[tokio::test]
    async fn global_and_collection_with_same_name_are_cached_apart() {
        let (service, origin, _) = service(PolicySettings::default());
        let global = ResourceRequest::global("footer").expect("valid");
        let listing = ResourceRequest::listing("footer").expect("valid");

        let from_global = service.read(global.clone()).await.expect("read");
        let from_listing = service.read(listing.clone()).await.expect("read");
        assert_eq!(from_listing.status, CacheStatus::Miss);
        assert_ne!(from_global.body, from_listing.body);

        assert_eq!(service.read(global).await.expect("read").body, from_global.body);
        assert_eq!(service.read(listing).await.expect("read").body, from_listing.body);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn origin_not_found_is_not_cached() {
        let (service, origin, _) = service(PolicySettings::default());
        let request = ResourceRequest::document("blogs", "missing").expect("valid");

        for _ in 0..2 {
            let err = service.read(request.clone()).await.expect_err("missing");
            assert!(matches!(err, AppError::Origin(OriginError::NotFound { .. })));
        }
        assert_eq!(origin.calls.load(Ordering::SeqCst), 2);
    }
}

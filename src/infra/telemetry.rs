use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Per-target filter directives, e.g. `sitecache::cache=debug,reqwest=warn`.
const LOG_FILTER_ENV: &str = "SITECACHE_LOG";

/// Install a global tracing subscriber using the provided logging settings.
///
/// `logging.level` is the floor; directives in `SITECACHE_LOG` refine it.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .with_env_var(LOG_FILTER_ENV)
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sitecache_lookup_total",
            Unit::Count,
            "Cache lookups by outcome (hit, stale, miss)."
        );
        describe_counter!(
            "sitecache_refresh_total",
            Unit::Count,
            "Background refreshes by outcome (ok, failed, timeout, discarded)."
        );
        describe_histogram!(
            "sitecache_refresh_ms",
            Unit::Milliseconds,
            "Background refresh latency in milliseconds."
        );
        describe_counter!(
            "sitecache_store_evict_total",
            Unit::Count,
            "Entries evicted from the in-memory store due to capacity."
        );
        describe_counter!(
            "sitecache_backend_error_total",
            Unit::Count,
            "Storage backend failures degraded to a miss or no-op."
        );
        describe_counter!(
            "sitecache_invalidated_total",
            Unit::Count,
            "Entries removed by key or tag invalidation."
        );
        describe_histogram!(
            "sitecache_invalidation_ms",
            Unit::Milliseconds,
            "Time to apply one invalidation plan in milliseconds."
        );
        describe_counter!(
            "sitecache_origin_fetch_total",
            Unit::Count,
            "Origin fetches by outcome."
        );
        describe_histogram!(
            "sitecache_origin_fetch_ms",
            Unit::Milliseconds,
            "Origin fetch latency in milliseconds."
        );
        describe_gauge!(
            "sitecache_store_entries",
            Unit::Count,
            "Entries held by the in-memory store at the last stats snapshot."
        );
    });
}

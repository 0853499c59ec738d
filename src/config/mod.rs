//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::BTreeMap, net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration,
};

use clap::Parser;
use config::{Config, Environment as EnvSource, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::{Dependencies, Environment, PolicySettings};

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sitecache";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
const DEFAULT_STALE_WINDOW_SECS: u64 = 3600;
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 30;
const MIN_SWR_MULTIPLIER: u64 = 2;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub policy: PolicySettings,
    /// Absent until a base URL is configured; `serve` refuses to start without it.
    pub origin: Option<OriginSettings>,
    pub invalidation: InvalidationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: NonZeroUsize,
    pub stale_while_revalidate: bool,
    pub stale_window: Duration,
    pub refresh_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    pub secret: Option<String>,
    pub dependencies: Dependencies,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(EnvSource::with_prefix("SITECACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::CheckConfig) | None => {
            raw.apply_serve_overrides(&ServeOverrides::default())
        }
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    policy: RawPolicySettings,
    origin: RawOriginSettings,
    invalidation: RawInvalidationSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(max) = overrides.cache_max_entries {
            self.cache.max_entries = Some(max);
        }
        if let Some(swr) = overrides.cache_stale_while_revalidate {
            self.cache.stale_while_revalidate = Some(swr);
        }
        if let Some(seconds) = overrides.cache_stale_window_seconds {
            self.cache.stale_window_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_refresh_timeout_seconds {
            self.cache.refresh_timeout_seconds = Some(seconds);
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.policy.environment = Some(environment.clone());
        }
        if let Some(url) = overrides.origin_url.as_ref() {
            self.origin.base_url = Some(url.clone());
        }
        if let Some(key) = overrides.origin_api_key.as_ref() {
            self.origin.api_key = Some(key.clone());
        }
        if let Some(seconds) = overrides.origin_timeout_seconds {
            self.origin.timeout_seconds = Some(seconds);
        }
        if let Some(secret) = overrides.invalidation_secret.as_ref() {
            self.invalidation.secret = Some(secret.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            policy,
            origin,
            invalidation,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let policy = build_policy_settings(policy)?;
        let origin = build_origin_settings(origin)?;
        let invalidation = build_invalidation_settings(invalidation);

        Ok(Self {
            server,
            logging,
            cache,
            policy,
            origin,
            invalidation,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries = NonZeroUsize::new(cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES))
        .ok_or_else(|| LoadError::invalid("cache.max_entries", "must be greater than zero"))?;

    let refresh_secs = cache
        .refresh_timeout_seconds
        .unwrap_or(DEFAULT_REFRESH_TIMEOUT_SECS);
    if refresh_secs == 0 {
        return Err(LoadError::invalid(
            "cache.refresh_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        max_entries,
        stale_while_revalidate: cache.stale_while_revalidate.unwrap_or(true),
        stale_window: Duration::from_secs(
            cache
                .stale_window_seconds
                .unwrap_or(DEFAULT_STALE_WINDOW_SECS),
        ),
        refresh_timeout: Duration::from_secs(refresh_secs),
    })
}

fn build_policy_settings(policy: RawPolicySettings) -> Result<PolicySettings, LoadError> {
    let defaults = PolicySettings::default();

    let environment = match policy.environment {
        Some(value) => Environment::from_str(&value)
            .map_err(|reason| LoadError::invalid("policy.environment", reason))?,
        None => defaults.environment,
    };

    let swr_multiplier = policy.swr_multiplier.unwrap_or(defaults.swr_multiplier);
    if swr_multiplier < MIN_SWR_MULTIPLIER {
        return Err(LoadError::invalid(
            "policy.swr_multiplier",
            format!("must be at least {MIN_SWR_MULTIPLIER}"),
        ));
    }

    Ok(PolicySettings {
        environment,
        document_ttl_seconds: policy
            .document_ttl_seconds
            .unwrap_or(defaults.document_ttl_seconds),
        listing_ttl_seconds: policy
            .listing_ttl_seconds
            .unwrap_or(defaults.listing_ttl_seconds),
        global_ttl_seconds: policy
            .global_ttl_seconds
            .unwrap_or(defaults.global_ttl_seconds),
        swr_multiplier,
    })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<Option<OriginSettings>, LoadError> {
    let Some(raw_url) = non_empty(origin.base_url) else {
        return Ok(None);
    };

    let base_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("origin.base_url", format!("`{raw_url}`: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "origin.base_url",
            "scheme must be http or https",
        ));
    }

    let timeout_secs = origin.timeout_seconds.unwrap_or(DEFAULT_ORIGIN_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "origin.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(Some(OriginSettings {
        base_url,
        api_key: non_empty(origin.api_key),
        timeout: Duration::from_secs(timeout_secs),
    }))
}

fn build_invalidation_settings(invalidation: RawInvalidationSettings) -> InvalidationSettings {
    InvalidationSettings {
        secret: non_empty(invalidation.secret),
        dependencies: Dependencies::from_map(invalidation.dependencies),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    max_entries: Option<usize>,
    stale_while_revalidate: Option<bool>,
    stale_window_seconds: Option<u64>,
    refresh_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPolicySettings {
    environment: Option<String>,
    document_ttl_seconds: Option<u64>,
    listing_ttl_seconds: Option<u64>,
    global_ttl_seconds: Option<u64>,
    swr_multiplier: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    secret: Option<String>,
    dependencies: BTreeMap<String, Vec<String>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;

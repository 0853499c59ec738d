use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the sitecache server.
#[derive(Debug, Parser)]
#[command(name = "sitecache", version, about = "Caching tier for a CMS-backed website")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SITECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the caching HTTP service.
    Serve(Box<ServeArgs>),
    /// Resolve configuration, print a summary and exit.
    #[command(name = "check-config")]
    CheckConfig,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Turn the server cache on or off.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the in-memory entry bound.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<usize>,

    /// Serve stale entries while refreshing in the background.
    #[arg(
        long = "cache-stale-while-revalidate",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_stale_while_revalidate: Option<bool>,

    /// How long past its TTL a stale entry may be served.
    #[arg(long = "cache-stale-window-seconds", value_name = "SECONDS")]
    pub cache_stale_window_seconds: Option<u64>,

    /// Upper bound on one background refresh.
    #[arg(long = "cache-refresh-timeout-seconds", value_name = "SECONDS")]
    pub cache_refresh_timeout_seconds: Option<u64>,

    /// Policy environment (development|production).
    #[arg(long = "environment", value_name = "ENV")]
    pub environment: Option<String>,

    /// Override the CMS base URL.
    #[arg(long = "origin-url", value_name = "URL")]
    pub origin_url: Option<String>,

    /// Override the CMS API key.
    #[arg(long = "origin-api-key", value_name = "KEY")]
    pub origin_api_key: Option<String>,

    /// Override the origin request timeout.
    #[arg(long = "origin-timeout-seconds", value_name = "SECONDS")]
    pub origin_timeout_seconds: Option<u64>,

    /// Override the bearer secret required by write endpoints.
    #[arg(long = "invalidation-secret", value_name = "SECRET")]
    pub invalidation_secret: Option<String>,
}

//! Command-line surface for `sitecache-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sitecache_api_types::ContentOperation;

#[derive(Parser, Debug)]
#[command(name = "sitecache-cli", version, about = "sitecache operator CLI", long_about = None)]
pub struct Cli {
    /// Server base URL, e.g. <http://127.0.0.1:3000>
    #[arg(long, env = "SITECACHE_SITE_URL")]
    pub site: Option<String>,

    /// Path to a file containing the invalidation secret (takes precedence over env)
    #[arg(long, env = "SITECACHE_SECRET_FILE")]
    pub secret_file: Option<PathBuf>,

    /// Invalidation secret from env (no CLI flag, to keep it out of shell history)
    #[arg(hide = true, env = "SITECACHE_SECRET")]
    pub secret_env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drop specific keys, or every entry carrying a tag
    Invalidate {
        /// Cache key, e.g. `api-blogs-read-hello`; may be repeated
        #[arg(long = "key")]
        keys: Vec<String>,
        /// Tag to invalidate in bulk, e.g. a collection slug such as `blogs`
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Replay a CMS content-change notification
    ContentChange {
        #[arg(long)]
        collection: String,
        #[arg(long, value_enum)]
        operation: OperationArg,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        document_id: Option<String>,
        /// Treat `collection` as a global slug
        #[arg(long)]
        global: bool,
    },
    /// Print cache statistics
    Stats,
    /// Drop every cached entry
    Clear,
    /// Read a resource through the cache and report its cache status
    Read {
        /// `collection`, `collection/slug` or `globals/name`
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Create,
    Update,
    Delete,
}

impl From<OperationArg> for ContentOperation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Create => ContentOperation::Create,
            OperationArg::Update => ContentOperation::Update,
            OperationArg::Delete => ContentOperation::Delete,
        }
    }
}

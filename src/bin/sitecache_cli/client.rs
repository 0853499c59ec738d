#![deny(clippy::all, clippy::pedantic)]

use std::fs;

use reqwest::{Client, Method, RequestBuilder, Response, Url, header};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("site URL is required (use --site or SITECACHE_SITE_URL)")]
    MissingSite,
    #[error("failed to read secret file: {0}")]
    SecretFile(std::io::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
    pub secret: Option<String>,
}

/// A resource read through the cache along with its cache headers.
#[derive(Debug)]
pub struct ReadOutcome {
    pub x_cache: Option<String>,
    pub cache_control: Option<String>,
    pub body: serde_json::Value,
}

impl Ctx {
    pub fn new(site: &str, secret: Option<String>) -> Result<Self, CliError> {
        let base = Url::parse(site)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            base,
            secret,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("sitecache-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn auth_header(&self) -> Result<Option<header::HeaderValue>, CliError> {
        self.secret
            .as_ref()
            .map(|secret| {
                header::HeaderValue::from_str(&format!("Bearer {secret}"))
                    .map_err(|e| CliError::InvalidInput(e.to_string()))
            })
            .transpose()
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base.join(path).map_err(CliError::Url)
    }

    fn builder(&self, method: Method, path: &str) -> Result<RequestBuilder, CliError> {
        let mut req = self.client.request(method, self.url(path)?);
        if let Some(value) = self.auth_header()? {
            req = req.header(header::AUTHORIZATION, value);
        }
        Ok(req)
    }

    pub async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, CliError> {
        let mut req = self.builder(method, path)?;
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        Self::handle(resp).await
    }

    pub async fn request_unit(&self, method: Method, path: &str) -> Result<(), CliError> {
        let resp = self.builder(method, path)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }
        Ok(())
    }

    pub async fn read(&self, path: &str) -> Result<ReadOutcome, CliError> {
        let resp = self.builder(Method::GET, path)?.send().await?;
        let header_text = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let x_cache = header_text("x-cache");
        let cache_control = header_text(header::CACHE_CONTROL.as_str());
        let body = Self::handle(resp).await?;
        Ok(ReadOutcome {
            x_cache,
            cache_control,
            body,
        })
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let site = cli.site.clone().ok_or(CliError::MissingSite)?;
    let secret = if let Some(path) = &cli.secret_file {
        Some(
            fs::read_to_string(path)
                .map_err(CliError::SecretFile)?
                .trim()
                .to_string(),
        )
    } else {
        cli.secret_env.clone()
    };

    Ctx::new(&site, secret.filter(|s| !s.is_empty()))
}

#![deny(clippy::all, clippy::pedantic)]

use reqwest::Method;
use serde::Serialize;
use sitecache_api_types::{
    CacheStatsResponse, ContentChangeRequest, ContentChangeResponse, InvalidateRequest,
    InvalidateResponse,
};

use crate::args::Commands;
use crate::client::{CliError, Ctx};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, cmd: Commands) -> Result<(), CliError> {
    match cmd {
        Commands::Invalidate { keys, pattern } => invalidate(ctx, keys, pattern).await,
        Commands::ContentChange {
            collection,
            operation,
            slug,
            document_id,
            global,
        } => {
            let request = ContentChangeRequest {
                collection,
                document_id,
                operation: operation.into(),
                slug,
                global,
            };
            content_change(ctx, &request).await
        }
        Commands::Stats => stats(ctx).await,
        Commands::Clear => clear(ctx).await,
        Commands::Read { path } => read(ctx, &path).await,
    }
}

async fn invalidate(ctx: &Ctx, keys: Vec<String>, pattern: Option<String>) -> Result<(), CliError> {
    if keys.is_empty() && pattern.is_none() {
        return Err(CliError::InvalidInput(
            "pass at least one --key or a --pattern".to_string(),
        ));
    }
    let body = InvalidateRequest { keys, pattern };
    let res: InvalidateResponse = ctx
        .request(Method::POST, "api/cache/invalidate", Some(&body))
        .await?;
    print_json(&res)
}

async fn content_change(ctx: &Ctx, request: &ContentChangeRequest) -> Result<(), CliError> {
    let res: ContentChangeResponse = ctx
        .request(Method::POST, "api/hooks/content-change", Some(request))
        .await?;
    print_json(&res)
}

async fn stats(ctx: &Ctx) -> Result<(), CliError> {
    let res: CacheStatsResponse = ctx
        .request::<_, ()>(Method::GET, "api/cache/stats", None)
        .await?;
    print_json(&res)
}

async fn clear(ctx: &Ctx) -> Result<(), CliError> {
    ctx.request_unit(Method::DELETE, "api/cache").await?;
    println!("cache cleared");
    Ok(())
}

#[derive(Serialize)]
struct ReadReport {
    path: String,
    x_cache: Option<String>,
    cache_control: Option<String>,
    body: serde_json::Value,
}

/// Map `blogs`, `blogs/hello` and `globals/footer` onto the server's read routes.
pub fn read_route(path: &str) -> Result<String, CliError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["globals", name] if !name.is_empty() => Ok(format!("api/globals/{name}/read")),
        [collection] if !collection.is_empty() => Ok(format!("api/{collection}/read")),
        [collection, slug] if !collection.is_empty() && !slug.is_empty() => {
            Ok(format!("api/{collection}/read/{slug}"))
        }
        _ => Err(CliError::InvalidInput(format!(
            "`{path}` is not `collection`, `collection/slug` or `globals/name`"
        ))),
    }
}

async fn read(ctx: &Ctx, path: &str) -> Result<(), CliError> {
    let route = read_route(path)?;
    let outcome = ctx.read(&route).await?;
    print_json(&ReadReport {
        path: route,
        x_cache: outcome.x_cache,
        cache_control: outcome.cache_control,
        body: outcome.body,
    })
}

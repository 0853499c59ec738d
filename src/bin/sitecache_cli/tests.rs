#![deny(clippy::all, clippy::pedantic)]

use httpmock::MockServer;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::args::{Cli, Commands, OperationArg};
use crate::client::{CliError, Ctx, build_ctx_from_cli};
use crate::handlers::{self, read_route};

fn ctx(server: &MockServer) -> Ctx {
    Ctx::new(&server.base_url(), Some("s3cret".into())).expect("ctx")
}

fn tmp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write tmp");
    file
}

#[test]
fn build_ctx_prefers_secret_file() -> Result<(), CliError> {
    let file = tmp_file("file-secret\n");
    let cli = Cli {
        site: Some("https://example.com".to_string()),
        secret_file: Some(file.path().to_path_buf()),
        secret_env: Some("env-secret".to_string()),
        command: Commands::Stats,
    };

    let ctx = build_ctx_from_cli(&cli)?;
    let header = ctx.auth_header()?.expect("header");
    assert_eq!(header.to_str().expect("header str"), "Bearer file-secret");
    Ok(())
}

#[test]
fn secret_is_optional() -> Result<(), CliError> {
    let cli = Cli {
        site: Some("https://example.com".to_string()),
        secret_file: None,
        secret_env: None,
        command: Commands::Stats,
    };

    let ctx = build_ctx_from_cli(&cli)?;
    assert!(ctx.auth_header()?.is_none());
    Ok(())
}

#[test]
fn build_ctx_errors_without_site() {
    let cli = Cli {
        site: None,
        secret_file: None,
        secret_env: None,
        command: Commands::Clear,
    };

    let err = build_ctx_from_cli(&cli).expect_err("missing site should fail");
    assert!(matches!(err, CliError::MissingSite));
}

#[test]
fn read_routes_map_paths() {
    assert_eq!(read_route("blogs").expect("listing"), "api/blogs/read");
    assert_eq!(
        read_route("/blogs/hello/").expect("document"),
        "api/blogs/read/hello"
    );
    assert_eq!(
        read_route("globals/footer").expect("global"),
        "api/globals/footer/read"
    );
    assert!(matches!(
        read_route("a/b/c"),
        Err(CliError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn invalidate_posts_keys_and_pattern() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/api/cache/invalidate")
            .header("authorization", "Bearer s3cret")
            .json_body(json!({"keys": ["api-blogs-read-hello"], "pattern": "blogs"}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"success": true, "invalidated": 3, "pattern": "blogs"}));
    });

    handlers::handle(
        &ctx(&server),
        Commands::Invalidate {
            keys: vec!["api-blogs-read-hello".to_string()],
            pattern: Some("blogs".to_string()),
        },
    )
    .await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn invalidate_requires_a_target() {
    let server = MockServer::start();
    let err = handlers::handle(
        &ctx(&server),
        Commands::Invalidate {
            keys: Vec::new(),
            pattern: None,
        },
    )
    .await
    .expect_err("nothing to invalidate");
    assert!(matches!(err, CliError::InvalidInput(_)));
}

#[tokio::test]
async fn content_change_sends_camel_case_payload() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/api/hooks/content-change")
            .json_body(json!({
                "collection": "blogs",
                "documentId": "42",
                "operation": "update",
                "slug": "hello",
                "global": false
            }));
        then.status(200)
            .json_body(json!({"success": true, "invalidated": 2}));
    });

    handlers::handle(
        &ctx(&server),
        Commands::ContentChange {
            collection: "blogs".to_string(),
            operation: OperationArg::Update,
            slug: Some("hello".to_string()),
            document_id: Some("42".to_string()),
            global: false,
        },
    )
    .await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn stats_and_clear_hit_endpoints() -> Result<(), CliError> {
    let server = MockServer::start();
    let stats = server.mock(|when, then| {
        when.method("GET").path("/api/cache/stats");
        then.status(200).json_body(json!({
            "count": 1,
            "approximateSizeBytes": 64,
            "capacity": 1000,
            "inFlightRefreshes": 0
        }));
    });
    let clear = server.mock(|when, then| {
        when.method("DELETE").path("/api/cache");
        then.status(204);
    });

    let ctx = ctx(&server);
    handlers::handle(&ctx, Commands::Stats).await?;
    handlers::handle(&ctx, Commands::Clear).await?;
    stats.assert();
    clear.assert();
    Ok(())
}

#[tokio::test]
async fn unauthorized_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("DELETE").path("/api/cache");
        then.status(401).body("unauthorized");
    });

    let err = handlers::handle(&ctx(&server), Commands::Clear)
        .await
        .expect_err("401");
    match err {
        CliError::Server(message) => assert!(message.contains("401")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn read_reports_cache_headers() -> Result<(), CliError> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/api/blogs/read/hello");
        then.status(200)
            .header("x-cache", "HIT")
            .header("cache-control", "public, max-age=0")
            .json_body(json!({"slug": "hello"}));
    });

    let outcome = ctx(&server).read("api/blogs/read/hello").await?;
    assert_eq!(outcome.x_cache.as_deref(), Some("HIT"));
    assert_eq!(outcome.cache_control.as_deref(), Some("public, max-age=0"));
    assert_eq!(outcome.body["slug"], "hello");
    Ok(())
}

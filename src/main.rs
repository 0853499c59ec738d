use std::{process, sync::Arc, time::Duration};

use sitecache::{
    application::{content::ContentService, error::AppError},
    cache::{CacheConfig, CacheManager, InvalidationBus, MemoryStore, SystemClock},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        origin::HttpOrigin,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CheckConfig => {
            check_config(&settings);
            Ok(())
        }
    }
}

fn check_config(settings: &config::Settings) {
    info!(
        addr = %settings.server.addr,
        environment = %settings.policy.environment,
        cache_enabled = settings.cache.enabled,
        max_entries = settings.cache.max_entries.get(),
        stale_while_revalidate = settings.cache.stale_while_revalidate,
        origin = settings
            .origin
            .as_ref()
            .map(|origin| origin.base_url.as_str())
            .unwrap_or("<unset>"),
        secret_configured = settings.invalidation.secret.is_some(),
        "Configuration resolved"
    );
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let origin_settings = settings.origin.as_ref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "origin.base_url must be set to serve content",
        ))
    })?;
    let origin = Arc::new(HttpOrigin::new(origin_settings).map_err(AppError::from)?);

    let cache_config = CacheConfig::from(&settings.cache);
    let backend = Arc::new(MemoryStore::new(&cache_config));
    let manager = Arc::new(CacheManager::new(
        cache_config,
        backend,
        Arc::new(SystemClock),
    ));
    let bus = Arc::new(InvalidationBus::new(
        manager.clone(),
        settings.invalidation.dependencies.clone(),
    ));
    let content = Arc::new(ContentService::new(
        manager.clone(),
        origin,
        settings.policy,
    ));

    if settings.invalidation.secret.is_none() {
        warn!("No invalidation secret configured; write endpoints are open");
    }

    let state = HttpState::new(content, bus, settings.invalidation.secret.clone());
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        environment = %settings.policy.environment,
        "sitecache listening"
    );

    serve_until_shutdown(listener, router, settings.server.graceful_shutdown).await?;

    let stats = manager.stats().await;
    info!(
        entries = stats.store.count,
        approximate_size_bytes = stats.store.approximate_size_bytes,
        in_flight_refreshes = stats.in_flight_refreshes,
        "Cache state at shutdown"
    );
    Ok(())
}

async fn serve_until_shutdown(
    listener: tokio::net::TcpListener,
    router: axum::Router,
    grace: Duration,
) -> Result<(), AppError> {
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = stop_rx.await;
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            return flatten_server_result(result);
        }
        () = shutdown_requested(tokio::signal::ctrl_c()) => {
            info!(grace_seconds = grace.as_secs(), "Shutdown requested; draining connections");
        }
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => flatten_server_result(result),
        Err(_) => {
            warn!("Graceful shutdown timed out; aborting open connections");
            server.abort();
            Ok(())
        }
    }
}

/// Resolves once `signal` fires. A signal handler that cannot be installed
/// never resolves, so the server keeps running until it stops on its own.
async fn shutdown_requested(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(err) = signal.await {
        warn!(error = %err, "failed to listen for shutdown signal; serving until stopped");
        std::future::pending::<()>().await;
    }
}

fn flatten_server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

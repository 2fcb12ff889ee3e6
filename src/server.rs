use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::DaemonConfig,
    handlers::{self, AppState},
    metrics,
    retention::{spawn_retention_task, RetentionManager},
    signals::setup_signal_handlers,
    storage::SqliteLogStore,
};

/// Run the daemon until SIGINT/SIGTERM
///
/// Opens storage (applying migrations), starts the retention schedule and
/// serves the HTTP API with graceful shutdown.
pub async fn start_server(config: DaemonConfig) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let store = Arc::new(
        SqliteLogStore::new(&config.storage.database_url)
            .await?
            .with_delete_chunk(config.storage.delete_chunk),
    );

    let retention = RetentionManager::new(store.clone(), config.retention.days);
    let retention_handle = spawn_retention_task(retention, config.retention.interval());

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("Invalid listen address: {}", config.server.host))?,
        config.server.port,
    ));

    info!(
        address = %addr,
        database_url = %config.storage.database_url,
        retention_days = config.retention.days.days(),
        "Starting logdock daemon"
    );

    let state = AppState::new(store, config);
    let app = create_router(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    retention_handle.abort();
    signal_handle.await?;
    info!("Daemon stopped gracefully");

    Ok(())
}

/// The daemon's HTTP surface; `/metrics` is mounted only with a recorder
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;

    let mut router = Router::new()
        .route("/status", get(handlers::status::status))
        .route("/logs/ingest", post(handlers::ingest::ingest_logs))
        .route("/logs/query", get(handlers::logs::query_logs))
        .route("/logs/clear", post(handlers::logs::clear_logs))
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler::metrics))
                .with_state(Arc::new(handle)),
        );
    }

    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

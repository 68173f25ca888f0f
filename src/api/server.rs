use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, AppState};
use crate::alerts::{PartitionClassifier, WebhookNotifier};
use crate::collector::{Collector, DedupCache, HealthState};
use crate::config::Config;
use crate::engine::EngineClient;
use crate::telemetry::install_statsd;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the collector and serve the health endpoint until Ctrl-C
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = install_statsd(&config.statsd_addr)?;
    tracing::info!("Sending metrics to statsd at {}", recorder.addr());

    let source = Arc::new(EngineClient::new(&config.engine_url, config.request_timeout)?);
    let notifier = Arc::new(WebhookNotifier::new(
        &config.alert_url,
        &config.engine_url,
        &config.reporting_user,
        config.request_timeout,
    )?);
    let classifier = PartitionClassifier::new(&config.connector, config.max_partitions);

    let health = Arc::new(HealthState::new(config.poll_interval));
    let collector = Arc::new(Collector::new(
        source,
        classifier,
        notifier,
        DedupCache::new(),
        Arc::clone(&health),
    ));
    let collector_handle = collector.start(config.poll_interval);

    let app = build_router(Arc::new(AppState { health }));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting health server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    collector_handle.stop().await;

    tracing::info!("scanwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping collector...");
}

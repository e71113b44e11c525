//! Hostwatch Agent - host resource analytics daemon
//!
//! Samples CPU, memory and disk usage of the local host, runs usage
//! forecasting and anomaly detection on every sample, and serves the
//! results over HTTP.

use anyhow::{Context, Result};
use hostwatch_lib::{
    collector::{create_collector, CollectionLoopBuilder},
    health::{components, HealthRegistry},
    observability::{HostwatchMetrics, StructuredLogger},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod runtime;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting hostwatch-agent");

    let config = config::AgentConfig::load();
    info!(
        host_name = %config.host_name,
        api_port = config.api_port,
        sample_interval_ms = config.sample_interval_ms,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }
    health_registry
        .set_degraded(components::PREDICTOR, "Collecting data for predictions")
        .await;
    health_registry
        .set_degraded(components::DETECTOR, "Collecting training data")
        .await;

    let metrics = HostwatchMetrics::new();
    let logger = StructuredLogger::new(&config.host_name);

    let collector = create_collector(&config.proc_path, &config.disk_mount)
        .await
        .context("Failed to initialize host collector")?;

    let (collection_loop, sample_rx) = CollectionLoopBuilder::new()
        .collector(collector)
        .interval(config.sample_interval())
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .build()?;

    let store = runtime::InsightsStore::new(config.predictor.min_samples);
    let analytics = runtime::AnalyticsTask::new(
        &config,
        store.clone(),
        health_registry.clone(),
        metrics,
        logger.clone(),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let collection_handle = tokio::spawn(collection_loop.run(shutdown_tx.subscribe()));
    let analytics_handle = tokio::spawn(analytics.run(sample_rx, shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), store));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(AGENT_VERSION, config.sample_interval_ms);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    logger.log_shutdown("SIGINT received");

    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    if let Err(e) = collection_handle.await {
        error!(error = %e, "Collection loop panicked");
    }
    if let Err(e) = analytics_handle.await {
        error!(error = %e, "Analytics task panicked");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server panicked"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

//! Fake account detector service
//!
//! Loads the persisted model (or trains one on first start) and serves
//! predictions over HTTP.

use account_detector::{api, config::DetectorConfig};
use anyhow::{Context, Result};
use detector_lib::{
    health::{Component, HealthRegistry},
    CsvDatasetStore, DetectorService, FileArtifactStore, StartupSource, StructuredLogger,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fake-account-detector");

    let config = DetectorConfig::load()?;
    info!(
        data_dir = %config.data_dir.display(),
        dataset = %config.dataset_name,
        artifact = %config.artifact_path().display(),
        "Detector configured"
    );

    let health_registry = HealthRegistry::with_components(&Component::ALL);

    let logger = StructuredLogger::new(&config.instance_name);
    let service = Arc::new(DetectorService::new(
        config.training_config(),
        Arc::new(CsvDatasetStore::new(&config.data_dir)),
        Arc::new(FileArtifactStore::new(config.artifact_path())),
        logger.clone(),
    ));

    // Training is CPU-bound, keep it off the async workers
    let startup = Arc::clone(&service);
    let source = tokio::task::spawn_blocking(move || startup.load_or_train())
        .await
        .context("Startup task panicked")?
        .context("Failed to load or train a model")?;
    match source {
        StartupSource::Loaded => info!("Existing model loaded successfully"),
        StartupSource::Trained => info!("Trained a new model"),
    }

    let app_state = Arc::new(api::AppState::new(service, health_registry));
    app_state.sync_health().await;

    logger.log_startup(SERVICE_VERSION, &format!("0.0.0.0:{}", config.api_port));

    let shutdown_logger = logger.clone();
    api::serve(config.api_port, app_state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_logger.log_shutdown("SIGINT received");
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}

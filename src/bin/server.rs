//! HTTP server for tablebridge

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tablebridge::api::create_router;
use tablebridge::config::AppConfig;
use tablebridge::ingestion::{ClickHouseConnector, CsvConnector, IngestionOrchestrator};
use tablebridge::service::TransferService;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::parse();

    let storage_root = config
        .prepare_storage()
        .with_context(|| format!("Failed to prepare storage directory {}", config.storage_dir.display()))?;
    info!("Storing uploads and exports in {}", storage_root.display());

    let orchestrator = IngestionOrchestrator::new(
        CsvConnector::new(storage_root),
        Arc::new(ClickHouseConnector::new(config.connect_timeout())),
        config.ingestion_options(),
    );
    let service = Arc::new(TransferService::new(orchestrator));
    let app = create_router(service, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

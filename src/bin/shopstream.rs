//! Product aggregator service binary.
//!
//! Reads configuration from the environment (and `.env`), then serves
//! `POST /products/get` until the process is stopped.

use anyhow::Context;
use shopstream::ServerConfig;
use shopstream_scrape::Orchestrator;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("shopstream starting");

    let config = ServerConfig::from_env().context("failed to load configuration")?;
    let orchestrator = Orchestrator::new(config.scrape.clone())
        .context("failed to build scrape orchestrator")?;

    shopstream::run_server(config, Arc::new(orchestrator))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "shopstream exited with error");
            e
        })?;

    tracing::info!("shopstream shut down cleanly");
    Ok(())
}

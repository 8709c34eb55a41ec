//! HTTP server for the analytics API
//! Configuration comes from the environment (and `.env`).

use anyhow::Result;
use market_analytics::config::{init_logging, AppConfig};
use market_analytics::engine::AnalyticsEngine;
use market_analytics::server::serve;
use market_analytics::source::open_path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_logging("info");

    info!("Starting analytics API server");
    info!("Reading records from {}", config.data_path.display());

    let engine = Arc::new(AnalyticsEngine::new(open_path(&config.data_path)));
    serve(engine, &config).await?;
    Ok(())
}

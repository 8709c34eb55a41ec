use market_analytics::config::{init_logging, AppConfig};
use market_analytics::engine::AnalyticsEngine;
use market_analytics::server::serve;
use market_analytics::source::open_path;
use market_analytics::views::{AggregationView, ViewKind};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "market-analytics")]
#[command(about = "Ad-hoc sales analytics over purchase-transaction records")]
#[command(version)]
struct Args {
    /// Record file (JSON array, newline-delimited JSON, or CSV).
    /// Defaults to ANALYTICS_DATA_PATH.
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one analytical view as JSON
    View {
        /// View name: stats, categories, locations, time_analysis, demographics,
        /// category_sales, location_sales, gender_distribution, seasonal_sales
        view: ViewKind,

        /// Restrict to one market (24-digit hex identifier)
        #[arg(short, long)]
        market_id: Option<String>,
    },
    /// Print every view for one market as a single JSON object
    Dashboard {
        /// Restrict to one market (24-digit hex identifier)
        #[arg(short, long)]
        market_id: Option<String>,
    },
    /// List the market identifiers present in the data
    Markets,
    /// Run the HTTP API
    Serve {
        /// Listen address (defaults to ANALYTICS_BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = AppConfig::from_env()?;
    init_logging("warn");

    let args = Args::parse();
    if let Some(data) = args.data {
        config.data_path = data;
    }

    let engine = Arc::new(AnalyticsEngine::new(open_path(&config.data_path)));

    match args.command {
        Commands::View { view, market_id } => run_view(&engine, view, market_id.as_deref()).await,
        Commands::Dashboard { market_id } => run_dashboard(&engine, market_id.as_deref()).await,
        Commands::Markets => {
            let markets = engine.available_markets().await?;
            println!("{}", serde_json::to_string_pretty(&markets)?);
            Ok(())
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            info!("Serving {}", config.data_path.display());
            serve(engine, &config).await?;
            Ok(())
        }
    }
}

async fn run_view(engine: &AnalyticsEngine, kind: ViewKind, market_id: Option<&str>) -> Result<()> {
    match engine.view(kind, market_id).await {
        Ok(view) => {
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Err(err) => {
            error!("{} failed: {}", kind, err);
            println!("{}", serde_json::to_string_pretty(&err.to_body())?);
            Err(err).context(format!("could not compute {}", kind))
        }
    }
}

async fn run_dashboard(engine: &AnalyticsEngine, market_id: Option<&str>) -> Result<()> {
    let snapshot = engine
        .snapshot(market_id)
        .await
        .context("could not load records")?;

    let dashboard = Dashboard(snapshot.all_views());
    println!("{}", serde_json::to_string_pretty(&dashboard)?);
    Ok(())
}

/// Every view keyed by name. Serialized directly so per-view key order
/// (seasons, age bands) survives.
struct Dashboard(Vec<(ViewKind, market_analytics::Result<AggregationView>)>);

impl Serialize for Dashboard {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (kind, result) in &self.0 {
            match result {
                Ok(view) => map.serialize_entry(kind.name(), view)?,
                Err(err) => map.serialize_entry(kind.name(), &err.to_body())?,
            }
        }
        map.end()
    }
}

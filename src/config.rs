//! Configuration
//!
//! Environment-driven settings. `.env` files are honoured through
//! `dotenv`; command-line flags override what is loaded here.

use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::error::{AnalyticsError, Result};

pub const DATA_PATH_VAR: &str = "ANALYTICS_DATA_PATH";
pub const BIND_ADDR_VAR: &str = "ANALYTICS_BIND_ADDR";
pub const READ_TIMEOUT_VAR: &str = "ANALYTICS_READ_TIMEOUT_SECS";

const DEFAULT_DATA_PATH: &str = "data/analytics.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Record file; `.csv` selects the CSV reader, anything else JSON.
    pub data_path: PathBuf,
    pub bind_addr: String,
    /// How long a connection may take to deliver its request.
    pub read_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Load from the process environment (after reading `.env`).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = AppConfig::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = var(DATA_PATH_VAR) {
            config.data_path = PathBuf::from(path);
        }
        if let Some(addr) = var(BIND_ADDR_VAR) {
            config.bind_addr = addr;
        }
        if let Some(secs) = var(READ_TIMEOUT_VAR) {
            let secs: u64 = secs.parse().map_err(|_| {
                AnalyticsError::Config(format!("{} must be a whole number of seconds, got '{}'", READ_TIMEOUT_VAR, secs))
            })?;
            config.read_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

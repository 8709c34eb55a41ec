use serde_json::json;
use thiserror::Error;

/// Message returned for a syntactically invalid market filter.
pub const INVALID_MARKET_ID: &str = "Invalid market ID format";

/// Message returned when a well-formed query matched nothing.
pub const NO_DATA_FOUND: &str = "No data found";

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid market ID format: {0}")]
    InvalidMarketId(String),

    /// Filter was valid (or absent) but the record set came back empty.
    /// `reason` carries the load failure message when the source faulted.
    #[error("No data found")]
    NoData { reason: Option<String> },

    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalyticsError {
    /// HTTP-equivalent status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalyticsError::InvalidMarketId(_) => 400,
            AnalyticsError::NoData { .. } => 404,
            _ => 500,
        }
    }

    /// Client-facing message. Internal faults never leak their detail.
    pub fn public_message(&self) -> String {
        match self {
            AnalyticsError::InvalidMarketId(_) => INVALID_MARKET_ID.to_string(),
            AnalyticsError::NoData { .. } => NO_DATA_FOUND.to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// `{"error": "..."}` response body.
    pub fn to_body(&self) -> serde_json::Value {
        json!({ "error": self.public_message() })
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

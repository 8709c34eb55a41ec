//! JSON File Source - Reads a JSON array or newline-delimited JSON export

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{distinct_market_ids, filter_market, RecordSource};
use crate::error::{AnalyticsError, Result};
use crate::record::MarketId;

/// Reads the whole file on every fetch; nothing is cached between requests.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_all(&self) -> Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let docs = parse_documents(&text)?;
        debug!("Read {} documents from {}", docs.len(), self.path.display());
        Ok(docs)
    }
}

/// A top-level array is one document per element; otherwise every
/// non-blank line is a document.
pub fn parse_documents(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Value>(trimmed)? {
            Value::Array(items) => Ok(items),
            _ => Err(AnalyticsError::Source("Expected a JSON array".to_string())),
        };
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<Value>(line).map_err(AnalyticsError::from))
        .collect()
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch(&self, market: Option<&MarketId>) -> Result<Vec<Value>> {
        Ok(filter_market(self.read_all().await?, market))
    }

    async fn distinct_markets(&self) -> Result<Vec<String>> {
        Ok(distinct_market_ids(&self.read_all().await?))
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

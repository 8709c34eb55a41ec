//! CSV File Source - Converts a flat CSV export into JSON documents

use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{distinct_market_ids, filter_market, RecordSource};
use crate::error::Result;
use crate::record::MarketId;

/// Columns whose cells are always kept as text, even when they look numeric.
const TEXT_COLUMNS: [&str; 6] = ["userId", "marketId", "customerGender", "location", "season", "orderDate"];

/// Column holding a JSON-encoded category list.
const CATEGORIES_COLUMN: &str = "categories";

/// CSV export with one row per purchase.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_all(&self) -> Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let docs = parse_csv_documents(&text)?;
        debug!("Read {} rows from {}", docs.len(), self.path.display());
        Ok(docs)
    }
}

fn coerce_cell(header: &str, s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if header == CATEGORIES_COLUMN {
        // Unparsable lists stay as text and are dropped by the expander.
        return serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()));
    }

    if TEXT_COLUMNS.contains(&header) {
        return Value::String(trimmed.to_string());
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(trimmed.to_string())
}

/// Parse CSV text (header row required) into one JSON object per row.
pub fn parse_csv_documents(text: &str) -> Result<Vec<Value>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut obj = Map::new();

        for (idx, header) in headers.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("");
            obj.insert(header.clone(), coerce_cell(header, cell));
        }

        out.push(Value::Object(obj));
    }

    Ok(out)
}

#[async_trait]
impl RecordSource for CsvFileSource {
    async fn fetch(&self, market: Option<&MarketId>) -> Result<Vec<Value>> {
        Ok(filter_market(self.read_all().await?, market))
    }

    async fn distinct_markets(&self) -> Result<Vec<String>> {
        Ok(distinct_market_ids(&self.read_all().await?))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

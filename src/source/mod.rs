//! Record Sources
//!
//! Data-access collaborators that hand raw store documents to the
//! normalizer. Sources apply the market filter themselves, the way a
//! document store would push it down into the query.

pub mod csv_file;
pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::normalizer::raw_market_id;
use crate::record::MarketId;

pub use csv_file::CsvFileSource;
pub use json_file::JsonFileSource;
pub use memory::MemorySource;

/// Raw record provider
///
/// Implementations:
/// - MemorySource: documents held in memory (tests, embedding)
/// - JsonFileSource: JSON array or newline-delimited JSON export
/// - CsvFileSource: flat CSV export with a JSON-encoded `categories` column
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Raw documents, restricted to `market` when given.
    async fn fetch(&self, market: Option<&MarketId>) -> Result<Vec<Value>>;

    /// Distinct market identifiers present in the store, first-seen order.
    async fn distinct_markets(&self) -> Result<Vec<String>>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Pick a file-backed source by extension: `.csv` is CSV, anything else JSON.
pub fn open_path(path: &Path) -> Arc<dyn RecordSource> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        Arc::new(CsvFileSource::new(path))
    } else {
        Arc::new(JsonFileSource::new(path))
    }
}

/// Documents whose `marketId` matches `market` (all of them when `None`).
pub(crate) fn filter_market(docs: Vec<Value>, market: Option<&MarketId>) -> Vec<Value> {
    match market {
        None => docs,
        Some(id) => docs
            .into_iter()
            .filter(|doc| raw_market_id(doc).map(|m| id.matches(&m)).unwrap_or(false))
            .collect(),
    }
}

pub(crate) fn distinct_market_ids(docs: &[Value]) -> Vec<String> {
    crate::aggregate::distinct(docs.iter(), |doc| {
        raw_market_id(doc).map(|m| m.to_ascii_lowercase())
    })
}

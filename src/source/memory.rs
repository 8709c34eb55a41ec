//! In-memory record source

use async_trait::async_trait;
use serde_json::Value;

use super::{distinct_market_ids, filter_market, RecordSource};
use crate::error::Result;
use crate::record::MarketId;

/// Holds raw documents in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Vec<Value>,
}

impl MemorySource {
    pub fn new(documents: Vec<Value>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch(&self, market: Option<&MarketId>) -> Result<Vec<Value>> {
        Ok(filter_market(self.documents.clone(), market))
    }

    async fn distinct_markets(&self) -> Result<Vec<String>> {
        Ok(distinct_market_ids(&self.documents))
    }

    fn describe(&self) -> String {
        format!("memory:{} documents", self.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_filters_by_market() {
        let source = MemorySource::new(vec![
            json!({"marketId": "65a1f0c2b3d4e5f601234567", "n": 1}),
            json!({"marketId": "65a1f0c2b3d4e5f6012345ff", "n": 2}),
        ]);
        let id: MarketId = "65A1F0C2B3D4E5F601234567".parse().unwrap();

        assert_eq!(source.fetch(None).await.unwrap().len(), 2);
        let picked = source.fetch(Some(&id)).await.unwrap();
        assert_eq!(picked, vec![json!({"marketId": "65a1f0c2b3d4e5f601234567", "n": 1})]);
        assert_eq!(source.describe(), "memory:2 documents");
    }
}

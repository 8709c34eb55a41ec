//! Analytics Engine
//!
//! Request boundary around the pure core: loads one private record set
//! per request through the injected [`RecordSource`], then hands it to
//! the view assemblers.

use chrono::Local;
use serde::Serialize;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::normalizer::load_records;
use crate::record::Record;
use crate::source::RecordSource;
use crate::views::{assemble, AggregationView, ViewContext, ViewKind};

/// Market identifiers known to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketList {
    pub available_markets: Vec<String>,
    pub count: usize,
}

/// Normalized records for one request plus the context they were
/// loaded under. Immutable once built.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub context: ViewContext,
    pub records: Arc<[Record]>,
}

impl Snapshot {
    pub fn view(&self, kind: ViewKind) -> Result<AggregationView> {
        assemble(kind, &self.records, &self.context)
    }

    /// Every view over this snapshot, assembled in parallel. Results come
    /// back in `ViewKind::ALL` order.
    pub fn all_views(&self) -> Vec<(ViewKind, Result<AggregationView>)> {
        ViewKind::ALL
            .par_iter()
            .map(|kind| (*kind, self.view(*kind)))
            .collect()
    }
}

pub struct AnalyticsEngine {
    source: Arc<dyn RecordSource>,
}

impl AnalyticsEngine {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &dyn RecordSource {
        self.source.as_ref()
    }

    /// Load and normalize the records for `market_filter`.
    ///
    /// Fails with `InvalidMarketId` for a malformed filter and `NoData`
    /// when nothing matched or the source could not be read.
    pub async fn snapshot(&self, market_filter: Option<&str>) -> Result<Snapshot> {
        let (scope, records) = load_records(self.source.as_ref(), market_filter)
            .await
            .into_result()?;
        debug!("Snapshot for market {} holds {} records", scope, records.len());

        Ok(Snapshot {
            context: ViewContext::new(scope, Local::now().naive_local()),
            records: records.into(),
        })
    }

    /// Compute one view for one request.
    pub async fn view(&self, kind: ViewKind, market_filter: Option<&str>) -> Result<AggregationView> {
        let snapshot = self.snapshot(market_filter).await.map_err(|err| {
            warn!("{} request failed: {}", kind, err);
            err
        })?;
        let view = snapshot.view(kind)?;
        info!(
            "Computed {} over {} records for market {}",
            kind,
            snapshot.records.len(),
            snapshot.context.scope
        );
        Ok(view)
    }

    /// Distinct market identifiers, read directly from the source
    /// without any filtering or normalization.
    pub async fn available_markets(&self) -> Result<MarketList> {
        let markets = self.source.distinct_markets().await.map_err(|err| {
            warn!("Error listing available markets: {}", err);
            err
        })?;
        Ok(MarketList {
            count: markets.len(),
            available_markets: markets,
        })
    }
}

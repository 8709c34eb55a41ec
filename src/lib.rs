pub mod aggregate;
pub mod buckets;
pub mod config;
pub mod engine;
pub mod error;
pub mod expander;
pub mod normalizer;
pub mod record;
pub mod server;
pub mod source;
pub mod views;

pub use engine::{AnalyticsEngine, MarketList, Snapshot};
pub use error::{AnalyticsError, Result};
pub use record::{CategoryShare, MarketId, MarketScope, Record, Season};
pub use views::{AggregationView, ViewKind};

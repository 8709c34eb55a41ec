//! Record Model
//!
//! Strictly-typed purchase records produced by the normalizer. Nothing
//! downstream of `normalizer` sees raw JSON.

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::AnalyticsError;

/// Category name used when a share carries no usable category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

lazy_static! {
    static ref OBJECT_ID: Regex = Regex::new(r"^[0-9a-fA-F]{24}$").unwrap();
}

/// One (category, amount) allocation inside a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
}

impl CategoryShare {
    pub fn new(category: impl Into<String>, amount: f64) -> Self {
        Self {
            category: category.into(),
            amount,
        }
    }
}

/// Calendar season, in its fixed ordinal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ORDERED: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }

    /// Case-insensitive parse; anything outside the four names is `None`.
    pub fn parse(value: &str) -> Option<Season> {
        let value = value.trim();
        Season::ORDERED
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized purchase transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub user_id: Option<String>,
    pub customer_age: Option<f64>,
    pub customer_gender: Option<String>,
    pub purchase_amount: Option<f64>,
    pub location: Option<String>,
    pub season: Option<Season>,
    pub order_date: Option<NaiveDateTime>,
    pub categories: Vec<CategoryShare>,
}

impl Record {
    /// Calendar date of the order, ignoring time of day.
    pub fn order_day(&self) -> Option<NaiveDate> {
        self.order_date.map(|ts| ts.date())
    }
}

/// Validated market identifier (24 hex digits). Keeps the caller's
/// spelling for echoing back; comparisons ignore ASCII case.
#[derive(Debug, Clone)]
pub struct MarketId(String);

impl MarketId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `candidate` names the same market.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate.trim())
    }
}

impl FromStr for MarketId {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if OBJECT_ID.is_match(trimmed) {
            Ok(MarketId(trimmed.to_string()))
        } else {
            Err(AnalyticsError::InvalidMarketId(s.to_string()))
        }
    }
}

impl PartialEq for MarketId {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for MarketId {}

impl Hash for MarketId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Market a view was computed for. Echoed back in every view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketScope {
    All,
    Market(MarketId),
}

impl MarketScope {
    pub fn market(&self) -> Option<&MarketId> {
        match self {
            MarketScope::All => None,
            MarketScope::Market(id) => Some(id),
        }
    }
}

impl fmt::Display for MarketScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketScope::All => f.write_str("all"),
            MarketScope::Market(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for MarketScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

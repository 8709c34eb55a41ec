//! Record Normalizer
//!
//! Coerces loosely-typed store documents into [`Record`]s. A field that
//! fails to coerce becomes `None` on that record only; the record itself
//! is always kept.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{AnalyticsError, Result};
use crate::expander::shares_from_raw;
use crate::record::{MarketId, MarketScope, Record, Season};
use crate::source::RecordSource;

/// Extended-JSON wrappers accepted around numeric values.
const NUMBER_WRAPPERS: [&str; 4] = ["$numberDouble", "$numberDecimal", "$numberLong", "$numberInt"];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Outcome of loading one request's record set.
///
/// An empty set with an error means the load itself failed; an empty set
/// without one means the query matched nothing.
#[derive(Debug)]
pub struct LoadOutcome {
    pub scope: MarketScope,
    pub records: Vec<Record>,
    pub error: Option<AnalyticsError>,
}

impl LoadOutcome {
    /// Collapse into the records, or the error a caller should report.
    pub fn into_result(self) -> Result<(MarketScope, Vec<Record>)> {
        match self.error {
            Some(err @ AnalyticsError::InvalidMarketId(_)) => Err(err),
            Some(err) => Err(AnalyticsError::NoData {
                reason: Some(err.to_string()),
            }),
            None if self.records.is_empty() => Err(AnalyticsError::NoData { reason: None }),
            None => Ok((self.scope, self.records)),
        }
    }
}

/// Parse the optional market filter. Blank filters mean "all markets".
pub fn parse_market_filter(filter: Option<&str>) -> Result<MarketScope> {
    match filter.map(str::trim) {
        None | Some("") => Ok(MarketScope::All),
        Some(raw) => raw.parse::<MarketId>().map(MarketScope::Market),
    }
}

/// Load and normalize the record set for one request.
pub async fn load_records(source: &dyn RecordSource, market_filter: Option<&str>) -> LoadOutcome {
    let scope = match parse_market_filter(market_filter) {
        Ok(scope) => scope,
        Err(err) => {
            warn!("Rejected market filter {:?}", market_filter);
            return LoadOutcome {
                scope: MarketScope::All,
                records: Vec::new(),
                error: Some(err),
            };
        }
    };

    match source.fetch(scope.market()).await {
        Ok(raw) => {
            let records = normalize_all(&raw);
            debug!("Loaded {} records for market {}", records.len(), scope);
            LoadOutcome {
                scope,
                records,
                error: None,
            }
        }
        Err(err) => {
            error!("Error loading data from {}: {}", source.describe(), err);
            LoadOutcome {
                scope,
                records: Vec::new(),
                error: Some(err),
            }
        }
    }
}

pub fn normalize_all(raw: &[Value]) -> Vec<Record> {
    raw.iter().map(normalize_record).collect()
}

/// Normalize one raw document. Non-object documents yield an all-null
/// record, which still counts as an order.
pub fn normalize_record(raw: &Value) -> Record {
    let field = |name: &str| raw.get(name);

    Record {
        user_id: field("userId").and_then(coerce_identifier),
        customer_age: field("customerAge").and_then(coerce_number),
        customer_gender: field("customerGender").and_then(coerce_label),
        purchase_amount: field("purchaseAmount").and_then(coerce_number),
        location: field("location").and_then(coerce_label),
        season: field("season")
            .and_then(Value::as_str)
            .and_then(Season::parse),
        order_date: field("orderDate").and_then(coerce_timestamp),
        categories: shares_from_raw(field("categories")),
    }
}

/// Market identifier carried by a raw document, if any.
pub fn raw_market_id(raw: &Value) -> Option<String> {
    raw.get("marketId").and_then(coerce_identifier)
}

/// Numeric coercion: numbers, numeric strings and extended-JSON number
/// wrappers. Non-finite results are treated as missing.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(obj) => NUMBER_WRAPPERS
            .iter()
            .find_map(|key| obj.get(*key))
            .and_then(coerce_number),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Trimmed, non-empty string labels.
pub fn coerce_label(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Opaque identifiers: strings, numbers, or `{"$oid": ".."}`.
pub fn coerce_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => coerce_label(value),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("$oid").and_then(coerce_label),
        _ => None,
    }
}

/// Timestamp coercion. Offsets are normalized to UTC.
pub fn coerce_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        Value::Object(obj) => match obj.get("$date")? {
            Value::Object(inner) => inner.get("$numberLong").and_then(|v| {
                coerce_number(v)
                    .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
                    .map(|dt| dt.naive_utc())
            }),
            other => coerce_timestamp(other),
        },
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CategoryShare;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_normalize_full_record() {
        let raw = json!({
            "userId": "u-1",
            "customerAge": "34",
            "customerGender": "Female",
            "purchaseAmount": 19.5,
            "location": "Berlin",
            "season": "summer",
            "orderDate": "2024-06-01T18:30:00Z",
            "categories": [{"category": "Food", "amount": 19.5}],
            "marketId": {"$oid": "65a1f0c2b3d4e5f601234567"}
        });
        let record = normalize_record(&raw);
        assert_eq!(record.user_id.as_deref(), Some("u-1"));
        assert_eq!(record.customer_age, Some(34.0));
        assert_eq!(record.customer_gender.as_deref(), Some("Female"));
        assert_eq!(record.purchase_amount, Some(19.5));
        assert_eq!(record.location.as_deref(), Some("Berlin"));
        assert_eq!(record.season, Some(Season::Summer));
        assert_eq!(record.order_day(), NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(record.categories, vec![CategoryShare::new("Food", 19.5)]);
        assert_eq!(raw_market_id(&raw).as_deref(), Some("65a1f0c2b3d4e5f601234567"));
    }

    #[test]
    fn test_bad_fields_become_null_individually() {
        let raw = json!({
            "userId": 7,
            "customerAge": "unknown",
            "purchaseAmount": "12.x",
            "location": "",
            "season": "Monsoon",
            "orderDate": "yesterday",
            "categories": "Food"
        });
        let record = normalize_record(&raw);
        assert_eq!(record.user_id.as_deref(), Some("7"));
        assert_eq!(record.customer_age, None);
        assert_eq!(record.purchase_amount, None);
        assert_eq!(record.location, None);
        assert_eq!(record.season, None);
        assert_eq!(record.order_date, None);
        assert!(record.categories.is_empty());
    }

    #[test]
    fn test_coerce_number_variants() {
        assert_eq!(coerce_number(&json!(3)), Some(3.0));
        assert_eq!(coerce_number(&json!(" 4.25 ")), Some(4.25));
        assert_eq!(coerce_number(&json!({"$numberDecimal": "10.10"})), Some(10.1));
        assert_eq!(coerce_number(&json!({"$numberInt": "42"})), Some(42.0));
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&Value::Null), None);
    }

    #[test]
    fn test_coerce_timestamp_variants() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        let date_of = |v: Value| coerce_timestamp(&v).map(|ts| ts.date());

        assert_eq!(date_of(json!("2024-01-05")), day(2024, 1, 5));
        assert_eq!(date_of(json!("2024-01-05 23:59:59")), day(2024, 1, 5));
        assert_eq!(date_of(json!("2024-01-05T10:00:00.250")), day(2024, 1, 5));
        // offset pushes the UTC date forward
        assert_eq!(date_of(json!("2024-01-05T22:00:00-05:00")), day(2024, 1, 6));
        assert_eq!(date_of(json!(1_704_067_200_000i64)), day(2024, 1, 1));
        assert_eq!(date_of(json!({"$date": "2024-02-29T00:00:00Z"})), day(2024, 2, 29));
        assert_eq!(
            date_of(json!({"$date": {"$numberLong": "1704067200000"}})),
            day(2024, 1, 1)
        );
        assert_eq!(date_of(json!("2024-13-40")), None);
    }

    #[test]
    fn test_parse_market_filter() {
        assert_eq!(parse_market_filter(None).unwrap(), MarketScope::All);
        assert_eq!(parse_market_filter(Some("  ")).unwrap(), MarketScope::All);
        assert!(matches!(
            parse_market_filter(Some("65a1f0c2b3d4e5f601234567")),
            Ok(MarketScope::Market(_))
        ));
        assert!(matches!(
            parse_market_filter(Some("market-7")),
            Err(AnalyticsError::InvalidMarketId(_))
        ));
    }

    #[test]
    fn test_outcome_distinguishes_failure_from_empty() {
        let failed = LoadOutcome {
            scope: MarketScope::All,
            records: Vec::new(),
            error: Some(AnalyticsError::Source("disk on fire".into())),
        };
        assert!(matches!(
            failed.into_result(),
            Err(AnalyticsError::NoData { reason: Some(_) })
        ));

        let empty = LoadOutcome {
            scope: MarketScope::All,
            records: Vec::new(),
            error: None,
        };
        assert!(matches!(
            empty.into_result(),
            Err(AnalyticsError::NoData { reason: None })
        ));
    }
}

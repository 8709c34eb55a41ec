//! Category Expander
//!
//! Flattens the one-to-many `categories` list of each record into a flat
//! sequence of (category, amount) observations.

use serde_json::Value;

use crate::normalizer::coerce_number;
use crate::record::{CategoryShare, Record, UNKNOWN_CATEGORY};

/// Parse a raw `categories` field into shares.
///
/// A field that is not an array yields nothing. Array entries that are not
/// objects are skipped one by one; the rest of the list is still used.
pub fn shares_from_raw(raw: Option<&Value>) -> Vec<CategoryShare> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| entry.as_object())
        .map(|obj| {
            let category = obj
                .get("category")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_CATEGORY);
            let amount = obj.get("amount").and_then(coerce_number).unwrap_or(0.0);
            CategoryShare::new(category, amount)
        })
        .collect()
}

/// One observation per (record, category) pair, in record order.
pub fn expand(records: &[Record]) -> Vec<CategoryShare> {
    records
        .iter()
        .flat_map(|r| r.categories.iter().cloned())
        .collect()
}

/// Category names observed across `records`, duplicates kept.
pub fn category_names<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<&'a str> {
    records
        .into_iter()
        .flat_map(|r| r.categories.iter().map(|c| c.category.as_str()))
        .collect()
}

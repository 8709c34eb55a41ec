//! Grouping / Aggregation Primitives
//!
//! Dimension-agnostic group-by operations over any item sequence. A key
//! function returning `None` drops the item from the grouping; a value
//! function returning `None` drops the item from that group's numeric
//! aggregate only. Groups are `IndexMap`s in first-seen key order, which
//! is what tie-breaks in the chart views rely on.
//!
//! Sums are taken over each group's values in ascending order, so a
//! group's total depends only on which values it holds, never on the
//! order records arrived in.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::Hash;

/// Key/value pairs in first-seen key order.
pub type Grouped<K, V> = IndexMap<K, V>;

/// Key-sorted mapping, used for JSON object output.
pub fn into_sorted_map<K: Ord, V>(groups: Grouped<K, V>) -> BTreeMap<K, V> {
    groups.into_iter().collect()
}

/// Entries ordered by value, largest first. Equal values keep first-seen
/// order.
pub fn sorted_desc<K, V: PartialOrd>(mut groups: Grouped<K, V>) -> Vec<(K, V)> {
    groups.sort_by(|_, a, _, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    groups.into_iter().collect()
}

/// Order-independent sum: adds the values smallest first.
pub fn stable_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().sum()
}

/// Occurrences per key.
pub fn count_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key_fn: F) -> Grouped<K, usize>
where
    K: Eq + Hash,
    F: FnMut(&T) -> Option<K>,
{
    let mut out = Grouped::new();
    for item in items {
        if let Some(key) = key_fn(&item) {
            *out.entry(key).or_insert(0) += 1;
        }
    }
    out
}

/// Sum of the non-null values per key. A key whose values are all null is
/// omitted rather than reported as zero.
pub fn sum_by<T, K, F, G>(items: impl IntoIterator<Item = T>, key_fn: F, value_fn: G) -> Grouped<K, f64>
where
    K: Eq + Hash,
    F: FnMut(&T) -> Option<K>,
    G: FnMut(&T) -> Option<f64>,
{
    collect_by(items, key_fn, value_fn)
        .into_iter()
        .map(|(key, values)| (key, stable_sum(values)))
        .collect()
}

/// Arithmetic mean of the non-null values per key. Groups with no
/// non-null value are omitted.
pub fn mean_by<T, K, F, G>(items: impl IntoIterator<Item = T>, key_fn: F, value_fn: G) -> Grouped<K, f64>
where
    K: Eq + Hash,
    F: FnMut(&T) -> Option<K>,
    G: FnMut(&T) -> Option<f64>,
{
    collect_by(items, key_fn, value_fn)
        .into_iter()
        .map(|(key, values)| {
            let n = values.len() as f64;
            (key, stable_sum(values) / n)
        })
        .collect()
}

fn collect_by<T, K, F, G>(items: impl IntoIterator<Item = T>, mut key_fn: F, mut value_fn: G) -> Grouped<K, Vec<f64>>
where
    K: Eq + Hash,
    F: FnMut(&T) -> Option<K>,
    G: FnMut(&T) -> Option<f64>,
{
    let mut out: Grouped<K, Vec<f64>> = Grouped::new();
    for item in items {
        let Some(value) = value_fn(&item) else {
            continue;
        };
        if let Some(key) = key_fn(&item) {
            out.entry(key).or_default().push(value);
        }
    }
    out
}

/// Unique non-null keys in first-seen order.
pub fn distinct<T, K, F>(items: impl IntoIterator<Item = T>, key_fn: F) -> Vec<K>
where
    K: Eq + Hash,
    F: FnMut(&T) -> Option<K>,
{
    count_by(items, key_fn).into_keys().collect()
}

/// Most frequent value. Ties go to the value encountered first.
pub fn top1_by_frequency<K>(values: impl IntoIterator<Item = K>) -> Option<K>
where
    K: Eq + Hash + Clone,
{
    let counts = count_by(values, |v| Some(v.clone()));
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Summary of a nullable numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericSummary {
    pub sum: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

impl NumericSummary {
    /// `None` when every value is null.
    pub fn of(values: impl IntoIterator<Item = Option<f64>>) -> Option<Self> {
        let mut values: Vec<f64> = values.into_iter().flatten().collect();
        values.sort_by(f64::total_cmp);
        let (min, max) = (*values.first()?, *values.last()?);
        Some(NumericSummary {
            count: values.len(),
            sum: values.into_iter().sum(),
            min,
            max,
        })
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

//! View Assemblers
//!
//! Pure functions turning a normalized record set into one analytical
//! view each. No assembler mutates its input or depends on another, so
//! they can run concurrently over the same slice.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::aggregate::{
    count_by, distinct, into_sorted_map, mean_by, sorted_desc, sum_by, top1_by_frequency, NumericSummary,
};
use crate::buckets::AgeHistogram;
use crate::error::{AnalyticsError, Result};
use crate::expander::{category_names, expand};
use crate::record::{CategoryShare, MarketScope, Record, Season};

/// Per-request inputs shared by every assembler.
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub scope: MarketScope,
    pub generated_at: NaiveDateTime,
}

impl ViewContext {
    pub fn new(scope: MarketScope, generated_at: NaiveDateTime) -> Self {
        Self { scope, generated_at }
    }
}

/// The analytical views the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Stats,
    Categories,
    Locations,
    TimeAnalysis,
    Demographics,
    CategorySalesChart,
    LocationSalesChart,
    GenderDistributionChart,
    SeasonalSalesChart,
}

impl ViewKind {
    pub const ALL: [ViewKind; 9] = [
        ViewKind::Stats,
        ViewKind::Categories,
        ViewKind::Locations,
        ViewKind::TimeAnalysis,
        ViewKind::Demographics,
        ViewKind::CategorySalesChart,
        ViewKind::LocationSalesChart,
        ViewKind::GenderDistributionChart,
        ViewKind::SeasonalSalesChart,
    ];

    /// Short name used on the command line and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::Stats => "stats",
            ViewKind::Categories => "categories",
            ViewKind::Locations => "locations",
            ViewKind::TimeAnalysis => "time_analysis",
            ViewKind::Demographics => "demographics",
            ViewKind::CategorySalesChart => "category_sales",
            ViewKind::LocationSalesChart => "location_sales",
            ViewKind::GenderDistributionChart => "gender_distribution",
            ViewKind::SeasonalSalesChart => "seasonal_sales",
        }
    }

    /// HTTP route serving this view.
    pub fn route(&self) -> String {
        match self {
            ViewKind::CategorySalesChart
            | ViewKind::LocationSalesChart
            | ViewKind::GenderDistributionChart
            | ViewKind::SeasonalSalesChart => format!("/api/charts/{}", self.name()),
            _ => format!("/api/{}", self.name()),
        }
    }

    pub fn from_route(path: &str) -> Option<ViewKind> {
        ViewKind::ALL.into_iter().find(|kind| kind.route() == path)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = ViewKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown view '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Headline numbers over the whole record set.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_sales: f64,
    /// Mean over records that carry an amount; null when none do.
    pub avg_purchase: Option<f64>,
    pub total_orders: usize,
    pub unique_customers: usize,
    pub last_updated: String,
    pub market_id: MarketScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub stats: SummaryStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub distribution: BTreeMap<String, usize>,
    pub sales: BTreeMap<String, f64>,
    pub average_purchase: BTreeMap<String, f64>,
    pub market_id: MarketScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationBreakdown {
    pub distribution: BTreeMap<String, usize>,
    pub sales: BTreeMap<String, f64>,
    pub top_categories: BTreeMap<String, String>,
    pub market_id: MarketScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeBreakdown {
    /// Keyed in season order, not alphabetically.
    pub season_sales: BTreeMap<Season, f64>,
    /// Keyed by `YYYY-MM-DD`.
    pub daily_sales: BTreeMap<String, f64>,
    pub market_id: MarketScope,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub groups: AgeHistogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct Demographics {
    pub gender_distribution: BTreeMap<String, usize>,
    pub gender_sales: BTreeMap<String, f64>,
    #[serde(serialize_with = "empty_object_if_none")]
    pub age_stats: Option<AgeStats>,
    pub market_id: MarketScope,
}

fn empty_object_if_none<S: Serializer>(value: &Option<AgeStats>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(stats) => stats.serialize(serializer),
        None => BTreeMap::<String, f64>::new().serialize(serializer),
    }
}

/// Parallel label/value sequences ready for a chart widget.
#[derive(Debug, Clone, Serialize)]
pub struct ChartView<V> {
    pub labels: Vec<String>,
    pub values: Vec<V>,
    pub title: String,
    pub market_id: MarketScope,
}

impl<V> ChartView<V> {
    fn from_pairs(pairs: Vec<(String, V)>, title: &str, ctx: &ViewContext) -> Self {
        let (labels, values) = pairs.into_iter().unzip();
        Self {
            labels,
            values,
            title: title.to_string(),
            market_id: ctx.scope.clone(),
        }
    }
}

/// Output of one assembler.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AggregationView {
    Stats(StatsView),
    Categories(CategoryBreakdown),
    Locations(LocationBreakdown),
    TimeAnalysis(TimeBreakdown),
    Demographics(Demographics),
    CategorySalesChart(ChartView<f64>),
    LocationSalesChart(ChartView<f64>),
    GenderDistributionChart(ChartView<usize>),
    SeasonalSalesChart(ChartView<f64>),
}

impl AggregationView {
    pub fn kind(&self) -> ViewKind {
        match self {
            AggregationView::Stats(_) => ViewKind::Stats,
            AggregationView::Categories(_) => ViewKind::Categories,
            AggregationView::Locations(_) => ViewKind::Locations,
            AggregationView::TimeAnalysis(_) => ViewKind::TimeAnalysis,
            AggregationView::Demographics(_) => ViewKind::Demographics,
            AggregationView::CategorySalesChart(_) => ViewKind::CategorySalesChart,
            AggregationView::LocationSalesChart(_) => ViewKind::LocationSalesChart,
            AggregationView::GenderDistributionChart(_) => ViewKind::GenderDistributionChart,
            AggregationView::SeasonalSalesChart(_) => ViewKind::SeasonalSalesChart,
        }
    }
}

/// Run the assembler for `kind`.
pub fn assemble(kind: ViewKind, records: &[Record], ctx: &ViewContext) -> Result<AggregationView> {
    Ok(match kind {
        ViewKind::Stats => AggregationView::Stats(StatsView {
            stats: summary_stats(records, ctx)?,
        }),
        ViewKind::Categories => AggregationView::Categories(category_breakdown(records, ctx)),
        ViewKind::Locations => AggregationView::Locations(location_breakdown(records, ctx)),
        ViewKind::TimeAnalysis => AggregationView::TimeAnalysis(time_breakdown(records, ctx)),
        ViewKind::Demographics => AggregationView::Demographics(demographics(records, ctx)),
        ViewKind::CategorySalesChart => AggregationView::CategorySalesChart(category_sales_chart(records, ctx)),
        ViewKind::LocationSalesChart => AggregationView::LocationSalesChart(location_sales_chart(records, ctx)),
        ViewKind::GenderDistributionChart => {
            AggregationView::GenderDistributionChart(gender_distribution_chart(records, ctx))
        }
        ViewKind::SeasonalSalesChart => AggregationView::SeasonalSalesChart(seasonal_sales_chart(records, ctx)),
    })
}

pub fn summary_stats(records: &[Record], ctx: &ViewContext) -> Result<SummaryStats> {
    if records.is_empty() {
        return Err(AnalyticsError::NoData { reason: None });
    }

    let amounts = NumericSummary::of(records.iter().map(|r| r.purchase_amount));
    let customers = distinct(records.iter(), |r| r.user_id.clone());

    Ok(SummaryStats {
        total_sales: amounts.map(|s| s.sum).unwrap_or(0.0),
        avg_purchase: amounts.map(|s| s.mean()),
        total_orders: records.len(),
        unique_customers: customers.len(),
        last_updated: ctx.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        market_id: ctx.scope.clone(),
    })
}

pub fn category_breakdown(records: &[Record], ctx: &ViewContext) -> CategoryBreakdown {
    let shares = expand(records);
    let key = |s: &&CategoryShare| Some(s.category.clone());

    CategoryBreakdown {
        distribution: into_sorted_map(count_by(shares.iter(), key)),
        sales: into_sorted_map(sum_by(shares.iter(), key, |s| Some(s.amount))),
        average_purchase: into_sorted_map(mean_by(shares.iter(), key, |s| Some(s.amount))),
        market_id: ctx.scope.clone(),
    }
}

pub fn location_breakdown(records: &[Record], ctx: &ViewContext) -> LocationBreakdown {
    let location = |r: &&Record| r.location.clone();

    let mut top_categories = BTreeMap::new();
    for loc in distinct(records.iter(), location) {
        let names = category_names(records.iter().filter(|r| r.location.as_deref() == Some(loc.as_str())));
        if let Some(top) = top1_by_frequency(names) {
            top_categories.insert(loc, top.to_string());
        }
    }

    LocationBreakdown {
        distribution: into_sorted_map(count_by(records.iter(), location)),
        sales: into_sorted_map(sum_by(records.iter(), location, |r| r.purchase_amount)),
        top_categories,
        market_id: ctx.scope.clone(),
    }
}

pub fn time_breakdown(records: &[Record], ctx: &ViewContext) -> TimeBreakdown {
    TimeBreakdown {
        season_sales: into_sorted_map(sum_by(records.iter(), |r| r.season, |r| r.purchase_amount)),
        daily_sales: into_sorted_map(sum_by(
            records.iter(),
            |r| r.order_day().map(|d| d.format("%Y-%m-%d").to_string()),
            |r| r.purchase_amount,
        )),
        market_id: ctx.scope.clone(),
    }
}

pub fn demographics(records: &[Record], ctx: &ViewContext) -> Demographics {
    let gender = |r: &&Record| r.customer_gender.clone();

    let age_stats = NumericSummary::of(records.iter().map(|r| r.customer_age)).map(|ages| AgeStats {
        average: ages.mean(),
        min: ages.min,
        max: ages.max,
        groups: AgeHistogram::from_ages(records.iter().map(|r| r.customer_age)),
    });

    Demographics {
        gender_distribution: into_sorted_map(count_by(records.iter(), gender)),
        gender_sales: into_sorted_map(sum_by(records.iter(), gender, |r| r.purchase_amount)),
        age_stats,
        market_id: ctx.scope.clone(),
    }
}

pub fn category_sales_chart(records: &[Record], ctx: &ViewContext) -> ChartView<f64> {
    let shares = expand(records);
    let sums = sum_by(shares.iter(), |s| Some(s.category.clone()), |s| Some(s.amount));
    ChartView::from_pairs(sorted_desc(sums), "Sales by Category", ctx)
}

pub fn location_sales_chart(records: &[Record], ctx: &ViewContext) -> ChartView<f64> {
    let sums = sum_by(records.iter(), |r| r.location.clone(), |r| r.purchase_amount);
    ChartView::from_pairs(sorted_desc(sums), "Sales by Location", ctx)
}

pub fn gender_distribution_chart(records: &[Record], ctx: &ViewContext) -> ChartView<usize> {
    let counts = count_by(records.iter(), |r| r.customer_gender.clone());
    ChartView::from_pairs(sorted_desc(counts), "Gender Distribution", ctx)
}

/// Seasons in Winter, Spring, Summer, Fall order. Seasons with no sales
/// are left out rather than shown as zero.
pub fn seasonal_sales_chart(records: &[Record], ctx: &ViewContext) -> ChartView<f64> {
    let sums = sum_by(records.iter(), |r| r.season, |r| r.purchase_amount);
    let pairs = Season::ORDERED
        .into_iter()
        .filter_map(|season| sums.get(&season).map(|v| (season.to_string(), *v)))
        .collect();
    ChartView::from_pairs(pairs, "Sales by Season", ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::AgeBand;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> ViewContext {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        ViewContext::new(MarketScope::All, ts)
    }

    fn purchase(user: &str, amount: Option<f64>) -> Record {
        Record {
            user_id: Some(user.to_string()),
            purchase_amount: amount,
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_stats_ignores_null_amounts() {
        let records = vec![
            purchase("u1", Some(10.0)),
            purchase("u2", Some(20.0)),
            purchase("u1", None),
        ];
        let stats = summary_stats(&records, &ctx()).unwrap();
        assert_eq!(stats.total_sales, 30.0);
        assert_eq!(stats.avg_purchase, Some(15.0));
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.unique_customers, 2);
        assert_eq!(stats.last_updated, "2024-03-01 12:00:00");
        assert_eq!(serde_json::to_value(&stats).unwrap()["market_id"], json!("all"));
    }

    #[test]
    fn test_summary_stats_empty_is_no_data() {
        assert!(matches!(
            summary_stats(&[], &ctx()),
            Err(AnalyticsError::NoData { reason: None })
        ));
    }

    #[test]
    fn test_summary_stats_all_amounts_null() {
        let stats = summary_stats(&[purchase("u1", None)], &ctx()).unwrap();
        assert_eq!(stats.total_sales, 0.0);
        assert_eq!(stats.avg_purchase, None);
    }

    #[test]
    fn test_category_breakdown_one_to_many() {
        let records = vec![Record {
            categories: vec![
                CategoryShare::new("Food", 5.0),
                CategoryShare::new("Food", 3.0),
                CategoryShare::new("Toys", 2.0),
            ],
            ..Default::default()
        }];
        let view = category_breakdown(&records, &ctx());
        assert_eq!(view.sales.get("Food"), Some(&8.0));
        assert_eq!(view.sales.get("Toys"), Some(&2.0));
        assert_eq!(view.distribution.get("Food"), Some(&2));
        assert_eq!(view.distribution.get("Toys"), Some(&1));
        assert_eq!(view.average_purchase.get("Food"), Some(&4.0));
    }

    #[test]
    fn test_category_breakdown_without_categories_is_empty() {
        let view = category_breakdown(&[purchase("u1", Some(3.0))], &ctx());
        assert!(view.distribution.is_empty());
        assert!(view.sales.is_empty());
        assert!(view.average_purchase.is_empty());
    }

    #[test]
    fn test_category_expansion_reshaped_keeps_sums() {
        let records = vec![
            Record {
                categories: vec![CategoryShare::new("A", 1.5), CategoryShare::new("B", 2.0)],
                ..Default::default()
            },
            Record {
                categories: vec![CategoryShare::new("A", 4.0)],
                ..Default::default()
            },
        ];
        let rewrapped: Vec<Record> = expand(&records)
            .into_iter()
            .map(|share| Record {
                categories: vec![share],
                ..Default::default()
            })
            .collect();
        assert_eq!(
            category_breakdown(&records, &ctx()).sales,
            category_breakdown(&rewrapped, &ctx()).sales
        );
    }

    #[test]
    fn test_location_breakdown_top_category() {
        let rec = |loc: Option<&str>, amount, cats: &[&str]| Record {
            location: loc.map(str::to_string),
            purchase_amount: Some(amount),
            categories: cats.iter().map(|c| CategoryShare::new(*c, 1.0)).collect(),
            ..Default::default()
        };
        let records = vec![
            rec(Some("Oslo"), 10.0, &["Toys", "Food"]),
            rec(Some("Oslo"), 5.0, &["Food"]),
            rec(Some("Rome"), 7.0, &["Books", "Garden"]),
            rec(Some("Rome"), 1.0, &["Garden", "Books"]),
            rec(Some("Kyiv"), 2.0, &[]),
            rec(None, 99.0, &["Food"]),
        ];
        let view = location_breakdown(&records, &ctx());

        assert_eq!(view.distribution.get("Oslo"), Some(&2));
        assert_eq!(view.sales.get("Oslo"), Some(&15.0));
        assert_eq!(view.sales.len(), 3);
        assert_eq!(view.top_categories.get("Oslo").map(String::as_str), Some("Food"));
        // tie goes to the first category seen in that location
        assert_eq!(view.top_categories.get("Rome").map(String::as_str), Some("Books"));
        assert!(!view.top_categories.contains_key("Kyiv"));
    }

    #[test]
    fn test_location_breakdown_without_locations() {
        let view = location_breakdown(&[purchase("u1", Some(1.0))], &ctx());
        assert!(view.distribution.is_empty());
        assert!(view.sales.is_empty());
        assert!(view.top_categories.is_empty());
    }

    #[test]
    fn test_time_breakdown_skips_undated_records() {
        let at = |d: u32, h: u32| NaiveDate::from_ymd_opt(2024, 5, d).unwrap().and_hms_opt(h, 0, 0);
        let records = vec![
            Record { season: Some(Season::Spring), order_date: at(1, 9), purchase_amount: Some(2.0), ..Default::default() },
            Record { season: Some(Season::Spring), order_date: at(1, 21), purchase_amount: Some(3.0), ..Default::default() },
            Record { season: Some(Season::Winter), order_date: None, purchase_amount: Some(4.0), ..Default::default() },
        ];
        let view = time_breakdown(&records, &ctx());
        assert_eq!(view.daily_sales.len(), 1);
        assert_eq!(view.daily_sales.get("2024-05-01"), Some(&5.0));
        assert_eq!(view.season_sales.get(&Season::Winter), Some(&4.0));

        let json = serde_json::to_string(&view.season_sales).unwrap();
        assert_eq!(json, r#"{"Winter":4.0,"Spring":5.0}"#);
    }

    #[test]
    fn test_demographics_null_ages_excluded() {
        let records = vec![
            Record { customer_age: Some(24.0), customer_gender: Some("F".into()), purchase_amount: Some(3.0), ..Default::default() },
            Record { customer_age: None, customer_gender: Some("M".into()), purchase_amount: Some(9.0), ..Default::default() },
        ];
        let view = demographics(&records, &ctx());
        let ages = view.age_stats.clone().unwrap();
        assert_eq!(ages.average, 24.0);
        assert_eq!((ages.min, ages.max), (24.0, 24.0));
        assert_eq!(ages.groups.count(AgeBand::Under25), 1);
        assert_eq!(ages.groups.total(), 1);
        assert_eq!(view.gender_sales.get("M"), Some(&9.0));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["age_stats"]["groups"], json!({"<25": 1}));
    }

    #[test]
    fn test_demographics_without_ages_serializes_empty_object() {
        let view = demographics(&[purchase("u1", Some(1.0))], &ctx());
        assert!(view.age_stats.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["age_stats"], json!({}));
    }

    #[test]
    fn test_category_chart_sorted_desc_with_stable_ties() {
        let records = vec![Record {
            categories: vec![
                CategoryShare::new("Garden", 2.0),
                CategoryShare::new("Food", 9.0),
                CategoryShare::new("Books", 2.0),
            ],
            ..Default::default()
        }];
        let chart = category_sales_chart(&records, &ctx());
        assert_eq!(chart.labels, vec!["Food", "Garden", "Books"]);
        assert_eq!(chart.values, vec![9.0, 2.0, 2.0]);
        assert_eq!(chart.title, "Sales by Category");
    }

    #[test]
    fn test_seasonal_chart_fixed_order() {
        let rec = |season, amount| Record { season: Some(season), purchase_amount: Some(amount), ..Default::default() };
        let records = vec![rec(Season::Fall, 1.0), rec(Season::Winter, 2.0), rec(Season::Fall, 3.0)];
        let chart = seasonal_sales_chart(&records, &ctx());
        assert_eq!(chart.labels, vec!["Winter", "Fall"]);
        assert_eq!(chart.values, vec![2.0, 4.0]);
    }

    #[test]
    fn test_gender_chart_counts() {
        let rec = |g: &str| Record { customer_gender: Some(g.to_string()), ..Default::default() };
        let records = vec![rec("F"), rec("M"), rec("M"), Record::default()];
        let chart = gender_distribution_chart(&records, &ctx());
        assert_eq!(chart.labels, vec!["M", "F"]);
        assert_eq!(chart.values, vec![2, 1]);
    }

    #[test]
    fn test_view_kind_routes_round_trip() {
        for kind in ViewKind::ALL {
            assert_eq!(ViewKind::from_route(&kind.route()), Some(kind));
            assert_eq!(kind.name().parse::<ViewKind>(), Ok(kind));
        }
        assert_eq!(ViewKind::from_route("/api/charts/seasonal_sales"), Some(ViewKind::SeasonalSalesChart));
        assert_eq!("time-analysis".parse::<ViewKind>(), Ok(ViewKind::TimeAnalysis));
        assert!("nope".parse::<ViewKind>().is_err());
    }
}

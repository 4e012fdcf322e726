//! Field mapping from ad-report records to destination rows.

use haulage_warehouse::Row;
use serde_json::Value;

/// `(output column, source field)` for every column of the ad-metrics table,
/// in table order. Values are copied without coercion.
pub const AD_METRIC_FIELDS: [(&str, &str); 26] = [
    ("day", "day"),
    ("hour", "hour"),
    ("campaign", "campaign"),
    ("campaign_id_external", "campaign_id"),
    ("ad", "ad"),
    ("ad_id", "ad_id"),
    ("ad_type", "ad_type"),
    ("ad_creative_type", "ad_creative_type"),
    ("creative_set", "creative_set"),
    ("creative_set_id", "creative_set_id"),
    ("impressions", "impressions"),
    ("clicks", "clicks"),
    ("ctr", "ctr"),
    ("conversions", "conversions"),
    ("cost", "cost"),
    ("sales", "sales"),
    ("roas_0d", "roas_0d"),
    ("roas_7d", "roas_7d"),
    ("chka_0d", "chka_0d"),
    ("chka_usd_0d", "chka_usd_0d"),
    ("cost_per_chka_0d", "cost_per_chka_0d"),
    ("chka_7d", "chka_7d"),
    ("chka_usd_7d", "chka_usd_7d"),
    ("cost_per_chka_7d", "cost_per_chka_7d"),
    // Each row covers exactly one day.
    ("Start_Date", "day"),
    ("End_Date", "day"),
];

/// Output column names of [`AD_METRIC_FIELDS`].
pub fn ad_metric_columns() -> impl Iterator<Item = &'static str> {
    AD_METRIC_FIELDS.iter().map(|(output, _)| *output)
}

/// Map one raw report record; absent source fields become null.
pub fn transform_ad_record(record: &Row) -> Row {
    AD_METRIC_FIELDS
        .iter()
        .map(|(output, source)| {
            let value = record.get(*source).cloned().unwrap_or(Value::Null);
            ((*output).to_owned(), value)
        })
        .collect()
}

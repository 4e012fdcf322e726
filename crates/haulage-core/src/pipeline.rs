//! The two flows: authenticate, fetch, transform, load.

use std::fmt::{Display, Formatter};

use haulage_warehouse::{
    CursorKey, CursorUpdate, Destination, LoadInfo, LoadRequest, Row, TableSchema,
    WriteDisposition,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::adapters::queries::ORDER_COLUMNS;
use crate::adapters::{AppLovinClient, OrdersFetch, ShipHeroClient, ShipHeroCredentials};
use crate::cursor::{top_of_hour, Watermark};
use crate::domain::{OrderRecord, ReportWindow};
use crate::error::PipelineError;
use crate::transform::{ad_metric_columns, transform_ad_record};

pub const AD_PIPELINE: &str = "applovin_advertiser_pipeline";
pub const AD_DATASET: &str = "applovin_dlt_staging_v1";
pub const AD_TABLE: &str = "AppLovin_Ecommerce_Advertiser";
pub const AD_PRIMARY_KEY: [&str; 3] = ["day", "ad_id", "campaign_id_external"];

pub const ORDERS_PIPELINE: &str = "shiphero_pipeline";
pub const ORDERS_DATASET: &str = "dagster_shiphero";
pub const ORDERS_TABLE: &str = "orders";
pub const ORDERS_CURSOR_FIELD: &str = "updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    AdMetrics,
    Orders,
}

impl Flow {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdMetrics => "ad_metrics",
            Self::Orders => "orders",
        }
    }

    pub const fn pipeline_name(self) -> &'static str {
        match self {
            Self::AdMetrics => AD_PIPELINE,
            Self::Orders => ORDERS_PIPELINE,
        }
    }
}

impl Display for Flow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Loaded { load: LoadInfo },
    /// The source returned no records; the destination was left as is.
    Empty,
    /// Nothing newer than the watermark; state was left as is.
    NoNewData,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub flow: Flow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_watermark: Option<String>,
    pub outcome: RunOutcome,
}

pub fn ad_metrics_schema() -> Result<TableSchema, PipelineError> {
    Ok(TableSchema::new(
        AD_DATASET,
        AD_TABLE,
        ad_metric_columns(),
        WriteDisposition::Replace,
    )?
    .with_primary_key(AD_PRIMARY_KEY)?)
}

pub fn orders_schema() -> Result<TableSchema, PipelineError> {
    Ok(
        TableSchema::new(ORDERS_DATASET, ORDERS_TABLE, ORDER_COLUMNS, WriteDisposition::Merge)?
            .with_primary_key(["id"])?,
    )
}

pub fn orders_cursor_key() -> CursorKey {
    CursorKey::new(ORDERS_PIPELINE, ORDERS_TABLE, ORDERS_CURSOR_FIELD)
}

/// Fetch the report for `window`, map it, and replace the ad-metrics table.
///
/// An empty report loads nothing. Any fetch error aborts before the
/// destination is touched.
#[instrument(name = "run", skip_all, fields(pipeline = AD_PIPELINE))]
pub async fn run_ad_metrics(
    client: &AppLovinClient,
    destination: &dyn Destination,
    window: ReportWindow,
) -> Result<RunReport, PipelineError> {
    let schema = ad_metrics_schema()?;
    info!(start = %window.start_iso(), end = %window.end_iso(), "fetching last 7 days");

    let records = client.fetch_report(&window).await?;
    let mut report = RunReport {
        pipeline: String::from(AD_PIPELINE),
        flow: Flow::AdMetrics,
        window_start: Some(window.start_iso()),
        window_end: Some(window.end_iso()),
        watermark: None,
        next_watermark: None,
        outcome: RunOutcome::Empty,
    };

    if records.is_empty() {
        warn!("no ad metrics available for the window");
        return Ok(report);
    }

    let rows = records.iter().map(transform_ad_record).collect::<Vec<Row>>();
    let load = destination.load(&LoadRequest {
        pipeline: AD_PIPELINE,
        schema: &schema,
        rows: &rows,
        cursor: None,
    })?;

    report.outcome = RunOutcome::Loaded { load };
    Ok(report)
}

/// Fetch orders newer than the stored watermark and merge them by `id`.
///
/// The watermark advances in the same transaction as the rows. When no
/// fetched order is strictly newer, nothing is loaded and state stays put.
#[instrument(name = "run", skip_all, fields(pipeline = ORDERS_PIPELINE))]
pub async fn run_orders(
    client: &ShipHeroClient,
    credentials: &ShipHeroCredentials,
    destination: &dyn Destination,
    now: OffsetDateTime,
) -> Result<RunReport, PipelineError> {
    let schema = orders_schema()?;
    let token = client.authenticate(credentials).await?;

    let key = orders_cursor_key();
    let since = match destination.read_cursor(&key)? {
        Some(stored) => Watermark::parse(&stored)?,
        None => Watermark::initial(),
    };
    let until = top_of_hour(now);
    info!(since = %since, until = %until, "latest cursor value");

    let mut report = RunReport {
        pipeline: String::from(ORDERS_PIPELINE),
        flow: Flow::Orders,
        window_start: None,
        window_end: None,
        watermark: Some(since.as_str().to_owned()),
        next_watermark: None,
        outcome: RunOutcome::NoNewData,
    };

    let (orders, freshest) = match client.fetch_orders(&token, &since, &until).await? {
        OrdersFetch::NoNewData { .. } => return Ok(report),
        OrdersFetch::Fetched { orders, freshest } => (orders, freshest),
    };

    let rows = orders
        .into_iter()
        .map(OrderRecord::into_row)
        .collect::<Vec<Row>>();
    let load = destination.load(&LoadRequest {
        pipeline: ORDERS_PIPELINE,
        schema: &schema,
        rows: &rows,
        cursor: Some(CursorUpdate {
            key,
            value: freshest.as_str().to_owned(),
        }),
    })?;

    report.next_watermark = Some(freshest.as_str().to_owned());
    report.outcome = RunOutcome::Loaded { load };
    Ok(report)
}

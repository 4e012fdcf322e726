//! # Haulage Core
//!
//! Fetchers, transforms and pipeline runs for the haulage ETL.
//!
//! ## Overview
//!
//! Two flows move upstream data into the local warehouse:
//!
//! - **Ad metrics**: a 7-day ad report is fetched with bounded retry on
//!   HTTP 429, mapped field by field, and replaces the destination table.
//! - **Orders**: orders newer than the stored `updated_at` watermark are
//!   fetched over GraphQL, enriched with line items under a credit budget,
//!   and merged by `id`. The watermark advances with the load.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Upstream API clients |
//! | [`config`] | Environment settings and destination credentials |
//! | [`cursor`] | Watermark parsing and comparison |
//! | [`domain`] | Report window and order records |
//! | [`error`] | Pipeline and validation errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`logging`] | Tracing subscriber setup |
//! | [`pipeline`] | The two flow runs |
//! | [`retry`] | 429 retry loop |
//! | [`schedule`] | Cron trigger definitions |
//! | [`sleep`] | Injectable sleeping |
//! | [`throttling`] | GraphQL credit tracking |
//! | [`transform`] | Ad-report field mapping |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use haulage_core::{run_ad_metrics, AppLovinClient, ReportWindow, ReqwestHttpClient, TokioSleeper};
//! use haulage_warehouse::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AppLovinClient::new(
//!         std::env::var("APPLOVIN_API_KEY")?,
//!         Arc::new(ReqwestHttpClient::new()),
//!         Arc::new(TokioSleeper),
//!     );
//!     let warehouse = Warehouse::open_default()?;
//!     let report = run_ad_metrics(&client, &warehouse, ReportWindow::last_seven_days()).await?;
//!     println!("{}", serde_json::to_string(&report)?);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod cursor;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod schedule;
pub mod sleep;
pub mod throttling;
pub mod transform;

#[cfg(test)]
mod testing;

pub use adapters::{AccessToken, AppLovinClient, OrdersFetch, ShipHeroClient, ShipHeroCredentials};
pub use config::{ServiceAccountKey, Settings};
pub use cursor::{Watermark, INITIAL_WATERMARK};
pub use domain::{OrderRecord, ReportWindow};
pub use error::{PipelineError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LoggingError};
pub use pipeline::{run_ad_metrics, run_orders, Flow, RunOutcome, RunReport};
pub use retry::{execute_with_retry, RetryConfig};
pub use schedule::{ScheduleDefinition, ScheduleInfo, ScheduleStatus};
pub use sleep::{RecordingSleeper, Sleeper, TokioSleeper};
pub use throttling::{CreditState, CreditTracker};

pub use haulage_warehouse::{
    QueryGuardrails, QueryResult, Warehouse, WarehouseConfig, WarehouseError,
};

//! CLI argument definitions for haulage.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ads run` | Load the last 7 days of ad metrics (replace) |
//! | `orders run` | Load orders newer than the watermark (merge) |
//! | `state show` | Print persisted cursors |
//! | `sql` | Query the local DuckDB warehouse |
//! | `schedule list` | List cron triggers |
//! | `schedule start` | Run a trigger loop in the foreground |
//!
//! # Examples
//!
//! ```bash
//! haulage ads run --pretty
//! haulage orders run --orders-limit 100
//! haulage sql "SELECT COUNT(*) FROM dagster_shiphero.orders"
//! haulage schedule start applovin_advertiser_daily
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Move ad metrics and orders into a local warehouse.
#[derive(Debug, Parser)]
#[command(name = "haulage", author, version, about = "Ad-metrics and orders ETL")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Directory holding the warehouse file.
    #[arg(long, global = true, env = "HAULAGE_HOME")]
    pub home: Option<PathBuf>,

    /// Orders requested per page.
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub orders_limit: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ad-metrics pipeline.
    Ads(FlowArgs),

    /// Orders pipeline.
    Orders(FlowArgs),

    /// Inspect persisted pipeline state.
    State(StateArgs),

    /// Run a read-only SQL query against the warehouse.
    ///
    /// Queries run with a row limit and a timeout. Only SELECT, WITH,
    /// EXPLAIN, SHOW and DESCRIBE statements are accepted.
    Sql(SqlArgs),

    /// Cron triggers.
    Schedule(ScheduleArgs),
}

#[derive(Debug, Args)]
pub struct FlowArgs {
    #[command(subcommand)]
    pub command: FlowCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum FlowCommand {
    /// Run the pipeline once and print the run report.
    Run,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum StateCommand {
    /// Print every stored cursor.
    Show,
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// SQL query to execute.
    pub query: String,

    /// Maximum number of rows to return.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub command: ScheduleCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// List trigger definitions with status and next fire time.
    List,

    /// Run a trigger in the foreground until interrupted.
    Start(ScheduleStartArgs),
}

#[derive(Debug, Args)]
pub struct ScheduleStartArgs {
    /// Trigger name, e.g. `applovin_advertiser_daily`.
    pub name: String,
}

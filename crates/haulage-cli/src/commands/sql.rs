use haulage_core::Settings;
use haulage_warehouse::{QueryGuardrails, QueryResult, Warehouse};
use tracing::warn;

use crate::cli::SqlArgs;
use crate::error::CliError;

pub fn run(args: &SqlArgs, settings: &Settings) -> Result<QueryResult, CliError> {
    let query = args.query.trim();
    if query.is_empty() {
        return Err(CliError::Command(String::from("query must not be empty")));
    }

    let warehouse = Warehouse::open(settings.warehouse_config())?;
    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };

    let result = warehouse.execute_query(query, guardrails)?;
    if result.truncated {
        warn!(
            rows = result.row_count,
            "result truncated (use --max-rows to increase limit)"
        );
    }
    Ok(result)
}

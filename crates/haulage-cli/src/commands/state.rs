use haulage_core::Settings;
use haulage_warehouse::{CursorRecord, Warehouse};

use crate::error::CliError;

pub fn show(settings: &Settings) -> Result<Vec<CursorRecord>, CliError> {
    let warehouse = Warehouse::open(settings.warehouse_config())?;
    Ok(warehouse.cursors()?)
}

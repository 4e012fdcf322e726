use haulage_core::{run_orders, RunReport, Settings, ShipHeroClient};
use haulage_warehouse::Warehouse;
use time::OffsetDateTime;

use crate::error::CliError;

pub async fn run(settings: &Settings) -> Result<RunReport, CliError> {
    let credentials = settings.shiphero_credentials()?;
    let client = ShipHeroClient::new(super::http_client(), super::sleeper())
        .with_orders_limit(settings.orders_limit)
        .with_retry(settings.retry_config());
    let warehouse = Warehouse::open(settings.warehouse_config())?;

    Ok(run_orders(&client, &credentials, &warehouse, OffsetDateTime::now_utc()).await?)
}

use haulage_core::{run_ad_metrics, AppLovinClient, ReportWindow, RunReport, Settings};
use haulage_warehouse::Warehouse;

use crate::error::CliError;

pub async fn run(settings: &Settings) -> Result<RunReport, CliError> {
    let api_key = settings.applovin_api_key()?;
    let client = AppLovinClient::new(api_key, super::http_client(), super::sleeper())
        .with_retry(settings.retry_config());
    let warehouse = Warehouse::open(settings.warehouse_config())?;

    Ok(run_ad_metrics(&client, &warehouse, ReportWindow::last_seven_days()).await?)
}

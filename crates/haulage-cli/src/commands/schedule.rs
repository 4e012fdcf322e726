use std::time::Duration;

use chrono::Utc;
use haulage_core::schedule::{self, ScheduleInfo};
use haulage_core::Settings;
use tracing::{error, info};

use crate::cli::ScheduleStartArgs;
use crate::error::CliError;
use crate::output;

pub fn list() -> Result<Vec<ScheduleInfo>, CliError> {
    let now = Utc::now();
    Ok(schedule::definitions()?
        .iter()
        .map(|definition| definition.info(now))
        .collect())
}

/// Fire the named trigger on its cron schedule until Ctrl-C.
///
/// A failed run is logged and the loop waits for the next fire time.
pub async fn start(args: &ScheduleStartArgs, settings: &Settings, pretty: bool) -> Result<(), CliError> {
    let definition = schedule::find(&args.name)?;
    info!(
        trigger = definition.name(),
        cron = definition.cron(),
        target = %definition.target(),
        "trigger started"
    );

    loop {
        let now = Utc::now();
        let Some(next) = definition.next_fire_after(now) else {
            return Err(CliError::Command(format!(
                "trigger '{}' has no upcoming fire time",
                definition.name()
            )));
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(trigger = definition.name(), next_fire = %next, "waiting for next fire");

        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!(trigger = definition.name(), "trigger stopped");
                return Ok(());
            }
        }

        match super::run_flow(definition.target(), settings).await {
            Ok(report) => output::render(&report, pretty)?,
            Err(run_error) => error!(
                trigger = definition.name(),
                exit_code = run_error.exit_code(),
                error = %run_error,
                "scheduled run failed"
            ),
        }
    }
}

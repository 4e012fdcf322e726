mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use haulage_core::{init_logging, LogConfig, Settings};
use std::process::ExitCode;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::error::CliError;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = prepare(&cli)?;

    // The environment is final by now; worker threads may read it freely.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::run(&cli, &settings))
}

/// Resolve settings, install logging and publish destination credentials.
///
/// Runs on the main thread before any runtime worker exists.
fn prepare(cli: &Cli) -> Result<Settings, CliError> {
    // Settings first so `.env` can carry the log level too.
    let settings = Settings::from_env()?;
    init_logging(&LogConfig::from_env()?)?;
    if let Some(path) = &settings.env_file {
        info!(path = %path.display(), "loaded .env");
    }

    let settings = apply_overrides(settings, cli);
    debug!(?settings, "resolved settings");

    if let Some(key) = &settings.service_account {
        key.export_to_env();
    }
    Ok(settings)
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(home) = &cli.home {
        settings = settings.with_home(home.clone());
    }
    if let Some(limit) = cli.orders_limit {
        settings.orders_limit = limit;
    }
    settings
}

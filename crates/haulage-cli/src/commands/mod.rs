mod ads;
mod orders;
mod schedule;
mod sql;
mod state;

use std::sync::Arc;

use haulage_core::{Flow, HttpClient, ReqwestHttpClient, RunReport, Settings, Sleeper, TokioSleeper};

use crate::cli::{Cli, Command, FlowCommand, ScheduleCommand, StateCommand};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli, settings: &Settings) -> Result<(), CliError> {
    match &cli.command {
        Command::Ads(args) => match args.command {
            FlowCommand::Run => output::render(&ads::run(settings).await?, cli.pretty),
        },
        Command::Orders(args) => match args.command {
            FlowCommand::Run => output::render(&orders::run(settings).await?, cli.pretty),
        },
        Command::State(args) => match args.command {
            StateCommand::Show => output::render(&state::show(settings)?, cli.pretty),
        },
        Command::Sql(args) => output::render(&sql::run(args, settings)?, cli.pretty),
        Command::Schedule(args) => match &args.command {
            ScheduleCommand::List => output::render(&schedule::list()?, cli.pretty),
            ScheduleCommand::Start(start) => schedule::start(start, settings, cli.pretty).await,
        },
    }
}

/// Run one flow with production clients.
pub async fn run_flow(flow: Flow, settings: &Settings) -> Result<RunReport, CliError> {
    match flow {
        Flow::AdMetrics => ads::run(settings).await,
        Flow::Orders => orders::run(settings).await,
    }
}

fn http_client() -> Arc<dyn HttpClient> {
    Arc::new(ReqwestHttpClient::new())
}

fn sleeper() -> Arc<dyn Sleeper> {
    Arc::new(TokioSleeper)
}

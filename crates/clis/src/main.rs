//! `clis`: provision command-line tools into a bin directory.

mod cli;
mod commands;
mod shutdown;
mod tracing;

use crate::commands::{Command, Overrides};
use ::tracing::Instrument;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// Exit status after a termination signal.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if let Err(error) = crate::tracing::init_tracing(cli.tracing_config()) {
        eprintln!("{error:?}");
        return ExitCode::FAILURE;
    }

    let shutdown = shutdown::install_signal_handlers();

    let span = ::tracing::info_span!("clis", run_id = %crate::tracing::run_id());
    match run(cli, shutdown.token()).instrument(span).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(_) if shutdown.is_shutdown() => {
            eprintln!("clis: interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: cli::Cli, cancel: &CancellationToken) -> miette::Result<String> {
    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Unable to determine the working directory: {e}"))?;
    let overrides = Overrides {
        config: cli.config,
        bin_dir: cli.bin_dir,
        concurrency: cli.concurrency,
    };
    let config = commands::load_config(&overrides, &cwd)?;
    let command: Command = cli.command.into();

    commands::execute(command, &config, &cwd, cli.json, cancel).await
}

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use cli::{Cli, Command};
use commands::Commands;
use config::CliConfig;
use error::CliError;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries command output, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> switchyard_core::Result<(), CliError> {
    let config = CliConfig::load(cli.config.as_deref()).map_err(|e| CliError::Config {
        details: e.to_string(),
    })?;
    tracing::debug!(?config, "loaded configuration");

    let commands = Commands::new(config);
    match cli.command {
        Command::Run(args) => commands.run(args).await,
        Command::Resume(args) => commands.resume(args).await,
        Command::Cancel(args) => commands.cancel(args).await,
        Command::Analyze(args) => commands.analyze(args),
        Command::Apply(args) => commands.apply(args),
    }
}

//! autocron - persistent cron-style job scheduler
//!
//! Main entry point for the CLI and the scheduler daemon.

mod cli;
mod commands;
mod daemon;
mod logging;
mod wiring;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use autocron_config::{ConfigLoader, ConfigValidator};

use crate::cli::{Cli, Commands};
use crate::commands::OneShot;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ConfigLoader::default_path);
    let config = ConfigLoader::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    logging::init_tracing(&config.logging)?;

    let warnings = ConfigValidator::validate(&config)
        .into_result()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
    for issue in &warnings {
        warn!(field = %issue.path, "{}", issue.message);
    }

    let command = match cli.command {
        Commands::Run => {
            daemon::run(config).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Describe { expression } => return Ok(print(commands::describe(&expression))),
        Commands::Add(job) => OneShot::Add(job.into_spec()),
        Commands::Replace { id, job } => OneShot::Replace(id, job.into_spec()),
        Commands::List => OneShot::List,
        Commands::Info { id } => OneShot::Info(id),
        Commands::Cancel { id } => OneShot::Cancel(id),
        Commands::CancelAll => OneShot::CancelAll,
    };

    let wiring = wiring::build(&config);
    Ok(print(commands::execute(&wiring.service, command).await))
}

fn print(result: Result<String, autocron_core::CronError>) -> ExitCode {
    match result {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

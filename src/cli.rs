//! CLI definitions for autocron.

use std::path::PathBuf;

use autocron_protocols::{Constraints, JobId, JobSpec, NetworkClass};
use clap::{Args, Parser, Subcommand};

/// autocron CLI.
#[derive(Parser)]
#[command(name = "autocron")]
#[command(about = "Persistent cron-style job scheduler with resource constraints")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.autocron/config.toml)
    #[arg(short, long, global = true, env = "AUTOCRON_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler daemon in the foreground
    Run,

    /// Schedule a new job
    Add(JobArgs),

    /// Replace the definition of an existing job, keeping its id
    Replace {
        /// Job id
        id: JobId,

        #[command(flatten)]
        job: JobArgs,
    },

    /// List all jobs, one line each
    List,

    /// Show details of a job
    Info {
        /// Job id
        id: JobId,
    },

    /// Delete a job
    Cancel {
        /// Job id
        id: JobId,
    },

    /// Delete every job
    CancelAll,

    /// Explain a cron expression in words
    Describe {
        /// Cron expression, quoted
        expression: String,
    },
}

/// Job definition flags shared by `add` and `replace`.
#[derive(Args)]
pub(crate) struct JobArgs {
    /// Cron expression, e.g. "*/15 * * * *"
    #[arg(long)]
    pub cron: Option<String>,

    /// Absolute path of an executable script
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Fire at the exact trigger time instead of within a window
    #[arg(long)]
    pub exact: bool,

    /// Network requirement: not_required, connected, unmetered, not_roaming, metered
    #[arg(long, default_value = "not_required")]
    pub network: NetworkClass,

    /// Require the battery not to be low
    #[arg(long)]
    pub battery_not_low: bool,

    /// Require the device to be charging
    #[arg(long)]
    pub charging: bool,

    /// Require the device to be idle
    #[arg(long)]
    pub idle: bool,

    /// Require free storage
    #[arg(long)]
    pub storage_not_low: bool,

    /// Give up waiting for constraints after this many ms (0 = wait forever)
    #[arg(long, default_value_t = 0)]
    pub constraint_timeout_ms: u64,

    /// Grace period between SIGTERM and kill
    #[arg(long)]
    pub grace_ms: Option<u64>,

    /// Keep running when constraints stop holding
    #[arg(long)]
    pub continue_on_break: bool,

    /// Maximum runtime in ms (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    pub max_runtime_ms: u64,
}

impl JobArgs {
    pub fn into_spec(self) -> JobSpec {
        JobSpec {
            cron_expression: self.cron,
            script_path: self.script,
            exact: self.exact,
            constraints: Constraints {
                network: self.network,
                battery_not_low: self.battery_not_low,
                charging: self.charging,
                device_idle: self.idle,
                storage_not_low: self.storage_not_low,
            },
            constraint_timeout_ms: self.constraint_timeout_ms,
            grace_period_ms: self.grace_ms,
            continue_on_constraint_break: self.continue_on_break,
            max_runtime_ms: self.max_runtime_ms,
        }
    }
}

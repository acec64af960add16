//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Base directory for autocron state, `~/.autocron`.
pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autocron")
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub constraints: ConstraintsConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Job list persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

fn default_store_path() -> PathBuf {
    default_base_dir().join("jobs.json")
}

/// Alarm policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tolerance window of inexact alarms.
    #[serde(default = "default_inexact_window")]
    pub inexact_window_secs: u64,

    /// Inexact alarms are aligned up to a multiple of this.
    #[serde(default = "default_alarm_granularity")]
    pub alarm_granularity_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            inexact_window_secs: default_inexact_window(),
            alarm_granularity_secs: default_alarm_granularity(),
        }
    }
}

impl SchedulerConfig {
    pub fn inexact_window(&self) -> Duration {
        Duration::from_secs(self.inexact_window_secs)
    }

    pub fn alarm_granularity(&self) -> Duration {
        Duration::from_secs(self.alarm_granularity_secs)
    }
}

fn default_inexact_window() -> u64 {
    600
}

fn default_alarm_granularity() -> u64 {
    60
}

/// Device condition thresholds and polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintsConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Battery at or below this percentage counts as low.
    #[serde(default = "default_battery_low")]
    pub battery_low_percent: u8,

    /// Free space at or below this percentage counts as low.
    #[serde(default = "default_storage_low")]
    pub storage_low_percent: u8,

    /// 1-minute load average under which the device counts as idle.
    #[serde(default = "default_idle_load")]
    pub idle_load_threshold: f64,

    /// Filesystem checked for storage; defaults to the base directory.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            battery_low_percent: default_battery_low(),
            storage_low_percent: default_storage_low(),
            idle_load_threshold: default_idle_load(),
            storage_path: None,
        }
    }
}

impl ConstraintsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(default_base_dir)
    }
}

fn default_poll_interval() -> u64 {
    30
}

fn default_battery_low() -> u8 {
    15
}

fn default_storage_low() -> u8 {
    10
}

fn default_idle_load() -> f64 {
    0.5
}

/// Script execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Forward script stdout/stderr lines to the log.
    #[serde(default = "default_true")]
    pub forward_output: bool,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { forward_output: true, working_dir: None }
    }
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), dir: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

//! Shared data types: job entries, specs and constraint sets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a stored job. Assigned by the job store, never reused
/// while a store instance is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Network requirement of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkClass {
    /// No network needed.
    #[default]
    NotRequired,
    /// Any working connection.
    Connected,
    /// A connection that is not billed per byte.
    Unmetered,
    /// A connection that is not roaming.
    NotRoaming,
    /// A metered (typically cellular) connection.
    Metered,
}

impl NetworkClass {
    /// Single-letter initial used in summary lines.
    pub fn initial(&self) -> Option<char> {
        match self {
            NetworkClass::NotRequired => None,
            NetworkClass::Connected => Some('C'),
            NetworkClass::Unmetered => Some('U'),
            NetworkClass::NotRoaming => Some('N'),
            NetworkClass::Metered => Some('M'),
        }
    }

    /// Check whether the given network state satisfies this class.
    pub fn allows(&self, state: &NetworkState) -> bool {
        match self {
            NetworkClass::NotRequired => true,
            NetworkClass::Connected => state.connected,
            NetworkClass::Unmetered => state.connected && !state.metered,
            NetworkClass::NotRoaming => state.connected && !state.roaming,
            NetworkClass::Metered => state.connected && state.metered,
        }
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkClass::NotRequired => "not_required",
            NetworkClass::Connected => "connected",
            NetworkClass::Unmetered => "unmetered",
            NetworkClass::NotRoaming => "not_roaming",
            NetworkClass::Metered => "metered",
        };
        write!(f, "{s}")
    }
}

impl FromStr for NetworkClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" | "not_required" => Ok(NetworkClass::NotRequired),
            "any" | "connected" => Ok(NetworkClass::Connected),
            "unmetered" => Ok(NetworkClass::Unmetered),
            "not_roaming" => Ok(NetworkClass::NotRoaming),
            "metered" | "cellular" => Ok(NetworkClass::Metered),
            other => Err(format!("unknown network class: {other}")),
        }
    }
}

/// Resource conditions that must all hold before a job may run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub network: NetworkClass,

    #[serde(default)]
    pub battery_not_low: bool,

    #[serde(default)]
    pub charging: bool,

    #[serde(default)]
    pub device_idle: bool,

    #[serde(default)]
    pub storage_not_low: bool,
}

impl Constraints {
    /// True when no condition is requested.
    pub fn is_empty(&self) -> bool {
        self.network == NetworkClass::NotRequired
            && !self.battery_not_low
            && !self.charging
            && !self.device_idle
            && !self.storage_not_low
    }

    /// Short letter code, e.g. `U-BC` for unmetered network, battery not
    /// low and charging. Empty when unconstrained.
    pub fn code(&self) -> String {
        let mut code = String::new();
        if let Some(initial) = self.network.initial() {
            code.push(initial);
            code.push('-');
        }
        for (set, letter) in [
            (self.battery_not_low, 'B'),
            (self.charging, 'C'),
            (self.device_idle, 'I'),
            (self.storage_not_low, 'S'),
        ] {
            if set {
                code.push(letter);
            }
        }
        code
    }
}

/// Observed network state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkState {
    pub connected: bool,
    pub metered: bool,
    pub roaming: bool,
}

/// A snapshot of the device conditions relevant to constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceConditions {
    pub network: NetworkState,
    pub battery_low: bool,
    pub charging: bool,
    pub idle: bool,
    pub storage_low: bool,
}

impl DeviceConditions {
    /// Check whether every requested constraint holds.
    pub fn satisfies(&self, constraints: &Constraints) -> bool {
        constraints.network.allows(&self.network)
            && (!constraints.battery_not_low || !self.battery_low)
            && (!constraints.charging || self.charging)
            && (!constraints.device_idle || self.idle)
            && (!constraints.storage_not_low || !self.storage_low)
    }
}

fn default_grace_period_ms() -> u64 {
    5_000
}

/// A persisted job. The only durable entity of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: JobId,

    /// Five-field UNIX cron expression.
    pub cron_expression: String,

    /// Absolute path of the executable to run.
    pub script_path: PathBuf,

    /// Fire at the precise instant instead of within a tolerance window.
    #[serde(default)]
    pub exact: bool,

    #[serde(default)]
    pub constraints: Constraints,

    /// How long to wait for constraints before giving up (0 = forever).
    #[serde(default)]
    pub constraint_timeout_ms: u64,

    /// Time a runaway execution gets to exit after SIGTERM.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    #[serde(default)]
    pub continue_on_constraint_break: bool,

    /// Wall-clock bound on one execution (0 = unbounded).
    #[serde(default)]
    pub max_runtime_ms: u64,
}

impl JobEntry {
    /// Build an entry from a spec whose required fields are present.
    pub fn from_spec(id: JobId, spec: &JobSpec) -> Result<Self, ValidationError> {
        let (cron_expression, script_path) = spec.required()?;
        Ok(Self {
            id,
            cron_expression: cron_expression.to_string(),
            script_path: script_path.to_path_buf(),
            exact: spec.exact,
            constraints: spec.constraints.clone(),
            constraint_timeout_ms: spec.constraint_timeout_ms,
            grace_period_ms: spec.grace_period_ms.unwrap_or_else(default_grace_period_ms),
            continue_on_constraint_break: spec.continue_on_constraint_break,
            max_runtime_ms: spec.max_runtime_ms,
        })
    }

    /// Whether the constraint machinery is needed at all.
    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Constraint code as shown in summaries, with `!` for exact jobs.
    pub fn constraint_code(&self) -> String {
        let mut code = self.constraints.code();
        if self.exact {
            code.push('!');
        }
        code
    }
}

/// User-supplied description of a job to schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub cron_expression: Option<String>,

    #[serde(default)]
    pub script_path: Option<PathBuf>,

    #[serde(default)]
    pub exact: bool,

    #[serde(default)]
    pub constraints: Constraints,

    #[serde(default)]
    pub constraint_timeout_ms: u64,

    #[serde(default)]
    pub grace_period_ms: Option<u64>,

    #[serde(default)]
    pub continue_on_constraint_break: bool,

    #[serde(default)]
    pub max_runtime_ms: u64,
}

impl JobSpec {
    /// Create a spec with the two required fields.
    pub fn new(cron_expression: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            cron_expression: Some(cron_expression.into()),
            script_path: Some(script_path.into()),
            ..Default::default()
        }
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_constraint_timeout_ms(mut self, ms: u64) -> Self {
        self.constraint_timeout_ms = ms;
        self
    }

    pub fn with_grace_period_ms(mut self, ms: u64) -> Self {
        self.grace_period_ms = Some(ms);
        self
    }

    pub fn with_continue_on_constraint_break(mut self, keep_running: bool) -> Self {
        self.continue_on_constraint_break = keep_running;
        self
    }

    pub fn with_max_runtime_ms(mut self, ms: u64) -> Self {
        self.max_runtime_ms = ms;
        self
    }

    /// Return the cron expression and script path, or the first missing field.
    pub fn required(&self) -> Result<(&str, &Path), ValidationError> {
        let cron = self
            .cron_expression
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("cron_expression"))?;
        let script = self
            .script_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ValidationError::MissingField("script_path"))?;
        Ok((cron, script))
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;

//! # autocron Runtime
//!
//! Default collaborators for running autocron as an ordinary host process:
//!
//! - [`TokioAlarmService`] - timer tasks on the tokio runtime
//! - [`LocalConstraintScheduler`] - polls a [`ConditionProbe`] for enqueued work
//! - [`SystemProbe`] - reads battery, network, storage and load from the OS
//! - [`ProcessRunner`] - runs job scripts as child processes
//!
//! [`ConditionProbe`]: autocron_protocols::ConditionProbe

pub mod alarm;
pub mod constraints;
pub mod probe;
pub mod process;

pub use alarm::TokioAlarmService;
pub use constraints::LocalConstraintScheduler;
pub use probe::{ProbeSettings, SystemProbe};
pub use process::{ProcessRunner, ProcessSettings};

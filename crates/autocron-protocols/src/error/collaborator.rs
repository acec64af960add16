//! Errors reported by the alarm, constraint and process collaborators.

use std::path::PathBuf;

use thiserror::Error;

use crate::executor::ExecutionHandle;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("Alarm rejected: {0}")]
    Rejected(String),

    #[error("Alarm service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("Work request rejected: {0}")]
    Rejected(String),

    #[error("Constraint scheduler unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to start '{}': {reason}", path.display())]
    Spawn { path: PathBuf, reason: String },

    #[error("Execution {0:?} is not running")]
    NotRunning(ExecutionHandle),

    #[error("Failed to signal execution: {0}")]
    Signal(String),
}

//! Umbrella error of the scheduler core.

use autocron_protocols::{
    AlarmError, ConstraintError, ExecutorError, JobId, ScheduleError, StoreError, ValidationError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Alarm(#[from] AlarmError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl CronError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CronError::NotFound(_))
    }
}

pub type CronResult<T> = Result<T, CronError>;

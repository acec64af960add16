//! Cron evaluation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Cannot parse cron expression '{expression}': {reason}")]
    Unparseable { expression: String, reason: String },

    #[error("Cron expression '{0}' has no upcoming trigger")]
    NoUpcoming(String),
}

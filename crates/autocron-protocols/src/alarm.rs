//! Alarm service protocol.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AlarmError;
use crate::types::JobId;

/// What an alarm is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmKind {
    /// The next cron trigger of the job.
    Trigger,
    /// Fallback that gives up waiting for constraints of one trigger.
    ConstraintTimeout { trigger: u64 },
}

/// Identity of an alarm. At most one alarm per key is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlarmKey {
    pub job: JobId,
    pub kind: AlarmKind,
}

impl AlarmKey {
    pub fn trigger(job: JobId) -> Self {
        Self { job, kind: AlarmKind::Trigger }
    }

    pub fn constraint_timeout(job: JobId, trigger: u64) -> Self {
        Self { job, kind: AlarmKind::ConstraintTimeout { trigger } }
    }
}

/// Opaque handle of an armed alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmHandle(pub u64);

/// Parameters for arming an alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRequest {
    pub key: AlarmKey,
    /// Earliest instant the alarm may fire.
    pub at: DateTime<Utc>,
    /// Fire precisely at `at` instead of within `window`.
    pub exact: bool,
    /// Tolerance for inexact alarms.
    pub window: Duration,
}

/// Wakes the scheduler at a wall-clock instant, delivering
/// `CronEvent::AlarmFired(key)` when the alarm goes off.
#[async_trait]
pub trait AlarmService: Send + Sync {
    /// Arm an alarm. An existing alarm with the same key is replaced.
    async fn arm(&self, request: AlarmRequest) -> Result<AlarmHandle, AlarmError>;

    /// Disarm an alarm. Unknown or already-fired handles are ignored.
    async fn disarm(&self, handle: AlarmHandle);
}

//! Constraint scheduler protocol.

use async_trait::async_trait;

use crate::error::ConstraintError;
use crate::types::{Constraints, DeviceConditions, JobId};

/// Opaque handle of a unit of constrained work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkHandle(pub u64);

/// Lifecycle of a unit of constrained work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Waiting for constraints.
    Enqueued,
    /// Constraints were satisfied and the work was handed out.
    Running,
    /// Unknown, cancelled or completed.
    Absent,
}

/// Holds work until its constraints are satisfied.
///
/// Delivers `CronEvent::ConstraintsSatisfied` once constraints hold and
/// `CronEvent::ConstraintsBroken` if they stop holding while the work is
/// running.
#[async_trait]
pub trait ConstraintScheduler: Send + Sync {
    /// Enqueue work for a job.
    async fn enqueue(
        &self,
        job: JobId,
        constraints: &Constraints,
    ) -> Result<WorkHandle, ConstraintError>;

    /// Drop work. No events are delivered for it afterwards.
    async fn cancel(&self, handle: WorkHandle);

    /// Mark running work as done.
    async fn complete(&self, handle: WorkHandle);

    /// Current status of work.
    fn status_of(&self, handle: WorkHandle) -> WorkStatus;
}

/// Samples current device conditions.
pub trait ConditionProbe: Send + Sync {
    fn sample(&self) -> DeviceConditions;
}

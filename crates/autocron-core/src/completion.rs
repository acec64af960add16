//! Registry of completion signals for dispatched executions.
//!
//! One entry per job between dispatch and the end of its run. The
//! collaborator's completion event and the coordinator's own timeout can
//! race, so resolving an absent or already-finished entry is a no-op.

use autocron_protocols::{ExecutionHandle, ExecutionReport, JobId};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// What the waiting coordinator is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Finished { success: bool, exit_code: Option<i32> },
    ConstraintsBroken,
}

struct Pending {
    trigger: u64,
    execution: Option<ExecutionHandle>,
    tx: mpsc::UnboundedSender<Resolution>,
}

#[derive(Default)]
pub struct CompletionRegistry {
    pending: DashMap<JobId, Pending>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the signal for a trigger, replacing any earlier one.
    pub fn register(&self, job: JobId, trigger: u64) -> mpsc::UnboundedReceiver<Resolution> {
        self.sweep();
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.insert(
            job,
            Pending {
                trigger,
                execution: None,
                tx,
            },
        );
        rx
    }

    /// Record which execution the signal belongs to.
    pub fn attach(&self, job: JobId, trigger: u64, execution: ExecutionHandle) -> bool {
        match self.pending.get_mut(&job) {
            Some(mut pending) if pending.trigger == trigger => {
                pending.execution = Some(execution);
                true
            }
            _ => false,
        }
    }

    /// Deliver an execution report. Reports for other executions of the
    /// same job are dropped.
    pub fn resolve_finished(&self, report: &ExecutionReport) -> bool {
        let delivered = match self.pending.get(&report.job) {
            Some(pending) if pending.execution == Some(report.execution) => pending
                .tx
                .send(Resolution::Finished {
                    success: report.success,
                    exit_code: report.exit_code,
                })
                .is_ok(),
            _ => false,
        };
        if !delivered {
            debug!(job_id = %report.job, execution = ?report.execution, "No waiter for execution report");
        }
        delivered
    }

    /// Deliver a resolution to the waiter of one trigger.
    pub fn resolve(&self, job: JobId, trigger: u64, resolution: Resolution) -> bool {
        match self.pending.get(&job) {
            Some(pending) if pending.trigger == trigger => pending.tx.send(resolution).is_ok(),
            _ => false,
        }
    }

    pub fn remove(&self, job: JobId, trigger: u64) {
        self.pending.remove_if(&job, |_, pending| pending.trigger == trigger);
    }

    /// Drop entries whose waiter has gone away.
    pub fn sweep(&self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pending| !pending.tx.is_closed());
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

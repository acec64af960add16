//! Per-trigger state machine.
//!
//! Each firing of a job's trigger alarm starts one trigger, identified by a
//! sequence number. All collaborator events for the trigger are applied
//! through [`TriggerState::on`]; inputs that are illegal in the current
//! state are ignored, and events carrying another trigger's sequence are
//! stale. Reaching a terminal state removes the trigger, releases its
//! constrained work and arms the job's next trigger.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use autocron_protocols::{ConstraintScheduler, ExecutionHandle, JobEntry, JobId, WorkHandle};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerState {
    Triggered,
    ConstraintsPending,
    Dispatched,
    Running,
    Completed,
    TimedOut,
    Cancelled,
    ConstraintTimedOut,
    /// A collaborator refused the hand-off.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerInput {
    /// The job has no constraints.
    Unconstrained,
    /// Work was enqueued with the constraint scheduler.
    Enqueued,
    ConstraintsSatisfied,
    FallbackExpired,
    Started,
    Finished,
    RuntimeExceeded,
    ConstraintsBroken { keep_running: bool },
    /// The completion channel closed without a result.
    Lost,
    HandOffFailed,
    /// The job was deleted while its trigger waited for constraints.
    Withdrawn,
}

impl TriggerState {
    /// The transition function. `None` means the input is ignored.
    pub fn on(self, input: TriggerInput) -> Option<TriggerState> {
        use TriggerInput as I;
        use TriggerState as S;

        match (self, input) {
            (S::Triggered, I::Unconstrained) => Some(S::Dispatched),
            (S::Triggered, I::Enqueued) => Some(S::ConstraintsPending),
            (S::ConstraintsPending, I::ConstraintsSatisfied) => Some(S::Dispatched),
            (S::ConstraintsPending, I::FallbackExpired) => Some(S::ConstraintTimedOut),
            (S::Dispatched, I::Started) => Some(S::Running),
            (S::Running, I::Finished) => Some(S::Completed),
            (S::Running, I::RuntimeExceeded) => Some(S::TimedOut),
            (S::Running, I::ConstraintsBroken { keep_running: false }) => Some(S::Cancelled),
            (S::Running, I::Lost) => Some(S::Failed),
            (S::ConstraintsPending, I::Withdrawn) => Some(S::Cancelled),
            (S::Triggered | S::ConstraintsPending | S::Dispatched, I::HandOffFailed) => {
                Some(S::Failed)
            }
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TriggerState::Completed
                | TriggerState::TimedOut
                | TriggerState::Cancelled
                | TriggerState::ConstraintTimedOut
                | TriggerState::Failed
        )
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A live trigger.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub seq: u64,
    pub state: TriggerState,
    /// Snapshot of the job taken when the trigger fired.
    pub entry: JobEntry,
    pub work: Option<WorkHandle>,
    pub execution: Option<ExecutionHandle>,
}

/// Result of applying an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Applied(TriggerState),
    /// Illegal in the current state.
    Ignored(TriggerState),
    /// No live trigger with that sequence.
    Stale,
}

/// Live triggers, at most one per job.
pub struct Triggers {
    next_seq: AtomicU64,
    live: Mutex<HashMap<JobId, Trigger>>,
    scheduler: Arc<Scheduler>,
    constraints: Arc<dyn ConstraintScheduler>,
}

impl Triggers {
    pub fn new(scheduler: Arc<Scheduler>, constraints: Arc<dyn ConstraintScheduler>) -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
            scheduler,
            constraints,
        }
    }

    /// Start a trigger for the entry. `None` while an earlier trigger of
    /// the same job is still in flight.
    pub fn begin(&self, entry: &JobEntry) -> Option<u64> {
        let mut live = self.live.lock();
        if let Some(current) = live.get(&entry.id) {
            warn!(
                job_id = %entry.id,
                trigger = current.seq,
                state = %current.state,
                "Previous trigger still in flight; skipping this occurrence"
            );
            return None;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        live.insert(
            entry.id,
            Trigger {
                seq,
                state: TriggerState::Triggered,
                entry: entry.clone(),
                work: None,
                execution: None,
            },
        );
        debug!(job_id = %entry.id, trigger = seq, "Trigger started");
        Some(seq)
    }

    pub fn current(&self, job: JobId) -> Option<Trigger> {
        self.live.lock().get(&job).cloned()
    }

    pub fn set_work(&self, job: JobId, seq: u64, work: WorkHandle) {
        if let Some(trigger) = self.live.lock().get_mut(&job).filter(|t| t.seq == seq) {
            trigger.work = Some(work);
        }
    }

    pub fn set_execution(&self, job: JobId, seq: u64, execution: ExecutionHandle) {
        if let Some(trigger) = self.live.lock().get_mut(&job).filter(|t| t.seq == seq) {
            trigger.execution = Some(execution);
        }
    }

    /// State the input would move the live trigger `seq` to, without
    /// applying it.
    pub fn peek(&self, job: JobId, seq: u64, input: TriggerInput) -> Option<TriggerState> {
        self.live
            .lock()
            .get(&job)
            .filter(|t| t.seq == seq)
            .and_then(|t| t.state.on(input))
    }

    /// Apply an input to the live trigger `seq` of `job`.
    pub async fn advance(&self, job: JobId, seq: u64, input: TriggerInput) -> Advance {
        let (next, finished) = {
            let mut live = self.live.lock();
            let Some(trigger) = live.get_mut(&job).filter(|t| t.seq == seq) else {
                debug!(job_id = %job, trigger = seq, ?input, "Stale trigger input ignored");
                return Advance::Stale;
            };
            let Some(next) = trigger.state.on(input) else {
                debug!(job_id = %job, trigger = seq, state = %trigger.state, ?input, "Input ignored");
                return Advance::Ignored(trigger.state);
            };
            debug!(job_id = %job, trigger = seq, from = %trigger.state, to = %next, "Trigger transition");
            trigger.state = next;
            if !next.is_terminal() {
                return Advance::Applied(next);
            }
            (next, live.remove(&job))
        };

        if let Some(trigger) = finished {
            self.conclude(trigger).await;
        }
        Advance::Applied(next)
    }

    async fn conclude(&self, trigger: Trigger) {
        let job = trigger.entry.id;
        if let Some(work) = trigger.work {
            // Work that never reached the executor is withdrawn, not completed.
            if trigger.execution.is_none() {
                self.constraints.cancel(work).await;
            } else {
                self.constraints.complete(work).await;
            }
        }
        info!(job_id = %job, trigger = trigger.seq, state = %trigger.state, "Trigger finished");
        self.scheduler.rearm_or_log(job).await;
    }

    /// End a trigger that is still waiting for constraints, cancelling its
    /// work. Triggers that already dispatched are left to finish.
    pub async fn abandon(&self, job: JobId) -> Option<TriggerState> {
        let seq = self
            .live
            .lock()
            .get(&job)
            .filter(|t| t.state == TriggerState::ConstraintsPending)
            .map(|t| t.seq)?;
        match self.advance(job, seq, TriggerInput::Withdrawn).await {
            Advance::Applied(state) => Some(state),
            Advance::Ignored(_) | Advance::Stale => None,
        }
    }

    /// Jobs with a live trigger.
    pub fn jobs(&self) -> Vec<JobId> {
        self.live.lock().keys().copied().collect()
    }

    /// Number of live triggers.
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;

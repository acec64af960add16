//! Dispatcher: turns alarm and constraint events into dispatches.

use std::sync::Arc;

use autocron_protocols::{ConstraintScheduler, JobId, WorkHandle};
use tracing::{debug, error, info};

use crate::coordinator::ExecutionCoordinator;
use crate::scheduler::Scheduler;
use crate::store::JobStore;
use crate::trigger::{Advance, TriggerInput, TriggerState, Triggers};

pub struct Dispatcher {
    store: Arc<JobStore>,
    scheduler: Arc<Scheduler>,
    constraints: Arc<dyn ConstraintScheduler>,
    triggers: Arc<Triggers>,
    coordinator: Arc<ExecutionCoordinator>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<JobStore>,
        scheduler: Arc<Scheduler>,
        constraints: Arc<dyn ConstraintScheduler>,
        triggers: Arc<Triggers>,
        coordinator: Arc<ExecutionCoordinator>,
    ) -> Self {
        Self {
            store,
            scheduler,
            constraints,
            triggers,
            coordinator,
        }
    }

    /// The job's trigger alarm fired.
    pub async fn on_trigger(&self, job: JobId) {
        self.scheduler.trigger_fired(job);

        let entry = match self.store.get_by_id(job).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                info!(job_id = %job, "Trigger for deleted job ignored");
                return;
            }
            Err(e) => {
                error!(job_id = %job, "Failed to load job for trigger: {}", e);
                return;
            }
        };

        let Some(seq) = self.triggers.begin(&entry) else {
            return;
        };
        info!(job_id = %job, trigger = seq, "Trigger fired");

        if !entry.is_constrained() {
            if self.triggers.advance(job, seq, TriggerInput::Unconstrained).await
                == Advance::Applied(TriggerState::Dispatched)
            {
                self.coordinator.dispatch(entry, seq).await;
            }
            return;
        }

        self.scheduler.disarm_constraint_timeout_fallback(job).await;
        let work = match self.constraints.enqueue(job, &entry.constraints).await {
            Ok(work) => work,
            Err(e) => {
                error!(job_id = %job, trigger = seq, "Constraint scheduler refused work: {}", e);
                self.triggers
                    .advance(job, seq, TriggerInput::HandOffFailed)
                    .await;
                return;
            }
        };
        self.triggers.set_work(job, seq, work);
        self.triggers.advance(job, seq, TriggerInput::Enqueued).await;
        debug!(job_id = %job, trigger = seq, work = ?work, code = %entry.constraints.code(), "Waiting for constraints");

        if let Err(e) = self
            .scheduler
            .arm_constraint_timeout_fallback(&entry, seq)
            .await
        {
            error!(job_id = %job, trigger = seq, "Failed to arm constraint fallback: {}", e);
        }
    }

    /// The constraint scheduler started a unit of work.
    pub async fn on_constraints_satisfied(&self, job: JobId, work: WorkHandle) {
        let Some(trigger) = self.triggers.current(job).filter(|t| t.work == Some(work)) else {
            debug!(job_id = %job, work = ?work, "Satisfied constraints for stale work");
            return;
        };
        match self
            .triggers
            .advance(job, trigger.seq, TriggerInput::ConstraintsSatisfied)
            .await
        {
            Advance::Applied(TriggerState::Dispatched) => {
                info!(job_id = %job, trigger = trigger.seq, "Constraints satisfied");
                self.coordinator.dispatch(trigger.entry, trigger.seq).await;
            }
            other => debug!(job_id = %job, trigger = trigger.seq, ?other, "Late constraint satisfaction ignored"),
        }
    }

    /// The constraint-timeout fallback of trigger `seq` fired.
    pub async fn on_constraint_timeout(&self, job: JobId, seq: u64) {
        self.scheduler.fallback_fired(job, seq);
        match self
            .triggers
            .advance(job, seq, TriggerInput::FallbackExpired)
            .await
        {
            Advance::Applied(state) => {
                info!(job_id = %job, trigger = seq, state = %state, "Constraints not met in time");
            }
            other => debug!(job_id = %job, trigger = seq, ?other, "Constraint fallback had no effect"),
        }
    }
}

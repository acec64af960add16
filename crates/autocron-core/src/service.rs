//! CronService: the public operations.

use std::collections::HashSet;
use std::sync::Arc;

use autocron_protocols::{
    AlarmService, ConstraintScheduler, JobEntry, JobId, JobSpec, ProcessExecutor, TextStore,
};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::clock::CronClock;
use crate::coordinator::ExecutionCoordinator;
use crate::dispatcher::Dispatcher;
use crate::engine::CronEngine;
use crate::error::{CronError, CronResult};
use crate::scheduler::{Scheduler, SchedulerPolicy};
use crate::store::JobStore;
use crate::summary::{detail_line, summary_line};
use crate::trigger::{TriggerState, Triggers};

/// The external collaborators the scheduler is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn TextStore>,
    pub alarms: Arc<dyn AlarmService>,
    pub constraints: Arc<dyn ConstraintScheduler>,
    pub executor: Arc<dyn ProcessExecutor>,
}

pub struct CronService {
    store: Arc<JobStore>,
    scheduler: Arc<Scheduler>,
    triggers: Arc<Triggers>,
    engine: CronEngine,
}

impl CronService {
    pub fn new(collaborators: Collaborators, policy: SchedulerPolicy) -> Self {
        let store = Arc::new(JobStore::new(collaborators.store));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            collaborators.alarms,
            policy,
        ));
        let triggers = Arc::new(Triggers::new(
            scheduler.clone(),
            collaborators.constraints.clone(),
        ));
        let coordinator = Arc::new(ExecutionCoordinator::new(
            collaborators.executor,
            scheduler.clone(),
            triggers.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            scheduler.clone(),
            collaborators.constraints,
            triggers.clone(),
            coordinator.clone(),
        ));

        Self {
            store,
            scheduler,
            triggers,
            engine: CronEngine::new(dispatcher, coordinator),
        }
    }

    /// Handle for feeding collaborator events.
    pub fn engine(&self) -> CronEngine {
        self.engine.clone()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Store a new job and arm its first trigger.
    pub async fn schedule(&self, spec: &JobSpec) -> CronResult<JobEntry> {
        let entry = self.store.add(spec).await?;
        if let Err(e) = self.scheduler.arm_next_trigger(&entry).await {
            error!(job_id = %entry.id, "Job stored but its trigger could not be armed: {}", e);
        }
        Ok(entry)
    }

    /// Swap a job's definition, keeping its id, and re-arm it.
    pub async fn replace(&self, id: JobId, spec: &JobSpec) -> CronResult<JobEntry> {
        let entry = self.store.replace(id, spec).await?;
        if let Err(e) = self.scheduler.arm_next_trigger(&entry).await {
            error!(job_id = %id, "Job replaced but its trigger could not be armed: {}", e);
        }
        Ok(entry)
    }

    /// One summary line per job, in insertion order.
    pub async fn list(&self) -> CronResult<Vec<String>> {
        let entries = self.store.get_all().await?;
        Ok(entries.iter().map(summary_line).collect())
    }

    pub async fn info(&self, id: JobId) -> CronResult<String> {
        let entry = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(CronError::NotFound(id))?;
        let next_run = self
            .scheduler
            .next_run(id)
            .or_else(|| CronClock::next_trigger(&entry.cron_expression, Utc::now()).ok());
        Ok(detail_line(&entry, next_run, self.state_of(id)))
    }

    /// Delete a job and disarm its alarms. A trigger still waiting for
    /// constraints is withdrawn; a run already started is not interrupted.
    pub async fn cancel(&self, id: JobId) -> CronResult<JobEntry> {
        let entry = self.store.delete(id).await?.ok_or(CronError::NotFound(id))?;
        self.release(id).await;
        if let Some(state) = self.state_of(id) {
            info!(job_id = %id, state = %state, "Cancelled job has a run in progress; it will finish");
        }
        Ok(entry)
    }

    /// Drop everything armed or pending for a job that left the store.
    async fn release(&self, id: JobId) {
        self.scheduler.disarm(id).await;
        self.scheduler.disarm_constraint_timeout_fallback(id).await;
        if self.triggers.abandon(id).await.is_some() {
            info!(job_id = %id, "Withdrew trigger waiting for constraints");
        }
    }

    /// Delete every job and disarm every alarm. Returns the number of jobs.
    pub async fn cancel_all(&self) -> CronResult<usize> {
        let entries = self.store.clear().await?;
        for entry in &entries {
            self.release(entry.id).await;
        }
        Ok(entries.len())
    }

    /// Arm a trigger for every stored job and disarm triggers of jobs that
    /// are gone. Returns the number of jobs armed.
    pub async fn reschedule_all(&self) -> CronResult<usize> {
        let entries = self.store.get_all().await?;
        let mut armed = 0;
        for entry in &entries {
            match self.scheduler.arm_next_trigger(entry).await {
                Ok(_) => armed += 1,
                Err(e) => warn!(job_id = %entry.id, "Could not arm job: {}", e),
            }
        }

        let known: HashSet<JobId> = entries.iter().map(|e| e.id).collect();
        let mut tracked = self.scheduler.armed_jobs();
        tracked.extend(self.triggers.jobs());
        tracked.sort();
        tracked.dedup();
        for id in tracked {
            if !known.contains(&id) {
                self.release(id).await;
            }
        }

        info!(armed, total = entries.len(), "Jobs rescheduled");
        Ok(armed)
    }

    /// Instant of the currently armed trigger.
    pub fn next_run(&self, id: JobId) -> Option<DateTime<Utc>> {
        self.scheduler.next_run(id)
    }

    /// State of the job's in-flight trigger.
    pub fn state_of(&self, id: JobId) -> Option<TriggerState> {
        self.triggers.current(id).map(|t| t.state)
    }
}

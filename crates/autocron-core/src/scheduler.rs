//! Scheduler: arms and disarms alarms for trigger instants and
//! constraint-timeout fallbacks.

use std::sync::Arc;
use std::time::Duration;

use autocron_protocols::{AlarmHandle, AlarmKey, AlarmRequest, AlarmService, JobEntry, JobId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error, info};

use crate::clock::CronClock;
use crate::error::CronResult;
use crate::store::JobStore;

/// Alarm policy.
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    /// Tolerance window handed to the alarm service for inexact jobs.
    pub inexact_window: Duration,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            inexact_window: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ArmedAlarm {
    handle: AlarmHandle,
    at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct ArmedFallback {
    handle: AlarmHandle,
    trigger: u64,
}

/// Glue between the job store, the cron clock and the alarm service.
///
/// Holds at most one trigger alarm and one fallback alarm per job.
pub struct Scheduler {
    store: Arc<JobStore>,
    alarms: Arc<dyn AlarmService>,
    policy: SchedulerPolicy,
    triggers: DashMap<JobId, ArmedAlarm>,
    fallbacks: DashMap<JobId, ArmedFallback>,
}

impl Scheduler {
    pub fn new(
        store: Arc<JobStore>,
        alarms: Arc<dyn AlarmService>,
        policy: SchedulerPolicy,
    ) -> Self {
        Self {
            store,
            alarms,
            policy,
            triggers: DashMap::new(),
            fallbacks: DashMap::new(),
        }
    }

    /// Arm the alarm for the entry's next trigger, replacing any pending one.
    pub async fn arm_next_trigger(&self, entry: &JobEntry) -> CronResult<DateTime<Utc>> {
        let at = CronClock::next_trigger(&entry.cron_expression, Utc::now())?;

        self.disarm(entry.id).await;

        let request = AlarmRequest {
            key: AlarmKey::trigger(entry.id),
            at,
            exact: entry.exact,
            window: if entry.exact {
                Duration::ZERO
            } else {
                self.policy.inexact_window
            },
        };
        let handle = self.alarms.arm(request).await?;
        if let Some(displaced) = self.triggers.insert(entry.id, ArmedAlarm { handle, at }) {
            self.alarms.disarm(displaced.handle).await;
        }

        info!(job_id = %entry.id, next = %at, exact = entry.exact, "Next trigger armed");
        Ok(at)
    }

    /// Reload the job and arm its next trigger. A job that no longer
    /// exists is left unarmed.
    pub async fn arm_next_trigger_for(&self, id: JobId) -> CronResult<Option<DateTime<Utc>>> {
        match self.store.get_by_id(id).await? {
            Some(entry) => self.arm_next_trigger(&entry).await.map(Some),
            None => {
                debug!(job_id = %id, "Job gone; not re-arming");
                self.disarm(id).await;
                Ok(None)
            }
        }
    }

    /// `arm_next_trigger_for` for callers that can only log the failure.
    pub async fn rearm_or_log(&self, id: JobId) {
        if let Err(e) = self.arm_next_trigger_for(id).await {
            error!(job_id = %id, "Failed to arm next trigger, job stalled: {}", e);
        }
    }

    /// Cancel the pending trigger alarm, if any.
    pub async fn disarm(&self, id: JobId) {
        if let Some((_, armed)) = self.triggers.remove(&id) {
            self.alarms.disarm(armed.handle).await;
            debug!(job_id = %id, "Trigger alarm disarmed");
        }
    }

    /// Forget a trigger alarm that has fired. A record armed for a later
    /// instant belongs to a newer alarm and is kept.
    pub fn trigger_fired(&self, id: JobId) {
        let now = Utc::now();
        self.triggers.remove_if(&id, |_, armed| armed.at <= now);
    }

    /// Arm the constraint-timeout fallback for one trigger. Does nothing
    /// when the entry waits for constraints indefinitely.
    pub async fn arm_constraint_timeout_fallback(
        &self,
        entry: &JobEntry,
        trigger: u64,
    ) -> CronResult<bool> {
        if entry.constraint_timeout_ms == 0 {
            return Ok(false);
        }
        self.disarm_constraint_timeout_fallback(entry.id).await;

        let timeout = chrono::Duration::milliseconds(
            i64::try_from(entry.constraint_timeout_ms).unwrap_or(i64::MAX),
        );
        let request = AlarmRequest {
            key: AlarmKey::constraint_timeout(entry.id, trigger),
            at: Utc::now() + timeout,
            exact: true,
            window: Duration::ZERO,
        };
        let handle = self.alarms.arm(request).await?;
        if let Some(displaced) = self
            .fallbacks
            .insert(entry.id, ArmedFallback { handle, trigger })
        {
            self.alarms.disarm(displaced.handle).await;
        }

        debug!(job_id = %entry.id, trigger, timeout_ms = entry.constraint_timeout_ms, "Constraint fallback armed");
        Ok(true)
    }

    pub async fn disarm_constraint_timeout_fallback(&self, id: JobId) {
        if let Some((_, armed)) = self.fallbacks.remove(&id) {
            self.alarms.disarm(armed.handle).await;
            debug!(job_id = %id, trigger = armed.trigger, "Constraint fallback disarmed");
        }
    }

    /// Forget a fallback alarm that has fired.
    pub fn fallback_fired(&self, id: JobId, trigger: u64) {
        self.fallbacks.remove_if(&id, |_, armed| armed.trigger == trigger);
    }

    /// Instant of the currently armed trigger.
    pub fn next_run(&self, id: JobId) -> Option<DateTime<Utc>> {
        self.triggers.get(&id).map(|armed| armed.at)
    }

    /// Jobs with an armed trigger alarm.
    pub fn armed_jobs(&self) -> Vec<JobId> {
        self.triggers.iter().map(|armed| *armed.key()).collect()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }
}

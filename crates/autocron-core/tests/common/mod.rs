//! Fake collaborators and a harness wiring them to a `CronService`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autocron_core::{Collaborators, CronEngine, CronService, MemoryTextStore, SchedulerPolicy};
use autocron_protocols::*;
use parking_lot::Mutex;

pub const SCRIPT: &str = "/bin/sh";

/// Cross-collaborator call order, shared by the fakes of one harness.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Records every arm/disarm and keeps the set of live alarms. Never
/// fires on its own; tests deliver `AlarmFired` explicitly.
#[derive(Default)]
pub struct FakeAlarms {
    next: AtomicU64,
    live: Mutex<HashMap<AlarmHandle, AlarmRequest>>,
    armed: Mutex<Vec<AlarmRequest>>,
    disarmed: Mutex<Vec<AlarmHandle>>,
    journal: Journal,
}

impl FakeAlarms {
    /// Arm calls for the job's trigger alarm.
    pub fn trigger_arms(&self, job: JobId) -> usize {
        self.armed
            .lock()
            .iter()
            .filter(|r| r.key == AlarmKey::trigger(job))
            .count()
    }

    pub fn live_triggers(&self, job: JobId) -> Vec<AlarmRequest> {
        self.live
            .lock()
            .values()
            .filter(|r| r.key == AlarmKey::trigger(job))
            .cloned()
            .collect()
    }

    pub fn live_fallback(&self, job: JobId) -> Option<AlarmRequest> {
        self.live
            .lock()
            .values()
            .find(|r| r.key.job == job && matches!(r.key.kind, AlarmKind::ConstraintTimeout { .. }))
            .cloned()
    }

    pub fn fallback_arms(&self, job: JobId) -> Vec<AlarmRequest> {
        self.armed
            .lock()
            .iter()
            .filter(|r| r.key.job == job && matches!(r.key.kind, AlarmKind::ConstraintTimeout { .. }))
            .cloned()
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn disarm_count(&self) -> usize {
        self.disarmed.lock().len()
    }
}

#[async_trait]
impl AlarmService for FakeAlarms {
    async fn arm(&self, request: AlarmRequest) -> Result<AlarmHandle, AlarmError> {
        let handle = AlarmHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.journal.lock().push(format!("arm {}", request.key.job));
        self.armed.lock().push(request.clone());
        self.live.lock().insert(handle, request);
        Ok(handle)
    }

    async fn disarm(&self, handle: AlarmHandle) {
        self.disarmed.lock().push(handle);
        self.live.lock().remove(&handle);
    }
}

/// Hands out work handles and records what happened to them. Constraint
/// satisfaction is driven by the test.
#[derive(Default)]
pub struct FakeConstraints {
    next: AtomicU64,
    work: Mutex<HashMap<WorkHandle, (JobId, WorkStatus)>>,
    enqueued: Mutex<Vec<(JobId, WorkHandle, Constraints)>>,
    cancelled: Mutex<Vec<WorkHandle>>,
    completed: Mutex<Vec<WorkHandle>>,
    pub refuse: AtomicBool,
}

impl FakeConstraints {
    pub fn enqueued(&self) -> Vec<(JobId, WorkHandle, Constraints)> {
        self.enqueued.lock().clone()
    }

    pub fn last_work(&self, job: JobId) -> Option<WorkHandle> {
        self.enqueued
            .lock()
            .iter()
            .rev()
            .find(|(j, _, _)| *j == job)
            .map(|(_, w, _)| *w)
    }

    /// Mark work as started, as the scheduler would before reporting it.
    pub fn start(&self, work: WorkHandle) {
        if let Some(entry) = self.work.lock().get_mut(&work) {
            entry.1 = WorkStatus::Running;
        }
    }

    pub fn cancelled(&self) -> Vec<WorkHandle> {
        self.cancelled.lock().clone()
    }

    pub fn completed(&self) -> Vec<WorkHandle> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl ConstraintScheduler for FakeConstraints {
    async fn enqueue(
        &self,
        job: JobId,
        constraints: &Constraints,
    ) -> Result<WorkHandle, ConstraintError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ConstraintError::Rejected("refused by test".to_string()));
        }
        let work = WorkHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.work.lock().insert(work, (job, WorkStatus::Enqueued));
        self.enqueued.lock().push((job, work, constraints.clone()));
        Ok(work)
    }

    async fn cancel(&self, handle: WorkHandle) {
        self.cancelled.lock().push(handle);
        self.work.lock().remove(&handle);
    }

    async fn complete(&self, handle: WorkHandle) {
        self.completed.lock().push(handle);
        self.work.lock().remove(&handle);
    }

    fn status_of(&self, handle: WorkHandle) -> WorkStatus {
        self.work
            .lock()
            .get(&handle)
            .map(|(_, status)| *status)
            .unwrap_or(WorkStatus::Absent)
    }
}

/// Records starts and terminations. Completion is reported by the test.
#[derive(Default)]
pub struct FakeExecutor {
    next: AtomicU64,
    started: Mutex<Vec<(JobId, PathBuf, ExecutionHandle)>>,
    terminated: Mutex<Vec<(ExecutionHandle, Duration)>>,
    journal: Journal,
    pub fail_start: AtomicBool,
}

impl FakeExecutor {
    pub fn started(&self) -> Vec<(JobId, PathBuf, ExecutionHandle)> {
        self.started.lock().clone()
    }

    pub fn last_execution(&self, job: JobId) -> Option<ExecutionHandle> {
        self.started
            .lock()
            .iter()
            .rev()
            .find(|(j, _, _)| *j == job)
            .map(|(_, _, e)| *e)
    }

    pub fn terminated(&self) -> Vec<(ExecutionHandle, Duration)> {
        self.terminated.lock().clone()
    }
}

#[async_trait]
impl ProcessExecutor for FakeExecutor {
    async fn start(&self, job: JobId, script: &Path) -> Result<ExecutionHandle, ExecutorError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ExecutorError::Spawn {
                path: script.to_path_buf(),
                reason: "refused by test".to_string(),
            });
        }
        let execution = ExecutionHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.started.lock().push((job, script.to_path_buf(), execution));
        Ok(execution)
    }

    async fn terminate(
        &self,
        execution: ExecutionHandle,
        grace: Duration,
    ) -> Result<(), ExecutorError> {
        self.journal.lock().push(format!("terminate {}", execution.0));
        self.terminated.lock().push((execution, grace));
        Ok(())
    }
}

pub struct Harness {
    pub service: CronService,
    pub engine: CronEngine,
    pub alarms: Arc<FakeAlarms>,
    pub constraints: Arc<FakeConstraints>,
    pub executor: Arc<FakeExecutor>,
    pub backend: Arc<MemoryTextStore>,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        let alarms = Arc::new(FakeAlarms {
            journal: journal.clone(),
            ..Default::default()
        });
        let constraints = Arc::new(FakeConstraints::default());
        let executor = Arc::new(FakeExecutor {
            journal: journal.clone(),
            ..Default::default()
        });
        let backend = Arc::new(MemoryTextStore::new());

        let service = CronService::new(
            Collaborators {
                store: backend.clone(),
                alarms: alarms.clone(),
                constraints: constraints.clone(),
                executor: executor.clone(),
            },
            SchedulerPolicy::default(),
        );
        let engine = service.engine();

        Self {
            service,
            engine,
            alarms,
            constraints,
            executor,
            backend,
            journal,
        }
    }

    pub async fn schedule(&self, spec: JobSpec) -> JobEntry {
        self.service.schedule(&spec).await.unwrap()
    }

    /// Deliver the job's trigger alarm.
    pub async fn fire(&self, job: JobId) {
        self.engine
            .handle(CronEvent::AlarmFired(AlarmKey::trigger(job)))
            .await;
    }

    /// Deliver the job's live constraint-timeout alarm.
    pub async fn fire_fallback(&self, job: JobId) {
        let request = self
            .alarms
            .live_fallback(job)
            .expect("no live constraint fallback");
        self.engine.handle(CronEvent::AlarmFired(request.key)).await;
    }

    pub async fn satisfy(&self, job: JobId) {
        let work = self.constraints.last_work(job).expect("no enqueued work");
        self.constraints.start(work);
        self.engine
            .handle(CronEvent::ConstraintsSatisfied { job, work })
            .await;
    }

    pub async fn break_constraints(&self, job: JobId) {
        let work = self.constraints.last_work(job).expect("no enqueued work");
        self.engine
            .handle(CronEvent::ConstraintsBroken { job, work })
            .await;
    }

    /// Report the job's latest execution as finished.
    pub async fn finish(&self, job: JobId, success: bool) {
        let execution = self.executor.last_execution(job).expect("nothing started");
        self.finish_execution(job, execution, success).await;
    }

    pub async fn finish_execution(&self, job: JobId, execution: ExecutionHandle, success: bool) {
        self.engine
            .handle(CronEvent::ExecutionFinished(ExecutionReport {
                job,
                execution,
                success,
                exit_code: Some(if success { 0 } else { 1 }),
            }))
            .await;
    }
}

/// Let spawned supervisors catch up.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn constrained(cron: &str) -> JobSpec {
    JobSpec::new(cron, SCRIPT).with_constraints(Constraints {
        charging: true,
        battery_not_low: true,
        ..Default::default()
    })
}

//! ExecutionCoordinator: runs a dispatched job and waits for it to end.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use autocron_protocols::{
    ExecutionHandle, ExecutionReport, JobEntry, JobId, ProcessExecutor, WorkHandle,
};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionRegistry, Resolution};
use crate::scheduler::Scheduler;
use crate::trigger::{Advance, TriggerInput, TriggerState, Triggers};

/// Owns the Dispatched -> Running -> terminal part of a trigger.
pub struct ExecutionCoordinator {
    executor: Arc<dyn ProcessExecutor>,
    scheduler: Arc<Scheduler>,
    triggers: Arc<Triggers>,
    completions: Arc<CompletionRegistry>,
    tasks: TaskTracker,
}

impl ExecutionCoordinator {
    pub fn new(
        executor: Arc<dyn ProcessExecutor>,
        scheduler: Arc<Scheduler>,
        triggers: Arc<Triggers>,
    ) -> Self {
        Self {
            executor,
            scheduler,
            triggers,
            completions: Arc::new(CompletionRegistry::new()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn completions(&self) -> &Arc<CompletionRegistry> {
        &self.completions
    }

    /// Start the job's script and supervise it in the background. The
    /// trigger must already be in `Dispatched`.
    pub async fn dispatch(&self, entry: JobEntry, trigger: u64) {
        let job = entry.id;
        self.scheduler.disarm_constraint_timeout_fallback(job).await;

        let rx = self.completions.register(job, trigger);
        let execution = match self.executor.start(job, &entry.script_path).await {
            Ok(execution) => execution,
            Err(e) => {
                error!(job_id = %job, trigger, "Failed to start script: {}", e);
                self.completions.remove(job, trigger);
                self.triggers
                    .advance(job, trigger, TriggerInput::HandOffFailed)
                    .await;
                return;
            }
        };
        self.completions.attach(job, trigger, execution);
        self.triggers.set_execution(job, trigger, execution);

        if self.triggers.advance(job, trigger, TriggerInput::Started).await
            != Advance::Applied(TriggerState::Running)
        {
            warn!(job_id = %job, trigger, "Trigger left Dispatched before start; stopping execution");
            self.completions.remove(job, trigger);
            terminate(self.executor.as_ref(), job, execution, entry.grace_period_ms).await;
            return;
        }

        info!(job_id = %job, trigger, execution = ?execution, "Job running");
        let supervisor = Supervisor {
            executor: self.executor.clone(),
            triggers: self.triggers.clone(),
            completions: self.completions.clone(),
        };
        self.tasks.spawn(supervisor.run(entry, trigger, execution, rx));
    }

    /// Route an execution report to the waiting supervisor.
    pub fn on_execution_finished(&self, report: &ExecutionReport) {
        self.completions.resolve_finished(report);
    }

    /// Route a constraint break to the waiting supervisor, if the broken
    /// work belongs to the running trigger.
    pub fn on_constraints_broken(&self, job: JobId, work: WorkHandle) {
        match self.triggers.current(job) {
            Some(trigger) if trigger.work == Some(work) => {
                self.completions
                    .resolve(job, trigger.seq, Resolution::ConstraintsBroken);
            }
            _ => debug!(job_id = %job, work = ?work, "Constraint break for stale work ignored"),
        }
    }

    /// Wait for every supervisor to finish.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Number of supervised executions.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }
}

async fn terminate(
    executor: &dyn ProcessExecutor,
    job: JobId,
    execution: ExecutionHandle,
    grace_ms: u64,
) {
    let grace = Duration::from_millis(grace_ms);
    match executor.terminate(execution, grace).await {
        Ok(()) => info!(job_id = %job, execution = ?execution, grace_ms, "Execution terminated"),
        Err(e) => warn!(job_id = %job, "Failed to terminate execution: {}", e),
    }
}

/// Waits on one execution.
struct Supervisor {
    executor: Arc<dyn ProcessExecutor>,
    triggers: Arc<Triggers>,
    completions: Arc<CompletionRegistry>,
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

impl Supervisor {
    async fn run(
        self,
        entry: JobEntry,
        trigger: u64,
        execution: ExecutionHandle,
        mut rx: mpsc::UnboundedReceiver<Resolution>,
    ) {
        let job = entry.id;
        let deadline = (entry.max_runtime_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(entry.max_runtime_ms));
        let timeout = deadline_reached(deadline);
        tokio::pin!(timeout);

        loop {
            let input = tokio::select! {
                resolution = rx.recv() => match resolution {
                    Some(Resolution::Finished { success, exit_code }) => {
                        info!(job_id = %job, trigger, success, ?exit_code, "Execution finished");
                        TriggerInput::Finished
                    }
                    Some(Resolution::ConstraintsBroken) => TriggerInput::ConstraintsBroken {
                        keep_running: entry.continue_on_constraint_break,
                    },
                    None => TriggerInput::Lost,
                },
                _ = &mut timeout => {
                    warn!(job_id = %job, trigger, max_runtime_ms = entry.max_runtime_ms, "Execution exceeded max runtime");
                    TriggerInput::RuntimeExceeded
                }
            };

            // Stop a runaway before its terminal transition re-arms the job.
            if let Some(TriggerState::TimedOut | TriggerState::Cancelled) =
                self.triggers.peek(job, trigger, input)
            {
                terminate(self.executor.as_ref(), job, execution, entry.grace_period_ms).await;
            }

            match self.triggers.advance(job, trigger, input).await {
                Advance::Applied(state) if state.is_terminal() => break,
                Advance::Applied(_) => {}
                Advance::Ignored(_)
                    if matches!(input, TriggerInput::ConstraintsBroken { keep_running: true }) =>
                {
                    info!(job_id = %job, trigger, "Constraints broke; job continues running");
                }
                Advance::Ignored(_) | Advance::Stale => break,
            }
        }
        self.completions.remove(job, trigger);
    }
}

//! Job scripts as child processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autocron_protocols::{
    CronEvent, EventSender, ExecutionHandle, ExecutionReport, ExecutorError, JobId,
    ProcessExecutor,
};
use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How scripts are launched.
#[derive(Debug, Clone, Default)]
pub struct ProcessSettings {
    /// Forward script stdout/stderr lines to the log.
    pub forward_output: bool,
    pub working_dir: Option<PathBuf>,
}

struct Running {
    job: JobId,
    pid: Option<u32>,
    kill: CancellationToken,
}

/// Runs each script directly (no shell) with stdin closed.
///
/// A waiter task owns the child and reports its exit exactly once.
pub struct ProcessRunner {
    events: EventSender,
    settings: ProcessSettings,
    next: AtomicU64,
    running: Arc<DashMap<ExecutionHandle, Running>>,
}

impl ProcessRunner {
    pub fn new(events: EventSender, settings: ProcessSettings) -> Self {
        Self {
            events,
            settings,
            next: AtomicU64::new(1),
            running: Arc::new(DashMap::new()),
        }
    }

    /// Number of live child processes.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new(script);
        cmd.stdin(Stdio::null());
        if self.settings.forward_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        if let Some(dir) = &self.settings.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

fn forward<R>(job: JobId, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(job_id = %job, stream, "{}", line);
        }
    });
}

#[async_trait]
impl ProcessExecutor for ProcessRunner {
    async fn start(&self, job: JobId, script: &Path) -> Result<ExecutionHandle, ExecutorError> {
        let mut child = self.command(script).spawn().map_err(|e| ExecutorError::Spawn {
            path: script.to_path_buf(),
            reason: e.to_string(),
        })?;

        let execution = ExecutionHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            forward(job, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward(job, "stderr", stderr);
        }

        let kill = CancellationToken::new();
        self.running.insert(execution, Running { job, pid, kill: kill.clone() });
        info!(job_id = %job, execution = execution.0, pid, script = %script.display(), "Script started");

        let events = self.events.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(job_id = %job, execution = execution.0, error = %e, "Failed to kill script");
                    }
                    child.wait().await
                }
            };
            running.remove(&execution);

            let (success, exit_code) = match status {
                Ok(status) => (status.success(), status.code()),
                Err(e) => {
                    warn!(job_id = %job, execution = execution.0, error = %e, "Failed to wait for script");
                    (false, None)
                }
            };
            info!(job_id = %job, execution = execution.0, success, exit_code, "Script exited");
            let report = ExecutionReport { job, execution, success, exit_code };
            if events.send(CronEvent::ExecutionFinished(report)).is_err() {
                debug!(job_id = %job, "Execution finished after the engine stopped");
            }
        });

        Ok(execution)
    }

    async fn terminate(
        &self,
        execution: ExecutionHandle,
        grace: Duration,
    ) -> Result<(), ExecutorError> {
        let (job, pid, kill) = match self.running.get(&execution) {
            Some(r) => (r.job, r.pid, r.kill.clone()),
            None => return Err(ExecutorError::NotRunning(execution)),
        };

        if let Some(pid) = pid {
            send_sigterm(pid)?;
        }
        debug!(job_id = %job, execution = execution.0, grace_ms = grace.as_millis() as u64, "Sent SIGTERM");

        if grace.is_zero() {
            kill.cancel();
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                kill.cancel();
            });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<(), ExecutorError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).map_err(|e| ExecutorError::Signal(e.to_string()))?;
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ExecutorError::Signal(e.to_string())),
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> Result<(), ExecutorError> {
    Ok(())
}

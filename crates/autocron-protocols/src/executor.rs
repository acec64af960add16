//! Process executor protocol.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecutorError;
use crate::types::JobId;

/// Opaque handle of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionHandle(pub u64);

/// Outcome of an execution, delivered as `CronEvent::ExecutionFinished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub job: JobId,
    pub execution: ExecutionHandle,
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Starts job scripts and stops them on request.
///
/// Every started execution produces exactly one `ExecutionFinished` event,
/// including executions that were terminated.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn start(&self, job: JobId, script: &Path) -> Result<ExecutionHandle, ExecutorError>;

    /// Ask the execution to stop, forcing it after `grace`.
    async fn terminate(
        &self,
        execution: ExecutionHandle,
        grace: Duration,
    ) -> Result<(), ExecutorError>;
}

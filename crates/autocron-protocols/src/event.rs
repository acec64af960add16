//! Events delivered to the scheduler by its collaborators.

use tokio::sync::mpsc;

use crate::alarm::AlarmKey;
use crate::constraint::WorkHandle;
use crate::executor::ExecutionReport;
use crate::types::JobId;

/// A callback from a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronEvent {
    AlarmFired(AlarmKey),
    ConstraintsSatisfied { job: JobId, work: WorkHandle },
    ConstraintsBroken { job: JobId, work: WorkHandle },
    ExecutionFinished(ExecutionReport),
}

impl CronEvent {
    /// Job the event concerns.
    pub fn job(&self) -> JobId {
        match self {
            CronEvent::AlarmFired(key) => key.job,
            CronEvent::ConstraintsSatisfied { job, .. } => *job,
            CronEvent::ConstraintsBroken { job, .. } => *job,
            CronEvent::ExecutionFinished(report) => report.job,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<CronEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<CronEvent>;

/// Create the channel collaborators use to reach the scheduler.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionHandle;

    #[test]
    fn test_event_job() {
        let event = CronEvent::AlarmFired(AlarmKey::constraint_timeout(JobId(4), 2));
        assert_eq!(event.job(), JobId(4));

        let event = CronEvent::ExecutionFinished(ExecutionReport {
            job: JobId(9),
            execution: ExecutionHandle(1),
            success: true,
            exit_code: Some(0),
        });
        assert_eq!(event.job(), JobId(9));
    }

    #[tokio::test]
    async fn test_event_channel_delivers() {
        let (tx, mut rx) = event_channel();
        tx.send(CronEvent::ConstraintsSatisfied { job: JobId(1), work: WorkHandle(5) })
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event, CronEvent::ConstraintsSatisfied { job: JobId(1), work: WorkHandle(5) });
    }
}

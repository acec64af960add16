//! Event loop routing collaborator events.

use std::sync::Arc;

use autocron_protocols::{AlarmKey, AlarmKind, CronEvent, EventReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::coordinator::ExecutionCoordinator;
use crate::dispatcher::Dispatcher;

/// Applies collaborator events one at a time, in arrival order.
#[derive(Clone)]
pub struct CronEngine {
    dispatcher: Arc<Dispatcher>,
    coordinator: Arc<ExecutionCoordinator>,
}

impl CronEngine {
    pub fn new(dispatcher: Arc<Dispatcher>, coordinator: Arc<ExecutionCoordinator>) -> Self {
        Self {
            dispatcher,
            coordinator,
        }
    }

    pub async fn handle(&self, event: CronEvent) {
        debug!(?event, "Handling event");
        match event {
            CronEvent::AlarmFired(AlarmKey {
                job,
                kind: AlarmKind::Trigger,
            }) => self.dispatcher.on_trigger(job).await,
            CronEvent::AlarmFired(AlarmKey {
                job,
                kind: AlarmKind::ConstraintTimeout { trigger },
            }) => self.dispatcher.on_constraint_timeout(job, trigger).await,
            CronEvent::ConstraintsSatisfied { job, work } => {
                self.dispatcher.on_constraints_satisfied(job, work).await
            }
            CronEvent::ConstraintsBroken { job, work } => {
                self.coordinator.on_constraints_broken(job, work)
            }
            CronEvent::ExecutionFinished(report) => {
                self.coordinator.on_execution_finished(&report)
            }
        }
    }

    /// Run until the channel closes or `shutdown` is cancelled. Running
    /// executions are left to finish on their own.
    pub async fn run(&self, mut events: EventReceiver, shutdown: CancellationToken) {
        info!("Cron engine started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }
        info!(running = self.coordinator.running(), "Cron engine stopped");
    }

    /// Wait until every supervised execution has ended.
    pub async fn drain(&self) {
        self.coordinator.shutdown().await;
    }
}

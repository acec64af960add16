//! Constraint scheduler that polls device conditions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autocron_protocols::{
    ConditionProbe, ConstraintError, ConstraintScheduler, Constraints, CronEvent, DeviceConditions,
    EventSender, JobId, WorkHandle, WorkStatus,
};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Work {
    job: JobId,
    constraints: Constraints,
    running: bool,
    /// A break was already reported and conditions have not recovered since.
    broken: bool,
}

/// Holds constrained work and re-evaluates it against a [`ConditionProbe`].
///
/// Conditions are checked when work is enqueued and then on every poll.
/// Enqueued work is handed out once with `ConstraintsSatisfied`. Running
/// work reports `ConstraintsBroken` once per transition into violation.
pub struct LocalConstraintScheduler {
    probe: Arc<dyn ConditionProbe>,
    events: EventSender,
    next: AtomicU64,
    work: DashMap<WorkHandle, Work>,
}

impl LocalConstraintScheduler {
    pub fn new(probe: Arc<dyn ConditionProbe>, events: EventSender) -> Self {
        Self {
            probe,
            events,
            next: AtomicU64::new(1),
            work: DashMap::new(),
        }
    }

    /// Number of enqueued or running work items.
    pub fn len(&self) -> usize {
        self.work.len()
    }

    pub fn is_empty(&self) -> bool {
        self.work.is_empty()
    }

    /// Sample conditions once and deliver any resulting events.
    pub fn poll_once(&self) {
        if self.work.is_empty() {
            return;
        }
        let conditions = self.probe.sample();
        let mut events = Vec::new();
        for mut item in self.work.iter_mut() {
            let handle = *item.key();
            if let Some(event) = evaluate(handle, item.value_mut(), &conditions) {
                events.push(event);
            }
        }
        for event in events {
            self.deliver(event);
        }
    }

    fn deliver(&self, event: CronEvent) {
        let job = event.job();
        if self.events.send(event).is_err() {
            warn!(job_id = %job, "Constraint event dropped; the engine stopped");
        }
    }

    /// Poll every `interval` until `shutdown` is cancelled.
    pub fn spawn_poller(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Constraint poller started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => self.poll_once(),
                }
            }
            info!("Constraint poller stopped");
        })
    }
}

fn evaluate(handle: WorkHandle, work: &mut Work, conditions: &DeviceConditions) -> Option<CronEvent> {
    let satisfied = conditions.satisfies(&work.constraints);
    match (work.running, satisfied) {
        (false, true) => {
            work.running = true;
            debug!(job_id = %work.job, work = handle.0, "Constraints satisfied");
            Some(CronEvent::ConstraintsSatisfied { job: work.job, work: handle })
        }
        (true, false) if !work.broken => {
            work.broken = true;
            debug!(job_id = %work.job, work = handle.0, "Constraints broken");
            Some(CronEvent::ConstraintsBroken { job: work.job, work: handle })
        }
        (true, true) => {
            work.broken = false;
            None
        }
        _ => None,
    }
}

#[async_trait]
impl ConstraintScheduler for LocalConstraintScheduler {
    async fn enqueue(
        &self,
        job: JobId,
        constraints: &Constraints,
    ) -> Result<WorkHandle, ConstraintError> {
        if self.events.is_closed() {
            return Err(ConstraintError::Unavailable("event channel closed".to_string()));
        }
        let handle = WorkHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let mut work = Work {
            job,
            constraints: constraints.clone(),
            running: false,
            broken: false,
        };
        let event = evaluate(handle, &mut work, &self.probe.sample());
        self.work.insert(handle, work);
        debug!(job_id = %job, work = handle.0, code = %constraints.code(), "Work enqueued");
        if let Some(event) = event {
            self.deliver(event);
        }
        Ok(handle)
    }

    async fn cancel(&self, handle: WorkHandle) {
        if self.work.remove(&handle).is_some() {
            debug!(work = handle.0, "Work cancelled");
        }
    }

    async fn complete(&self, handle: WorkHandle) {
        if self.work.remove(&handle).is_some() {
            debug!(work = handle.0, "Work completed");
        }
    }

    fn status_of(&self, handle: WorkHandle) -> WorkStatus {
        match self.work.get(&handle) {
            Some(work) if work.running => WorkStatus::Running,
            Some(_) => WorkStatus::Enqueued,
            None => WorkStatus::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocron_protocols::{event_channel, EventReceiver, NetworkClass, NetworkState};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Switch(Mutex<DeviceConditions>);

    impl Switch {
        fn set(&self, conditions: DeviceConditions) {
            *self.0.lock() = conditions;
        }
    }

    impl ConditionProbe for Switch {
        fn sample(&self) -> DeviceConditions {
            *self.0.lock()
        }
    }

    fn charging() -> DeviceConditions {
        DeviceConditions { charging: true, ..Default::default() }
    }

    fn charging_only() -> Constraints {
        Constraints { charging: true, ..Default::default() }
    }

    fn setup() -> (Arc<Switch>, LocalConstraintScheduler, EventReceiver) {
        let probe = Arc::new(Switch::default());
        let (tx, rx) = event_channel();
        let scheduler = LocalConstraintScheduler::new(probe.clone(), tx);
        (probe, scheduler, rx)
    }

    #[tokio::test]
    async fn test_satisfied_on_enqueue() {
        let (probe, scheduler, mut rx) = setup();
        probe.set(charging());

        let work = scheduler.enqueue(JobId(1), &charging_only()).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            CronEvent::ConstraintsSatisfied { job: JobId(1), work }
        );
        assert_eq!(scheduler.status_of(work), WorkStatus::Running);
    }

    #[tokio::test]
    async fn test_waits_until_poll_sees_conditions() {
        let (probe, scheduler, mut rx) = setup();
        let work = scheduler.enqueue(JobId(1), &charging_only()).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(scheduler.status_of(work), WorkStatus::Enqueued);

        scheduler.poll_once();
        assert!(rx.try_recv().is_err());

        probe.set(charging());
        scheduler.poll_once();
        assert!(matches!(rx.try_recv(), Ok(CronEvent::ConstraintsSatisfied { .. })));

        scheduler.poll_once();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_break_reported_once_per_violation() {
        let (probe, scheduler, mut rx) = setup();
        probe.set(charging());
        let work = scheduler.enqueue(JobId(2), &charging_only()).await.unwrap();
        rx.try_recv().unwrap();

        probe.set(DeviceConditions::default());
        scheduler.poll_once();
        scheduler.poll_once();
        assert_eq!(rx.try_recv().unwrap(), CronEvent::ConstraintsBroken { job: JobId(2), work });
        assert!(rx.try_recv().is_err());

        probe.set(charging());
        scheduler.poll_once();
        probe.set(DeviceConditions::default());
        scheduler.poll_once();
        assert!(matches!(rx.try_recv(), Ok(CronEvent::ConstraintsBroken { .. })));
    }

    #[tokio::test]
    async fn test_cancel_and_complete_remove_work() {
        let (probe, scheduler, mut rx) = setup();
        let waiting = scheduler.enqueue(JobId(1), &charging_only()).await.unwrap();
        scheduler.cancel(waiting).await;
        assert_eq!(scheduler.status_of(waiting), WorkStatus::Absent);

        probe.set(charging());
        scheduler.poll_once();
        assert!(rx.try_recv().is_err());

        let running = scheduler.enqueue(JobId(1), &charging_only()).await.unwrap();
        rx.try_recv().unwrap();
        scheduler.complete(running).await;
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_network_constraint() {
        let (probe, scheduler, mut rx) = setup();
        let constraints = Constraints { network: NetworkClass::Unmetered, ..Default::default() };
        probe.set(DeviceConditions {
            network: NetworkState { connected: true, metered: true, roaming: false },
            ..Default::default()
        });
        scheduler.enqueue(JobId(3), &constraints).await.unwrap();
        assert!(rx.try_recv().is_err());

        probe.set(DeviceConditions {
            network: NetworkState { connected: true, metered: false, roaming: false },
            ..Default::default()
        });
        scheduler.poll_once();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_events_after_engine_stopped_are_dropped() {
        let (probe, scheduler, rx) = setup();
        let work = scheduler.enqueue(JobId(5), &charging_only()).await.unwrap();
        drop(rx);

        probe.set(charging());
        scheduler.poll_once();
        assert_eq!(scheduler.status_of(work), WorkStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_stops_on_shutdown() {
        let (probe, scheduler, mut rx) = setup();
        let scheduler = Arc::new(scheduler);
        scheduler.enqueue(JobId(1), &charging_only()).await.unwrap();

        let shutdown = CancellationToken::new();
        let poller = scheduler.clone().spawn_poller(Duration::from_secs(30), shutdown.clone());

        probe.set(charging());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(matches!(rx.recv().await, Some(CronEvent::ConstraintsSatisfied { .. })));

        shutdown.cancel();
        poller.await.unwrap();
    }
}

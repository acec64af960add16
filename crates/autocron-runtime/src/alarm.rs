//! Alarm service backed by tokio timers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autocron_protocols::{
    AlarmError, AlarmHandle, AlarmKey, AlarmRequest, AlarmService, CronEvent, EventSender,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// When an alarm actually goes off.
///
/// Inexact alarms are pushed up to the next multiple of `granularity` so
/// that alarms requested close together fire together, but never later
/// than the end of their window.
pub fn fire_time(request: &AlarmRequest, granularity: Duration) -> DateTime<Utc> {
    if request.exact || granularity.is_zero() || request.window.is_zero() {
        return request.at;
    }
    let step = i64::try_from(granularity.as_millis()).unwrap_or(i64::MAX);
    let window = i64::try_from(request.window.as_millis()).unwrap_or(i64::MAX);
    let at = request.at.timestamp_millis();

    let aligned = at.div_euclid(step) * step + if at.rem_euclid(step) == 0 { 0 } else { step };
    let fire = aligned.min(at.saturating_add(window));
    DateTime::from_timestamp_millis(fire).unwrap_or(request.at)
}

/// One sleeping task per armed alarm. Alarms do not survive the process;
/// the daemon re-arms every job at start-up.
pub struct TokioAlarmService {
    events: EventSender,
    granularity: Duration,
    next: AtomicU64,
    live: Arc<DashMap<AlarmHandle, (AlarmKey, CancellationToken)>>,
    by_key: Arc<DashMap<AlarmKey, AlarmHandle>>,
}

impl TokioAlarmService {
    pub fn new(events: EventSender, granularity: Duration) -> Self {
        Self {
            events,
            granularity,
            next: AtomicU64::new(1),
            live: Arc::new(DashMap::new()),
            by_key: Arc::new(DashMap::new()),
        }
    }

    /// Number of pending alarms.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    fn cancel(&self, handle: AlarmHandle) -> bool {
        match self.live.remove(&handle) {
            Some((_, (key, token))) => {
                token.cancel();
                self.by_key.remove_if(&key, |_, h| *h == handle);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AlarmService for TokioAlarmService {
    async fn arm(&self, request: AlarmRequest) -> Result<AlarmHandle, AlarmError> {
        if self.events.is_closed() {
            return Err(AlarmError::Unavailable("event channel closed".to_string()));
        }
        if let Some(previous) = self.by_key.get(&request.key).map(|h| *h) {
            self.cancel(previous);
        }

        let handle = AlarmHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let key = request.key;
        let at = fire_time(&request, self.granularity);
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let token = CancellationToken::new();

        self.live.insert(handle, (key, token.clone()));
        self.by_key.insert(key, handle);

        let events = self.events.clone();
        let live = self.live.clone();
        let by_key = self.by_key.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    live.remove(&handle);
                    by_key.remove_if(&key, |_, h| *h == handle);
                    if events.send(CronEvent::AlarmFired(key)).is_err() {
                        warn!(job_id = %key.job, "Alarm fired after the engine stopped");
                    }
                }
            }
        });

        debug!(job_id = %key.job, kind = ?key.kind, at = %at, delay_ms = delay.as_millis() as u64, "Alarm armed");
        Ok(handle)
    }

    async fn disarm(&self, handle: AlarmHandle) {
        if self.cancel(handle) {
            debug!(handle = handle.0, "Alarm disarmed");
        }
    }
}

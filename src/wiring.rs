//! Builds a `CronService` wired to the host collaborators.

use std::sync::Arc;

use autocron_config::Config;
use autocron_core::{Collaborators, CronService, FileTextStore, SchedulerPolicy};
use autocron_protocols::{event_channel, EventReceiver, TextStore};
use autocron_runtime::{
    LocalConstraintScheduler, ProbeSettings, ProcessRunner, ProcessSettings, SystemProbe,
    TokioAlarmService,
};

/// Everything the daemon and the one-shot commands share.
pub(crate) struct Wiring {
    pub service: CronService,
    pub constraints: Arc<LocalConstraintScheduler>,
    pub events: EventReceiver,
}

pub(crate) fn build(config: &Config) -> Wiring {
    build_with_store(config, Arc::new(FileTextStore::new(config.store.path.clone())))
}

pub(crate) fn build_with_store(config: &Config, store: Arc<dyn TextStore>) -> Wiring {
    let (tx, rx) = event_channel();

    let probe = Arc::new(SystemProbe::new(ProbeSettings {
        battery_low_percent: config.constraints.battery_low_percent,
        storage_low_percent: config.constraints.storage_low_percent,
        idle_load_threshold: config.constraints.idle_load_threshold,
        storage_path: config.constraints.storage_path(),
        ..Default::default()
    }));
    let constraints = Arc::new(LocalConstraintScheduler::new(probe, tx.clone()));
    let alarms = Arc::new(TokioAlarmService::new(
        tx.clone(),
        config.scheduler.alarm_granularity(),
    ));
    let executor = Arc::new(ProcessRunner::new(
        tx,
        ProcessSettings {
            forward_output: config.executor.forward_output,
            working_dir: config.executor.working_dir.clone(),
        },
    ));

    let collaborators = Collaborators {
        store,
        alarms,
        constraints: constraints.clone(),
        executor,
    };
    let policy = SchedulerPolicy {
        inexact_window: config.scheduler.inexact_window(),
    };

    Wiring {
        service: CronService::new(collaborators, policy),
        constraints,
        events: rx,
    }
}

//! The `run` command: the long-lived scheduler process.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use autocron_config::Config;
use autocron_core::CronService;
use notify::{Config as WatchConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::wiring::{self, Wiring};

const RESYNC_DEBOUNCE: Duration = Duration::from_millis(500);

pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting autocron v{}", env!("CARGO_PKG_VERSION"));
    info!(store = %config.store.path.display(), "Job file");

    let Wiring { service, constraints, events } = wiring::build(&config);
    let service = Arc::new(service);
    let shutdown = CancellationToken::new();

    let armed = service
        .reschedule_all()
        .await
        .context("Failed to load jobs at start-up")?;
    info!(armed, "Boot reschedule complete");

    let poller = constraints.spawn_poller(config.constraints.poll_interval(), shutdown.clone());
    let _watcher = match watch_store(&config.store.path, service.clone(), shutdown.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Job file changes will not be picked up: {:#}", e);
            None
        }
    };
    spawn_signal_handler(shutdown.clone());

    service.engine().run(events, shutdown.clone()).await;
    shutdown.cancel();

    // Scripts still running keep going; their next occurrences are
    // re-armed by the next boot.
    if let Err(e) = poller.await {
        error!("Constraint poller ended abnormally: {}", e);
    }
    info!("autocron stopped");
    Ok(())
}

/// Stop on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("Received Ctrl-C");
        }
        shutdown.cancel();
    });
}

/// Resynchronise alarms whenever the job file is rewritten by another
/// process (the one-shot commands, or an editor).
fn watch_store(
    store: &Path,
    service: Arc<CronService>,
    shutdown: CancellationToken,
) -> anyhow::Result<RecommendedWatcher> {
    // Replacement is a rename into place, so watch the directory.
    let dir = store
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            if let Ok(event) = result {
                let _ = tx.send(event);
            }
        },
        WatchConfig::default().with_poll_interval(Duration::from_secs(2)),
    )
    .context("Failed to create file watcher")?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    info!(dir = %dir.display(), "Watching job file");

    let target = store.to_path_buf();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if !touches(&event, &target) {
                        continue;
                    }
                    debug!(paths = ?event.paths, "Job file changed");
                    tokio::time::sleep(RESYNC_DEBOUNCE).await;
                    while rx.try_recv().is_ok() {}
                    if let Err(e) = service.reschedule_all().await {
                        error!("Failed to resynchronise after job file change: {}", e);
                    }
                }
            }
        }
        debug!("Job file watcher stopped");
    });

    Ok(watcher)
}

fn touches(event: &Event, target: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == target.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn test_touches_only_job_file() {
        let target = PathBuf::from("/home/u/.autocron/jobs.json");

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/home/u/.autocron/jobs.json"));
        assert!(touches(&event, &target));

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/home/u/.autocron/config.toml"));
        assert!(!touches(&event, &target));

        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/home/u/.autocron/jobs.json"));
        assert!(!touches(&event, &target));
    }
}

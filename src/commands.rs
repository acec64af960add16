//! One-shot commands. Each prints a single result line.

use autocron_core::{CronClock, CronError, CronService};
use autocron_protocols::{JobEntry, JobId, JobSpec};
use chrono::{Local, Utc};

/// A command that runs against the job file and exits.
pub(crate) enum OneShot {
    Add(JobSpec),
    Replace(JobId, JobSpec),
    List,
    Info(JobId),
    Cancel(JobId),
    CancelAll,
}

pub(crate) async fn execute(service: &CronService, command: OneShot) -> Result<String, CronError> {
    match command {
        OneShot::Add(spec) => {
            let entry = service.schedule(&spec).await?;
            Ok(format!("Scheduled job {}{}", entry.id, next_run_suffix(&entry)))
        }
        OneShot::Replace(id, spec) => {
            let entry = service.replace(id, &spec).await?;
            Ok(format!("Replaced job {}{}", entry.id, next_run_suffix(&entry)))
        }
        OneShot::List => {
            let lines = service.list().await?;
            if lines.is_empty() {
                Ok("No jobs scheduled".to_string())
            } else {
                Ok(lines.join("\n"))
            }
        }
        OneShot::Info(id) => service.info(id).await,
        OneShot::Cancel(id) => {
            let entry = service.cancel(id).await?;
            Ok(format!("Cancelled job {}", entry.id))
        }
        OneShot::CancelAll => {
            let count = service.cancel_all().await?;
            Ok(format!("Cancelled {count} job(s)"))
        }
    }
}

/// Explain an expression without touching the job file.
pub(crate) fn describe(expression: &str) -> Result<String, CronError> {
    CronClock::validate(expression)?;
    let next = CronClock::next_trigger(expression, Utc::now())?;
    Ok(format!(
        "{}, next at {}",
        CronClock::describe(expression),
        next.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z")
    ))
}

fn next_run_suffix(entry: &JobEntry) -> String {
    match CronClock::next_trigger(&entry.cron_expression, Utc::now()) {
        Ok(at) => format!(
            ", next run {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z")
        ),
        Err(_) => ", no run scheduled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use autocron_config::Config;
    use autocron_core::MemoryTextStore;

    use crate::wiring::{build_with_store, Wiring};

    fn wiring() -> Wiring {
        build_with_store(&Config::default(), Arc::new(MemoryTextStore::new()))
    }

    #[tokio::test]
    async fn test_add_list_cancel() {
        let wiring = wiring();
        let service = &wiring.service;
        let line = execute(service, OneShot::Add(JobSpec::new("*/5 * * * *", "/bin/true")))
            .await
            .unwrap();
        assert!(line.starts_with("Scheduled job 1, next run "));

        let list = execute(service, OneShot::List).await.unwrap();
        assert_eq!(list, "1 | */5 * * * * |  | /bin/true");

        let line = execute(service, OneShot::Cancel(JobId(1))).await.unwrap();
        assert_eq!(line, "Cancelled job 1");
        assert_eq!(execute(service, OneShot::List).await.unwrap(), "No jobs scheduled");
    }

    #[tokio::test]
    async fn test_missing_job() {
        let wiring = wiring();
        let service = &wiring.service;
        let err = execute(service, OneShot::Info(JobId(9))).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Job 9 not found");
    }

    #[tokio::test]
    async fn test_invalid_spec_is_one_line() {
        let wiring = wiring();
        let service = &wiring.service;
        let err = execute(service, OneShot::Add(JobSpec::new("not cron", "/bin/true")))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains('\n'));
        assert_eq!(execute(service, OneShot::List).await.unwrap(), "No jobs scheduled");
    }

    #[tokio::test]
    async fn test_cancel_all_counts() {
        let wiring = wiring();
        let service = &wiring.service;
        for _ in 0..3 {
            execute(service, OneShot::Add(JobSpec::new("0 * * * *", "/bin/true")))
                .await
                .unwrap();
        }
        let line = execute(service, OneShot::CancelAll).await.unwrap();
        assert_eq!(line, "Cancelled 3 job(s)");
    }

    #[test]
    fn test_describe() {
        let line = describe("0 */6 * * *").unwrap();
        assert!(line.starts_with("every 6 hours, next at "));
        assert!(describe("61 * * * *").is_err());
    }
}

//! Human-facing one-line renderings of jobs.

use autocron_protocols::JobEntry;
use chrono::{DateTime, Local, Utc};

use crate::clock::CronClock;
use crate::trigger::TriggerState;

/// `<id> | <cron> | <constraint code> | <script>`
pub fn summary_line(entry: &JobEntry) -> String {
    format!(
        "{} | {} | {} | {}",
        entry.id,
        entry.cron_expression,
        entry.constraint_code(),
        entry.script_path.display()
    )
}

/// Summary line followed by the schedule, the next run and the limits.
pub fn detail_line(
    entry: &JobEntry,
    next_run: Option<DateTime<Utc>>,
    state: Option<TriggerState>,
) -> String {
    let mut parts = vec![summary_line(entry), CronClock::describe(&entry.cron_expression)];

    match next_run {
        Some(at) => parts.push(format!(
            "next run {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z")
        )),
        None => parts.push("no run scheduled".to_string()),
    }
    if let Some(state) = state {
        parts.push(format!("current run {}", state.to_string().to_lowercase()));
    }

    let mut limits = Vec::new();
    if entry.max_runtime_ms > 0 {
        limits.push(format!("max runtime {}ms", entry.max_runtime_ms));
    }
    limits.push(format!("grace {}ms", entry.grace_period_ms));
    if entry.is_constrained() {
        if entry.constraint_timeout_ms > 0 {
            limits.push(format!("constraint timeout {}ms", entry.constraint_timeout_ms));
        }
        if entry.continue_on_constraint_break {
            limits.push("keeps running on constraint break".to_string());
        }
    }
    parts.push(limits.join(", "));

    parts.join(" | ")
}

//! CronClock: five-field UNIX cron expressions to trigger instants.
//!
//! The `cron` crate expects a leading seconds field and numbers Sunday as 1,
//! so expressions are rewritten before parsing. Day-of-week values are
//! expanded into an explicit list of day names, which also covers UNIX's
//! `0` and `7` for Sunday and ranges that wrap past Saturday.
//!
//! When day-of-month and day-of-week are both restricted, UNIX cron fires
//! when *either* matches. The `cron` crate requires both, so such
//! expressions are compiled into two schedules and the earlier occurrence
//! wins.

use std::collections::BTreeSet;
use std::str::FromStr;

use autocron_protocols::{ScheduleError, ValidationError};
use chrono::{DateTime, Local, TimeZone, Utc};
use cron::Schedule;

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// The five fields of a UNIX cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fields {
    minute: String,
    hour: String,
    day_of_month: String,
    month: String,
    day_of_week: String,
}

impl Fields {
    fn split(expression: &str) -> Result<Self, String> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(format!("expected 5 fields, got {}", parts.len()));
        }
        Ok(Self {
            minute: parts[0].to_string(),
            hour: parts[1].to_string(),
            day_of_month: parts[2].to_string(),
            month: parts[3].to_string(),
            day_of_week: parts[4].to_string(),
        })
    }
}

fn is_unrestricted(field: &str) -> bool {
    field.starts_with('*') || field == "?"
}

fn expand_macro(expression: &str) -> Result<&str, String> {
    match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        other => Err(format!("unsupported macro {other}")),
    }
}

fn parse_day(value: &str) -> Result<u8, String> {
    if let Ok(n) = value.parse::<u8>() {
        return if n <= 7 {
            Ok(n)
        } else {
            Err(format!("day-of-week {n} out of range"))
        };
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
        .map(|i| i as u8)
        .ok_or_else(|| format!("unknown day-of-week '{value}'"))
}

/// Expand a day-of-week field into UNIX day numbers (0 = Sunday).
fn expand_days(field: &str) -> Result<BTreeSet<u8>, String> {
    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .map_err(|_| format!("bad step in '{item}'"))?;
                if step == 0 {
                    return Err(format!("zero step in '{item}'"));
                }
                (range, step)
            }
            None => (item, 1),
        };
        let (first, last) = if range == "*" {
            (0, 6)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_day(a)?, parse_day(b)?)
        } else {
            let first = parse_day(range)?;
            (first, if step > 1 { 6 } else { first })
        };
        if first > last {
            return Err(format!("descending range '{range}'"));
        }
        for day in (first..=last).step_by(step as usize) {
            days.insert(day % 7);
        }
    }
    if days.is_empty() {
        return Err(format!("day-of-week '{field}' selects no day"));
    }
    Ok(days)
}

fn days_for_cron_crate(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok("*".to_string());
    }
    let days = expand_days(field)?;
    Ok(days
        .iter()
        .map(|d| DAY_NAMES[*d as usize])
        .collect::<Vec<_>>()
        .join(","))
}

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    fields: Fields,
    schedules: Vec<Schedule>,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let unparseable = |reason: String| ScheduleError::Unparseable {
            expression: expression.to_string(),
            reason,
        };

        let trimmed = expression.trim();
        let source = if trimmed.starts_with('@') {
            expand_macro(trimmed).map_err(unparseable)?
        } else {
            trimmed
        };
        let fields = Fields::split(source).map_err(unparseable)?;
        let day_of_week = days_for_cron_crate(&fields.day_of_week).map_err(unparseable)?;

        let compile = |dom: &str, dow: &str| {
            let six = format!(
                "0 {} {} {} {} {}",
                fields.minute, fields.hour, dom, fields.month, dow
            );
            Schedule::from_str(&six).map_err(|e| unparseable(e.to_string()))
        };

        let schedules = if is_unrestricted(&fields.day_of_month)
            || is_unrestricted(&fields.day_of_week)
        {
            vec![compile(&fields.day_of_month, &day_of_week)?]
        } else {
            vec![
                compile(&fields.day_of_month, "*")?,
                compile("*", &day_of_week)?,
            ]
        };

        Ok(Self {
            expression: trimmed.to_string(),
            fields,
            schedules,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `from`.
    pub fn next_after<Tz: TimeZone>(&self, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(from).next())
            .min()
    }

    pub fn describe(&self) -> String {
        describe_fields(&self.fields)
    }
}

/// Pure functions over cron expressions.
pub struct CronClock;

impl CronClock {
    /// Next trigger after `from`, evaluated in the local time zone.
    pub fn next_trigger(
        expression: &str,
        from: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let local = Self::next_trigger_in(expression, &from.with_timezone(&Local))?;
        Ok(local.with_timezone(&Utc))
    }

    /// Next trigger after `from`, evaluated in `from`'s time zone.
    pub fn next_trigger_in<Tz: TimeZone>(
        expression: &str,
        from: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, ScheduleError> {
        CronSchedule::parse(expression)?
            .next_after(from)
            .ok_or_else(|| ScheduleError::NoUpcoming(expression.to_string()))
    }

    /// Check an expression at job creation time.
    pub fn validate(expression: &str) -> Result<(), ValidationError> {
        let bad = |reason: String| ValidationError::BadCronExpression {
            expression: expression.to_string(),
            reason,
        };
        let schedule = CronSchedule::parse(expression).map_err(|e| match e {
            ScheduleError::Unparseable { reason, .. } => bad(reason),
            other => bad(other.to_string()),
        })?;
        if schedule.next_after(&Utc::now()).is_none() {
            return Err(bad("expression never fires".to_string()));
        }
        Ok(())
    }

    /// Best-effort English rendering; echoes the expression when it cannot
    /// be parsed.
    pub fn describe(expression: &str) -> String {
        match CronSchedule::parse(expression) {
            Ok(schedule) => schedule.describe(),
            Err(_) => expression.to_string(),
        }
    }
}

fn plural(n: &str, unit: &str) -> String {
    if n == "1" {
        format!("every {unit}")
    } else {
        format!("every {n} {unit}s")
    }
}

fn describe_days(field: &str) -> String {
    let Ok(days) = expand_days(field) else {
        return format!("day-of-week {field}");
    };
    let names: Vec<String> = days
        .iter()
        .map(|d| {
            let name = DAY_NAMES[*d as usize];
            format!("{}{}", &name[..1], name[1..].to_ascii_lowercase())
        })
        .collect();
    let days: Vec<u8> = days.into_iter().collect();
    let contiguous = days.windows(2).all(|w| w[1] == w[0] + 1);
    if contiguous && names.len() >= 3 {
        format!("{}-{}", names[0], names[names.len() - 1])
    } else {
        names.join(", ")
    }
}

fn describe_month(field: &str) -> String {
    match field.parse::<usize>() {
        Ok(m) if (1..=12).contains(&m) => MONTH_NAMES[m - 1].to_string(),
        _ => format!("month {field}"),
    }
}

fn day_qualifiers(fields: &Fields) -> Vec<String> {
    let mut parts = Vec::new();
    if !is_unrestricted(&fields.day_of_month) {
        parts.push(format!("on day {} of the month", fields.day_of_month));
    }
    if !is_unrestricted(&fields.day_of_week) {
        let days = format!("on {}", describe_days(&fields.day_of_week));
        if parts.is_empty() {
            parts.push(days);
        } else {
            parts.push(format!("or {days}"));
        }
    }
    if !is_unrestricted(&fields.month) {
        parts.push(format!("in {}", describe_month(&fields.month)));
    }
    parts
}

fn describe_fields(fields: &Fields) -> String {
    let numeric = |s: &str| s.parse::<u32>().ok();
    let step = |s: &str| s.strip_prefix("*/").map(str::to_string);

    let time = match (
        fields.minute.as_str(),
        fields.hour.as_str(),
        numeric(&fields.minute),
        numeric(&fields.hour),
    ) {
        ("*", "*", _, _) => "every minute".to_string(),
        (m, "*", _, _) if step(m).is_some() => plural(&step(m).unwrap_or_default(), "minute"),
        (_, "*", Some(m), _) => format!("at minute {m} of every hour"),
        (_, h, Some(0), _) if step(h).is_some() => plural(&step(h).unwrap_or_default(), "hour"),
        (_, h, Some(m), _) if step(h).is_some() => format!(
            "{} at minute {m}",
            plural(&step(h).unwrap_or_default(), "hour")
        ),
        (_, _, Some(m), Some(h)) => format!("at {h:02}:{m:02}"),
        _ => {
            return format!(
                "minute {}, hour {}, day-of-month {}, month {}, day-of-week {}",
                fields.minute, fields.hour, fields.day_of_month, fields.month, fields.day_of_week
            );
        }
    };

    let qualifiers = day_qualifiers(fields);
    if qualifiers.is_empty() {
        if time.starts_with("at ") && numeric(&fields.hour).is_some() {
            format!("{time} every day")
        } else {
            time
        }
    } else {
        format!("{time} {}", qualifiers.join(" "))
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

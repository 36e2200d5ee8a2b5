use crate::error::EngineError;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

/// First occurrence of `expression` strictly after `from`.
pub fn next_run_for(expression: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, EngineError> {
    parse_schedule(expression)?
        .after(&from)
        .next()
        .ok_or_else(|| {
            EngineError::InvalidSchedule(format!("no future occurrence for {expression}"))
        })
}

pub fn parse_schedule(expression: &str) -> Result<Schedule, EngineError> {
    let normalized = normalize_expression(expression)?;
    Schedule::from_str(&normalized)
        .map_err(|e| EngineError::InvalidSchedule(format!("{expression}: {e}")))
}

fn normalize_expression(expression: &str) -> Result<String, EngineError> {
    let expression = expression.trim();
    let field_count = expression.split_whitespace().count();

    match field_count {
        // standard crontab syntax: minute hour day month weekday
        5 => Ok(format!("0 {expression}")),
        // crate-native syntax includes seconds (+ optional year)
        6 | 7 => Ok(expression.to_string()),
        _ => Err(EngineError::InvalidSchedule(format!(
            "{expression} (expected 5, 6, or 7 fields, got {field_count})"
        ))),
    }
}

pub(crate) fn millis_to_datetime(raw: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(raw)
}

//! Time window resolution.
//!
//! Relative windows end at `now`. Months count as 30 days and years as
//! 365 days. A missing or unrecognized unit yields a 7-day window whatever
//! the count.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::error::{CompileError, CompileResult};
use crate::report::{TimeRange, TimeUnit};

/// Format used when binding a bound as a parameter.
pub const BOUND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Inclusive bounds; `None` is an open side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeBounds {
    /// Render a bound the way it is bound as a parameter.
    pub fn format(bound: NaiveDateTime) -> String {
        bound.format(BOUND_FORMAT).to_string()
    }
}

/// Resolve a window against `now`.
pub fn resolve(range: &TimeRange, now: NaiveDateTime) -> CompileResult<TimeBounds> {
    match range {
        TimeRange::Absolute { start, end } => Ok(TimeBounds {
            start: parse_bound(start.as_deref())?,
            end: parse_bound(end.as_deref())?,
        }),
        TimeRange::Relative { value, unit } => {
            let delta = relative_delta(value.unwrap_or(0), unit.as_deref())?;
            let start = now.checked_sub_signed(delta).ok_or_else(|| {
                CompileError::InvalidTimeRange("relative window out of range".into())
            })?;
            Ok(TimeBounds {
                start: Some(start),
                end: Some(now),
            })
        }
    }
}

fn relative_delta(count: i64, unit: Option<&str>) -> CompileResult<Duration> {
    let overflow = || CompileError::InvalidTimeRange(format!("window of {count} is too large"));
    let days = |n: i64| count.checked_mul(n).and_then(Duration::try_days);

    let delta = match unit.and_then(TimeUnit::parse) {
        Some(TimeUnit::Hours) => Duration::try_hours(count),
        Some(TimeUnit::Days) => days(1),
        Some(TimeUnit::Weeks) => Duration::try_weeks(count),
        Some(TimeUnit::Months) => days(30),
        Some(TimeUnit::Years) => days(365),
        None => Duration::try_days(DEFAULT_WINDOW_DAYS),
    };
    delta.ok_or_else(overflow)
}

/// Parse one absolute bound. Blank or absent means open.
fn parse_bound(raw: Option<&str>) -> CompileResult<Option<NaiveDateTime>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.naive_utc()));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(dt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date.and_time(NaiveTime::MIN)));
    }

    Err(CompileError::InvalidTimeRange(format!(
        "cannot parse timestamp '{raw}'"
    )))
}

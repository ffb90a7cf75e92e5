//! Field matcher and next-occurrence stepping loop for the `cron(...)`
//! half of the Expression Parser.
//!
//! Association schedules are always UTC (there is no timezone field in
//! the wire syntax), so this evaluates directly against `DateTime<Utc>`.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// A cron expression split into its positional fields, independent of
/// whether the source had 5, 6, or 7 tokens (see [`super::split_fields`]).
pub struct CronFields<'a> {
    pub second: Option<&'a str>,
    pub minute: &'a str,
    pub hour: &'a str,
    pub day_of_month: &'a str,
    pub month: &'a str,
    pub day_of_week: &'a str,
    pub year: Option<&'a str>,
}

fn field_matches(field: &str, value: u32) -> bool {
    if field == "*" || field == "?" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value % n == 0;
        }
        return false;
    }
    // AWS-style "N/M" step starting at N (e.g. month "1/1").
    if let Some((start_s, step_s)) = field.split_once('/') {
        if let (Ok(start), Ok(step)) = (start_s.parse::<u32>(), step_s.parse::<u32>()) {
            if step == 0 {
                return false;
            }
            return value >= start && (value - start) % step == 0;
        }
    }
    for part in field.split(',') {
        if let Some((start_s, end_s)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start_s.parse::<u32>(), end_s.parse::<u32>()) {
                if value >= start && value <= end {
                    return true;
                }
            }
        } else if let Ok(n) = part.parse::<u32>() {
            if value == n {
                return true;
            }
        }
    }
    false
}

/// Match a candidate instant against every field. The seconds field (when
/// present) is only ever checked against zero — we step at minute
/// granularity, so any other seconds value can never be satisfied and is
/// rejected up front by the parser instead.
pub fn matches(fields: &CronFields<'_>, dt: &DateTime<Utc>) -> bool {
    field_matches(fields.minute, dt.minute())
        && field_matches(fields.hour, dt.hour())
        && field_matches(fields.day_of_month, dt.day())
        && field_matches(fields.month, dt.month())
        && field_matches(fields.day_of_week, dt.weekday().num_days_from_sunday())
        && fields
            .year
            .map(|y| field_matches(y, dt.year() as u32))
            .unwrap_or(true)
}

/// Step minute-by-minute from just after `after` looking for the next
/// matching instant, up to one year out. Mirrors the bounded stepping loop
/// used for IANA-timezone cron evaluation, simplified to plain UTC.
pub fn next(fields: &CronFields<'_>, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut candidate = after
        .with_second(0)
        .unwrap_or(*after)
        .with_nanosecond(0)
        .unwrap_or(*after)
        + Duration::minutes(1);

    let max_checks = 366 * 24 * 60;
    for _ in 0..max_checks {
        if matches(fields, &candidate) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }
    None
}

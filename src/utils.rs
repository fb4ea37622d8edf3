use crate::error::{PerformanceError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parses a JSON value as a decimal. Accepts numbers and numeric strings
/// (surrounding whitespace and thousands separators are ignored).
pub fn parse_decimal(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}

/// Non-negative decimal, 0 when missing or unparsable.
pub fn coerce_amount(value: Option<&Value>) -> f64 {
    value.and_then(parse_decimal).map(|v| v.max(0.0)).unwrap_or(0.0)
}

/// Non-negative integer, 0 when missing or unparsable. Fractions are truncated.
pub fn coerce_quantity(value: Option<&Value>) -> u64 {
    value
        .and_then(parse_decimal)
        .map(|v| if v > 0.0 { v.trunc() as u64 } else { 0 })
        .unwrap_or(0)
}

/// Parses a timestamp from RFC 3339, a naive date-time, a plain date, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Month number from `3`, `"03"`, `"March"` or `"mar"`. Out-of-range values yield `None`.
pub fn parse_month(value: &Value) -> Option<u32> {
    if let Some(n) = parse_decimal(value) {
        let month = n.trunc() as i64;
        return (1..=12).contains(&month).then_some(month as u32);
    }

    let name = value.as_str()?.trim().to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|full| full.starts_with(name.as_str()))
        .map(|idx| idx as u32 + 1)
}

pub fn parse_year(value: &Value) -> Option<i32> {
    let n = parse_decimal(value)?.trunc();
    (n >= 1.0 && n <= i32::MAX as f64).then_some(n as i32)
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(PerformanceError::Validation(format!(
            "Invalid month {}: must be between 1 and 12",
            month
        )));
    }
    Ok(())
}

/// Joins a base URL and a path segment with exactly one slash between them.
pub fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Current instant as ISO-8601 with millisecond precision, e.g.
/// `2024-05-01T09:30:00.123Z`.
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

pub fn format_iso(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// `now`, unless the clock has not moved past `previous`; then one
/// millisecond after `previous`. Unparseable input yields `now`.
pub fn advance_past(previous: &str, now: &str) -> String {
    match (
        parse_datetime(previous, "previous timestamp"),
        parse_datetime(now, "current timestamp"),
    ) {
        (Ok(previous), Ok(current)) if current <= previous => {
            format_iso(previous + Duration::milliseconds(1))
        }
        _ => now.to_string(),
    }
}

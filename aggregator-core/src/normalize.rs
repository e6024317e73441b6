//! Unit and time normalization shared by the provider adapters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const MS_TO_KPH: f64 = 3.6;

/// Naive timestamp layouts seen across providers, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// What an adapter reports when the upstream timestamp can't be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFallback {
    /// Leave the timestamp out.
    Omit,
    /// Substitute the current wall-clock time.
    Now,
}

impl TimestampFallback {
    pub fn resolve(self, parsed: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match (parsed, self) {
            (Some(ts), _) => Some(ts),
            (None, TimestampFallback::Omit) => None,
            (None, TimestampFallback::Now) => Some(Utc::now()),
        }
    }
}

pub fn ms_to_kph(speed_ms: f64) -> f64 {
    speed_ms * MS_TO_KPH
}

/// Parses an ISO-8601 timestamp. Values without an offset are read as UTC.
pub fn parse_iso_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|ndt| ndt.and_utc())
}

pub fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

/// Combines a `YYYY-MM-DD` date with an encoded time of day such as `"0"`,
/// `"300"` or `"1530"`. Values of 100 and above are `HHMM`; smaller values
/// are minutes past midnight. An unreadable or out-of-range time falls back
/// to midnight.
pub fn combine_date_and_hhmm(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;

    let encoded: u32 = time.and_then(|t| t.trim().parse().ok()).unwrap_or(0);
    let (hour, minute) = if encoded >= 100 {
        (encoded / 100, encoded % 100)
    } else {
        (encoded / 60, encoded % 60)
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);

    Some(date.and_time(time).and_utc())
}

/// Day count for providers that take a whole-day horizon.
pub fn days_for_hours(hours: u32) -> u32 {
    hours.div_ceil(24).max(1)
}

/// Point count for providers with a 3-hour grid capped at five days.
pub fn three_hour_points(hours: u32) -> u32 {
    hours.min(5 * 24).div_ceil(3)
}

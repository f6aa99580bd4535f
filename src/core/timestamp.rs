//! Timestamp formatting and clock sources
//!
//! Provides standardized, configurable timestamp formats for structured output and an
//! injectable [`Clock`] so time-based behavior (message stamps, interval rotation,
//! archive names) can be driven deterministically.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standardized timestamp format options
///
/// Supports the formats commonly expected by log aggregation tools
/// (Elasticsearch, Splunk, Loki, etc.)
///
/// # Examples
///
/// ```
/// use rust_log_engine::core::timestamp::TimestampFormat;
/// use chrono::Utc;
///
/// let format = TimestampFormat::Iso8601;
/// let timestamp = format.format(&Utc::now());
/// assert!(timestamp.ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// RFC 3339 format: `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Unix timestamp in microseconds: `1736332245123456`
    UnixMicros,

    /// Custom strftime format
    ///
    /// ```
    /// use rust_log_engine::core::timestamp::TimestampFormat;
    ///
    /// // Apache log format
    /// let format = TimestampFormat::Custom("%d/%b/%Y:%H:%M:%S %z".to_string());
    /// assert!(format.is_valid());
    /// ```
    Custom(String),
}

impl TimestampFormat {
    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        let mut out = String::with_capacity(32);
        if self.write_to(datetime, &mut out).is_err() {
            out.clear();
        }
        out
    }

    /// Write the timestamp without allocating.
    ///
    /// Fails with `fmt::Error` when a custom pattern is invalid or `out` refuses the text.
    pub fn write_to<W: fmt::Write + ?Sized>(&self, datetime: &DateTime<Utc>, out: &mut W) -> fmt::Result {
        match self {
            TimestampFormat::Iso8601 => write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            TimestampFormat::Iso8601Micros => {
                write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
            }
            TimestampFormat::Rfc3339 => write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
            TimestampFormat::Unix => write!(out, "{}", datetime.timestamp()),
            TimestampFormat::UnixMillis => write!(out, "{}", datetime.timestamp_millis()),
            TimestampFormat::UnixMicros => write!(out, "{}", datetime.timestamp_micros()),
            TimestampFormat::Custom(pattern) => {
                if !is_valid_pattern(pattern) {
                    return Err(fmt::Error);
                }
                write!(out, "{}", datetime.format(pattern))
            }
        }
    }

    /// The number a Unix-based format stands for; `None` for text formats
    pub fn unix_value(&self, datetime: &DateTime<Utc>) -> Option<i64> {
        match self {
            TimestampFormat::Unix => Some(datetime.timestamp()),
            TimestampFormat::UnixMillis => Some(datetime.timestamp_millis()),
            TimestampFormat::UnixMicros => Some(datetime.timestamp_micros()),
            _ => None,
        }
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TimestampFormat::Unix | TimestampFormat::UnixMillis | TimestampFormat::UnixMicros
        )
    }

    /// `false` only for a custom pattern chrono cannot render
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            TimestampFormat::Custom(pattern) => is_valid_pattern(pattern),
            _ => true,
        }
    }

    /// Get a description of this format
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            TimestampFormat::Iso8601 => "ISO 8601 with milliseconds (2025-01-08T10:30:45.123Z)",
            TimestampFormat::Iso8601Micros => {
                "ISO 8601 with microseconds (2025-01-08T10:30:45.123456Z)"
            }
            TimestampFormat::Rfc3339 => "RFC 3339 with timezone (2025-01-08T10:30:45+00:00)",
            TimestampFormat::Unix => "Unix timestamp in seconds (1736332245)",
            TimestampFormat::UnixMillis => "Unix timestamp in milliseconds (1736332245123)",
            TimestampFormat::UnixMicros => "Unix timestamp in microseconds (1736332245123456)",
            TimestampFormat::Custom(_) => "Custom strftime format",
        }
    }
}

/// Whether chrono accepts `pattern` as a strftime format
pub fn is_valid_pattern(pattern: &str) -> bool {
    StrftimeItems::new(pattern).all(|item| !matches!(item, Item::Error))
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// ```
/// use rust_log_engine::core::timestamp::{Clock, ManualClock};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 8, 23, 59, 0).unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::minutes(2));
/// assert_eq!(clock.now(), start + Duration::minutes(2));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_datetime() -> DateTime<Utc> {
        // 2025-01-08 10:30:45.123456 UTC
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + Duration::microseconds(123456)
    }

    #[test]
    fn test_iso8601_format() {
        let result = TimestampFormat::Iso8601.format(&fixed_datetime());
        assert_eq!(result, "2025-01-08T10:30:45.123Z");
    }

    #[test]
    fn test_iso8601_micros_format() {
        let result = TimestampFormat::Iso8601Micros.format(&fixed_datetime());
        assert_eq!(result, "2025-01-08T10:30:45.123456Z");
    }

    #[test]
    fn test_rfc3339_format() {
        let result = TimestampFormat::Rfc3339.format(&fixed_datetime());
        assert_eq!(result, "2025-01-08T10:30:45.123456+00:00");
    }

    #[test]
    fn test_unix_formats_are_nested() {
        let dt = fixed_datetime();
        let secs: i64 = TimestampFormat::Unix.format(&dt).parse().unwrap();
        let millis: i64 = TimestampFormat::UnixMillis.format(&dt).parse().unwrap();
        let micros: i64 = TimestampFormat::UnixMicros.format(&dt).parse().unwrap();
        assert_eq!(millis / 1000, secs);
        assert_eq!(micros / 1000, millis);
    }

    #[test]
    fn test_unix_value_matches_text() {
        let dt = fixed_datetime();
        for format in [TimestampFormat::Unix, TimestampFormat::UnixMillis, TimestampFormat::UnixMicros] {
            assert_eq!(format.unix_value(&dt).map(|v| v.to_string()), Some(format.format(&dt)));
        }
        assert_eq!(TimestampFormat::Iso8601.unix_value(&dt), None);
        assert_eq!(TimestampFormat::Custom("%s".to_string()).unix_value(&dt), None);
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::Custom("%d/%b/%Y:%H:%M:%S +0000".to_string());
        assert_eq!(format.format(&fixed_datetime()), "08/Jan/2025:10:30:45 +0000");
    }

    #[test]
    fn test_invalid_custom_format() {
        let format = TimestampFormat::Custom("%Q".to_string());
        assert!(!format.is_valid());
        let mut out = String::new();
        assert!(format.write_to(&fixed_datetime(), &mut out).is_err());
        assert_eq!(format.format(&fixed_datetime()), "");
    }

    #[test]
    fn test_is_numeric() {
        assert!(!TimestampFormat::Iso8601.is_numeric());
        assert!(!TimestampFormat::Rfc3339.is_numeric());
        assert!(TimestampFormat::Unix.is_numeric());
        assert!(TimestampFormat::UnixMillis.is_numeric());
        assert!(TimestampFormat::UnixMicros.is_numeric());
        assert!(!TimestampFormat::Custom("%Y".to_string()).is_numeric());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&TimestampFormat::Iso8601).expect("serialize");
        assert_eq!(json, "\"Iso8601\"");

        let format: TimestampFormat =
            serde_json::from_str(r#"{"Custom":"%Y-%m-%d"}"#).expect("deserialize Custom");
        assert_eq!(format, TimestampFormat::Custom("%Y-%m-%d".to_string()));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(fixed_datetime());
        assert_eq!(clock.now(), fixed_datetime());
        clock.advance(Duration::hours(1));
        assert_eq!(clock.now(), fixed_datetime() + Duration::hours(1));
        clock.set(fixed_datetime());
        assert_eq!(clock.now(), fixed_datetime());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}

//! # Temporal Types: UTC-Only Timestamps
//!
//! `Timestamp` is the wire type for every time-valued resource field
//! (`endOfLifeTimestamp`, `expiresAt`, the system-data audit times).
//! Values are UTC, truncated to whole seconds, and render as
//! `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! Strict parsing ([`Timestamp::parse`]) requires the `Z` suffix. Request
//! bodies are decoded leniently through serde, which accepts any RFC 3339
//! offset and converts to UTC.

use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::shape::{Reflect, ScalarKind, Shape};

/// Failure to parse a timestamp string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp must use Z suffix (UTC only), got: {0:?}")]
    NotUtc(String),

    #[error("invalid RFC 3339 timestamp {input:?}: {reason}")]
    Invalid { input: String, reason: String },
}

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, TimestampError> {
        if !s.ends_with('Z') {
            return Err(TimestampError::NotUtc(s.to_string()));
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, TimestampError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| TimestampError::Invalid {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Shift by a signed duration.
    pub fn offset(&self, by: Duration) -> Self {
        Self(self.0 + by)
    }

    /// Render as ISO 8601 with Z suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_lenient(&s).map_err(serde::de::Error::custom)
    }
}

impl Reflect for Timestamp {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Timestamp)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc
            .with_ymd_and_hms(2026, 1, 15, 12, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(Timestamp::from_utc(dt).to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn test_parse_strict_requires_z() {
        assert!(Timestamp::parse("2026-01-15T12:00:00Z").is_ok());
        assert_eq!(
            Timestamp::parse("2026-01-15T12:00:00+00:00"),
            Err(TimestampError::NotUtc("2026-01-15T12:00:00+00:00".into()))
        );
        assert!(matches!(
            Timestamp::parse("not-a-dateZ"),
            Err(TimestampError::Invalid { .. })
        ));
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let ts = Timestamp::parse_lenient("2026-01-15T17:00:00+05:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_offset_and_ordering() {
        let base = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let later = base.offset(Duration::seconds(1));
        assert!(base < later);
        assert_eq!(later.to_string(), "2026-01-15T12:00:01Z");
    }

    #[test]
    fn test_serde_uses_iso8601() {
        let ts = Timestamp::parse("2026-01-15T12:00:00.5Z").unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2026-01-15T12:00:00Z\"");
        let back: Timestamp = serde_json::from_str("\"2026-01-15T13:00:00+01:00\"").unwrap();
        assert_eq!(back, ts);
        assert!(serde_json::from_str::<Timestamp>("\"yesterday\"").is_err());
    }

    #[test]
    fn test_reflects_as_timestamp_scalar() {
        assert!(matches!(
            Timestamp::shape(),
            Shape::Scalar(ScalarKind::Timestamp)
        ));
    }
}

//! Wire timestamps.
//!
//! INDI timestamps are `YYYY-MM-DDTHH:MM:SS` with an optional fraction
//! of driver-chosen precision. The received text is kept verbatim, so
//! a value re-serializes with exactly the digits it arrived with and
//! two timestamps differing only in trailing zeros stay distinct, the
//! way they are on the wire. Frames that arrive without a timestamp
//! are stamped with [`Timestamp::now`] at whole-second precision.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `%.f` also accepts the absence of a fraction
const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A timestamp as it appeared on the wire, plus its parsed instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    raw: String,
    datetime: DateTime<Utc>,
}

impl Timestamp {
    /// Wall-clock UTC truncated to whole seconds, the value recorded
    /// when an inbound frame omits its timestamp
    pub fn now() -> Self {
        let datetime = Utc::now();
        Self {
            raw: datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
            datetime,
        }
    }

    /// The parsed instant
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }
}

impl TryFrom<String> for Timestamp {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(&raw, WIRE_FORMAT)
            .map_err(|e| Error::Parse(format!("bad timestamp {:?}: {}", raw, e)))?;
        Ok(Self {
            raw,
            datetime: naive.and_utc(),
        })
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(s.to_string())
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.raw
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_text_round_trips_verbatim() {
        for wire in [
            "2025-01-01T00:00:00",
            "2025-01-01T00:00:00.5",
            "2025-01-01T00:00:00.500",
            "2025-01-01T00:00:00.123456",
        ] {
            let ts: Timestamp = wire.parse().unwrap();
            assert_eq!(ts.to_string(), wire);
        }
    }

    #[test]
    fn test_trailing_zeros_distinguish_values() {
        let short: Timestamp = "2025-01-01T00:00:00.5".parse().unwrap();
        let long: Timestamp = "2025-01-01T00:00:00.500".parse().unwrap();
        assert_ne!(short, long);
        assert_eq!(short.datetime(), long.datetime());
    }

    #[test]
    fn test_parsed_instant() {
        let ts: Timestamp = "2025-06-01T12:00:00.25".parse().unwrap();
        assert_eq!(ts.datetime().timestamp_subsec_millis(), 250);
        assert_eq!(
            ts.datetime().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2025-06-01 12:00:00"
        );
    }

    #[test]
    fn test_now_has_seconds_precision() {
        assert!(!Timestamp::now().to_string().contains('.'));
    }

    #[test]
    fn test_rejects_malformed_text() {
        for bad in [
            "yesterday",
            "2024-02-21 19:30:00",
            "2024-02-21T19:30:00.",
            "2024-02-21T19:30:00Z",
            "2024-13-40T99:99:99",
        ] {
            assert!(bad.parse::<Timestamp>().is_err(), "{} parsed", bad);
        }
    }
}

//! Time utilities for rate snapshots.

use chrono::{DateTime, Utc};

/// A point in time, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert Unix seconds to a UTC instant. `None` when out of range.
pub fn from_unix_seconds(seconds: i64) -> Option<Timestamp> {
    DateTime::from_timestamp(seconds, 0)
}

/// Convert a UTC instant back to Unix seconds, dropping sub-second precision.
pub fn to_unix_seconds(timestamp: Timestamp) -> i64 {
    timestamp.timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_roundtrip() {
        let ts = from_unix_seconds(1_700_000_000).unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert_eq!(to_unix_seconds(ts), 1_700_000_000);
    }

    #[test]
    fn test_out_of_range() {
        assert!(from_unix_seconds(i64::MAX).is_none());
    }
}

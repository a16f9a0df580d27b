// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp encoding shared by every table.
//!
//! Timestamps are UTC text with millisecond precision and a fixed width, so
//! string comparison in SQL matches chronological order.

use chrono::{DateTime, TimeZone, Utc};

/// Format used for every persisted timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Encode a point in time for storage.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Encode epoch milliseconds, as sent by billing providers.
pub fn timestamp_from_millis(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms).single().map(format_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_millis_and_zulu() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 5, 9).unwrap();
        assert_eq!(format_timestamp(at), "2026-03-01T08:05:09.000Z");
    }

    #[test]
    fn millis_round_trip() {
        let s = timestamp_from_millis(1_767_225_600_123).unwrap();
        assert_eq!(s, "2026-01-01T00:00:00.123Z");
        let parsed = DateTime::parse_from_rfc3339(&s).unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_767_225_600_123);
    }

    #[test]
    fn lexical_order_matches_time_order() {
        let a = format_timestamp(Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap());
        let b = format_timestamp(Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap());
        assert!(a < b);
    }
}

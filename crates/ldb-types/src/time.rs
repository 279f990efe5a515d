//! Timestamp formatting.
//!
//! All timestamps written to instance files use the local offset and
//! microsecond precision, e.g. `2022-03-04 10:11:12.123456+01:00`.

use chrono::{DateTime, FixedOffset, Local};

use crate::error::TypeError;

/// On-disk timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

/// Current time formatted for storage.
pub fn now_timestamp() -> String {
    format_timestamp(&Local::now().fixed_offset())
}

/// Format a timestamp for storage.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, TypeError> {
    DateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|_| TypeError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_has_microseconds_and_offset() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let ts = offset
            .with_ymd_and_hms(2022, 3, 4, 10, 11, 12)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2022-03-04 10:11:12.000000+01:00");
    }

    #[test]
    fn now_parses_back() {
        let s = now_timestamp();
        let parsed = parse_timestamp(&s).unwrap();
        assert_eq!(format_timestamp(&parsed), s);
    }

    #[test]
    fn reject_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}

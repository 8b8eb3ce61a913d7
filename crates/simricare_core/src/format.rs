//! Display formatting for Korean users.

use chrono::{DateTime, Datelike, Duration, Timelike};

const KST_OFFSET_HOURS: i64 = 9;

/// Formats an RFC 3339 timestamp as `YYYY년 M월 D일 HH:MM` in Korea Standard Time.
///
/// Input that does not parse is returned unchanged.
pub fn format_date(iso: &str) -> String {
    match DateTime::parse_from_rfc3339(iso) {
        Ok(at) => {
            let local = at.naive_utc() + Duration::hours(KST_OFFSET_HOURS);
            format!(
                "{}년 {}월 {}일 {:02}:{:02}",
                local.year(),
                local.month(),
                local.day(),
                local.hour(),
                local.minute()
            )
        }
        Err(_) => iso.to_string(),
    }
}

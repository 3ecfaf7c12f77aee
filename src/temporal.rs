// src/temporal.rs
//! Publish-time normalization: epoch numbers, relative phrases (English/Korean)
//! and absolute date strings all end up as epoch milliseconds, or `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;

/// Values below this are epoch seconds, at or above it epoch milliseconds.
pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

fn scale_epoch(n: i64) -> i64 {
    if n < MILLIS_THRESHOLD {
        n.saturating_mul(1000)
    } else {
        n
    }
}

fn relative_en_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+)\s*(minutes?|mins?|hours?|hrs?|days?)\s+ago\s*$")
            .expect("relative en regex")
    })
}

fn relative_ko_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*(분|시간|일)\s*전\s*$").expect("relative ko regex"))
}

fn unit_ms(unit: &str) -> Option<i64> {
    let u = unit.to_lowercase();
    if u.starts_with("min") || u == "분" {
        Some(MINUTE_MS)
    } else if u.starts_with("h") || u == "시간" {
        Some(HOUR_MS)
    } else if u.starts_with("day") || u == "일" {
        Some(DAY_MS)
    } else {
        None
    }
}

fn parse_relative(s: &str, now_ms: i64) -> Option<i64> {
    let caps = relative_en_re()
        .captures(s)
        .or_else(|| relative_ko_re().captures(s))?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = unit_ms(caps.get(2)?.as_str())?;
    Some(now_ms.saturating_sub(n.saturating_mul(unit)))
}

fn parse_absolute(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Normalize a textual time representation. Never fails; `None` means unknown.
pub fn text_to_epoch_ms(raw: &str, now_ms: i64) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().map(scale_epoch);
    }
    parse_relative(s, now_ms).or_else(|| parse_absolute(s))
}

/// Normalize a JSON time value (number or string) to epoch milliseconds.
pub fn to_epoch_ms(value: &Value, now_ms: i64) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .map(scale_epoch),
        Value::String(s) => text_to_epoch_ms(s, now_ms),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn seconds_and_millis_agree() {
        assert_eq!(to_epoch_ms(&json!(1_700_000_000), NOW), Some(1_700_000_000_000));
        assert_eq!(to_epoch_ms(&json!(1_700_000_000_000i64), NOW), Some(1_700_000_000_000));
        assert_eq!(to_epoch_ms(&json!("1700000000"), NOW), Some(1_700_000_000_000));
    }

    #[test]
    fn relative_phrases_in_both_languages() {
        assert_eq!(text_to_epoch_ms("2 hours ago", NOW), Some(NOW - 2 * HOUR_MS));
        assert_eq!(text_to_epoch_ms("45 Minutes Ago", NOW), Some(NOW - 45 * MINUTE_MS));
        assert_eq!(text_to_epoch_ms("1 day ago", NOW), Some(NOW - DAY_MS));
        assert_eq!(text_to_epoch_ms("3시간 전", NOW), Some(NOW - 3 * HOUR_MS));
        assert_eq!(text_to_epoch_ms("10분 전", NOW), Some(NOW - 10 * MINUTE_MS));
        assert_eq!(text_to_epoch_ms("2일 전", NOW), Some(NOW - 2 * DAY_MS));
    }

    #[test]
    fn absolute_strings() {
        assert_eq!(
            text_to_epoch_ms("2023-11-14T22:13:20Z", NOW),
            Some(1_700_000_000_000)
        );
        assert_eq!(
            text_to_epoch_ms("Tue, 14 Nov 2023 22:13:20 +0000", NOW),
            Some(1_700_000_000_000)
        );
        assert_eq!(
            text_to_epoch_ms("2023-11-14 22:13:20", NOW),
            Some(1_700_000_000_000)
        );
        assert_eq!(text_to_epoch_ms("2023-11-14", NOW), Some(1_699_920_000_000));
    }

    #[test]
    fn garbage_is_unknown_not_an_error() {
        assert_eq!(text_to_epoch_ms("yesterday-ish", NOW), None);
        assert_eq!(text_to_epoch_ms("", NOW), None);
        assert_eq!(to_epoch_ms(&json!(null), NOW), None);
        assert_eq!(to_epoch_ms(&json!(true), NOW), None);
    }
}

//! Human time expressions.
//!
//! Durations accept the base units `ns`, `us`/`µs`, `ms`, `s`, `m` and `h`
//! (composable, e.g. `1h30m`, with decimal fractions such as `1.5h`), plus a
//! single integer followed by `d` (days) or `w` (weeks).
//!
//! Points in time accept an RFC 3339 timestamp, a bare `YYYY-MM-DD` date
//! (midnight UTC) or a duration, which is read as "that long ago".

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;

use crate::error::TimeParseError;

const NANOSECOND: u128 = 1;
const MICROSECOND: u128 = 1_000 * NANOSECOND;
const MILLISECOND: u128 = 1_000 * MICROSECOND;
const SECOND: u128 = 1_000 * MILLISECOND;
const MINUTE: u128 = 60 * SECOND;
const HOUR: u128 = 60 * MINUTE;

fn days_weeks_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)([dw])$").expect("valid day/week pattern"))
}

fn date_only_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"))
}

/// Parse a duration string with support for days and weeks.
///
/// The base-unit grammar is tried first; `<int>d` and `<int>w` are the
/// fallback.
///
/// ```
/// use chrono::Duration;
/// use release_client::timeparse::parse_duration;
///
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::minutes(90));
/// assert_eq!(parse_duration("2w").unwrap(), Duration::hours(336));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, TimeParseError> {
    if let Some(d) = parse_base_units(s) {
        return Ok(d);
    }

    let captures = days_weeks_pattern()
        .captures(s)
        .ok_or_else(|| TimeParseError::InvalidDuration(s.to_string()))?;

    let value: i64 = captures[1]
        .parse()
        .map_err(|_| TimeParseError::InvalidNumber(captures[1].to_string()))?;

    let duration = match &captures[2] {
        "d" => Duration::try_days(value),
        "w" => Duration::try_weeks(value),
        _ => None,
    };
    duration.ok_or_else(|| TimeParseError::InvalidDuration(s.to_string()))
}

/// Parse base-unit durations (`300ms`, `-1.5h`, `2h45m`).
///
/// Returns `None` for anything outside the grammar, including values that
/// overflow a signed 64-bit nanosecond count.
fn parse_base_units(input: &str) -> Option<Duration> {
    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Some(Duration::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let first = rest.as_bytes()[0];
        if !(first == b'.' || first.is_ascii_digit()) {
            return None;
        }

        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if rest.starts_with('.') {
            rest = &rest[1..];
            let frac_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &rest[..frac_len];
            rest = &rest[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_len = rest
            .bytes()
            .take_while(|c| *c != b'.' && !c.is_ascii_digit())
            .count();
        if unit_len == 0 {
            return None;
        }
        let unit = match &rest[..unit_len] {
            "ns" => NANOSECOND,
            "us" | "µs" | "μs" => MICROSECOND,
            "ms" => MILLISECOND,
            "s" => SECOND,
            "m" => MINUTE,
            "h" => HOUR,
            _ => return None,
        };
        rest = &rest[unit_len..];

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        total = total.checked_add(whole.checked_mul(unit)?)?;

        if !frac_part.is_empty() {
            // Precision past 18 digits is below a nanosecond for every unit.
            let digits = &frac_part[..frac_part.len().min(18)];
            let fraction: f64 = format!("0.{digits}").parse().ok()?;
            total = total.checked_add((fraction * unit as f64) as u128)?;
        }

        if total > i64::MAX as u128 + u128::from(negative) {
            return None;
        }
    }

    let nanos = if negative {
        i64::try_from(-(total as i128)).ok()?
    } else {
        i64::try_from(total).ok()?
    };
    Some(Duration::nanoseconds(nanos))
}

/// Parse a point in time relative to the current instant.
///
/// See [`parse_time_to_utc_at`].
pub fn parse_time_to_utc(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    parse_time_to_utc_at(s, Utc::now())
}

/// Parse a point in time, resolving relative durations against `now`.
///
/// RFC 3339 input keeps its instant; the offset it carries is honoured and
/// the result is expressed in UTC, so `2025-11-02T10:00:00-05:00` and
/// `2025-11-02T15:00:00Z` parse to equal values.
pub fn parse_time_to_utc_at(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }

    if date_only_pattern().is_match(s) {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
    }

    let duration = parse_duration(s).map_err(|_| TimeParseError::InvalidTime(s.to_string()))?;
    now.checked_sub_signed(duration)
        .ok_or_else(|| TimeParseError::InvalidTime(s.to_string()))
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Format a duration as a coarse, human-readable phrase ("3 days").
pub fn format_relative_time(d: Duration) -> String {
    if d < Duration::minutes(1) {
        return "less than a minute".to_string();
    }
    if d < Duration::hours(1) {
        return plural(d.num_minutes(), "minute");
    }
    if d < Duration::hours(24) {
        return plural(d.num_hours(), "hour");
    }

    let days = d.num_hours() / 24;
    if days <= 28 {
        return plural(days, "day");
    }

    let months = days / 30;
    if months < 1 {
        return plural(days / 7, "week");
    }
    if months < 12 {
        return plural(months, "month");
    }

    plural((days / 365).max(1), "year")
}

//! Flexible date/time input normalized to `YYYY-MM-DD HH:MM:SS`.
//!
//! The rewrite steps run in a fixed order; later steps rely on the padding done
//! by earlier ones (the AM/PM step expects a two-digit hour).

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Canonical output format.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

struct Patterns {
    leading_day: Regex,
    inner_month: Regex,
    hour: Regex,
    minute_second: Regex,
    us_date: Regex,
    meridiem: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("invalid built-in date regex");
        Patterns {
            leading_day: re(r"^([0-9])/"),
            inner_month: re(r"/([0-9])/"),
            hour: re(r"(^|[^0-9])([0-9]):"),
            minute_second: re(r":([0-9])([^0-9]|$)"),
            us_date: re(r"([0-9]{2})/([0-9]{2})/([0-9]{4})"),
            meridiem: re(r"(?i)([0-9]{2})(:[0-9]{2}(?::[0-9]{2})?)\s*(am|pm)"),
        }
    })
}

/// Normalize a human-entered date or time.
///
/// Returns `Ok(None)` for empty input and a validation error when the
/// rewritten text still cannot be parsed.
///
/// ```ignore
/// assert_eq!(
///     rowbase::date::normalize("1/2/2020 9:5:3 pm")?.as_deref(),
///     Some("2020-01-02 21:05:03"),
/// );
/// ```
pub fn normalize(input: &str) -> OrmResult<Option<String>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let p = patterns();

    let s = p.leading_day.replace(input, "0${1}/");
    let s = p.inner_month.replace(&s, "/0${1}/");

    let s = p.hour.replace_all(&s, "${1}0${2}:");
    // Twice: a match consumes the separator the next component starts with.
    let s = p.minute_second.replace_all(&s, ":0${1}${2}");
    let s = p.minute_second.replace_all(&s, ":0${1}${2}");

    let s = p.us_date.replace(&s, "${3}-${1}-${2}");

    let s = p.meridiem.replace(&s, |caps: &Captures<'_>| {
        let mut hours: u32 = caps[1].parse().unwrap_or(0);
        let pm = caps[3].eq_ignore_ascii_case("pm");
        if !pm && hours == 12 {
            hours = 0;
        } else if pm && hours < 12 {
            hours += 12;
        }
        format!("{hours:02}{}", &caps[2])
    });

    parse(s.trim())
        .map(|dt| Some(dt.format(FORMAT).to_string()))
        .ok_or_else(|| OrmError::validation(format!("unrecognized date '{input}'")))
}

fn parse(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(Local::now().date_naive().and_time(t));
        }
    }
    None
}

/// Current local time in canonical form, used for timestamp columns.
pub fn now_string() -> String {
    Local::now().format(FORMAT).to_string()
}

/// Normalize a text value bound for a date column; other values pass through.
pub(crate) fn normalize_value(value: &Value) -> OrmResult<Value> {
    match value {
        Value::Text(s) => Ok(normalize(s)?.map_or(Value::Null, Value::Text)),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> Option<String> {
        normalize(s).unwrap()
    }

    #[test]
    fn us_date_with_twelve_hour_time() {
        assert_eq!(norm("1/2/2020 9:5:3 pm").as_deref(), Some("2020-01-02 21:05:03"));
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(norm(""), None);
        assert_eq!(norm("   "), None);
    }

    #[test]
    fn midnight_am_becomes_hour_zero() {
        let out = norm("12:00:00 am").unwrap();
        assert_eq!(&out[11..13], "00");
        assert_eq!(&out[10..], " 00:00:00");
    }

    #[test]
    fn noon_pm_stays_twelve() {
        assert_eq!(norm("03/04/2021 12:30:00 PM").as_deref(), Some("2021-03-04 12:30:00"));
    }

    #[test]
    fn trailing_single_digit_seconds_are_padded() {
        assert_eq!(norm("2020-01-02 9:5:3").as_deref(), Some("2020-01-02 09:05:03"));
    }

    #[test]
    fn iso_forms_parse() {
        assert_eq!(norm("2020-01-02T03:04:05").as_deref(), Some("2020-01-02 03:04:05"));
        assert_eq!(norm("2020-01-02").as_deref(), Some("2020-01-02 00:00:00"));
        assert_eq!(norm("2020-01-02 03:04").as_deref(), Some("2020-01-02 03:04:00"));
    }

    #[test]
    fn canonical_input_is_unchanged() {
        assert_eq!(norm("2020-01-02 21:05:03").as_deref(), Some("2020-01-02 21:05:03"));
    }

    #[test]
    fn garbage_is_a_validation_error() {
        let err = normalize("next tuesday").unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
    }

    #[test]
    fn now_string_is_canonical() {
        let now = now_string();
        assert!(NaiveDateTime::parse_from_str(&now, FORMAT).is_ok());
    }

    #[test]
    fn date_values_pass_through() {
        assert_eq!(normalize_value(&Value::Int(3)).unwrap(), Value::Int(3));
        assert_eq!(normalize_value(&Value::from("")).unwrap(), Value::Null);
    }
}

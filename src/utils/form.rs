//! Helpers for urlencoded form fields, which arrive as strings and are blank when unset.

use chrono::NaiveDate;
use std::str::FromStr;

/// Trimmed value, or `None` when blank.
pub fn text(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

/// Blank → `Ok(None)`; unparsable → `Err(())`.
pub fn optional<T: FromStr>(raw: &str) -> Result<Option<T>, ()> {
    match raw.trim() {
        "" => Ok(None),
        value => value.parse().map(Some).map_err(|_| ()),
    }
}

/// A value that must be present and parse.
pub fn required<T: FromStr>(raw: &str) -> Result<T, ()> {
    optional(raw)?.ok_or(())
}

/// Finite number (rejects `NaN`/`inf`, which `f64::from_str` accepts).
pub fn number(raw: &str) -> Result<f64, ()> {
    required::<f64>(raw).and_then(|v| if v.is_finite() { Ok(v) } else { Err(()) })
}

pub fn optional_number(raw: &str) -> Result<Option<f64>, ()> {
    match optional::<f64>(raw)? {
        Some(v) if !v.is_finite() => Err(()),
        other => Ok(other),
    }
}

pub fn date(raw: &str) -> Result<NaiveDate, ()> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ())
}

pub fn optional_date(raw: &str) -> Result<Option<NaiveDate>, ()> {
    match raw.trim() {
        "" => Ok(None),
        value => date(value).map(Some),
    }
}

/// Checkbox semantics: present and not "0"/"false".
pub fn checked(raw: &str) -> bool {
    !matches!(raw.trim(), "" | "0" | "false" | "off")
}

/// An address with something on both sides of the `@`.
pub fn valid_email(email: &str) -> bool {
    email
        .trim()
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
}

//! Canonical forms and bound checks shared by every tool.

use chrono::NaiveDate;

use crate::error::ToolFailure;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Identity form of a free-text key: trimmed and lower-cased.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Case-insensitive substring test on identity keys. Lower-casing is
/// Unicode-aware, unlike SQLite `LIKE`.
pub fn name_contains(name: &str, term: &str) -> bool {
    normalize_key(name).contains(&normalize_key(term))
}

/// Collapse every whitespace run to one space and lower-case.
pub fn grouping_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Trimmed text, or `None` when absent or blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required<T>(value: Option<T>, message: &str) -> Result<T, ToolFailure> {
    value.ok_or_else(|| ToolFailure::validation(message))
}

pub fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, ToolFailure> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ToolFailure::validation(format!("{field} must be a date in YYYY-MM-DD format")))
}

pub fn parse_optional_day(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ToolFailure> {
    raw.map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| parse_day(field, r))
        .transpose()
}

pub fn int_in_range(field: &str, value: i64, min: i64, max: i64) -> Result<i64, ToolFailure> {
    if value < min || value > max {
        return Err(ToolFailure::validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(value)
}

/// `0 < value <= max`
pub fn positive_at_most(field: &str, value: f64, max: f64) -> Result<f64, ToolFailure> {
    if !value.is_finite() || value <= 0.0 || value > max {
        return Err(ToolFailure::validation(format!(
            "{field} must be greater than 0 and at most {max}"
        )));
    }
    Ok(value)
}

/// `0 <= value <= max`
pub fn non_negative_at_most(field: &str, value: f64, max: f64) -> Result<f64, ToolFailure> {
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(ToolFailure::validation(format!(
            "{field} must be between 0 and {max}"
        )));
    }
    Ok(value)
}

pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ToolFailure> {
    if value.chars().count() > max {
        return Err(ToolFailure::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Result cap for list queries: default 10, at most 100.
pub fn limit(value: Option<i64>) -> Result<i64, ToolFailure> {
    match value {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if n < 1 => Err(ToolFailure::validation("limit must be at least 1")),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};

/// Resolve a `--date` argument against the user's `today`.
/// Accepts YYYY-MM-DD or today/yesterday/tomorrow.
pub(crate) fn parse_date(date_str: Option<String>, today: NaiveDate) -> Result<NaiveDate> {
    let Some(s) = date_str else {
        return Ok(today);
    };
    let shifted = match s.as_str() {
        "today" => Some(today),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        _ => {
            return NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            });
        }
    };
    shifted.with_context(|| format!("Date out of range: '{s}'"))
}

pub(crate) fn opt_grams(v: Option<i64>) -> String {
    v.map_or("-".into(), |g| format!("{g}g"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

//! Month references (`SET/25`) used to bucket income, expenses and debts.

use chrono::{Datelike, NaiveDate};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
];

/// Field holding the month reference on month-bucketed tables.
pub const MONTH_FIELD: &str = "mes_referencia";

/// Format a calendar date as a month reference, e.g. `2025-09-20` -> `SET/25`.
pub fn month_ref_for(date: NaiveDate) -> String {
    let month = MONTH_ABBREVIATIONS[date.month0() as usize];
    format!("{month}/{:02}", date.year().rem_euclid(100))
}

/// Derive a month reference from a `YYYY-MM-DD` date string.
///
/// Timestamps such as `2025-09-20T10:00:00Z` are accepted; only the date
/// prefix is read.
pub fn month_ref_from_date(value: &str) -> Option<String> {
    let date_part = value.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .map(month_ref_for)
}

/// Canonical form used for lookups: trimmed and upper case.
pub fn normalize_month_ref(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Whether a string is a well-formed month reference.
pub fn is_month_ref(value: &str) -> bool {
    let normalized = normalize_month_ref(value);
    let Some((month, year)) = normalized.split_once('/') else {
        return false;
    };
    MONTH_ABBREVIATIONS.contains(&month)
        && year.len() == 2
        && year.chars().all(|c| c.is_ascii_digit())
}

use crate::error::{Result, RevenueError};
use chrono::{Datelike, NaiveDate};

pub const MONTHS_PER_YEAR: usize = 12;

const MONTH_LABELS: [&str; MONTHS_PER_YEAR] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Clamps a raw amount to a usable contribution.
///
/// NaN, infinities and negative values all count as zero so that a single
/// corrupt record cannot poison a month or a report total.
pub fn finite_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Returns the 0-based month index (Jan = 0) of a date.
pub fn month_index(date: NaiveDate) -> usize {
    date.month0() as usize
}

pub fn month_label(index: usize) -> &'static str {
    MONTH_LABELS.get(index).copied().unwrap_or("???")
}

pub fn validate_report_year(year: i32) -> Result<()> {
    if !(2000..=2100).contains(&year) {
        return Err(RevenueError::InvalidYear(year));
    }
    Ok(())
}

/// Parses the date strings found in synchronized rows.
///
/// Accepts a bare `YYYY-MM-DD` as well as the timestamp form the remote API
/// returns (`2024-03-15 00:00:00.000000`, `2024-03-15T09:30:00`).
pub fn parse_record_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
        RevenueError::DateError(format!(
            "Invalid record date: '{}'. Expected YYYY-MM-DD",
            raw
        ))
    })
}

/// Parses a decimal that may use a comma as decimal separator ("12,5").
///
/// A lone comma is always the decimal separator, so "1,250" reads as 1.25.
/// Thousands grouping is only recognized next to a decimal part ("1.250,00").
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Whichever separator comes last is the decimal one ("1.250,75" or "1,250.75").
    let normalized = match (trimmed.rfind(','), trimmed.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => trimmed.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => trimmed.replace(',', ""),
        (Some(_), None) => trimmed.replace(',', "."),
        _ => trimmed.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

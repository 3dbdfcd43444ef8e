//! # Date Handling
//!
//! Lenient parsing for `date` attributes and the normalized sort key form.
//!
//! Accepted inputs, in order: RFC 3339 timestamps, `YYYY-MM-DD`, `YYYY-MM`,
//! and a bare `YYYY`. Partial dates resolve to the first day of the period.

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a date-like value into a UTC timestamp.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_year_month(raw))
        .or_else(|| parse_year(raw))?;
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

fn parse_year_month(raw: &str) -> Option<NaiveDate> {
    let (year, month) = raw.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

fn parse_year(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(raw.parse().ok()?, 1, 1)
}

/// Lexically sortable form of a date value (`YYYY-MM-DDTHH:MM:SSZ`).
pub fn sort_key(raw: &str) -> Option<String> {
    parse_date(raw).map(|dt| format_timestamp(&dt))
}

/// Render a timestamp the way index fields store it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Four-digit year of a date-like value.
///
/// Falls back to the first run of exactly four digits for free-text dates
/// such as `"circa 1887"`.
pub fn year_of(raw: &str) -> Option<String> {
    if let Some(dt) = parse_date(raw) {
        return Some(dt.format("%Y").to_string());
    }
    let bytes = raw.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s == 4 {
                    return Some(raw[s..i].to_string());
                }
                start = None;
            }
            _ => {}
        }
    }
    match start {
        Some(s) if bytes.len() - s == 4 => Some(raw[s..].to_string()),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Date normalization to a single canonical display form.
//!
//! Every supported input representation of the same instant converges on
//! `"Weekday, Month D, YYYY H:MM AM/PM"` with no leading zeros on the day
//! or hour. Normalization is idempotent: the canonical form parses back to
//! itself.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Literal placeholder for a missing or unknown timestamp.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Normalize any supported date representation to the canonical form.
///
/// Offsets are dropped rather than converted: `2025-06-03 18:25:59+08:00`
/// keeps its 18:25 wall-clock time. Unparseable input passes through
/// unchanged so nothing is silently lost.
pub fn normalize_date(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == UNKNOWN_DATE {
        return UNKNOWN_DATE.to_string();
    }

    match parse_datetime(trimmed) {
        Some(dt) => format_canonical(&dt),
        None => trimmed.to_string(),
    }
}

/// Canonical form for a unix timestamp (UTC wall clock).
pub fn canonical_from_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| format_canonical(&dt.naive_utc()))
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    // Canonical form first, then the remaining naive layouts.
    const NAIVE_FORMATS: &[&str] = &[
        "%A, %B %d, %Y %I:%M %p",
        "%A, %B %d, %Y %I:%M:%S %p",
        "%B %d, %Y %I:%M %p",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    // ISO with an offset but a space separator: "2025-06-03 18:25:59+08:00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_local());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    // Date-only forms render as midnight.
    for format in &["%B %d, %Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

fn format_canonical(dt: &NaiveDateTime) -> String {
    dt.format("%A, %B %-d, %Y %-I:%M %p").to_string()
}

//! Human readable sizes and timestamps for reports.

use chrono::{DateTime, NaiveDateTime, Utc};

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte count with 1024-based units and one decimal, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

/// Render a server timestamp as `Mon D, YYYY at HH:MM`.
///
/// Accepts RFC 3339 and the naive ISO form the server writes
/// (`2024-05-01T13:45:00` or with fractional seconds). Unparseable input is
/// returned unchanged.
pub fn format_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => format_datetime(&ts),
        None => raw.to_string(),
    }
}

/// Format an already parsed timestamp.
pub fn format_datetime(ts: &DateTime<Utc>) -> String {
    ts.format("%b %-d, %Y at %H:%M").to_string()
}

/// Parse a server timestamp, treating naive values as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

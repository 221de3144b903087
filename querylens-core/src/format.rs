//! Parsing and formatting of the units the coordinator reports.
//!
//! The coordinator serializes durations as `"<magnitude><unit>"` strings
//! (`"1.50s"`, `"250.00ms"`) and data sizes the same way (`"12.5MB"`). The
//! helpers here convert them to canonical milliseconds and bytes and back
//! into short human-readable text.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Duration units, smallest first, with their size in milliseconds.
const DURATION_UNITS: [(&str, f64); 7] = [
    ("ns", 1.0e-6),
    ("us", 1.0e-3),
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
    ("d", 86_400_000.0),
];

const KIB: f64 = 1024.0;

/// Data-size units, smallest first, with their size in bytes.
const DATA_SIZE_UNITS: [(&str, f64); 6] = [
    ("B", 1.0),
    ("kB", KIB),
    ("MB", KIB * KIB),
    ("GB", KIB * KIB * KIB),
    ("TB", KIB * KIB * KIB * KIB),
    ("PB", KIB * KIB * KIB * KIB * KIB),
];

/// Bare multipliers used for byte-seconds and similar compound quantities.
const BYTE_MULTIPLIERS: [(&str, f64); 6] = [
    ("", 1.0),
    ("K", KIB),
    ("M", KIB * KIB),
    ("G", KIB * KIB * KIB),
    ("T", KIB * KIB * KIB * KIB),
    ("P", KIB * KIB * KIB * KIB * KIB),
];

/// Split `"<magnitude><unit>"` into its numeric part and unit token.
fn split_magnitude(text: &str) -> Result<(f64, &str)> {
    let trimmed = text.trim();
    let unit_start = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| Error::parse(text, "missing unit"))?;
    let (number, unit) = trimmed.split_at(unit_start);
    let number = number.trim_end();

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(Error::parse(text, "magnitude is not a number"));
    }
    let magnitude: f64 = number
        .parse()
        .map_err(|_| Error::parse(text, "magnitude is not a number"))?;

    if !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::parse(text, format!("malformed unit {:?}", unit)));
    }
    Ok((magnitude, unit))
}

fn lookup_unit(text: &str, unit: &str, table: &[(&str, f64)]) -> Result<f64> {
    table
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| *factor)
        .ok_or_else(|| Error::parse(text, format!("unknown unit {:?}", unit)))
}

/// Parse a duration such as `"1.50s"` into milliseconds.
pub fn parse_duration(text: &str) -> Result<f64> {
    let (magnitude, unit) = split_magnitude(text)?;
    Ok(magnitude * lookup_unit(text, unit, &DURATION_UNITS)?)
}

/// Parse a data size such as `"12.5MB"` into bytes (1024-based).
pub fn parse_data_size(text: &str) -> Result<f64> {
    let (magnitude, unit) = split_magnitude(text)?;
    Ok(magnitude * lookup_unit(text, unit, &DATA_SIZE_UNITS)?)
}

/// Like [`parse_duration`], but unparsable or missing text counts as zero.
pub fn parse_duration_or_zero(text: &str) -> f64 {
    lenient(text, parse_duration)
}

/// Like [`parse_data_size`], but unparsable or missing text counts as zero.
pub fn parse_data_size_or_zero(text: &str) -> f64 {
    lenient(text, parse_data_size)
}

fn lenient(text: &str, parse: fn(&str) -> Result<f64>) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    match parse(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Treating unparsable field as zero");
            0.0
        }
    }
}

/// Render `value` in the largest unit whose magnitude is at least one.
fn format_scaled(value: f64, table: &[(&str, f64)]) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    let (unit, factor) = table
        .iter()
        .rev()
        .find(|(_, factor)| magnitude / factor >= 1.0)
        .unwrap_or(&table[0]);
    format!("{}{:.1}{}", sign, magnitude / factor, unit)
}

/// Format milliseconds as e.g. `"1.5s"` or `"250.0ms"`.
pub fn format_duration(millis: f64) -> String {
    format_scaled(millis, &DURATION_UNITS)
}

/// Format bytes as e.g. `"1.5kB"` or `"3.0GB"`.
pub fn format_data_size(bytes: f64) -> String {
    format_scaled(bytes, &DATA_SIZE_UNITS)
}

/// Format bytes with a bare multiplier, e.g. `"1.5K"`.
///
/// Used where the caller appends its own unit (byte-seconds).
pub fn format_data_size_bytes(bytes: f64) -> String {
    format_scaled(bytes, &BYTE_MULTIPLIERS)
}

/// Rate per second of `value_delta` over `elapsed_millis`; zero when no time passed.
pub fn compute_rate(value_delta: f64, elapsed_millis: f64) -> f64 {
    if elapsed_millis == 0.0 {
        return 0.0;
    }
    value_delta / (elapsed_millis / 1000.0)
}

/// Round for display: two decimals below 10, one below 100, integer above.
pub fn precision_round(n: f64) -> String {
    let magnitude = n.abs();
    if magnitude < 10.0 {
        format!("{:.2}", n)
    } else if magnitude < 100.0 {
        format!("{:.1}", n)
    } else {
        format!("{:.0}", n.round())
    }
}

/// Format a count with 1000-based suffixes (`"1.50K"`, `"12.0M"`).
pub fn format_count(count: f64) -> String {
    const SUFFIXES: [&str; 5] = ["K", "M", "B", "T", "Q"];

    let mut value = count;
    let mut unit = "";
    for suffix in SUFFIXES {
        if value.abs() < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = suffix;
    }
    format!("{}{}", precision_round(value), unit)
}

/// Format a timestamp as `2023-01-01 2:05pm`.
pub fn format_short_date_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %-I:%M%P").to_string()
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else {
        format!("{}d ago", duration.num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), 250.0);
        assert_eq!(parse_duration("1.50s").unwrap(), 1500.0);
        assert_eq!(parse_duration("2m").unwrap(), 120_000.0);
        assert_eq!(parse_duration("1h").unwrap(), 3_600_000.0);
        assert_eq!(parse_duration("1d").unwrap(), 86_400_000.0);
        assert!(close(parse_duration("1500us").unwrap(), 1.5, 1e-9));
        assert!(close(parse_duration("2000000ns").unwrap(), 2.0, 1e-9));
        assert_eq!(parse_duration(" 3.00 s ").unwrap(), 3000.0);
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        assert!(matches!(
            parse_duration("12parsecs"),
            Err(Error::Parse { .. })
        ));
        assert!(parse_duration("5S").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("1.2.3s").is_err());
        assert!(parse_duration("42").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_parse_data_size_is_1024_based() {
        assert_eq!(parse_data_size("512B").unwrap(), 512.0);
        assert_eq!(parse_data_size("1kB").unwrap(), 1024.0);
        assert_eq!(parse_data_size("1.5MB").unwrap(), 1.5 * 1024.0 * 1024.0);
        assert_eq!(parse_data_size("2GB").unwrap(), 2.0 * 1024f64.powi(3));
        assert_eq!(parse_data_size("1PB").unwrap(), 1024f64.powi(5));
        assert!(parse_data_size("1KB").is_err());
        assert!(parse_data_size("1mb").is_err());
    }

    #[test]
    fn test_lenient_parsers() {
        assert_eq!(parse_duration_or_zero(""), 0.0);
        assert_eq!(parse_duration_or_zero("garbage"), 0.0);
        assert_eq!(parse_duration_or_zero("2s"), 2000.0);
        assert_eq!(parse_data_size_or_zero("oops"), 0.0);
        assert_eq!(parse_data_size_or_zero("1kB"), 1024.0);
    }

    #[test]
    fn test_format_duration_picks_largest_unit() {
        assert_eq!(format_duration(500.0), "500.0ms");
        assert_eq!(format_duration(1500.0), "1.5s");
        assert_eq!(format_duration(90_000.0), "1.5m");
        assert_eq!(format_duration(3_600_000.0), "1.0h");
        assert_eq!(format_duration(2.0 * 86_400_000.0), "2.0d");
        assert_eq!(format_duration(0.5), "500.0us");
        assert_eq!(format_duration(0.0), "0.0ns");
        assert_eq!(format_duration(-1500.0), "-1.5s");
    }

    #[test]
    fn test_duration_round_trip() {
        for millis in [500.0, 1500.0, 90_000.0, 3_600_000.0, 7.3, 45_000.0] {
            let text = format_duration(millis);
            let parsed = parse_duration(&text).unwrap();
            // One decimal place in the chosen unit.
            let (_, unit) = split_magnitude(&text).unwrap();
            let factor = lookup_unit(&text, unit, &DURATION_UNITS).unwrap();
            assert!(
                close(parsed, millis, 0.05 * factor),
                "{} -> {} -> {}",
                millis,
                text,
                parsed
            );
        }
    }

    #[test]
    fn test_format_data_size() {
        assert_eq!(format_data_size(512.0), "512.0B");
        assert_eq!(format_data_size(1536.0), "1.5kB");
        assert_eq!(format_data_size(3.0 * 1024f64.powi(3)), "3.0GB");
        assert_eq!(format_data_size(0.0), "0.0B");
        assert_eq!(format_data_size_bytes(1536.0), "1.5K");
        assert_eq!(format_data_size_bytes(100.0), "100.0");
        assert_eq!(parse_data_size(&format_data_size(1536.0)).unwrap(), 1536.0);
    }

    #[test]
    fn test_compute_rate() {
        assert_eq!(compute_rate(3000.0, 3000.0), 1000.0);
        assert_eq!(compute_rate(100.0, 500.0), 200.0);
        assert_eq!(compute_rate(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_precision_round_and_count() {
        assert_eq!(precision_round(1.234), "1.23");
        assert_eq!(precision_round(12.34), "12.3");
        assert_eq!(precision_round(123.4), "123");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(1500.0), "1.50K");
        assert_eq!(format_count(12_000_000.0), "12.0M");
        assert_eq!(format_count(0.0), "0.00");
    }

    #[test]
    fn test_format_times() {
        let ts = Utc.with_ymd_and_hms(2023, 1, 1, 14, 5, 0).unwrap();
        assert_eq!(format_short_date_time(ts), "2023-01-01 2:05pm");

        let now = ts + chrono::Duration::minutes(3);
        assert_eq!(format_relative_time(ts, now), "3m ago");
        assert_eq!(format_relative_time(now, ts), "just now");
    }
}

//! Parsing of hours and polled-user counts from cell text

use super::selectors::{
    COUNT, HALF_HOURS, HOURS, HOURS_MINUTES, MINUTES, ONLY_HALF_HOURS, RANGE_SPLIT,
};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses a time cell into hours
///
/// Accepts `"12 Hours"`, `"12½ Hours"`, `"½ Hours"`, `"5h 30m"`, `"5h"`,
/// `"45m"`, `"45 Mins"` and ranges such as `"10 - 12 Hours"` (mean of the
/// two ends). `"--"` and unrecognized text yield `None`.
pub fn parse_hours(text: &str) -> Option<f64> {
    let raw = text.replace('\u{a0}', " ").trim().to_lowercase();
    if raw.is_empty() || raw == "--" || raw == "-" {
        return None;
    }

    if raw.contains(['-', '–', '—']) {
        let parts: Vec<&str> = RANGE_SPLIT.split(&raw).collect();
        if parts.len() == 2 {
            let high = parse_hours(parts[1]);
            let low = parse_hours(parts[0]).or_else(|| parts[0].trim().parse::<f64>().ok());
            if let (Some(low), Some(high)) = (low, high) {
                return Some(round2((low + high) / 2.0));
            }
        }
    }

    if let Some(caps) = HALF_HOURS.captures(&raw) {
        let whole: f64 = caps[1].parse().ok()?;
        return Some(whole + 0.5);
    }

    if ONLY_HALF_HOURS.is_match(&raw) {
        return Some(0.5);
    }

    if let Some(caps) = HOURS_MINUTES.captures(&raw) {
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        return Some(round2(hours + minutes / 60.0));
    }

    if let Some(caps) = MINUTES.captures(&raw) {
        let minutes: f64 = caps[1].parse().ok()?;
        return Some(round2(minutes / 60.0));
    }

    if let Some(caps) = HOURS.captures(&raw) {
        let hours: f64 = caps[1].parse().ok()?;
        return Some(round2(hours));
    }

    None
}

/// Parses a polled-user count (`"1,234"`, `"56 Polled"`, `"1.2K"`)
pub fn parse_count(text: &str) -> Option<u32> {
    let caps = COUNT.captures(text)?;
    let digits = caps[1].replace(',', "");

    if caps.get(2).is_some() {
        let thousands: f64 = digits.parse().ok()?;
        return Some((thousands * 1000.0).round() as u32);
    }

    let whole = digits.split('.').next()?;
    whole.parse().ok()
}

/// Formats hours for output: whole numbers without a fraction, otherwise
/// up to two decimals
pub fn format_hours(hours: f64) -> String {
    let rounded = round2(hours);
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        let text = format!("{:.2}", rounded);
        text.trim_end_matches('0').to_string()
    }
}

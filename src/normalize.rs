//! Provider-independent normalization of free-form listing fields.
//!
//! Relative dates are resolved against a caller-supplied `today` so results
//! are reproducible. Resolution is lossy: "3 weeks ago" becomes 21 days ago,
//! and anything unrecognised becomes `today`. Results never lie in the future.

use chrono::{DateTime, NaiveDate, TimeDelta};

pub const COMPETITIVE: &str = "Competitive";
pub const EXCERPT_LIMIT: usize = 300;

/// Resolve posted-date text into a calendar date no later than `today`.
pub fn parse_posted_date(text: &str, today: NaiveDate) -> NaiveDate {
    parse_date_inner(text, today)
        .map(|d| d.min(today))
        .unwrap_or(today)
}

fn parse_date_inner(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let t = text.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }

    match t.as_str() {
        "today" | "just now" | "just posted" | "new" | "active today" => return Some(today),
        "yesterday" => return today.checked_sub_signed(TimeDelta::days(1)),
        _ => {}
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text.trim()) {
        return Some(dt.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text.trim(), "%d/%m/%Y") {
        return Some(d);
    }
    // ISO timestamps without an offset, e.g. "2026-10-15T08:00:00"
    if let Some((date, _)) = t.split_once('t')
        && let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
    {
        return Some(d);
    }

    relative_offset(&t)
        .and_then(TimeDelta::try_days)
        .and_then(|offset| today.checked_sub_signed(offset))
}

/// Days represented by phrases like "2 days ago", "30+ days ago", "a week ago".
fn relative_offset(t: &str) -> Option<i64> {
    let t = t.strip_prefix("posted ").unwrap_or(t);
    let t = t.strip_suffix(" ago")?;
    let mut parts = t.split_whitespace();
    let amount = parts.next()?;
    let unit = parts.next()?;

    let n: i64 = match amount.trim_end_matches('+') {
        "a" | "an" | "one" => 1,
        digits => digits.parse().ok()?,
    };

    let per_unit = match unit.trim_end_matches('s') {
        "second" | "minute" | "min" | "hour" | "hr" => 0,
        "day" => 1,
        "week" => 7,
        "month" => 30,
        "year" => 365,
        _ => return None,
    };

    Some(n.saturating_mul(per_unit))
}

/// Format structured salary bounds. Non-positive values count as absent.
pub fn format_salary(min: Option<f64>, max: Option<f64>) -> String {
    let min = min.filter(|v| v.is_finite() && *v > 0.0);
    let max = max.filter(|v| v.is_finite() && *v > 0.0);

    match (min, max) {
        (Some(lo), Some(hi)) if (lo.round() - hi.round()).abs() < 1.0 => pounds(lo),
        (Some(lo), Some(hi)) => {
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            format!("{} - {}", pounds(lo), pounds(hi))
        }
        (Some(v), None) | (None, Some(v)) => format!("{}+", pounds(v)),
        (None, None) => COMPETITIVE.to_string(),
    }
}

/// Prefer structured bounds, then non-empty free text, then "Competitive".
pub fn salary_or_text(min: Option<f64>, max: Option<f64>, text: Option<&str>) -> String {
    let formatted = format_salary(min, max);
    if formatted != COMPETITIVE {
        return formatted;
    }
    text.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or(formatted)
}

fn pounds(value: f64) -> String {
    let whole = value.round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("£{grouped}")
}

/// Collapse whitespace, strip tags, and cut to `EXCERPT_LIMIT` characters.
pub fn truncate_excerpt(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                plain.push(' ');
            }
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }

    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_LIMIT {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(EXCERPT_LIMIT).collect();
    format!("{}...", cut.trim_end())
}

/// Map provider contract vocabulary onto display values.
pub fn employment_type(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let mapped = match raw.to_lowercase().replace(['_', '-'], " ").as_str() {
        "permanent" => "Permanent",
        "contract" => "Contract",
        "temporary" | "temp" => "Temporary",
        "full time" => "Full-time",
        "part time" => "Part-time",
        "apprenticeship" => "Apprenticeship",
        _ => return Some(raw.to_string()),
    };
    Some(mapped.to_string())
}

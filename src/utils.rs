//! Utility functions for date windows, log-safe strings, and URL redaction.
//!
//! This module provides helper functions used throughout the application:
//! - Calendar-day windows for provider queries
//! - The long-form date printed in digest emails
//! - String truncation for logging model output
//! - Credential redaction for URLs that end up in logs or errors

use chrono::{Days, Local, NaiveDate};
use url::Url;

/// Inclusive `[from, to]` calendar-day window, both formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

/// Compute a window of `window_days` days ending today (local time).
///
/// A 5-day window includes today and the four preceding days. Returns
/// `None` for a zero-day window.
pub fn date_range(window_days: u32) -> Option<DateRange> {
    date_range_ending(Local::now().date_naive(), window_days)
}

/// Same as [`date_range`] with an explicit reference day.
pub fn date_range_ending(today: NaiveDate, window_days: u32) -> Option<DateRange> {
    let back = window_days.checked_sub(1)?;
    let from = today.checked_sub_days(Days::new(u64::from(back)))?;
    Some(DateRange {
        from: from.format("%Y-%m-%d").to_string(),
        to: today.format("%Y-%m-%d").to_string(),
    })
}

/// Today's date as printed in the digest subject and body,
/// e.g. `"Sunday, October 18, 2026"`.
pub fn format_date_today() -> String {
    format_date_long(Local::now().date_naive())
}

pub fn format_date_long(day: NaiveDate) -> String {
    day.format("%A, %B %-d, %Y").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Replace the value of the `token` query parameter with `***`.
pub fn redact_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "token") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

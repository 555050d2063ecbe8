// src/discover/date.rs
//! Publication-date extraction from a document link.
//!
//! Two strategies are tried in order; the first one that yields a full
//! calendar date wins:
//! 1. path: `September-25-2025` inside the URL path (two-digit day),
//! 2. label: `September 25 2025` / `September 5, 2025` in the link text.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::error::ParseError;

/// Which strategy produced a date. Kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateOrigin {
    FromPath,
    FromLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedDate {
    pub date: NaiveDate,
    pub origin: DateOrigin,
}

type Strategy = fn(&str, &str) -> Option<NaiveDate>;

const STRATEGIES: [(DateOrigin, Strategy); 2] = [
    (DateOrigin::FromPath, path_strategy),
    (DateOrigin::FromLabel, label_strategy),
];

fn path_strategy(path: &str, _label: &str) -> Option<NaiveDate> {
    from_path(path)
}

fn label_strategy(_path: &str, label: &str) -> Option<NaiveDate> {
    from_label(label)
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Case-sensitive full English month name → 1..=12.
pub fn month_number(word: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| *m == word)
        .map(|i| i as u32 + 1)
}

/// Extract a date from a link target path and its visible text.
/// Returns `None` when neither strategy finds a valid date.
pub fn extract_date(path_or_href: &str, label_text: &str) -> Option<ExtractedDate> {
    STRATEGIES.iter().find_map(|(origin, strategy)| {
        strategy(path_or_href, label_text).map(|date| ExtractedDate {
            date,
            origin: *origin,
        })
    })
}

/// Month name ending a run of letters, so `ButuanCitySeptember` reads as
/// `September`.
fn trailing_month(word: &str) -> &str {
    MONTHS
        .iter()
        .find(|m| word.ends_with(**m))
        .map_or(word, |m| &word[word.len() - m.len()..])
}

/// Strategy A: `<Month>-<DD>-<YYYY>` in a URL path. The month may follow
/// any separator (`Price_September-25-2025`) or be glued to a prefix.
pub fn from_path(path: &str) -> Option<NaiveDate> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"([A-Za-z]+)-(\d{2})-(\d{4})").unwrap());
    re.captures_iter(path).find_map(|caps| {
        let whole = caps.get(0)?;
        if path[whole.end()..].starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        match parse_parts(trailing_month(&caps[1]), &caps[2], &caps[3]) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::debug!(target: "discover", fragment = whole.as_str(), error = %e, "date fragment rejected");
                None
            }
        }
    })
}

/// Strategy B: `<Month> <D or DD>[,] <YYYY>` in free text.
pub fn from_label(label: &str) -> Option<NaiveDate> {
    if label.trim().is_empty() {
        return None;
    }
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"\b([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})\b").unwrap());
    first_valid(re, label)
}

fn first_valid(re: &Regex, haystack: &str) -> Option<NaiveDate> {
    re.captures_iter(haystack).find_map(|caps| {
        match parse_parts(&caps[1], &caps[2], &caps[3]) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::debug!(target: "discover", fragment = &caps[0], error = %e, "date fragment rejected");
                None
            }
        }
    })
}

/// Build a date from month word, day and year fragments.
pub fn parse_parts(month: &str, day: &str, year: &str) -> Result<NaiveDate, ParseError> {
    let m = month_number(month).ok_or_else(|| ParseError::UnknownMonth(month.to_string()))?;
    let d: u32 = day
        .parse()
        .map_err(|_| ParseError::Number(day.to_string()))?;
    let y: i32 = year
        .parse()
        .map_err(|_| ParseError::Number(year.to_string()))?;
    NaiveDate::from_ymd_opt(y, m, d).ok_or(ParseError::DayOutOfRange {
        year: y,
        month: m,
        day: d,
    })
}

// src/normalize/dates.rs

//! Indian-locale date parsing.
//!
//! The site writes dates as "15-01-2026", "15/01/2026", "15 January
//! 2026", "15th Jan 2026" and labeled variants ("Last Date: …").
//! Numeric forms are day-first per the source locale. Parsing scans the
//! text for the first recognizable date, so label prefixes and ranges
//! need no special handling.

use chrono::NaiveDate;
use regex::Regex;

/// Parse the first date found in the text, day-first.
pub fn parse_indian_date(text: &str) -> Option<NaiveDate> {
    numeric_date(text).or_else(|| textual_date(text))
}

/// `DD-MM-YYYY`, `DD/MM/YYYY`, `DD.MM.YYYY`.
fn numeric_date(text: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})").ok()?;
    let caps = re.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `15 January 2026`, `15th Jan 2026`, `January 15, 2026`.
fn textual_date(text: &str) -> Option<NaiveDate> {
    let day_first = Regex::new(r"(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+),?\s+(\d{4})").ok()?;
    if let Some(caps) = day_first.captures(text) {
        if let Some(month) = month_number(&caps[2]) {
            let day: u32 = caps[1].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }
    }

    let month_first = Regex::new(r"([A-Za-z]+)\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})").ok()?;
    let caps = month_first.captures(text)?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let prefix = name.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

//! Lenient date parsing for resume date fields.
//!
//! The model is asked for `YYYY-MM-DD`, but resumes say "Mar 2019",
//! "2019", "09/2020" or "present", and the model sometimes passes them on.
//! Missing day or month is completed to `01`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Outcome of parsing one date string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParse {
    Date(NaiveDate),
    /// "present", "current", "now" and friends: the range is ongoing.
    Present,
    Invalid,
}

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

static ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[t ].*)?$").unwrap());
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})$").unwrap());
static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})[-/.](\d{4})$").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").unwrap());
static NUMERIC_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})$").unwrap());
static NAMED_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d{1,2})(?:st|nd|rd|th)?\.?\s+)?([a-z]+)\.?,?\s+(?:(\d{1,2})(?:st|nd|rd|th)?,?\s+)?(\d{4})$")
        .unwrap()
});

const PRESENT_WORDS: &[&str] = &[
    "present",
    "current",
    "currently",
    "now",
    "ongoing",
    "today",
    "to date",
    "till date",
    "to present",
    "until now",
];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Full month name or its three-letter abbreviation ("sept" is also
/// accepted). Anything else, including words that merely start with a
/// month, is rejected.
fn month_from_name(name: &str) -> Option<u32> {
    if name == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| name == *m || (name.len() == 3 && m.starts_with(name)))
        .map(|i| i as u32 + 1)
}

/// Whether `date` lies in the year window accepted for resume dates.
pub fn in_supported_range(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

fn ymd(year: i32, month: u32, day: u32) -> DateParse {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) if in_supported_range(date) => DateParse::Date(date),
        _ => DateParse::Invalid,
    }
}

fn num<T: std::str::FromStr>(caps: &regex::Captures<'_>, i: usize) -> Option<T> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

/// Parse a resume date.
///
/// Accepted shapes: `YYYY-MM-DD` (optionally with a time suffix), `YYYY-MM`,
/// `MM/YYYY`, `YYYY`, `Month YYYY`, `d Month YYYY`, `Month d, YYYY` and
/// numeric `dd/mm/yyyy`. Numeric day/month order is day-first unless the
/// second number cannot be a month.
pub fn parse_date(input: &str) -> DateParse {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return DateParse::Invalid;
    }
    if PRESENT_WORDS.contains(&s.as_str()) {
        return DateParse::Present;
    }

    if let Some(c) = ISO.captures(&s) {
        return match (num(&c, 1), num(&c, 2), num(&c, 3)) {
            (Some(y), Some(m), Some(d)) => ymd(y, m, d),
            _ => DateParse::Invalid,
        };
    }
    if let Some(c) = YEAR_MONTH.captures(&s) {
        return match (num(&c, 1), num(&c, 2)) {
            (Some(y), Some(m)) => ymd(y, m, 1),
            _ => DateParse::Invalid,
        };
    }
    if let Some(c) = MONTH_YEAR.captures(&s) {
        return match (num(&c, 1), num(&c, 2)) {
            (Some(m), Some(y)) => ymd(y, m, 1),
            _ => DateParse::Invalid,
        };
    }
    if let Some(c) = YEAR.captures(&s) {
        return match num(&c, 1) {
            Some(y) => ymd(y, 1, 1),
            None => DateParse::Invalid,
        };
    }
    if let Some(c) = NUMERIC_DMY.captures(&s) {
        return match (num::<u32>(&c, 1), num::<u32>(&c, 2), num(&c, 3)) {
            (Some(a), Some(b), Some(y)) if b > 12 => ymd(y, a, b),
            (Some(a), Some(b), Some(y)) => ymd(y, b, a),
            _ => DateParse::Invalid,
        };
    }
    if let Some(c) = NAMED_MONTH.captures(&s) {
        let month = c.get(2).and_then(|m| month_from_name(m.as_str()));
        let day: u32 = num(&c, 1).or_else(|| num(&c, 3)).unwrap_or(1);
        return match (month, num(&c, 4)) {
            (Some(m), Some(y)) => ymd(y, m, day),
            _ => DateParse::Invalid,
        };
    }

    DateParse::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> DateParse {
        DateParse::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap())
    }

    #[test]
    fn iso_and_partial_forms() {
        assert_eq!(parse_date("2020-03-15"), d(2020, 3, 15));
        assert_eq!(parse_date("2020-03-15T00:00:00Z"), d(2020, 3, 15));
        assert_eq!(parse_date("2020/3/5"), d(2020, 3, 5));
        assert_eq!(parse_date("2019-09"), d(2019, 9, 1));
        assert_eq!(parse_date("09/2019"), d(2019, 9, 1));
        assert_eq!(parse_date("2018"), d(2018, 1, 1));
    }

    #[test]
    fn named_months() {
        assert_eq!(parse_date("March 2019"), d(2019, 3, 1));
        assert_eq!(parse_date("Sept. 2021"), d(2021, 9, 1));
        assert_eq!(parse_date("5 Jan 2020"), d(2020, 1, 5));
        assert_eq!(parse_date("January 5, 2020"), d(2020, 1, 5));
        assert_eq!(parse_date("1st Feb 2022"), d(2022, 2, 1));
        assert_eq!(parse_date("sep 2021"), d(2021, 9, 1));
        assert_eq!(parse_date("May 2020"), d(2020, 5, 1));
        assert_eq!(parse_date("December 2020"), d(2020, 12, 1));
    }

    #[test]
    fn numeric_day_first() {
        assert_eq!(parse_date("05/03/2020"), d(2020, 3, 5));
        assert_eq!(parse_date("03/25/2020"), d(2020, 3, 25));
    }

    #[test]
    fn present_words() {
        assert_eq!(parse_date("Present"), DateParse::Present);
        assert_eq!(parse_date(" current "), DateParse::Present);
        assert_eq!(parse_date("Now"), DateParse::Present);
    }

    #[test]
    fn invalid_inputs() {
        assert_eq!(parse_date(""), DateParse::Invalid);
        assert_eq!(parse_date("soon"), DateParse::Invalid);
        assert_eq!(parse_date("2020-13-01"), DateParse::Invalid);
        assert_eq!(parse_date("2021-02-30"), DateParse::Invalid);
        assert_eq!(parse_date("1066"), DateParse::Invalid);
        assert_eq!(parse_date("Smarch 2020"), DateParse::Invalid);
        assert_eq!(parse_date("Mayday 2020"), DateParse::Invalid);
        assert_eq!(parse_date("Marchitecture 2020"), DateParse::Invalid);
        assert_eq!(parse_date("Junk 2020"), DateParse::Invalid);
    }
}

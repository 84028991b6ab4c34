//! YYYYMMDD date stamps and inclusive range filtering.
//!
//! Every source and both database tables traffic in 8-digit, zero-padded
//! date strings (`20250321`). Because the representation is fixed-width,
//! plain lexicographic comparison is a correct date comparison, and
//! [`DateStamp`] leans on that instead of converting to a calendar type
//! for every filter check.

use chrono::{Duration, FixedOffset, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A date token inside free text: `2025.03.21` or `2025-03-21`.
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[.\-](\d{2})[.\-](\d{2})").unwrap());

/// Seoul is UTC+9 year-round; a fixed offset is exact.
const KST_SECS: i32 = 9 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("not a YYYYMMDD or YYYY-MM-DD date: {0:?}")]
    Unparseable(String),
    #[error("not a calendar date: {0}")]
    OutOfCalendar(String),
}

/// An 8-digit `YYYYMMDD` date stamp.
///
/// Ordering is derived from the inner string; valid because the format is
/// fixed-width and zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct DateStamp(String);

impl DateStamp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Today's date in Asia/Seoul.
    pub fn today_kst() -> Self {
        let kst = FixedOffset::east_opt(KST_SECS).unwrap();
        let today = Utc::now().with_timezone(&kst).date_naive();
        Self::from_naive(today)
    }

    fn from_naive(d: NaiveDate) -> Self {
        DateStamp(d.format("%Y%m%d").to_string())
    }

    fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, "%Y%m%d").ok()
    }
}

impl FromStr for DateStamp {
    type Err = DateError;

    /// Accepts both CLI formats seen in the wild: `20250321` and `2025-03-21`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| *c != '-').collect();
        if compact.len() != 8 || !compact.chars().all(|c| c.is_ascii_digit()) {
            return Err(DateError::Unparseable(s.to_string()));
        }
        // Reject stamps like 20251340 early instead of at the database.
        if NaiveDate::parse_from_str(&compact, "%Y%m%d").is_err() {
            return Err(DateError::OutOfCalendar(compact));
        }
        Ok(DateStamp(compact))
    }
}

impl fmt::Display for DateStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the first publication-date token from free text.
///
/// Returns `None` when no token is present ("no date" articles always fail
/// the range filter and are skipped by callers).
pub fn find_stamp(text: &str) -> Option<DateStamp> {
    let caps = DATE_TOKEN.captures(text)?;
    let compact = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
    compact.parse().ok()
}

/// An inclusive `[start, end]` date range.
#[derive(Debug, Clone)]
pub struct DateRange {
    pub start: DateStamp,
    pub end: DateStamp,
}

impl DateRange {
    /// Build a range from optional CLI bounds; both default to today KST.
    pub fn from_args(start: Option<DateStamp>, end: Option<DateStamp>) -> Self {
        let today = DateStamp::today_kst();
        let start = start.unwrap_or_else(|| today.clone());
        let end = end.unwrap_or(today);
        DateRange { start, end }
    }

    /// Both bounds inclusive.
    pub fn contains(&self, d: &DateStamp) -> bool {
        *d >= self.start && *d <= self.end
    }

    /// Walk the range one day at a time, newest first. The report source is
    /// keyed by day and recent days are the interesting ones.
    pub fn days_desc(&self) -> impl Iterator<Item = DateStamp> {
        let mut cursor = self.end.to_naive();
        let floor = self.start.to_naive();
        std::iter::from_fn(move || {
            let (day, floor) = (cursor?, floor?);
            if day < floor {
                return None;
            }
            cursor = day.checked_sub_signed(Duration::days(1));
            Some(DateStamp::from_naive(day))
        })
    }
}

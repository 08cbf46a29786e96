//! Calendar days and the two overlap semantics used by the engine.
//!
//! Every date the engine compares goes through [`Day::parse`]. Bookings are
//! compared half-open (a check-out day may equal another check-in day),
//! holds and maintenance inclusively.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::limits::*;

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A local calendar day. Time of day never reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Day> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }

    /// Normalize an ISO date or timestamp to its calendar day.
    ///
    /// Accepts `YYYY-MM-DD`, naive `YYYY-MM-DDTHH:MM[:SS[.f]]` and RFC 3339.
    /// A timestamp with an offset keeps the day of that offset; it is never
    /// shifted to UTC first.
    pub fn parse(input: &str) -> Result<Day, EngineError> {
        let input = input.trim();
        let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive()))
            .or_else(|| {
                NAIVE_DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                    .map(|dt| dt.date())
            })
            .ok_or_else(|| EngineError::Validation(format!("not a calendar date: {input:?}")))?;
        if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&date.year()) {
            return Err(EngineError::LimitExceeded("date out of range"));
        }
        Ok(Day(date))
    }

    /// The following day. Saturates at the end of the calendar.
    pub fn next(self) -> Day {
        self.0.checked_add_days(Days::new(1)).map_or(self, Day)
    }

    /// Signed number of days from `self` to `later`.
    pub fn days_until(self, later: Day) -> i64 {
        later.0.signed_duration_since(self.0).num_days()
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Day(date)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A pair of calendar days.
///
/// For stays `end` is the check-out day; for holds and maintenance it is the
/// last affected day. Which reading applies is chosen by the overlap method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayRange {
    pub start: Day,
    pub end: Day,
}

impl DayRange {
    pub fn single(day: Day) -> Self {
        Self { start: day, end: day }
    }

    /// Build a range from unchecked days, rejecting reversed or oversized ranges.
    pub fn checked(start: Day, end: Day) -> Result<Self, EngineError> {
        let range = Self { start, end };
        validate_range(&range)?;
        Ok(range)
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, EngineError> {
        Self::checked(Day::parse(start)?, Day::parse(end)?)
    }

    pub fn len_days(&self) -> i64 {
        self.start.days_until(self.end)
    }

    /// Exclusive bound of the half-open reading. A zero-length stay still
    /// occupies its first day.
    pub fn exclusive_end(&self) -> Day {
        if self.end > self.start {
            self.end
        } else {
            self.start.next()
        }
    }

    /// `[start, end)` overlap.
    pub fn overlaps_half_open(&self, other: &DayRange) -> bool {
        self.start < other.exclusive_end() && self.exclusive_end() > other.start
    }

    /// `[start, end]` overlap.
    pub fn overlaps_inclusive(&self, other: &DayRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Re-express an inclusive range so its last day survives a half-open test.
    pub fn inclusive_as_half_open(&self) -> DayRange {
        DayRange {
            start: self.start,
            end: self.end.next(),
        }
    }

    /// Clamp to `window`. Only meaningful when the two overlap inclusively.
    pub fn clip(&self, window: &DayRange) -> DayRange {
        DayRange {
            start: self.start.max(window.start),
            end: self.end.min(window.end),
        }
    }
}

impl fmt::Display for DayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

pub(crate) fn validate_range(range: &DayRange) -> Result<(), EngineError> {
    if range.start > range.end {
        return Err(EngineError::Validation(format!(
            "range start {} is after end {}",
            range.start, range.end
        )));
    }
    if range.len_days() > MAX_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("range too long"));
    }
    Ok(())
}

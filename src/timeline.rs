use std::fmt::{Display, Formatter};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Inclusive date range. Both endpoints are part of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PlanError> {
        if end < start {
            return Err(PlanError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Inclusive day count.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Fractional week count, days / 7.
    pub fn weeks(&self) -> f64 {
        self.days() as f64 / 7.0
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Week-start buckets beginning with the week containing `from`.
pub fn week_starts(from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let first = week_start(from);
    (0..count)
        .map(|i| first + Duration::days(7 * i as i64))
        .collect()
}

//! Business calendar
//!
//! Policy periods, installment due dates and "overdue" checks are all
//! evaluated against the brokerage's local date in Africa/Nairobi, not UTC.
//! A payment made at 01:00 EAT on the 1st belongs to the 1st even though it
//! is still the previous day in UTC.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timezone the brokerage operates in
pub const BUSINESS_TZ: Tz = chrono_tz::Africa::Nairobi;

/// Errors raised by calendar arithmetic
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("End date {end} must be after start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Date arithmetic out of range")]
    OutOfRange,
}

/// Today's date in the business timezone
pub fn today() -> NaiveDate {
    local_date(Utc::now())
}

/// Converts a UTC instant to the business-local calendar date
pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&BUSINESS_TZ).date_naive()
}

/// Business-local year of an instant, used in reference numbers
pub fn year_of(instant: DateTime<Utc>) -> i32 {
    local_date(instant).year()
}

/// Start of a business-local day, expressed in UTC
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    BUSINESS_TZ
        .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

/// Adds calendar months, clamping to the last day of shorter months
///
/// 31 January plus one month is 28 (or 29) February.
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, CalendarError> {
    date.checked_add_months(Months::new(months))
        .ok_or(CalendarError::OutOfRange)
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First days of the last `n` calendar months, oldest first, ending with
/// the month containing `today`
pub fn trailing_months(today: NaiveDate, n: u32) -> Vec<NaiveDate> {
    let current = month_start(today);
    (0..n)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .collect()
}

/// An inclusive range of calendar dates, such as a policy period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range; `end` must be strictly after `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarError> {
        if end <= start {
            return Err(CalendarError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Checks whether a date falls inside the range (both ends inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Length of the range in days
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Days from `from` until the range ends; negative once it has ended
    pub fn days_remaining(&self, from: NaiveDate) -> i64 {
        (self.end - from).num_days()
    }

    /// The range of the same length starting the day after this one ends
    pub fn following(&self) -> Result<Self, CalendarError> {
        let start = self
            .end
            .checked_add_signed(Duration::days(1))
            .ok_or(CalendarError::OutOfRange)?;
        let end = start
            .checked_add_signed(Duration::days(self.days()))
            .ok_or(CalendarError::OutOfRange)?;
        Self::new(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_local_date_is_ahead_of_utc_near_midnight() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 31, 22, 30, 0).unwrap();
        assert_eq!(local_date(instant), date(2024, 4, 1));
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months(date(2024, 1, 31), 1).unwrap(), date(2024, 2, 29));
        assert_eq!(add_months(date(2023, 1, 31), 1).unwrap(), date(2023, 2, 28));
    }

    #[test]
    fn test_trailing_months() {
        let months = trailing_months(date(2024, 3, 15), 3);
        assert_eq!(months, vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]);
    }

    #[test]
    fn test_range_rejects_inverted_dates() {
        assert!(DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).is_err());
        assert!(DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_following_range_has_same_length() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        let next = range.following().unwrap();
        assert_eq!(next.start(), date(2025, 1, 1));
        assert_eq!(next.days(), range.days());
    }

    #[test]
    fn test_start_of_day_is_three_hours_before_utc_midnight() {
        let utc = start_of_day(date(2024, 6, 1));
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 5, 31, 21, 0, 0).unwrap());
    }
}

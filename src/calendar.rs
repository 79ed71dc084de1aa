use std::fmt;

use thiserror::Error;
use time::{Date, Month, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid calendar date {year}-{month}-{day}")]
pub struct InvalidDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

/// A single day on the calendar. Ordering and equality follow the calendar,
/// so two values built from the same (year, month, day) are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(Date);

impl CalendarDate {
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self, InvalidDate> {
        let invalid = || InvalidDate { year, month, day };
        let month_value = Month::try_from(month).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month_value, day)
            .map(Self)
            .map_err(|_| invalid())
    }

    /// Current date in the local timezone, or UTC when the local offset
    /// cannot be determined.
    pub fn today() -> Self {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self(now.date())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u8 {
        u8::from(self.0.month())
    }

    pub fn day(&self) -> u8 {
        self.0.day()
    }

    /// 0 for Monday through 6 for Sunday.
    pub fn weekday_from_monday(&self) -> u8 {
        self.0.weekday().number_days_from_monday()
    }

    pub fn succ(&self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    pub fn pred(&self) -> Option<Self> {
        self.0.previous_day().map(Self)
    }

    pub fn page(&self) -> MonthPage {
        MonthPage {
            year: self.year(),
            month: self.month(),
        }
    }

    /// Moves by whole months, clamping the day to the target month length
    /// (Jan 31 + 1 month lands on Feb 28/29).
    pub fn shift_months(&self, delta: i32) -> Option<Self> {
        let page = self.page().shift(delta)?;
        let day = self.day().min(page.days_in_month());
        Self::new(page.year, page.month, day).ok()
    }
}

impl From<Date> for CalendarDate {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.year(),
            self.month(),
            self.day()
        )
    }
}

/// A displayed month of the calendar, independent of which day is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPage {
    pub year: i32,
    pub month: u8,
}

impl MonthPage {
    pub fn new(year: i32, month: u8) -> Option<Self> {
        CalendarDate::new(year, month, 1).ok().map(|d| d.page())
    }

    pub fn first_day(&self) -> Option<CalendarDate> {
        CalendarDate::new(self.year, self.month, 1).ok()
    }

    pub fn days_in_month(&self) -> u8 {
        Month::try_from(self.month)
            .map(|month| time::util::days_in_year_month(self.year, month))
            .unwrap_or(0)
    }

    pub fn shift(&self, delta: i32) -> Option<Self> {
        let index = self.year.checked_mul(12)? + i32::from(self.month) - 1 + delta;
        let year = index.div_euclid(12);
        let month = (index.rem_euclid(12) + 1) as u8;
        Self::new(year, month)
    }

    /// Every day of the month in order, walking forward from the 1st until
    /// the month rolls over.
    pub fn days(&self) -> MonthDays {
        MonthDays {
            next: self.first_day(),
            month: self.month,
        }
    }
}

impl fmt::Display for MonthPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub struct MonthDays {
    next: Option<CalendarDate>,
    month: u8,
}

impl Iterator for MonthDays {
    type Item = CalendarDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|date| date.month() == self.month)?;
        self.next = current.succ();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_impossible_dates() {
        assert!(CalendarDate::new(2023, 2, 29).is_err());
        assert!(CalendarDate::new(2024, 13, 1).is_err());
        assert!(CalendarDate::new(2024, 2, 29).is_ok());
    }

    #[test]
    fn ordering_follows_calendar() {
        let a = CalendarDate::new(2024, 1, 31).unwrap();
        let b = CalendarDate::new(2024, 2, 1).unwrap();
        assert!(a < b);
        assert_eq!(a.succ(), Some(b));
        assert_eq!(b.pred(), Some(a));
    }

    #[test]
    fn month_days_walks_until_rollover() {
        let leap = MonthPage::new(2024, 2).unwrap();
        assert_eq!(leap.days().count(), 29);
        let plain = MonthPage::new(2023, 2).unwrap();
        assert_eq!(plain.days().count(), 28);
        let december = MonthPage::new(2023, 12).unwrap();
        let days: Vec<_> = december.days().map(|d| d.day()).collect();
        assert_eq!(days.first(), Some(&1));
        assert_eq!(days.last(), Some(&31));
    }

    #[test]
    fn shift_months_clamps_day_and_crosses_years() {
        let jan31 = CalendarDate::new(2024, 1, 31).unwrap();
        assert_eq!(
            jan31.shift_months(1),
            Some(CalendarDate::new(2024, 2, 29).unwrap())
        );
        let page = MonthPage::new(2024, 1).unwrap();
        assert_eq!(page.shift(-1), MonthPage::new(2023, 12));
        assert_eq!(page.shift(12), MonthPage::new(2025, 1));
    }

    #[test]
    fn display_is_iso_like() {
        let date = CalendarDate::new(2024, 3, 7).unwrap();
        assert_eq!(date.to_string(), "2024-03-07");
    }
}

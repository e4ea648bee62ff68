//! Reading clock: the interval schedule plus calendar helpers.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingClock {
    start:         NaiveDateTime,
    end_exclusive: NaiveDateTime,
    step:          Duration,
}

impl ReadingClock {
    /// Covers `start_date 00:00` up to but excluding `end_date + 1 day 00:00`.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, frequency_minutes: u32) -> Self {
        Self {
            start:         start_date.and_time(NaiveTime::MIN),
            end_exclusive: (end_date + Duration::days(1)).and_time(NaiveTime::MIN),
            step:          Duration::minutes(i64::from(frequency_minutes)),
        }
    }

    pub fn step_minutes(&self) -> i64 {
        self.step.num_minutes()
    }

    /// Every slot of the schedule at or after `from_date 00:00`.
    /// Slots stay aligned to the schedule's grid.
    pub fn slots_from(&self, from_date: NaiveDate) -> Slots {
        let from = from_date.and_time(NaiveTime::MIN);
        let first = if from <= self.start {
            self.start
        } else {
            let step = self.step.num_minutes();
            let offset = (from - self.start).num_minutes();
            let steps = (offset + step - 1) / step;
            self.start + Duration::minutes(steps * step)
        };
        Slots { next: first, end_exclusive: self.end_exclusive, step: self.step }
    }

    pub fn slot_count(&self) -> usize {
        let span = (self.end_exclusive - self.start).num_minutes();
        let step = self.step.num_minutes();
        ((span + step - 1) / step) as usize
    }
}

pub struct Slots {
    next:          NaiveDateTime,
    end_exclusive: NaiveDateTime,
    step:          Duration,
}

impl Iterator for Slots {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        if self.next >= self.end_exclusive {
            return None;
        }
        let current = self.next;
        self.next += self.step;
        Some(current)
    }
}

/// A calendar month, used as the billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year:  i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(text: &str) -> Option<Self> {
        let (y, m) = text.trim().split_once('-')?;
        let year = y.parse().ok()?;
        let month = m.parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day() - Duration::days(1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Integer key `YYYYMM`.
    pub fn key(&self) -> i32 {
        self.year * 100 + self.month as i32
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn two_days_hourly_has_48_slots() {
        let clock = ReadingClock::new(d(2024, 1, 1), d(2024, 1, 2), 60);
        assert_eq!(clock.slot_count(), 48);
        assert_eq!(clock.slots_from(d(2024, 1, 1)).count(), 48);
    }

    #[test]
    fn late_start_stays_on_grid() {
        let clock = ReadingClock::new(d(2024, 1, 1), d(2024, 1, 3), 25);
        let first = clock.slots_from(d(2024, 1, 2)).next().unwrap();
        let offset = (first - d(2024, 1, 1).and_time(NaiveTime::MIN)).num_minutes();
        assert_eq!(offset % 25, 0);
        assert!(first >= d(2024, 1, 2).and_time(NaiveTime::MIN));
    }

    #[test]
    fn year_month_last_day_handles_leap_years() {
        assert_eq!(YearMonth { year: 2024, month: 2 }.last_day(), d(2024, 2, 29));
        assert_eq!(YearMonth { year: 2023, month: 12 }.last_day(), d(2023, 12, 31));
        assert_eq!(YearMonth::parse("2024-07"), Some(YearMonth { year: 2024, month: 7 }));
        assert_eq!(YearMonth::parse("2024-13"), None);
    }
}

//! Time system for habit recurrence
//!
//! Provides the calendar arithmetic behind streaks and duplicate detection:
//! - `Recurrence` - How often a habit repeats
//! - `Period` - The window a single completion counts for
//! - `day_key` - Calendar-day string stored on every completion
//!
//! All calendar days are UTC days.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day of week, 0 = Sunday .. 6 = Saturday
pub type Weekday = u8;

/// Seconds in one hour
const HOUR_SECS: i64 = 3600;

/// How often a habit is meant to be done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    /// Every calendar day
    #[default]
    Daily,
    /// On specific weekdays
    Weekly { days: Vec<Weekday> },
    /// Every `hours` hours, in epoch-aligned windows
    Interval { hours: u32 },
}

impl Recurrence {
    /// Reject recurrences that can never be scheduled
    pub fn validate(&self) -> Result<()> {
        match self {
            Recurrence::Daily => Ok(()),
            Recurrence::Weekly { days } => {
                if days.is_empty() {
                    return Err(Error::validation("weekly habits need at least one weekday"));
                }
                if let Some(day) = days.iter().find(|d| **d > 6) {
                    return Err(Error::validation(format!("weekday {} out of range 0..=6", day)));
                }
                Ok(())
            }
            Recurrence::Interval { hours } => {
                if *hours == 0 {
                    Err(Error::validation("interval must be at least one hour"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// The period a completion at `at` belongs to
    pub fn period_of(&self, at: DateTime<Utc>) -> Period {
        match self {
            Recurrence::Daily | Recurrence::Weekly { .. } => Period::Day(at.date_naive()),
            Recurrence::Interval { hours } => {
                let width = i64::from((*hours).max(1)) * HOUR_SECS;
                Period::Window {
                    hours: *hours,
                    index: at.timestamp().div_euclid(width),
                }
            }
        }
    }

    /// Check whether the habit is due on a calendar day
    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        match self {
            Recurrence::Weekly { days } => days.contains(&weekday_of(date)),
            Recurrence::Daily | Recurrence::Interval { .. } => true,
        }
    }

    /// The latest scheduled day strictly before `date`
    pub fn previous_scheduled_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        (1..=7u64)
            .filter_map(|n| date.checked_sub_days(Days::new(n)))
            .find(|d| self.is_scheduled_on(*d))
    }

    /// Short label for logs and reports
    pub fn label(&self) -> String {
        match self {
            Recurrence::Daily => "daily".to_string(),
            Recurrence::Weekly { .. } => "weekly".to_string(),
            Recurrence::Interval { hours } => format!("every {}h", hours),
        }
    }
}

/// The recurrence window a completion counts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    /// A calendar day
    Day(NaiveDate),
    /// The `index`-th window of `hours` hours since the Unix epoch
    Window { hours: u32, index: i64 },
}

impl Period {
    /// Stable key stored in the (habit, period) unique index
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Whether `other` is the period immediately before this one
    pub fn follows(&self, other: &Period) -> bool {
        match (self, other) {
            (Period::Day(today), Period::Day(prev)) => today.checked_sub_days(Days::new(1)) == Some(*prev),
            (
                Period::Window { hours, index },
                Period::Window {
                    hours: prev_hours,
                    index: prev_index,
                },
            ) => hours == prev_hours && *prev_index == index - 1,
            _ => false,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Period::Window { hours, index } => write!(f, "{}h#{}", hours, index),
        }
    }
}

/// Weekday number of a date, 0 = Sunday
pub fn weekday_of(date: NaiveDate) -> Weekday {
    date.weekday().num_days_from_sunday() as Weekday
}

/// Calendar-day string (`YYYY-MM-DD`) of a timestamp
pub fn day_key(at: DateTime<Utc>) -> String {
    at.date_naive().format("%Y-%m-%d").to_string()
}

/// The last `days` calendar days ending with `today`, oldest first
pub fn trailing_days(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..u64::from(days))
        .rev()
        .filter_map(|n| today.checked_sub_days(Days::new(n)))
        .collect()
}

/// Sunday starting the week that contains `date`
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(weekday_of(date))))
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_period() {
        let r = Recurrence::Daily;
        assert_eq!(r.period_of(at(2025, 3, 1, 0)), r.period_of(at(2025, 3, 1, 23)));
        assert_eq!(r.period_of(at(2025, 3, 1, 8)).key(), "2025-03-01");
        assert!(r
            .period_of(at(2025, 3, 1, 8))
            .follows(&r.period_of(at(2025, 2, 28, 22))));
    }

    #[test]
    fn test_interval_windows() {
        let r = Recurrence::Interval { hours: 6 };
        let morning = r.period_of(at(2025, 3, 1, 7));
        let noon = r.period_of(at(2025, 3, 1, 12));
        assert_eq!(morning, r.period_of(at(2025, 3, 1, 11)));
        assert!(noon.follows(&morning));
        assert!(!r.period_of(at(2025, 3, 1, 18)).follows(&morning));
    }

    #[test]
    fn test_weekly_schedule() {
        // 2025-03-03 is a Monday
        let r = Recurrence::Weekly { days: vec![1, 3] };
        assert_eq!(weekday_of(day(2025, 3, 3)), 1);
        assert!(r.is_scheduled_on(day(2025, 3, 3)));
        assert!(!r.is_scheduled_on(day(2025, 3, 4)));
        assert_eq!(r.previous_scheduled_day(day(2025, 3, 5)), Some(day(2025, 3, 3)));
        assert_eq!(r.previous_scheduled_day(day(2025, 3, 3)), Some(day(2025, 2, 26)));
    }

    #[test]
    fn test_validate() {
        assert!(Recurrence::Daily.validate().is_ok());
        assert!(Recurrence::Weekly { days: vec![] }.validate().is_err());
        assert!(Recurrence::Weekly { days: vec![7] }.validate().is_err());
        assert!(Recurrence::Interval { hours: 0 }.validate().is_err());
        assert!(Recurrence::Interval { hours: 24 }.validate().is_ok());
    }

    #[test]
    fn test_calendar_helpers() {
        let days = trailing_days(day(2025, 3, 2), 3);
        assert_eq!(days, vec![day(2025, 2, 28), day(2025, 3, 1), day(2025, 3, 2)]);
        // 2025-03-05 is a Wednesday
        assert_eq!(start_of_week(day(2025, 3, 5)), day(2025, 3, 2));
        assert_eq!(day_key(at(2025, 3, 5, 23)), "2025-03-05");
    }
}

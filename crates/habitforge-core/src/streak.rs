//! Streak evaluation for a single completion attempt
//!
//! Given the previous completion marker, the recurrence and the time of the
//! new attempt, decide whether the attempt is a duplicate, continues the
//! streak, or starts a new one. Pure; performs no I/O.
//!
//! Continuation is calendar adjacency:
//! - daily: the previous completion was yesterday
//! - weekly: no scheduled weekday was skipped since the previous completion
//! - interval: the previous completion sits in the immediately preceding window
//!
//! Weekly habits can only be completed on their scheduled weekdays.

use crate::time::{Period, Recurrence};
use crate::{Error, HabitId, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// How the streak moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First completion ever
    Started,
    /// Previous period was completed
    Continued,
    /// There was a gap
    Reset,
}

/// Result of evaluating one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    /// Period this completion counts for
    pub period: Period,
    pub change: StreakChange,
    pub current: u32,
    pub longest: u32,
}

/// Streak state of one habit, fed to [`StreakEvaluator::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub last_completed_at: Option<DateTime<Utc>>,
    pub current: u32,
    pub longest: u32,
}

/// Streak evaluator bound to one habit's recurrence
#[derive(Debug, Clone, Copy)]
pub struct StreakEvaluator<'a> {
    habit: HabitId,
    recurrence: &'a Recurrence,
}

impl<'a> StreakEvaluator<'a> {
    pub fn new(habit: HabitId, recurrence: &'a Recurrence) -> Self {
        Self { habit, recurrence }
    }

    /// Evaluate a completion attempt at `now`
    ///
    /// Fails with [`Error::AlreadyCompleted`] when `state` already covers the
    /// current period, and with [`Error::Validation`] on a day the recurrence
    /// does not schedule.
    pub fn evaluate(&self, state: StreakState, now: DateTime<Utc>) -> Result<StreakUpdate> {
        let today = now.date_naive();
        if !self.recurrence.is_scheduled_on(today) {
            return Err(Error::validation(format!(
                "{} is not scheduled on {}",
                self.habit,
                today.weekday()
            )));
        }
        let period = self.recurrence.period_of(now);

        let change = match state.last_completed_at {
            None => StreakChange::Started,
            Some(last) => {
                let last_period = self.recurrence.period_of(last);
                if last_period >= period {
                    return Err(Error::AlreadyCompleted {
                        habit: self.habit.to_string(),
                        period: period.key(),
                    });
                }
                if self.continues(last, now) {
                    StreakChange::Continued
                } else {
                    StreakChange::Reset
                }
            }
        };

        let current = match change {
            StreakChange::Continued => state.current.saturating_add(1),
            StreakChange::Started | StreakChange::Reset => 1,
        };

        Ok(StreakUpdate {
            period,
            change,
            current,
            longest: state.longest.max(current),
        })
    }

    /// Whether a completion at `last` keeps the streak alive at `now`
    fn continues(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.recurrence {
            Recurrence::Daily | Recurrence::Interval { .. } => self
                .recurrence
                .period_of(now)
                .follows(&self.recurrence.period_of(last)),
            Recurrence::Weekly { .. } => {
                match self.recurrence.previous_scheduled_day(now.date_naive()) {
                    Some(previous) => last.date_naive() >= previous,
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    fn state(last: Option<DateTime<Utc>>, current: u32, longest: u32) -> StreakState {
        StreakState {
            last_completed_at: last,
            current,
            longest,
        }
    }

    #[test]
    fn test_first_completion_starts() {
        let daily = Recurrence::Daily;
        let eval = StreakEvaluator::new(HabitId::new(1), &daily);
        let update = eval.evaluate(StreakState::default(), at(1, 8)).unwrap();
        assert_eq!(update.change, StreakChange::Started);
        assert_eq!(update.current, 1);
        assert_eq!(update.longest, 1);
    }

    #[test]
    fn test_same_day_is_duplicate() {
        let daily = Recurrence::Daily;
        let eval = StreakEvaluator::new(HabitId::new(1), &daily);
        let err = eval.evaluate(state(Some(at(1, 7)), 3, 3), at(1, 22)).unwrap_err();
        assert!(matches!(err, Error::AlreadyCompleted { .. }));
    }

    #[test]
    fn test_yesterday_continues() {
        let daily = Recurrence::Daily;
        let eval = StreakEvaluator::new(HabitId::new(1), &daily);
        let update = eval.evaluate(state(Some(at(1, 23)), 4, 9), at(2, 0)).unwrap();
        assert_eq!(update.change, StreakChange::Continued);
        assert_eq!(update.current, 5);
        assert_eq!(update.longest, 9);
    }

    #[test]
    fn test_gap_resets_regardless_of_prior_streak() {
        let daily = Recurrence::Daily;
        let eval = StreakEvaluator::new(HabitId::new(1), &daily);
        for prior in [1, 6, 29, 250] {
            let update = eval.evaluate(state(Some(at(1, 12)), prior, prior), at(3, 12)).unwrap();
            assert_eq!(update.change, StreakChange::Reset);
            assert_eq!(update.current, 1);
            assert_eq!(update.longest, prior);
        }
    }

    #[test]
    fn test_weekly_skips_unscheduled_days() {
        // Mondays and Fridays; 2025-03-03 is a Monday, 2025-03-07 a Friday
        let weekly = Recurrence::Weekly { days: vec![1, 5] };
        let eval = StreakEvaluator::new(HabitId::new(1), &weekly);

        let update = eval.evaluate(state(Some(at(3, 9)), 2, 2), at(7, 9)).unwrap();
        assert_eq!(update.change, StreakChange::Continued);
        assert_eq!(update.current, 3);

        // Friday completion missed, next Monday resets
        let update = eval.evaluate(state(Some(at(3, 9)), 2, 2), at(10, 9)).unwrap();
        assert_eq!(update.change, StreakChange::Reset);
    }

    #[test]
    fn test_weekly_rejects_unscheduled_days() {
        // Mondays only; 2025-03-04 is a Tuesday
        let weekly = Recurrence::Weekly { days: vec![1] };
        let eval = StreakEvaluator::new(HabitId::new(1), &weekly);
        let err = eval.evaluate(state(Some(at(3, 9)), 1, 1), at(4, 9)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(eval.evaluate(StreakState::default(), at(9, 9)).is_err());

        let update = eval.evaluate(state(Some(at(3, 9)), 1, 1), at(10, 9)).unwrap();
        assert_eq!(update.change, StreakChange::Continued);
        assert_eq!(update.current, 2);
    }

    #[test]
    fn test_interval_windows() {
        let every_eight = Recurrence::Interval { hours: 8 };
        let eval = StreakEvaluator::new(HabitId::new(1), &every_eight);

        assert!(eval.evaluate(state(Some(at(1, 1)), 1, 1), at(1, 7)).is_err());
        let update = eval.evaluate(state(Some(at(1, 1)), 1, 1), at(1, 9)).unwrap();
        assert_eq!(update.change, StreakChange::Continued);
        let update = eval.evaluate(state(Some(at(1, 1)), 1, 1), at(1, 17)).unwrap();
        assert_eq!(update.change, StreakChange::Reset);
    }

    #[test]
    fn test_current_never_exceeds_longest() {
        let daily = Recurrence::Daily;
        let eval = StreakEvaluator::new(HabitId::new(1), &daily);
        let mut s = StreakState::default();
        for day in 1..=20 {
            let update = eval.evaluate(s, at(day, 10)).unwrap();
            assert!(update.current <= update.longest);
            s = state(Some(at(day, 10)), update.current, update.longest);
        }
        assert_eq!(s.current, 20);
    }
}

//! Read-only statistics over a user's habits and completions

use crate::model::{Completion, Habit, TimeOfDay};
use crate::store::Store;
use crate::time::{start_of_week, trailing_days};
use crate::tracker::{checked_days, Tracker, DEFAULT_HISTORY_DAYS};
use crate::{HabitId, Result, UserId};
use chrono::{DateTime, Days, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// Completions and XP earned on one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStat {
    pub date: String,
    pub completions: u64,
    pub xp: u64,
}

/// One entry per day of the last `days` days ending `today`, oldest first.
/// Days without completions are present with zeros.
pub fn daily_stats(completions: &[Completion], today: NaiveDate, days: u32) -> Vec<DailyStat> {
    let mut by_day: IndexMap<String, DailyStat> = trailing_days(today, days)
        .into_iter()
        .map(|d| {
            let date = d.format("%Y-%m-%d").to_string();
            let stat = DailyStat {
                date: date.clone(),
                completions: 0,
                xp: 0,
            };
            (date, stat)
        })
        .collect();
    for completion in completions {
        if let Some(stat) = by_day.get_mut(&completion.date) {
            stat.completions += 1;
            stat.xp += completion.xp_earned;
        }
    }
    by_day.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStat {
    pub category: String,
    /// Completions as a percentage of the summed target goals
    pub rate: f64,
    pub completed: u64,
    pub total: u64,
}

/// Completion rate per category, in order of first appearance
pub fn category_rates(habits: &[Habit]) -> Vec<CategoryStat> {
    let mut totals: IndexMap<&str, (u64, u64)> = IndexMap::new();
    for habit in habits {
        let entry = totals.entry(habit.category.as_str()).or_default();
        entry.0 += habit.total_completions;
        entry.1 += u64::from(habit.target_goal);
    }
    totals
        .into_iter()
        .map(|(category, (completed, total))| CategoryStat {
            category: category.to_string(),
            rate: percent(completed, total),
            completed,
            total,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitStreak {
    pub habit_id: HabitId,
    pub habit_name: String,
    pub streak: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakAnalysis {
    pub total_habits: usize,
    pub active_habits: usize,
    /// Streaks of live habits
    pub current_streaks: Vec<HabitStreak>,
    pub average_streak: f64,
    pub longest_overall_streak: u32,
}

pub fn streak_analysis(habits: &[Habit]) -> StreakAnalysis {
    let live: Vec<&Habit> = habits.iter().filter(|h| h.is_live()).collect();
    let average_streak = if live.is_empty() {
        0.0
    } else {
        live.iter().map(|h| f64::from(h.current_streak)).sum::<f64>() / live.len() as f64
    };
    StreakAnalysis {
        total_habits: habits.len(),
        active_habits: live.len(),
        current_streaks: live
            .iter()
            .map(|h| HabitStreak {
                habit_id: h.id,
                habit_name: h.name.clone(),
                streak: h.current_streak,
                longest: h.longest_streak,
            })
            .collect(),
        average_streak,
        longest_overall_streak: habits.iter().map(|h| h.longest_streak).max().unwrap_or(0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOfDayStat {
    pub time: TimeOfDay,
    pub completions: u64,
}

/// Total completions by the habits' time of day; always four entries
pub fn time_of_day_breakdown(habits: &[Habit]) -> Vec<TimeOfDayStat> {
    TimeOfDay::ALL
        .into_iter()
        .map(|time| TimeOfDayStat {
            time,
            completions: habits
                .iter()
                .filter(|h| h.time_of_day == time)
                .map(|h| h.total_completions)
                .sum(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayStat {
    pub day: &'static str,
    pub date: String,
    pub completions: u64,
    pub xp: u64,
}

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Sunday through Saturday of the week containing `today`
pub fn weekly_progress(completions: &[Completion], today: NaiveDate) -> Vec<WeekdayStat> {
    let sunday = start_of_week(today);
    WEEKDAY_NAMES
        .into_iter()
        .zip(0u64..)
        .map(|(name, offset)| {
            let date = sunday
                .checked_add_days(Days::new(offset))
                .unwrap_or(sunday)
                .format("%Y-%m-%d")
                .to_string();
            let on_day = completions.iter().filter(|c| c.date == date);
            let (count, xp) = on_day.fold((0, 0), |(n, xp), c| (n + 1, xp + c.xp_earned));
            WeekdayStat {
                day: name,
                date,
                completions: count,
                xp,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitPerformance {
    #[serde(flatten)]
    pub habit: Habit,
    /// Completions as a percentage of the target goal
    pub completion_rate: f64,
}

/// Habits ranked by completion rate, best first
pub fn best_performing(habits: &[Habit], limit: usize) -> Vec<HabitPerformance> {
    let mut ranked: Vec<HabitPerformance> = habits
        .iter()
        .map(|h| HabitPerformance {
            habit: h.clone(),
            completion_rate: percent(h.total_completions, u64::from(h.target_goal)),
        })
        .collect();
    ranked.sort_by(|a, b| b.completion_rate.total_cmp(&a.completion_rate));
    ranked.truncate(limit);
    ranked
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Default number of habits in `best_performing`
pub const DEFAULT_BEST_LIMIT: usize = 5;

impl<S: Store> Tracker<S> {
    /// Daily completion and XP series for the last `days` days
    pub fn completion_stats(&self, user_id: UserId, days: Option<u32>, now: DateTime<Utc>) -> Result<Vec<DailyStat>> {
        let days = checked_days(days.unwrap_or(DEFAULT_HISTORY_DAYS))?;
        let completions = self.store().read(|view| {
            view.require_user(user_id)?;
            view.completions_of_user(user_id)
        })?;
        Ok(daily_stats(&completions, now.date_naive(), days))
    }

    pub fn category_stats(&self, user_id: UserId) -> Result<Vec<CategoryStat>> {
        Ok(category_rates(&self.owned_habits(user_id)?))
    }

    pub fn streak_stats(&self, user_id: UserId) -> Result<StreakAnalysis> {
        Ok(streak_analysis(&self.owned_habits(user_id)?))
    }

    pub fn time_of_day_stats(&self, user_id: UserId) -> Result<Vec<TimeOfDayStat>> {
        Ok(time_of_day_breakdown(&self.owned_habits(user_id)?))
    }

    pub fn weekly_stats(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<WeekdayStat>> {
        let completions = self.store().read(|view| {
            view.require_user(user_id)?;
            view.completions_of_user(user_id)
        })?;
        Ok(weekly_progress(&completions, now.date_naive()))
    }

    pub fn best_habits(&self, user_id: UserId, limit: Option<usize>) -> Result<Vec<HabitPerformance>> {
        let limit = limit.unwrap_or(DEFAULT_BEST_LIMIT).max(1);
        Ok(best_performing(&self.owned_habits(user_id)?, limit))
    }

    pub(crate) fn owned_habits(&self, user_id: UserId) -> Result<Vec<Habit>> {
        self.store().read(|view| {
            view.require_user(user_id)?;
            view.habits_of(user_id)
        })
    }
}

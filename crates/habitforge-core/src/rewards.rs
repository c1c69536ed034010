//! Summary reports, upcoming achievements and level-gated themes

use crate::achievement::AchievementProgress;
use crate::model::{Completion, Habit, User};
use crate::store::Store;
use crate::tracker::Tracker;
use crate::{Error, HabitId, Result, UserId};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of entries returned by `upcoming_achievements`
pub const UPCOMING_LIMIT: usize = 5;

/// Level needed for each named theme; other names need level 1
pub const THEME_LEVELS: [(&str, u32); 4] = [("ocean", 3), ("sunset", 5), ("forest", 7), ("galaxy", 10)];

/// Span covered by a summary report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSpan {
    Week,
    Month,
}

impl ReportSpan {
    pub fn days(&self) -> u32 {
        match self {
            ReportSpan::Week => 7,
            ReportSpan::Month => 30,
        }
    }
}

impl FromStr for ReportSpan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "week" => Ok(ReportSpan::Week),
            "month" => Ok(ReportSpan::Month),
            other => Err(Error::validation(format!("unknown report period '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestHabit {
    pub habit_id: HabitId,
    pub name: String,
    pub completions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub period: ReportSpan,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_completions: u64,
    pub total_xp: u64,
    pub unique_habits_completed: usize,
    pub total_habits: usize,
    /// Rounded to one decimal
    pub average_completions_per_day: f64,
    pub best_habit: Option<BestHabit>,
    pub current_streak: u32,
    /// A completion was recorded on the current day
    pub streak_maintained: bool,
    /// Whole percent of `total_habits * days`
    pub completion_rate: u32,
}

/// Summarize the completions made in the `span` days before `now`
pub fn summary_report(
    user: &User,
    habits: &[Habit],
    completions: &[Completion],
    span: ReportSpan,
    now: DateTime<Utc>,
) -> SummaryReport {
    let days = span.days();
    let start = now - Duration::days(i64::from(days));
    let recent: Vec<&Completion> = completions.iter().filter(|c| c.completed_at >= start).collect();

    let mut per_habit: IndexMap<HabitId, u64> = IndexMap::new();
    for completion in &recent {
        *per_habit.entry(completion.habit_id).or_default() += 1;
    }

    // first habit wins ties
    let mut best_habit: Option<BestHabit> = None;
    for (habit_id, count) in &per_habit {
        if best_habit.as_ref().is_some_and(|b| b.completions >= *count) {
            continue;
        }
        if let Some(habit) = habits.iter().find(|h| h.id == *habit_id) {
            best_habit = Some(BestHabit {
                habit_id: *habit_id,
                name: habit.name.clone(),
                completions: *count,
            });
        }
    }

    let total_completions = recent.len() as u64;
    let today = now.date_naive();
    let slots = habits.len() as f64 * f64::from(days);
    SummaryReport {
        period: span,
        start,
        end: now,
        total_completions,
        total_xp: recent.iter().map(|c| c.xp_earned).sum(),
        unique_habits_completed: per_habit.len(),
        total_habits: habits.len(),
        average_completions_per_day: (total_completions as f64 / f64::from(days) * 10.0).round() / 10.0,
        best_habit,
        current_streak: user.current_streak,
        streak_maintained: recent.iter().any(|c| c.completed_at.date_naive() == today),
        completion_rate: if slots > 0.0 {
            (total_completions as f64 / slots * 100.0).round() as u32
        } else {
            0
        },
    }
}

/// Locked, incomplete achievements closest to unlocking
pub fn upcoming_achievements(progress: Vec<AchievementProgress>, limit: usize) -> Vec<AchievementProgress> {
    let mut upcoming: Vec<AchievementProgress> = progress
        .into_iter()
        .filter(|p| !p.unlocked && p.percentage < 100.0)
        .collect();
    upcoming.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    upcoming.truncate(limit);
    upcoming
}

/// Level a theme requires
pub fn theme_level(theme: &str) -> u32 {
    THEME_LEVELS
        .iter()
        .find(|(name, _)| *name == theme)
        .map(|(_, level)| *level)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeUnlock {
    pub theme: String,
    pub required_level: u32,
    pub unlocked: bool,
    pub message: String,
}

/// Check that `user` may use `theme`
pub fn unlock_theme(user: &User, theme: &str) -> Result<ThemeUnlock> {
    let theme = theme.trim();
    if theme.is_empty() {
        return Err(Error::validation("theme name must not be empty"));
    }
    let required = theme_level(theme);
    if user.level < required {
        return Err(Error::LevelRequired {
            theme: theme.to_string(),
            required,
        });
    }
    Ok(ThemeUnlock {
        theme: theme.to_string(),
        required_level: required,
        unlocked: true,
        message: format!("{} theme unlocked!", theme),
    })
}

impl<S: Store> Tracker<S> {
    pub fn summary(&self, user_id: UserId, span: ReportSpan, now: DateTime<Utc>) -> Result<SummaryReport> {
        self.store().read(|view| {
            let user = view.require_user(user_id)?;
            let habits = view.habits_of(user_id)?;
            let completions = view.completions_of_user(user_id)?;
            Ok(summary_report(&user, &habits, &completions, span, now))
        })
    }

    pub fn upcoming_achievements(&self, user_id: UserId) -> Result<Vec<AchievementProgress>> {
        Ok(upcoming_achievements(self.achievement_progress(user_id)?, UPCOMING_LIMIT))
    }

    pub fn unlock_theme(&self, user_id: UserId, theme: &str) -> Result<ThemeUnlock> {
        let user = self.user(user_id)?;
        unlock_theme(&user, theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievement::AchievementEvaluator;
    use crate::model::NewHabit;
    use crate::CompletionId;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn completion(id: u64, habit: u64, days_ago: i64, xp: u64) -> Completion {
        let at = now() - Duration::days(days_ago);
        Completion {
            id: CompletionId::new(id),
            user_id: UserId::new(1),
            habit_id: HabitId::new(habit),
            completed_at: at,
            date: crate::time::day_key(at),
            period: crate::time::day_key(at),
            xp_earned: xp,
            streak_day: 1,
            notes: None,
        }
    }

    fn habits() -> Vec<Habit> {
        (1..=2)
            .map(|id| {
                Habit::create(HabitId::new(id), UserId::new(1), NewHabit::new(format!("h{}", id), "x"), now())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_weekly_summary() {
        let user = User::new(UserId::new(1), "sub", "Ada", now());
        let completions = vec![
            completion(1, 1, 0, 10),
            completion(2, 1, 1, 10),
            completion(3, 2, 2, 5),
            completion(4, 2, 20, 5),
        ];
        let report = summary_report(&user, &habits(), &completions, ReportSpan::Week, now());
        assert_eq!(report.total_completions, 3);
        assert_eq!(report.total_xp, 25);
        assert_eq!(report.unique_habits_completed, 2);
        assert_eq!(report.average_completions_per_day, 0.4);
        assert_eq!(report.best_habit.map(|b| b.habit_id), Some(HabitId::new(1)));
        assert!(report.streak_maintained);
        // 3 of 14 slots
        assert_eq!(report.completion_rate, 21);
    }

    #[test]
    fn test_empty_summary() {
        let user = User::new(UserId::new(1), "sub", "Ada", now());
        let report = summary_report(&user, &[], &[], ReportSpan::Month, now());
        assert_eq!(report.completion_rate, 0);
        assert_eq!(report.best_habit, None);
        assert!(!report.streak_maintained);
    }

    #[test]
    fn test_upcoming_excludes_unlocked_and_complete() {
        let mut user = User::new(UserId::new(1), "sub", "Ada", now());
        user.total_habits_completed = 60;
        let progress = AchievementEvaluator::default().progress(&user, &[], &[]);
        let upcoming = upcoming_achievements(progress, UPCOMING_LIMIT);
        assert_eq!(upcoming.len(), 5);
        assert_eq!(upcoming[0].def.id, "century_club");
        assert!(upcoming.iter().all(|p| p.def.id != "first_step"));
        assert!(upcoming.windows(2).all(|w| w[0].percentage >= w[1].percentage));
    }

    #[test]
    fn test_theme_gates() {
        let mut user = User::new(UserId::new(1), "sub", "Ada", now());
        assert!(unlock_theme(&user, "plain").unwrap().unlocked);
        assert_eq!(
            unlock_theme(&user, "ocean").unwrap_err(),
            Error::LevelRequired {
                theme: "ocean".to_string(),
                required: 3
            }
        );
        user.add_xp(250);
        assert_eq!(unlock_theme(&user, "ocean").unwrap().required_level, 3);
        assert!(unlock_theme(&user, "galaxy").is_err());
    }
}

//! Habit, completion and unlock models for database storage.

use super::{from_millis, to_millis};
use crate::error::{Error, Result};
use habitforge_core::{
    AchievementId, AchievementUnlock, Completion, CompletionId, Habit, HabitId, Recurrence, UserId,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Stored habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 3, version = 1)]
#[native_db]
pub struct StoredHabit {
    /// Primary key - habit ID.
    #[primary_key]
    pub id: u64,
    /// Owning user.
    #[secondary_key]
    pub user_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    /// "daily", "weekly" or "interval".
    pub recurrence: String,
    /// Weekdays of a weekly habit, 0 = Sunday.
    pub weekly_days: Vec<u8>,
    /// Window length of an interval habit.
    pub interval_hours: u32,
    pub difficulty: String,
    pub xp_value: u64,
    pub time_of_day: String,
    pub target_goal: u32,
    pub reminder_enabled: bool,
    pub reminder_time: Option<String>,
    pub icon: String,
    pub color: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completions: u64,
    pub is_active: bool,
    pub is_paused: bool,
    /// Milliseconds since the epoch.
    pub last_completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StoredHabit {
    /// Create from a habit record.
    pub fn from_habit(habit: &Habit) -> Self {
        let (weekly_days, interval_hours) = match &habit.recurrence {
            Recurrence::Daily => (Vec::new(), 0),
            Recurrence::Weekly { days } => (days.clone(), 0),
            Recurrence::Interval { hours } => (Vec::new(), *hours),
        };
        Self {
            id: habit.id.raw(),
            user_id: habit.user_id.raw(),
            name: habit.name.clone(),
            description: habit.description.clone(),
            category: habit.category.clone(),
            recurrence: recurrence_kind(&habit.recurrence).to_string(),
            weekly_days,
            interval_hours,
            difficulty: habit.difficulty.as_str().to_string(),
            xp_value: habit.xp_value,
            time_of_day: habit.time_of_day.as_str().to_string(),
            target_goal: habit.target_goal,
            reminder_enabled: habit.reminder_enabled,
            reminder_time: habit.reminder_time.clone(),
            icon: habit.icon.clone(),
            color: habit.color.clone(),
            current_streak: habit.current_streak,
            longest_streak: habit.longest_streak,
            total_completions: habit.total_completions,
            is_active: habit.is_active,
            is_paused: habit.is_paused,
            last_completed_at: habit.last_completed_at.map(to_millis),
            created_at: to_millis(habit.created_at),
            updated_at: to_millis(habit.updated_at),
        }
    }

    /// Convert to a habit record.
    pub fn to_habit(&self) -> Result<Habit> {
        let recurrence = match self.recurrence.as_str() {
            "daily" => Recurrence::Daily,
            "weekly" => Recurrence::Weekly {
                days: self.weekly_days.clone(),
            },
            "interval" => Recurrence::Interval {
                hours: self.interval_hours,
            },
            other => return Err(Error::Corrupt(format!("habit {}: recurrence '{}'", self.id, other))),
        };
        Ok(Habit {
            id: HabitId::new(self.id),
            user_id: UserId::new(self.user_id),
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            recurrence,
            difficulty: self
                .difficulty
                .parse()
                .map_err(|e| Error::Corrupt(format!("habit {}: {}", self.id, e)))?,
            xp_value: self.xp_value,
            time_of_day: self
                .time_of_day
                .parse()
                .map_err(|e| Error::Corrupt(format!("habit {}: {}", self.id, e)))?,
            target_goal: self.target_goal,
            reminder_enabled: self.reminder_enabled,
            reminder_time: self.reminder_time.clone(),
            icon: self.icon.clone(),
            color: self.color.clone(),
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            total_completions: self.total_completions,
            is_active: self.is_active,
            is_paused: self.is_paused,
            last_completed_at: self.last_completed_at.map(from_millis).transpose()?,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

fn recurrence_kind(recurrence: &Recurrence) -> &'static str {
    match recurrence {
        Recurrence::Daily => "daily",
        Recurrence::Weekly { .. } => "weekly",
        Recurrence::Interval { .. } => "interval",
    }
}

/// Key of the unique (habit, period) index.
pub fn habit_period_key(habit: HabitId, period: &str) -> String {
    format!("{}/{}", habit.raw(), period)
}

/// Stored completion. Never updated once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 4, version = 1)]
#[native_db]
pub struct StoredCompletion {
    /// Primary key - completion ID.
    #[primary_key]
    pub id: u64,
    #[secondary_key]
    pub user_id: u64,
    #[secondary_key]
    pub habit_id: u64,
    /// `habit/period`; at most one completion per habit and period.
    #[secondary_key(unique)]
    pub habit_period: String,
    pub completed_at: i64,
    pub date: String,
    pub period: String,
    pub xp_earned: u64,
    pub streak_day: u32,
    pub notes: Option<String>,
}

impl StoredCompletion {
    /// Create from a completion record.
    pub fn from_completion(completion: &Completion) -> Self {
        Self {
            id: completion.id.raw(),
            user_id: completion.user_id.raw(),
            habit_id: completion.habit_id.raw(),
            habit_period: habit_period_key(completion.habit_id, &completion.period),
            completed_at: to_millis(completion.completed_at),
            date: completion.date.clone(),
            period: completion.period.clone(),
            xp_earned: completion.xp_earned,
            streak_day: completion.streak_day,
            notes: completion.notes.clone(),
        }
    }

    /// Convert to a completion record.
    pub fn to_completion(&self) -> Result<Completion> {
        Ok(Completion {
            id: CompletionId::new(self.id),
            user_id: UserId::new(self.user_id),
            habit_id: HabitId::new(self.habit_id),
            completed_at: from_millis(self.completed_at)?,
            date: self.date.clone(),
            period: self.period.clone(),
            xp_earned: self.xp_earned,
            streak_day: self.streak_day,
            notes: self.notes.clone(),
        })
    }
}

/// Key of an unlock row.
pub fn unlock_key(user: UserId, achievement: &AchievementId) -> String {
    format!("{}/{}", user.raw(), achievement.as_str())
}

/// Stored achievement unlock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 5, version = 1)]
#[native_db]
pub struct StoredUnlock {
    /// Primary key - `user/achievement`, so each user unlocks an achievement once.
    #[primary_key]
    pub key: String,
    #[secondary_key]
    pub user_id: u64,
    pub achievement: String,
    pub xp_reward: u64,
    pub unlocked_at: i64,
}

impl StoredUnlock {
    /// Create from an unlock record.
    pub fn from_unlock(unlock: &AchievementUnlock) -> Self {
        Self {
            key: unlock_key(unlock.user_id, &unlock.achievement),
            user_id: unlock.user_id.raw(),
            achievement: unlock.achievement.as_str().to_string(),
            xp_reward: unlock.xp_reward,
            unlocked_at: to_millis(unlock.unlocked_at),
        }
    }

    /// Convert to an unlock record.
    pub fn to_unlock(&self) -> Result<AchievementUnlock> {
        Ok(AchievementUnlock {
            user_id: UserId::new(self.user_id),
            achievement: AchievementId::new(self.achievement.clone()),
            xp_reward: self.xp_reward,
            unlocked_at: from_millis(self.unlocked_at)?,
        })
    }
}

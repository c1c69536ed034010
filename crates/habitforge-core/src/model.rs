//! Records owned by the store: users, habits, completions, unlocks

use crate::level::level_for_xp;
use crate::time::{Period, Recurrence};
use crate::{AchievementId, CompletionId, Error, HabitId, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A person tracking habits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Subject id issued by the external identity provider
    pub subject: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub xp: u64,
    /// Always `level_for_xp(xp)`; use [`User::add_xp`] to change XP
    pub level: u32,
    /// Highest current streak across the user's habits
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_habits_completed: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a fresh user with no progress
    pub fn new(id: UserId, subject: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            subject: subject.into(),
            name: name.into(),
            email: String::new(),
            avatar: None,
            xp: 0,
            level: 1,
            current_streak: 0,
            longest_streak: 0,
            total_habits_completed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add XP and recompute the level. Returns true on level-up.
    pub fn add_xp(&mut self, amount: u64) -> bool {
        let before = self.level;
        self.xp = self.xp.saturating_add(amount);
        self.level = level_for_xp(self.xp);
        self.level > before
    }
}

/// Profile sent by the identity provider on sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub subject: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(Error::validation("user subject must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("user name must not be empty"));
        }
        Ok(())
    }
}

/// Effort tier of a habit, fixing its XP per completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[serde(alias = "low")]
    Easy,
    #[default]
    Medium,
    #[serde(alias = "high")]
    Hard,
}

impl Difficulty {
    /// XP granted per completion
    pub fn xp_value(&self) -> u64 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" | "low" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" | "high" => Ok(Difficulty::Hard),
            other => Err(Error::validation(format!("unknown difficulty '{}'", other))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the day a habit is usually done in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Anytime,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Anytime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Anytime => "anytime",
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TimeOfDay::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation(format!("unknown time of day '{}'", s)))
    }
}

/// A recurring activity owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    /// Free-form tag
    pub category: String,
    pub recurrence: Recurrence,
    pub difficulty: Difficulty,
    /// XP per completion, derived from `difficulty`
    pub xp_value: u64,
    pub time_of_day: TimeOfDay,
    /// Completions the user aims for
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
    pub last_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// Build a habit from validated creation input
    pub fn create(id: HabitId, user_id: UserId, new: NewHabit, now: DateTime<Utc>) -> Result<Self> {
        new.validate()?;
        Ok(Self {
            id,
            user_id,
            name: new.name.trim().to_string(),
            description: new.description,
            category: new.category.trim().to_string(),
            xp_value: new.difficulty.xp_value(),
            recurrence: new.recurrence,
            difficulty: new.difficulty,
            time_of_day: new.time_of_day,
            target_goal: new.target_goal,
            reminder_enabled: new.reminder_enabled,
            reminder_time: new.reminder_time,
            icon: new.icon,
            color: new.color,
            current_streak: 0,
            longest_streak: 0,
            total_completions: 0,
            is_active: true,
            is_paused: false,
            last_completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Active and not paused
    pub fn is_live(&self) -> bool {
        self.is_active && !self.is_paused
    }

    /// Period the habit's current completion window falls in
    pub fn period_at(&self, at: DateTime<Utc>) -> Period {
        self.recurrence.period_of(at)
    }

    /// Whether the last recorded completion covers the period containing `at`
    pub fn is_done_at(&self, at: DateTime<Utc>) -> bool {
        self.last_completed_at
            .map(|last| self.period_at(last) >= self.period_at(at))
            .unwrap_or(false)
    }

    /// Apply a partial update. Changing difficulty changes the XP of future completions.
    ///
    /// The habit is left untouched when any field is invalid.
    pub fn apply_patch(&mut self, patch: HabitPatch, now: DateTime<Utc>) -> Result<()> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::validation("habit name must not be empty"));
        }
        if patch.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(Error::validation("habit category must not be empty"));
        }
        if patch.target_goal == Some(0) {
            return Err(Error::validation("target goal must be at least 1"));
        }
        if let Some(recurrence) = &patch.recurrence {
            recurrence.validate()?;
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(category) = patch.category {
            self.category = category.trim().to_string();
        }
        if let Some(recurrence) = patch.recurrence {
            self.recurrence = recurrence;
        }
        if let Some(target_goal) = patch.target_goal {
            self.target_goal = target_goal;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
            self.xp_value = difficulty.xp_value();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(time_of_day) = patch.time_of_day {
            self.time_of_day = time_of_day;
        }
        if let Some(enabled) = patch.reminder_enabled {
            self.reminder_enabled = enabled;
        }
        if patch.reminder_time.is_some() {
            self.reminder_time = patch.reminder_time;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Input for creating a habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHabit {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default = "default_target_goal")]
    pub target_goal: u32,
    #[serde(default)]
    pub reminder_enabled: bool,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_target_goal() -> u32 {
    30
}

fn default_icon() -> String {
    "check".to_string()
}

fn default_color() -> String {
    "#6366f1".to_string()
}

impl NewHabit {
    /// Minimal daily habit, handy for callers that only know name and category
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: category.into(),
            recurrence: Recurrence::Daily,
            difficulty: Difficulty::default(),
            time_of_day: TimeOfDay::default(),
            target_goal: default_target_goal(),
            reminder_enabled: false,
            reminder_time: None,
            icon: default_icon(),
            color: default_color(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = time_of_day;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("habit name must not be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(Error::validation("habit category must not be empty"));
        }
        if self.target_goal == 0 {
            return Err(Error::validation("target goal must be at least 1"));
        }
        self.recurrence.validate()
    }
}

/// Partial update of a habit; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub difficulty: Option<Difficulty>,
    pub time_of_day: Option<TimeOfDay>,
    pub target_goal: Option<u32>,
    pub reminder_enabled: Option<bool>,
    pub reminder_time: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

/// One recorded check-off of a habit. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: CompletionId,
    pub user_id: UserId,
    pub habit_id: HabitId,
    pub completed_at: DateTime<Utc>,
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    /// Period key used for duplicate detection
    pub period: String,
    /// Base plus streak bonus XP granted by this completion
    pub xp_earned: u64,
    /// Streak value reached by this completion
    pub streak_day: u32,
    pub notes: Option<String>,
}

/// Record of an achievement a user has unlocked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub user_id: UserId,
    pub achievement: AchievementId,
    pub xp_reward: u64,
    pub unlocked_at: DateTime<Utc>,
}

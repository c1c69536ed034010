//! Tracker - the entry point for every habit operation
//!
//! The tracker owns a [`Store`] and the achievement catalog. Mutations run
//! inside a single `Store::write` call, so a completion either lands with all
//! of its effects (habit streak, user XP, unlock records) or not at all.
//!
//! A completion moves through these stages:
//!
//! ```text
//! Requested -> Validated -> StreakComputed -> XpAwarded -> AchievementsChecked -> Persisted
//!     \____________\______________\______________\_______________\_____________-> Rejected
//! ```

use crate::achievement::{AchievementDef, AchievementEvaluator, AchievementProgress, AchievementStatus};
use crate::level::LevelProgress;
use crate::model::{AchievementUnlock, Completion, Habit, HabitPatch, NewHabit, NewUser, User};
use crate::store::{Ledger, LedgerView, Store};
use crate::streak::{StreakEvaluator, StreakState};
use crate::time::{day_key, Period};
use crate::xp::XpAward;
use crate::{CompletionId, Error, HabitId, IdKind, Result, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default window of `habit_history`
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// Longest window accepted by history and analytics queries
pub const MAX_HISTORY_DAYS: u32 = 365;

/// Stage of a completion request, emitted as a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStage {
    Requested,
    Validated,
    StreakComputed,
    XpAwarded,
    AchievementsChecked,
    Persisted,
    Rejected,
}

impl CompletionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStage::Requested => "requested",
            CompletionStage::Validated => "validated",
            CompletionStage::StreakComputed => "streak_computed",
            CompletionStage::XpAwarded => "xp_awarded",
            CompletionStage::AchievementsChecked => "achievements_checked",
            CompletionStage::Persisted => "persisted",
            CompletionStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CompletionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(stage: CompletionStage, habit: HabitId) {
    debug!(stage = %stage, habit = %habit, "completion stage");
}

/// Everything a completion changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOutcome {
    pub completion: Completion,
    /// Base plus streak bonus
    pub xp_earned: u64,
    pub bonus_xp: u64,
    /// Rewards of achievements unlocked by this completion
    pub achievement_xp: u64,
    pub new_streak: u32,
    pub longest_streak: u32,
    pub leveled_up: bool,
    pub new_level: u32,
    pub total_xp: u64,
    pub unlocked_achievements: Vec<AchievementDef>,
}

/// Which habits a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitFilter {
    #[default]
    All,
    /// Active and not paused
    Active,
    Paused,
    /// Completed in the current period
    Completed,
}

impl FromStr for HabitFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(HabitFilter::All),
            "active" => Ok(HabitFilter::Active),
            "paused" => Ok(HabitFilter::Paused),
            "completed" => Ok(HabitFilter::Completed),
            other => Err(Error::validation(format!("unknown habit filter '{}'", other))),
        }
    }
}

/// A habit as listed to its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitView {
    #[serde(flatten)]
    pub habit: Habit,
    /// A completion exists for the current period
    pub completed_today: bool,
}

/// Profile numbers shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub name: String,
    pub xp: u64,
    pub level: u32,
    pub xp_for_current_level: u64,
    pub xp_for_next_level: u64,
    pub progress_percent: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_habits_completed: u64,
    pub total_habits: usize,
    pub active_habits: usize,
    pub achievements_unlocked: usize,
}

/// Recent completions of one habit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitHistory {
    pub habit_id: HabitId,
    pub days: u32,
    /// Newest first
    pub completions: Vec<Completion>,
}

/// A live habit still open in its current period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub user_id: UserId,
    pub habit_id: HabitId,
    pub habit_name: String,
    pub reminder_enabled: bool,
    pub reminder_time: Option<String>,
    pub period: String,
}

/// Habit tracker over a store
pub struct Tracker<S> {
    store: S,
    achievements: AchievementEvaluator,
}

impl<S: Store> Tracker<S> {
    /// Create a tracker with the built-in achievement catalog
    pub fn new(store: S) -> Self {
        Self {
            store,
            achievements: AchievementEvaluator::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every achievement a user can earn
    pub fn achievement_catalog(&self) -> &'static [AchievementDef] {
        self.achievements.catalog()
    }

    /// One catalog entry by id
    pub fn achievement_def(&self, id: &str) -> Result<AchievementDef> {
        self.achievements
            .find(id)
            .copied()
            .ok_or_else(|| Error::not_found(format!("achievement:{}", id)))
    }

    // ---- users ----

    /// Create a user for a new subject, or refresh the profile of a known one
    pub fn register_user(&self, new: NewUser, now: DateTime<Utc>) -> Result<User> {
        new.validate()?;
        let user = self.store.write(|ledger| {
            let user = match ledger.user_by_subject(new.subject.trim())? {
                Some(mut user) => {
                    user.name = new.name.trim().to_string();
                    user.email = new.email;
                    user.avatar = new.avatar;
                    user.updated_at = now;
                    user
                }
                None => {
                    let id = UserId::new(ledger.next_id(IdKind::User)?);
                    let mut user = User::new(id, new.subject.trim(), new.name.trim(), now);
                    user.email = new.email;
                    user.avatar = new.avatar;
                    user
                }
            };
            ledger.put_user(&user)?;
            Ok(user)
        })?;
        info!(user = %user.id, subject = %user.subject, "user registered");
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        self.store.read(|view| view.require_user(id))
    }

    pub fn user_stats(&self, id: UserId) -> Result<UserStats> {
        self.store.read(|view| {
            let user = view.require_user(id)?;
            let habits = view.habits_of(id)?;
            let unlocks = view.unlocks_of(id)?;
            let progress = LevelProgress::for_xp(user.xp);
            Ok(UserStats {
                user_id: user.id,
                name: user.name,
                xp: user.xp,
                level: user.level,
                xp_for_current_level: progress.xp_for_current_level,
                xp_for_next_level: progress.xp_for_next_level,
                progress_percent: progress.progress_percent,
                current_streak: user.current_streak,
                longest_streak: user.longest_streak,
                total_habits_completed: user.total_habits_completed,
                total_habits: habits.len(),
                active_habits: habits.iter().filter(|h| h.is_live()).count(),
                achievements_unlocked: unlocks.len(),
            })
        })
    }

    // ---- habits ----

    pub fn create_habit(&self, user_id: UserId, new: NewHabit, now: DateTime<Utc>) -> Result<Habit> {
        new.validate()?;
        let habit = self.store.write(|ledger| {
            ledger.require_user(user_id)?;
            let id = HabitId::new(ledger.next_id(IdKind::Habit)?);
            let habit = Habit::create(id, user_id, new, now)?;
            ledger.put_habit(&habit)?;
            Ok(habit)
        })?;
        debug!(user = %user_id, habit = %habit.id, recurrence = %habit.recurrence.label(), "habit created");
        Ok(habit)
    }

    /// List a user's habits, optionally restricted to one category
    pub fn habits(
        &self,
        user_id: UserId,
        filter: HabitFilter,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HabitView>> {
        self.store.read(|view| {
            view.require_user(user_id)?;
            let mut listed = Vec::new();
            for habit in view.habits_of(user_id)? {
                if category.is_some_and(|c| !habit.category.eq_ignore_ascii_case(c)) {
                    continue;
                }
                let habit_view = view_of(view, habit, now)?;
                let keep = match filter {
                    HabitFilter::All => true,
                    HabitFilter::Active => habit_view.habit.is_live(),
                    HabitFilter::Paused => habit_view.habit.is_paused,
                    HabitFilter::Completed => habit_view.completed_today,
                };
                if keep {
                    listed.push(habit_view);
                }
            }
            Ok(listed)
        })
    }

    /// Live habits scheduled on the current day
    pub fn todays_habits(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<HabitView>> {
        let today = now.date_naive();
        Ok(self
            .habits(user_id, HabitFilter::Active, None, now)?
            .into_iter()
            .filter(|v| v.habit.recurrence.is_scheduled_on(today))
            .collect())
    }

    pub fn habit(&self, user_id: UserId, habit_id: HabitId, now: DateTime<Utc>) -> Result<HabitView> {
        self.store.read(|view| {
            let habit = view.require_habit(user_id, habit_id)?;
            view_of(view, habit, now)
        })
    }

    pub fn update_habit(
        &self,
        user_id: UserId,
        habit_id: HabitId,
        patch: HabitPatch,
        now: DateTime<Utc>,
    ) -> Result<Habit> {
        self.store.write(|ledger| {
            let mut habit = ledger.require_habit(user_id, habit_id)?;
            habit.apply_patch(patch, now)?;
            ledger.put_habit(&habit)?;
            Ok(habit)
        })
    }

    /// Flip the paused flag
    pub fn toggle_pause(&self, user_id: UserId, habit_id: HabitId, now: DateTime<Utc>) -> Result<Habit> {
        let habit = self.store.write(|ledger| {
            let mut habit = ledger.require_habit(user_id, habit_id)?;
            habit.is_paused = !habit.is_paused;
            habit.updated_at = now;
            ledger.put_habit(&habit)?;
            Ok(habit)
        })?;
        debug!(habit = %habit_id, paused = habit.is_paused, "habit pause toggled");
        Ok(habit)
    }

    /// Delete a habit and all of its completions. Returns the number of
    /// completions removed.
    pub fn delete_habit(&self, user_id: UserId, habit_id: HabitId) -> Result<usize> {
        let removed = self.store.write(|ledger| {
            ledger.require_habit(user_id, habit_id)?;
            let completions = ledger.completions_of_habit(habit_id)?;
            for completion in &completions {
                ledger.remove_completion(completion.id)?;
            }
            ledger.remove_habit(habit_id)?;

            let mut user = ledger.require_user(user_id)?;
            user.current_streak = best_current_streak(&ledger.habits_of(user_id)?);
            ledger.put_user(&user)?;
            Ok(completions.len())
        })?;
        info!(habit = %habit_id, completions = removed, "habit deleted");
        Ok(removed)
    }

    /// Completions of a habit over the last `days` days (default 30)
    pub fn habit_history(
        &self,
        user_id: UserId,
        habit_id: HabitId,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<HabitHistory> {
        let days = checked_days(days.unwrap_or(DEFAULT_HISTORY_DAYS))?;
        let since = now - Duration::days(i64::from(days));
        self.store.read(|view| {
            view.require_habit(user_id, habit_id)?;
            let mut completions: Vec<Completion> = view
                .completions_of_habit(habit_id)?
                .into_iter()
                .filter(|c| c.completed_at >= since)
                .collect();
            completions.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            Ok(HabitHistory {
                habit_id,
                days,
                completions,
            })
        })
    }

    // ---- completions ----

    /// Record a completion of `habit_id` at `now`
    ///
    /// Fails with `AlreadyCompleted` when the habit was already done in the
    /// current period; nothing is written in that case.
    pub fn complete_habit(
        &self,
        user_id: UserId,
        habit_id: HabitId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        enter(CompletionStage::Requested, habit_id);
        let result = self
            .store
            .write(|ledger| self.complete_in(ledger, user_id, habit_id, notes, now));

        match &result {
            Ok(outcome) => {
                enter(CompletionStage::Persisted, habit_id);
                if outcome.leveled_up {
                    info!(user = %user_id, level = outcome.new_level, "level up");
                }
                for def in &outcome.unlocked_achievements {
                    info!(user = %user_id, achievement = def.id, xp = def.xp_reward, "achievement unlocked");
                }
            }
            Err(err) => {
                enter(CompletionStage::Rejected, habit_id);
                if err.is_client_error() {
                    warn!(user = %user_id, habit = %habit_id, error = %err, "completion rejected");
                }
            }
        }
        result
    }

    fn complete_in(
        &self,
        ledger: &mut dyn Ledger,
        user_id: UserId,
        habit_id: HabitId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let mut habit = ledger.require_habit(user_id, habit_id)?;
        let mut user = ledger.require_user(user_id)?;
        if !habit.is_active {
            return Err(Error::validation(format!("{} is not active", habit_id)));
        }
        if habit.is_paused {
            return Err(Error::validation(format!("{} is paused", habit_id)));
        }
        enter(CompletionStage::Validated, habit_id);

        let state = StreakState {
            last_completed_at: habit.last_completed_at,
            current: habit.current_streak,
            longest: habit.longest_streak,
        };
        let update = StreakEvaluator::new(habit_id, &habit.recurrence).evaluate(state, now)?;
        let period = update.period.key();
        if ledger.has_completion(habit_id, &period)? {
            return Err(Error::AlreadyCompleted {
                habit: habit_id.to_string(),
                period,
            });
        }
        enter(CompletionStage::StreakComputed, habit_id);

        let award = XpAward::for_completion(&habit, update.current);
        let completion = Completion {
            id: CompletionId::new(ledger.next_id(IdKind::Completion)?),
            user_id,
            habit_id,
            completed_at: now,
            date: day_key(now),
            period,
            xp_earned: award.total(),
            streak_day: update.current,
            notes,
        };
        ledger.insert_completion(&completion)?;

        habit.current_streak = update.current;
        habit.longest_streak = update.longest;
        habit.total_completions += 1;
        habit.last_completed_at = Some(now);
        habit.updated_at = now;
        ledger.put_habit(&habit)?;

        let mut leveled_up = award.apply_to(&mut user);
        user.total_habits_completed += 1;
        let habits = ledger.habits_of(user_id)?;
        user.current_streak = best_current_streak(&habits);
        user.longest_streak = user.longest_streak.max(user.current_streak);
        user.updated_at = now;
        enter(CompletionStage::XpAwarded, habit_id);

        let existing = ledger.unlocks_of(user_id)?;
        let batch = self.achievements.unlock_all(&mut user, &habits, &existing, now);
        for record in &batch.records {
            ledger.insert_unlock(record)?;
        }
        leveled_up |= batch.leveled_up;
        ledger.put_user(&user)?;
        enter(CompletionStage::AchievementsChecked, habit_id);

        Ok(CompletionOutcome {
            completion,
            xp_earned: award.total(),
            bonus_xp: award.bonus,
            achievement_xp: batch.xp,
            new_streak: update.current,
            longest_streak: update.longest,
            leveled_up,
            new_level: user.level,
            total_xp: user.xp,
            unlocked_achievements: batch.unlocked.into_iter().copied().collect(),
        })
    }

    // ---- achievements ----

    /// The catalog with the user's unlock status
    pub fn achievements(&self, user_id: UserId) -> Result<Vec<AchievementStatus>> {
        self.store.read(|view| {
            view.require_user(user_id)?;
            Ok(self.achievements.statuses(&view.unlocks_of(user_id)?))
        })
    }

    pub fn achievement_progress(&self, user_id: UserId) -> Result<Vec<AchievementProgress>> {
        self.store.read(|view| {
            let user = view.require_user(user_id)?;
            let habits = view.habits_of(user_id)?;
            Ok(self
                .achievements
                .progress(&user, &habits, &view.unlocks_of(user_id)?))
        })
    }

    /// Evaluate achievements outside of a completion and unlock what is due
    pub fn check_achievements(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<AchievementDef>> {
        let unlocked = self.store.write(|ledger| {
            let mut user = ledger.require_user(user_id)?;
            let habits = ledger.habits_of(user_id)?;
            let existing = ledger.unlocks_of(user_id)?;
            let batch = self.achievements.unlock_all(&mut user, &habits, &existing, now);
            if batch.is_empty() {
                return Ok(Vec::new());
            }
            for record in &batch.records {
                ledger.insert_unlock(record)?;
            }
            ledger.put_user(&user)?;
            Ok(batch.unlocked.into_iter().copied().collect::<Vec<_>>())
        })?;
        for def in &unlocked {
            info!(user = %user_id, achievement = def.id, xp = def.xp_reward, "achievement unlocked");
        }
        Ok(unlocked)
    }

    pub fn unlocks(&self, user_id: UserId) -> Result<Vec<AchievementUnlock>> {
        self.store.read(|view| {
            view.require_user(user_id)?;
            view.unlocks_of(user_id)
        })
    }

    // ---- reminders ----

    /// Live habits of every user that are due today and still open
    pub fn pending_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let today = now.date_naive();
        self.store.read(|view| {
            let mut pending = Vec::new();
            for user in view.users()? {
                for habit in view.habits_of(user.id)? {
                    if !habit.is_live() || !habit.recurrence.is_scheduled_on(today) {
                        continue;
                    }
                    let period = habit.period_at(now).key();
                    if view.has_completion(habit.id, &period)? {
                        continue;
                    }
                    pending.push(Reminder {
                        user_id: user.id,
                        habit_id: habit.id,
                        habit_name: habit.name,
                        reminder_enabled: habit.reminder_enabled,
                        reminder_time: habit.reminder_time,
                        period,
                    });
                }
            }
            Ok(pending)
        })
    }
}

fn view_of<L: LedgerView + ?Sized>(view: &L, habit: Habit, now: DateTime<Utc>) -> Result<HabitView> {
    let period: Period = habit.period_at(now);
    let completed_today = view.has_completion(habit.id, &period.key())?;
    Ok(HabitView {
        habit,
        completed_today,
    })
}

/// A user's current streak is their best running habit streak
fn best_current_streak(habits: &[Habit]) -> u32 {
    habits.iter().map(|h| h.current_streak).max().unwrap_or(0)
}

pub(crate) fn checked_days(days: u32) -> Result<u32> {
    if days == 0 || days > MAX_HISTORY_DAYS {
        return Err(Error::validation(format!(
            "days must be between 1 and {}",
            MAX_HISTORY_DAYS
        )));
    }
    Ok(days)
}

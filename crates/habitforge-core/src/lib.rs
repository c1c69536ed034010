//! Habitforge Core - Streak, XP and achievement rules for habit tracking
//!
//! This crate provides the scoring rules and the completion orchestrator:
//! - Records (`User`, `Habit`, `Completion`, `AchievementUnlock`)
//! - Recurrence periods and calendar helpers
//! - Level table, streak evaluation and XP awards
//! - Static achievement catalog with fixpoint unlocking
//! - `Tracker`, which runs every operation through a transactional `Store`
//!
//! ## Storage
//!
//! `Store` is the only seam to persistence. `MemoryStore` ships here for
//! tests and ephemeral servers; `habitforge-db` provides a native_db backend.
//!
//! ## Example
//!
//! ```
//! use habitforge_core::{MemoryStore, NewHabit, NewUser, Tracker};
//! use chrono::Utc;
//!
//! let tracker = Tracker::new(MemoryStore::new());
//! let now = Utc::now();
//! let user = tracker
//!     .register_user(
//!         NewUser {
//!             subject: "auth|42".into(),
//!             name: "Ada".into(),
//!             email: String::new(),
//!             avatar: None,
//!         },
//!         now,
//!     )
//!     .unwrap();
//! let habit = tracker.create_habit(user.id, NewHabit::new("Stretch", "health"), now).unwrap();
//! let outcome = tracker.complete_habit(user.id, habit.id, None, now).unwrap();
//! assert_eq!(outcome.new_streak, 1);
//! ```

pub mod achievement;
pub mod analytics;
mod error;
mod identity;
pub mod level;
mod model;
pub mod rewards;
pub mod store;
pub mod streak;
pub mod time;
mod tracker;
pub mod xp;

pub use achievement::{AchievementDef, AchievementEvaluator, AchievementProgress, AchievementStatus, Requirement, CATALOG};
pub use error::{Error, Result};
pub use identity::{AchievementId, CompletionId, HabitId, IdKind, UserId};
pub use level::{level_for_xp, xp_threshold_for_level, LevelProgress, MAX_LEVEL};
pub use model::{
    AchievementUnlock, Completion, Difficulty, Habit, HabitPatch, NewHabit, NewUser, TimeOfDay, User,
};
pub use rewards::{ReportSpan, SummaryReport, ThemeUnlock};
pub use store::{Ledger, LedgerView, MemoryStore, Store};
pub use streak::{StreakChange, StreakEvaluator, StreakState, StreakUpdate};
pub use time::{Period, Recurrence};
pub use tracker::{
    CompletionOutcome, CompletionStage, HabitFilter, HabitHistory, HabitView, Reminder, Tracker, UserStats,
    DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS,
};
pub use xp::{streak_bonus, XpAward};

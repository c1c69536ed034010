//! Achievement catalog and evaluation
//!
//! The catalog is an immutable static table. Evaluation compares a user's
//! aggregate metrics against each definition that is not yet unlocked:
//!
//! | requirement   | metric                                             |
//! |---------------|----------------------------------------------------|
//! | `Completions` | `user.total_habits_completed`                      |
//! | `Streak`      | highest `current_streak` over all habits           |
//! | `Level`       | `user.level`                                       |
//! | `TimeOfDay`   | completions of habits tagged with that time of day |
//! | `Categories`  | distinct categories among active habits            |

use crate::model::{AchievementUnlock, Habit, TimeOfDay, User};
use crate::AchievementId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Threshold a metric must reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Completions(u64),
    Streak(u32),
    Level(u32),
    TimeOfDay(TimeOfDay, u64),
    Categories(u64),
}

impl Requirement {
    pub fn threshold(&self) -> u64 {
        match self {
            Requirement::Completions(n) => *n,
            Requirement::Streak(n) => u64::from(*n),
            Requirement::Level(n) => u64::from(*n),
            Requirement::TimeOfDay(_, n) => *n,
            Requirement::Categories(n) => *n,
        }
    }

    /// Category name used by clients
    pub fn kind(&self) -> &'static str {
        match self {
            Requirement::Completions(_) => "completion",
            Requirement::Streak(_) => "streak",
            Requirement::Level(_) => "level",
            Requirement::TimeOfDay(..) => "time",
            Requirement::Categories(_) => "category",
        }
    }
}

/// A catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub requirement: Requirement,
    pub xp_reward: u64,
}

impl AchievementDef {
    pub fn achievement_id(&self) -> AchievementId {
        AchievementId::new(self.id)
    }
}

/// Built-in achievements
pub static CATALOG: &[AchievementDef] = &[
    AchievementDef {
        id: "first_step",
        title: "First Step",
        description: "Complete your first habit",
        icon: "👣",
        requirement: Requirement::Completions(1),
        xp_reward: 10,
    },
    AchievementDef {
        id: "week_warrior",
        title: "Week Warrior",
        description: "Maintain a 7-day streak on any habit",
        icon: "🔥",
        requirement: Requirement::Streak(7),
        xp_reward: 25,
    },
    AchievementDef {
        id: "month_master",
        title: "Month Master",
        description: "Maintain a 30-day streak on any habit",
        icon: "🏆",
        requirement: Requirement::Streak(30),
        xp_reward: 100,
    },
    AchievementDef {
        id: "century_club",
        title: "Century Club",
        description: "Complete 100 total habits",
        icon: "💯",
        requirement: Requirement::Completions(100),
        xp_reward: 50,
    },
    AchievementDef {
        id: "early_bird",
        title: "Early Bird",
        description: "Complete 10 morning habits",
        icon: "🌅",
        requirement: Requirement::TimeOfDay(TimeOfDay::Morning, 10),
        xp_reward: 30,
    },
    AchievementDef {
        id: "night_owl",
        title: "Night Owl",
        description: "Complete 10 evening habits",
        icon: "🦉",
        requirement: Requirement::TimeOfDay(TimeOfDay::Evening, 10),
        xp_reward: 30,
    },
    AchievementDef {
        id: "diversified",
        title: "Diversified",
        description: "Have active habits in 5+ categories",
        icon: "🌈",
        requirement: Requirement::Categories(5),
        xp_reward: 40,
    },
    AchievementDef {
        id: "level_5",
        title: "Rising Star",
        description: "Reach Level 5",
        icon: "⭐",
        requirement: Requirement::Level(5),
        xp_reward: 50,
    },
    AchievementDef {
        id: "level_10",
        title: "Habit Master",
        description: "Reach Level 10",
        icon: "👑",
        requirement: Requirement::Level(10),
        xp_reward: 200,
    },
];

/// Aggregate counters achievements are measured against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    pub total_completions: u64,
    pub max_streak: u32,
    pub level: u32,
    pub morning_completions: u64,
    pub afternoon_completions: u64,
    pub evening_completions: u64,
    pub anytime_completions: u64,
    pub active_categories: u64,
}

impl Metrics {
    pub fn gather(user: &User, habits: &[Habit]) -> Self {
        let mut metrics = Metrics {
            total_completions: user.total_habits_completed,
            max_streak: habits.iter().map(|h| h.current_streak).max().unwrap_or(0),
            level: user.level,
            ..Default::default()
        };
        for habit in habits {
            *metrics.time_of_day_mut(habit.time_of_day) += habit.total_completions;
        }
        metrics.active_categories = habits
            .iter()
            .filter(|h| h.is_active)
            .map(|h| h.category.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;
        metrics
    }

    pub fn completions_at(&self, time_of_day: TimeOfDay) -> u64 {
        match time_of_day {
            TimeOfDay::Morning => self.morning_completions,
            TimeOfDay::Afternoon => self.afternoon_completions,
            TimeOfDay::Evening => self.evening_completions,
            TimeOfDay::Anytime => self.anytime_completions,
        }
    }

    fn time_of_day_mut(&mut self, time_of_day: TimeOfDay) -> &mut u64 {
        match time_of_day {
            TimeOfDay::Morning => &mut self.morning_completions,
            TimeOfDay::Afternoon => &mut self.afternoon_completions,
            TimeOfDay::Evening => &mut self.evening_completions,
            TimeOfDay::Anytime => &mut self.anytime_completions,
        }
    }

    /// Current value of the metric a requirement is measured on
    pub fn value_for(&self, requirement: &Requirement) -> u64 {
        match requirement {
            Requirement::Completions(_) => self.total_completions,
            Requirement::Streak(_) => u64::from(self.max_streak),
            Requirement::Level(_) => u64::from(self.level),
            Requirement::TimeOfDay(tod, _) => self.completions_at(*tod),
            Requirement::Categories(_) => self.active_categories,
        }
    }

    pub fn meets(&self, requirement: &Requirement) -> bool {
        self.value_for(requirement) >= requirement.threshold()
    }
}

/// Achievements unlocked by one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnlockBatch {
    pub unlocked: Vec<&'static AchievementDef>,
    /// One record per newly unlocked achievement
    pub records: Vec<AchievementUnlock>,
    /// Sum of rewards credited to the user
    pub xp: u64,
    pub leveled_up: bool,
}

impl UnlockBatch {
    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }
}

/// Unlock status of a catalog entry for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub def: AchievementDef,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Progress of a user toward a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementProgress {
    #[serde(flatten)]
    pub def: AchievementDef,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    /// Metric value, capped at `total`
    pub progress: u64,
    pub total: u64,
    /// 0.0 ..= 100.0
    pub percentage: f64,
}

/// Evaluates a catalog against user state
#[derive(Debug, Clone, Copy)]
pub struct AchievementEvaluator {
    catalog: &'static [AchievementDef],
}

impl Default for AchievementEvaluator {
    fn default() -> Self {
        Self::new(CATALOG)
    }
}

impl AchievementEvaluator {
    pub fn new(catalog: &'static [AchievementDef]) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'static [AchievementDef] {
        self.catalog
    }

    pub fn find(&self, id: &str) -> Option<&'static AchievementDef> {
        self.catalog.iter().find(|d| d.id == id)
    }

    /// Definitions not in `existing` whose threshold the user has crossed
    pub fn evaluate(
        &self,
        user: &User,
        habits: &[Habit],
        existing: &[AchievementUnlock],
    ) -> Vec<&'static AchievementDef> {
        let metrics = Metrics::gather(user, habits);
        self.catalog
            .iter()
            .filter(|def| !is_unlocked(existing, def.id))
            .filter(|def| metrics.meets(&def.requirement))
            .collect()
    }

    /// Unlock every crossed achievement and credit its reward to `user`
    ///
    /// Rewards can lift the user's level, which may cross a level
    /// achievement, so evaluation repeats until nothing new unlocks. Running
    /// this twice without new completions therefore unlocks nothing the
    /// second time.
    pub fn unlock_all(
        &self,
        user: &mut User,
        habits: &[Habit],
        existing: &[AchievementUnlock],
        now: DateTime<Utc>,
    ) -> UnlockBatch {
        let mut batch = UnlockBatch::default();
        let mut known: Vec<AchievementUnlock> = existing.to_vec();

        loop {
            let crossed = self.evaluate(user, habits, &known);
            if crossed.is_empty() {
                break;
            }
            for def in crossed {
                let record = AchievementUnlock {
                    user_id: user.id,
                    achievement: def.achievement_id(),
                    xp_reward: def.xp_reward,
                    unlocked_at: now,
                };
                batch.leveled_up |= user.add_xp(def.xp_reward);
                batch.xp += def.xp_reward;
                batch.unlocked.push(def);
                batch.records.push(record.clone());
                known.push(record);
            }
        }

        if !batch.is_empty() {
            user.updated_at = now;
        }
        batch
    }

    /// Catalog with unlock status
    pub fn statuses(&self, existing: &[AchievementUnlock]) -> Vec<AchievementStatus> {
        self.catalog
            .iter()
            .map(|def| {
                let unlock = existing.iter().find(|u| u.achievement.as_str() == def.id);
                AchievementStatus {
                    def: *def,
                    unlocked: unlock.is_some(),
                    unlocked_at: unlock.map(|u| u.unlocked_at),
                }
            })
            .collect()
    }

    /// Read-only progress toward every catalog entry
    pub fn progress(
        &self,
        user: &User,
        habits: &[Habit],
        existing: &[AchievementUnlock],
    ) -> Vec<AchievementProgress> {
        let metrics = Metrics::gather(user, habits);
        self.catalog
            .iter()
            .map(|def| {
                let unlock = existing.iter().find(|u| u.achievement.as_str() == def.id);
                let total = def.requirement.threshold().max(1);
                let progress = match unlock {
                    Some(_) => total,
                    None => metrics.value_for(&def.requirement).min(total),
                };
                AchievementProgress {
                    def: *def,
                    unlocked: unlock.is_some(),
                    unlocked_at: unlock.map(|u| u.unlocked_at),
                    progress,
                    total,
                    percentage: progress as f64 / total as f64 * 100.0,
                }
            })
            .collect()
    }
}

fn is_unlocked(existing: &[AchievementUnlock], id: &str) -> bool {
    existing.iter().any(|u| u.achievement.as_str() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewHabit;
    use crate::{HabitId, UserId};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn user() -> User {
        User::new(UserId::new(1), "sub", "Ada", now())
    }

    fn habit(id: u64, category: &str, tod: TimeOfDay) -> Habit {
        Habit::create(
            HabitId::new(id),
            UserId::new(1),
            NewHabit::new(format!("habit {}", id), category).with_time_of_day(tod),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_catalog_ids_unique() {
        let ids: HashSet<_> = CATALOG.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn test_first_completion_unlocks_first_step() {
        let mut u = user();
        u.total_habits_completed = 1;
        let eval = AchievementEvaluator::default();
        let crossed = eval.evaluate(&u, &[], &[]);
        assert_eq!(crossed.iter().map(|d| d.id).collect::<Vec<_>>(), vec!["first_step"]);
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let mut u = user();
        u.total_habits_completed = 1;
        let eval = AchievementEvaluator::default();

        let first = eval.unlock_all(&mut u, &[], &[], now());
        assert_eq!(first.unlocked.len(), 1);
        assert_eq!(first.xp, 10);
        assert_eq!(u.xp, 10);

        let second = eval.unlock_all(&mut u, &[], &first.records, now());
        assert!(second.is_empty());
        assert_eq!(u.xp, 10);
    }

    #[test]
    fn test_rewards_cascade_into_level_achievements() {
        // 950 xp + 50 from century_club reaches level 5 (1000 xp)
        let mut u = user();
        u.add_xp(950);
        u.total_habits_completed = 100;
        let existing = vec![AchievementUnlock {
            user_id: u.id,
            achievement: AchievementId::new("first_step"),
            xp_reward: 10,
            unlocked_at: now(),
        }];

        let eval = AchievementEvaluator::default();
        let batch = eval.unlock_all(&mut u, &[], &existing, now());
        let ids: Vec<_> = batch.unlocked.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["century_club", "level_5"]);
        assert!(batch.leveled_up);
        assert_eq!(u.xp, 1050);
        assert_eq!(u.level, 5);

        let mut all = existing.clone();
        all.extend(batch.records);
        assert!(eval.evaluate(&u, &[], &all).is_empty());
    }

    #[test]
    fn test_time_of_day_and_categories() {
        let mut morning = habit(1, "health", TimeOfDay::Morning);
        morning.total_completions = 6;
        let mut morning_two = habit(2, "mind", TimeOfDay::Morning);
        morning_two.total_completions = 4;
        let mut paused = habit(3, "work", TimeOfDay::Evening);
        paused.is_active = false;
        let habits = vec![
            morning,
            morning_two,
            paused,
            habit(4, "social", TimeOfDay::Anytime),
            habit(5, "money", TimeOfDay::Anytime),
            habit(6, "home", TimeOfDay::Anytime),
        ];

        let metrics = Metrics::gather(&user(), &habits);
        assert_eq!(metrics.completions_at(TimeOfDay::Morning), 10);
        assert_eq!(metrics.active_categories, 5);

        let eval = AchievementEvaluator::default();
        let ids: Vec<_> = eval.evaluate(&user(), &habits, &[]).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["early_bird", "diversified"]);
    }

    #[test]
    fn test_progress() {
        let mut u = user();
        u.total_habits_completed = 40;
        let mut streaky = habit(1, "health", TimeOfDay::Morning);
        streaky.current_streak = 3;

        let eval = AchievementEvaluator::default();
        let progress = eval.progress(&u, &[streaky], &[]);
        let century = progress.iter().find(|p| p.def.id == "century_club").unwrap();
        assert_eq!((century.progress, century.total), (40, 100));
        assert!((century.percentage - 40.0).abs() < 1e-9);

        let first = progress.iter().find(|p| p.def.id == "first_step").unwrap();
        assert_eq!(first.progress, 1);
        assert_eq!(first.percentage, 100.0);

        let week = progress.iter().find(|p| p.def.id == "week_warrior").unwrap();
        assert_eq!(week.progress, 3);
    }
}

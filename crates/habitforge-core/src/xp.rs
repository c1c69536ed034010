//! XP awarded for a completion

use crate::model::{Habit, User};
use serde::{Deserialize, Serialize};

/// One-time bonuses granted when a streak reaches exactly this length
pub const STREAK_BONUSES: [(u32, u64); 3] = [(7, 10), (30, 50), (100, 200)];

/// Bonus XP for reaching `streak`; exact milestones only
pub fn streak_bonus(streak: u32) -> u64 {
    STREAK_BONUSES
        .iter()
        .find(|(length, _)| *length == streak)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

/// XP granted by a single completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XpAward {
    /// The habit's per-completion value
    pub base: u64,
    /// Streak milestone bonus
    pub bonus: u64,
}

impl XpAward {
    /// Compute the award for completing `habit` with the streak now at `new_streak`
    pub fn for_completion(habit: &Habit, new_streak: u32) -> Self {
        Self {
            base: habit.xp_value,
            bonus: streak_bonus(new_streak),
        }
    }

    pub fn total(&self) -> u64 {
        self.base + self.bonus
    }

    /// Credit the award to `user`, returning true when the level went up
    pub fn apply_to(&self, user: &mut User) -> bool {
        user.add_xp(self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, NewHabit};
    use crate::{HabitId, UserId};
    use chrono::Utc;

    fn habit(difficulty: Difficulty) -> Habit {
        Habit::create(
            HabitId::new(1),
            UserId::new(1),
            NewHabit::new("Stretch", "health").with_difficulty(difficulty),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_milestones_are_exact() {
        assert_eq!(streak_bonus(6), 0);
        assert_eq!(streak_bonus(7), 10);
        assert_eq!(streak_bonus(8), 0);
        assert_eq!(streak_bonus(30), 50);
        assert_eq!(streak_bonus(100), 200);
        assert_eq!(streak_bonus(101), 0);
    }

    #[test]
    fn test_award_for_completion() {
        let award = XpAward::for_completion(&habit(Difficulty::Medium), 1);
        assert_eq!(award, XpAward { base: 10, bonus: 0 });

        let award = XpAward::for_completion(&habit(Difficulty::Hard), 7);
        assert_eq!(award.total(), 30);
    }

    #[test]
    fn test_apply_reports_level_up() {
        let mut user = User::new(UserId::new(1), "sub", "Ada", Utc::now());
        user.add_xp(95);
        let award = XpAward::for_completion(&habit(Difficulty::Medium), 2);
        assert!(award.apply_to(&mut user));
        assert_eq!(user.xp, 105);
        assert_eq!(user.level, 2);
    }
}

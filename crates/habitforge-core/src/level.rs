//! Level table: maps accumulated XP to a level

use serde::{Deserialize, Serialize};

/// XP at which each level starts; level `n` starts at `LEVEL_THRESHOLDS[n - 1]`
pub const LEVEL_THRESHOLDS: [u64; 10] = [0, 100, 250, 500, 1000, 2000, 4000, 8000, 16000, 32000];

/// Highest reachable level
pub const MAX_LEVEL: u32 = LEVEL_THRESHOLDS.len() as u32;

/// Level for an XP total, always in `1..=MAX_LEVEL`
pub fn level_for_xp(xp: u64) -> u32 {
    let reached = LEVEL_THRESHOLDS.iter().filter(|t| **t <= xp).count() as u32;
    reached.clamp(1, MAX_LEVEL)
}

/// XP at which `level` starts. Levels outside the table clamp to its ends.
pub fn xp_threshold_for_level(level: u32) -> u64 {
    let index = level.clamp(1, MAX_LEVEL) as usize - 1;
    LEVEL_THRESHOLDS[index]
}

/// Where an XP total sits within its level, for progress bars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// XP at which the current level started
    pub xp_for_current_level: u64,
    /// XP at which the next level starts (equal to the current floor at max level)
    pub xp_for_next_level: u64,
    /// 0.0 ..= 100.0
    pub progress_percent: f64,
}

impl LevelProgress {
    pub fn for_xp(xp: u64) -> Self {
        let level = level_for_xp(xp);
        let floor = xp_threshold_for_level(level);
        let next = xp_threshold_for_level(level + 1);
        let progress_percent = if next > floor {
            let earned = xp.saturating_sub(floor) as f64;
            (earned / (next - floor) as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        Self {
            level,
            xp_for_current_level: floor,
            xp_for_next_level: next,
            progress_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(249), 2);
        assert_eq!(level_for_xp(250), 3);
        assert_eq!(level_for_xp(31_999), 9);
        assert_eq!(level_for_xp(32_000), 10);
        assert_eq!(level_for_xp(u64::MAX), MAX_LEVEL);
    }

    #[test]
    fn test_level_monotonic() {
        let mut previous = level_for_xp(0);
        for xp in (0..40_000).step_by(7) {
            let level = level_for_xp(xp);
            assert!(level >= previous, "level dropped at {} xp", xp);
            previous = level;
        }
    }

    #[test]
    fn test_thresholds_clamp() {
        assert_eq!(xp_threshold_for_level(0), 0);
        assert_eq!(xp_threshold_for_level(1), 0);
        assert_eq!(xp_threshold_for_level(2), 100);
        assert_eq!(xp_threshold_for_level(10), 32_000);
        assert_eq!(xp_threshold_for_level(42), 32_000);
        for level in 1..=MAX_LEVEL {
            assert_eq!(level_for_xp(xp_threshold_for_level(level)), level);
        }
    }

    #[test]
    fn test_level_progress() {
        let progress = LevelProgress::for_xp(175);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.xp_for_current_level, 100);
        assert_eq!(progress.xp_for_next_level, 250);
        assert!((progress.progress_percent - 50.0).abs() < f64::EPSILON);

        let capped = LevelProgress::for_xp(50_000);
        assert_eq!(capped.level, MAX_LEVEL);
        assert_eq!(capped.progress_percent, 100.0);
    }
}

//! Common query patterns for the database.

use crate::error::Result;
use crate::models::*;
use crate::store::NativeStore;
use serde::Serialize;

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub users: usize,
    pub habits: usize,
    pub completions: usize,
    pub unlocks: usize,
}

impl NativeStore {
    /// Count the rows of every table in one read transaction.
    pub fn counts(&self) -> Result<TableCounts> {
        let r = self.db.r_transaction()?;
        Ok(TableCounts {
            users: r.scan().primary::<StoredUser>()?.all()?.count(),
            habits: r.scan().primary::<StoredHabit>()?.all()?.count(),
            completions: r.scan().primary::<StoredCompletion>()?.all()?.count(),
            unlocks: r.scan().primary::<StoredUnlock>()?.all()?.count(),
        })
    }

    /// Number of completions recorded on a calendar day (`YYYY-MM-DD`).
    pub fn completions_on(&self, date: &str) -> Result<usize> {
        let r = self.db.r_transaction()?;
        let scan = r.scan().primary::<StoredCompletion>()?;
        let iter = scan.all()?;
        let rows: std::result::Result<Vec<StoredCompletion>, _> = iter.collect();
        Ok(rows?.iter().filter(|c| c.date == date).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use habitforge_core::{NewHabit, NewUser, Tracker};

    #[test]
    fn test_counts() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let tracker = Tracker::new(NativeStore::in_memory().unwrap());
        assert_eq!(tracker.store().counts().unwrap(), TableCounts::default());

        let user = tracker
            .register_user(
                NewUser {
                    subject: "auth|ada".to_string(),
                    name: "Ada".to_string(),
                    email: String::new(),
                    avatar: None,
                },
                now,
            )
            .unwrap();
        let habit = tracker.create_habit(user.id, NewHabit::new("Run", "health"), now).unwrap();
        tracker.complete_habit(user.id, habit.id, None, now).unwrap();

        let counts = tracker.store().counts().unwrap();
        assert_eq!(
            counts,
            TableCounts {
                users: 1,
                habits: 1,
                completions: 1,
                unlocks: 1
            }
        );
        assert_eq!(tracker.store().completions_on("2025-03-03").unwrap(), 1);
        assert_eq!(tracker.store().completions_on("2025-03-04").unwrap(), 0);
    }
}

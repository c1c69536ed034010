//! Storage seam
//!
//! The tracker only talks to storage through [`Store`]. A store hands out a
//! [`LedgerView`] for reads and a [`Ledger`] for writes; everything done
//! through one `write` call commits together, or not at all when the closure
//! returns an error.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and by the
//! server when no database path is configured.

use crate::model::{AchievementUnlock, Completion, Habit, User};
use crate::{CompletionId, Error, HabitId, IdKind, Result, UserId};
use indexmap::IndexMap;
use std::sync::Mutex;

/// Read access to persisted records
pub trait LedgerView {
    fn user(&self, id: UserId) -> Result<Option<User>>;

    fn user_by_subject(&self, subject: &str) -> Result<Option<User>>;

    fn users(&self) -> Result<Vec<User>>;

    fn habit(&self, id: HabitId) -> Result<Option<Habit>>;

    /// Habits of a user in creation order
    fn habits_of(&self, user: UserId) -> Result<Vec<Habit>>;

    fn completions_of_user(&self, user: UserId) -> Result<Vec<Completion>>;

    fn completions_of_habit(&self, habit: HabitId) -> Result<Vec<Completion>>;

    /// Whether a completion exists for `(habit, period)`
    fn has_completion(&self, habit: HabitId, period: &str) -> Result<bool>;

    fn unlocks_of(&self, user: UserId) -> Result<Vec<AchievementUnlock>>;

    /// Load a user or fail with `NotFound`
    fn require_user(&self, id: UserId) -> Result<User> {
        self.user(id)?.ok_or_else(|| Error::not_found(id))
    }

    /// Load a habit owned by `user` or fail with `NotFound`
    ///
    /// A habit owned by someone else is reported exactly like a missing one.
    fn require_habit(&self, user: UserId, id: HabitId) -> Result<Habit> {
        match self.habit(id)? {
            Some(habit) if habit.user_id == user => Ok(habit),
            _ => Err(Error::not_found(id)),
        }
    }
}

/// Write access, only available inside [`Store::write`]
pub trait Ledger: LedgerView {
    /// Draw the next id of a sequence; ids start at 1
    fn next_id(&mut self, kind: IdKind) -> Result<u64>;

    /// Insert or replace a user; subjects are unique
    fn put_user(&mut self, user: &User) -> Result<()>;

    /// Insert or replace a habit
    fn put_habit(&mut self, habit: &Habit) -> Result<()>;

    fn remove_habit(&mut self, id: HabitId) -> Result<()>;

    /// Append a completion
    ///
    /// Fails with [`Error::AlreadyCompleted`] when the habit already has a
    /// completion for the same period.
    fn insert_completion(&mut self, completion: &Completion) -> Result<()>;

    fn remove_completion(&mut self, id: CompletionId) -> Result<()>;

    /// Record an unlock. Returns false when the user already had it.
    fn insert_unlock(&mut self, unlock: &AchievementUnlock) -> Result<bool>;
}

/// Transactional storage backend
pub trait Store: Send + Sync {
    /// Run `f` against a consistent snapshot
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerView) -> Result<T>) -> Result<T>;

    /// Run `f` inside one serialized write transaction
    ///
    /// Changes made through the ledger are committed only when `f` returns
    /// `Ok`; on error nothing is visible to later readers.
    fn write<T>(&self, f: impl FnOnce(&mut dyn Ledger) -> Result<T>) -> Result<T>;
}

/// In-memory tables
#[derive(Debug, Clone, Default)]
struct Tables {
    users: IndexMap<UserId, User>,
    habits: IndexMap<HabitId, Habit>,
    completions: IndexMap<CompletionId, Completion>,
    unlocks: Vec<AchievementUnlock>,
    sequences: IndexMap<IdKind, u64>,
}

impl LedgerView for Tables {
    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_by_subject(&self, subject: &str) -> Result<Option<User>> {
        Ok(self.users.values().find(|u| u.subject == subject).cloned())
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.values().cloned().collect())
    }

    fn habit(&self, id: HabitId) -> Result<Option<Habit>> {
        Ok(self.habits.get(&id).cloned())
    }

    fn habits_of(&self, user: UserId) -> Result<Vec<Habit>> {
        Ok(self.habits.values().filter(|h| h.user_id == user).cloned().collect())
    }

    fn completions_of_user(&self, user: UserId) -> Result<Vec<Completion>> {
        Ok(self
            .completions
            .values()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect())
    }

    fn completions_of_habit(&self, habit: HabitId) -> Result<Vec<Completion>> {
        Ok(self
            .completions
            .values()
            .filter(|c| c.habit_id == habit)
            .cloned()
            .collect())
    }

    fn has_completion(&self, habit: HabitId, period: &str) -> Result<bool> {
        Ok(self
            .completions
            .values()
            .any(|c| c.habit_id == habit && c.period == period))
    }

    fn unlocks_of(&self, user: UserId) -> Result<Vec<AchievementUnlock>> {
        Ok(self.unlocks.iter().filter(|u| u.user_id == user).cloned().collect())
    }
}

impl Ledger for Tables {
    fn next_id(&mut self, kind: IdKind) -> Result<u64> {
        let counter = self.sequences.entry(kind).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn put_user(&mut self, user: &User) -> Result<()> {
        if self
            .users
            .values()
            .any(|u| u.subject == user.subject && u.id != user.id)
        {
            return Err(Error::validation(format!(
                "subject '{}' is already registered",
                user.subject
            )));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn put_habit(&mut self, habit: &Habit) -> Result<()> {
        self.habits.insert(habit.id, habit.clone());
        Ok(())
    }

    fn remove_habit(&mut self, id: HabitId) -> Result<()> {
        self.habits.shift_remove(&id);
        Ok(())
    }

    fn insert_completion(&mut self, completion: &Completion) -> Result<()> {
        if self.has_completion(completion.habit_id, &completion.period)? {
            return Err(Error::AlreadyCompleted {
                habit: completion.habit_id.to_string(),
                period: completion.period.clone(),
            });
        }
        self.completions.insert(completion.id, completion.clone());
        Ok(())
    }

    fn remove_completion(&mut self, id: CompletionId) -> Result<()> {
        self.completions.shift_remove(&id);
        Ok(())
    }

    fn insert_unlock(&mut self, unlock: &AchievementUnlock) -> Result<bool> {
        let exists = self
            .unlocks
            .iter()
            .any(|u| u.user_id == unlock.user_id && u.achievement == unlock.achievement);
        if exists {
            return Ok(false);
        }
        self.unlocks.push(unlock.clone());
        Ok(true)
    }
}

/// Store backed by in-memory tables
///
/// Writers work on a copy of the tables that replaces the live copy on
/// success, so a failed write leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Storage("memory store lock poisoned".to_string())
}

impl Store for MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerView) -> Result<T>) -> Result<T> {
        let tables = self.tables.lock().map_err(poisoned)?;
        f(&*tables)
    }

    fn write<T>(&self, f: impl FnOnce(&mut dyn Ledger) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        let mut draft = tables.clone();
        let value = f(&mut draft)?;
        *tables = draft;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewHabit;
    use chrono::Utc;

    fn completion(id: u64, habit: u64, period: &str) -> Completion {
        Completion {
            id: CompletionId::new(id),
            user_id: UserId::new(1),
            habit_id: HabitId::new(habit),
            completed_at: Utc::now(),
            date: period.to_string(),
            period: period.to_string(),
            xp_earned: 10,
            streak_day: 1,
            notes: None,
        }
    }

    #[test]
    fn test_sequences_are_per_kind() {
        let store = MemoryStore::new();
        let ids = store
            .write(|ledger| {
                Ok((
                    ledger.next_id(IdKind::User)?,
                    ledger.next_id(IdKind::User)?,
                    ledger.next_id(IdKind::Habit)?,
                ))
            })
            .unwrap();
        assert_eq!(ids, (1, 2, 1));
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let store = MemoryStore::new();
        let user = User::new(UserId::new(1), "sub-1", "Ada", Utc::now());

        let result: Result<()> = store.write(|ledger| {
            ledger.put_user(&user)?;
            Err(Error::validation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.read(|view| view.user(UserId::new(1))).unwrap(), None);
    }

    #[test]
    fn test_completion_unique_per_period() {
        let store = MemoryStore::new();
        store
            .write(|ledger| ledger.insert_completion(&completion(1, 7, "2025-03-01")))
            .unwrap();

        let err = store
            .write(|ledger| ledger.insert_completion(&completion(2, 7, "2025-03-01")))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyCompleted { .. }));

        store
            .write(|ledger| ledger.insert_completion(&completion(3, 8, "2025-03-01")))
            .unwrap();
        assert!(store.read(|view| view.has_completion(HabitId::new(7), "2025-03-01")).unwrap());
    }

    #[test]
    fn test_unique_subject() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .write(|ledger| ledger.put_user(&User::new(UserId::new(1), "sub", "Ada", now)))
            .unwrap();
        let err = store
            .write(|ledger| ledger.put_user(&User::new(UserId::new(2), "sub", "Bob", now)))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_require_habit_checks_owner() {
        let store = MemoryStore::new();
        let habit = Habit::create(
            HabitId::new(1),
            UserId::new(1),
            NewHabit::new("Walk", "health"),
            Utc::now(),
        )
        .unwrap();
        store.write(|ledger| ledger.put_habit(&habit)).unwrap();

        store
            .read(|view| view.require_habit(UserId::new(1), HabitId::new(1)))
            .unwrap();
        let err = store
            .read(|view| view.require_habit(UserId::new(2), HabitId::new(1)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

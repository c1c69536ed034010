//! Database store wrapper.

use crate::error::{Error, Result};
use crate::models::*;
use habitforge_core::{
    AchievementUnlock, Completion, CompletionId, Habit, HabitId, IdKind, Ledger, LedgerView,
    Result as CoreResult, Store, User, UserId,
};
use native_db::transaction::{RTransaction, RwTransaction};
use native_db::*;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

// Static models for the database
static MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut models = Models::new();
    models.define::<StoredUser>().unwrap();
    models.define::<StoredSequence>().unwrap();
    models.define::<StoredHabit>().unwrap();
    models.define::<StoredCompletion>().unwrap();
    models.define::<StoredUnlock>().unwrap();
    models
});

/// Habit store backed by native_db.
pub struct NativeStore {
    pub(crate) db: Database<'static>,
}

impl NativeStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Builder::new()
            .create(&MODELS, path)
            .map_err(|e| Error::Database(e.to_string()))?;
        info!(path = %path.display(), "database opened");
        Ok(Self { db })
    }

    /// Create an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let db = Builder::new()
            .create_in_memory(&MODELS)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(Self { db })
    }
}

/// Read-only view over one transaction.
struct Reader<'db> {
    txn: RTransaction<'db>,
}

/// Read-write view over one transaction, committed by [`NativeStore::write`].
struct Writer<'db> {
    txn: RwTransaction<'db>,
}

fn convert<S, T>(rows: Vec<S>, f: impl Fn(&S) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(f).collect()
}

macro_rules! ledger_view {
    ($view:ident) => {
        impl LedgerView for $view<'_> {
            fn user(&self, id: UserId) -> CoreResult<Option<User>> {
                let stored: Option<StoredUser> = self.txn.get().primary(id.raw()).map_err(Error::from)?;
                Ok(stored.map(|s| s.to_user()).transpose()?)
            }

            fn user_by_subject(&self, subject: &str) -> CoreResult<Option<User>> {
                let stored: Option<StoredUser> = self
                    .txn
                    .get()
                    .secondary(StoredUserKey::subject, subject.to_string())
                    .map_err(Error::from)?;
                Ok(stored.map(|s| s.to_user()).transpose()?)
            }

            fn users(&self) -> CoreResult<Vec<User>> {
                let scan = self.txn.scan().primary::<StoredUser>().map_err(Error::from)?;
                let rows: std::result::Result<Vec<StoredUser>, _> = scan.all().map_err(Error::from)?.collect();
                Ok(convert(rows.map_err(Error::from)?, StoredUser::to_user)?)
            }

            fn habit(&self, id: HabitId) -> CoreResult<Option<Habit>> {
                let stored: Option<StoredHabit> = self.txn.get().primary(id.raw()).map_err(Error::from)?;
                Ok(stored.map(|s| s.to_habit()).transpose()?)
            }

            fn habits_of(&self, user: UserId) -> CoreResult<Vec<Habit>> {
                let scan = self
                    .txn
                    .scan()
                    .secondary::<StoredHabit>(StoredHabitKey::user_id)
                    .map_err(Error::from)?;
                let rows: std::result::Result<Vec<StoredHabit>, _> =
                    scan.start_with(user.raw()).map_err(Error::from)?.collect();
                Ok(convert(rows.map_err(Error::from)?, StoredHabit::to_habit)?)
            }

            fn completions_of_user(&self, user: UserId) -> CoreResult<Vec<Completion>> {
                let scan = self
                    .txn
                    .scan()
                    .secondary::<StoredCompletion>(StoredCompletionKey::user_id)
                    .map_err(Error::from)?;
                let rows: std::result::Result<Vec<StoredCompletion>, _> =
                    scan.start_with(user.raw()).map_err(Error::from)?.collect();
                Ok(convert(rows.map_err(Error::from)?, StoredCompletion::to_completion)?)
            }

            fn completions_of_habit(&self, habit: HabitId) -> CoreResult<Vec<Completion>> {
                let scan = self
                    .txn
                    .scan()
                    .secondary::<StoredCompletion>(StoredCompletionKey::habit_id)
                    .map_err(Error::from)?;
                let rows: std::result::Result<Vec<StoredCompletion>, _> =
                    scan.start_with(habit.raw()).map_err(Error::from)?.collect();
                Ok(convert(rows.map_err(Error::from)?, StoredCompletion::to_completion)?)
            }

            fn has_completion(&self, habit: HabitId, period: &str) -> CoreResult<bool> {
                let stored: Option<StoredCompletion> = self
                    .txn
                    .get()
                    .secondary(StoredCompletionKey::habit_period, habit_period_key(habit, period))
                    .map_err(Error::from)?;
                Ok(stored.is_some())
            }

            fn unlocks_of(&self, user: UserId) -> CoreResult<Vec<AchievementUnlock>> {
                let scan = self
                    .txn
                    .scan()
                    .secondary::<StoredUnlock>(StoredUnlockKey::user_id)
                    .map_err(Error::from)?;
                let rows: std::result::Result<Vec<StoredUnlock>, _> =
                    scan.start_with(user.raw()).map_err(Error::from)?.collect();
                Ok(convert(rows.map_err(Error::from)?, StoredUnlock::to_unlock)?)
            }
        }
    };
}

ledger_view!(Reader);
ledger_view!(Writer);

impl Ledger for Writer<'_> {
    fn next_id(&mut self, kind: IdKind) -> CoreResult<u64> {
        let name = kind.as_str().to_string();
        let current: Option<StoredSequence> = self.txn.get().primary(name.clone()).map_err(Error::from)?;
        let last = current.map(|s| s.last).unwrap_or(0) + 1;
        self.txn
            .upsert(StoredSequence { name, last })
            .map_err(Error::from)?;
        Ok(last)
    }

    fn put_user(&mut self, user: &User) -> CoreResult<()> {
        if let Some(owner) = self.user_by_subject(&user.subject)? {
            if owner.id != user.id {
                return Err(habitforge_core::Error::validation(format!(
                    "subject '{}' is already registered",
                    user.subject
                )));
            }
        }
        self.txn
            .upsert(StoredUser::from_user(user))
            .map_err(Error::from)?;
        Ok(())
    }

    fn put_habit(&mut self, habit: &Habit) -> CoreResult<()> {
        self.txn
            .upsert(StoredHabit::from_habit(habit))
            .map_err(Error::from)?;
        Ok(())
    }

    fn remove_habit(&mut self, id: HabitId) -> CoreResult<()> {
        let stored: Option<StoredHabit> = self.txn.get().primary(id.raw()).map_err(Error::from)?;
        if let Some(row) = stored {
            self.txn.remove(row).map_err(Error::from)?;
        }
        Ok(())
    }

    fn insert_completion(&mut self, completion: &Completion) -> CoreResult<()> {
        if self.has_completion(completion.habit_id, &completion.period)? {
            return Err(habitforge_core::Error::AlreadyCompleted {
                habit: completion.habit_id.to_string(),
                period: completion.period.clone(),
            });
        }
        self.txn
            .insert(StoredCompletion::from_completion(completion))
            .map_err(Error::from)?;
        Ok(())
    }

    fn remove_completion(&mut self, id: CompletionId) -> CoreResult<()> {
        let stored: Option<StoredCompletion> = self.txn.get().primary(id.raw()).map_err(Error::from)?;
        if let Some(row) = stored {
            self.txn.remove(row).map_err(Error::from)?;
        }
        Ok(())
    }

    fn insert_unlock(&mut self, unlock: &AchievementUnlock) -> CoreResult<bool> {
        let key = unlock_key(unlock.user_id, &unlock.achievement);
        let existing: Option<StoredUnlock> = self.txn.get().primary(key).map_err(Error::from)?;
        if existing.is_some() {
            return Ok(false);
        }
        self.txn
            .insert(StoredUnlock::from_unlock(unlock))
            .map_err(Error::from)?;
        Ok(true)
    }
}

impl Store for NativeStore {
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerView) -> CoreResult<T>) -> CoreResult<T> {
        let txn = self.db.r_transaction().map_err(Error::from)?;
        f(&Reader { txn })
    }

    fn write<T>(&self, f: impl FnOnce(&mut dyn Ledger) -> CoreResult<T>) -> CoreResult<T> {
        let txn = self.db.rw_transaction().map_err(Error::from)?;
        let mut writer = Writer { txn };
        // dropping the transaction without commit discards its writes
        let value = f(&mut writer)?;
        writer.txn.commit().map_err(Error::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use habitforge_core::{MemoryStore, NewHabit, NewUser, Recurrence, Tracker};

    fn ada() -> NewUser {
        NewUser {
            subject: "auth|ada".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            avatar: None,
        }
    }

    #[test]
    fn test_roundtrip_through_tracker() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let tracker = Tracker::new(NativeStore::in_memory().unwrap());
        let user = tracker.register_user(ada(), now).unwrap();
        let habit = tracker
            .create_habit(
                user.id,
                NewHabit::new("Swim", "health").with_recurrence(Recurrence::Weekly { days: vec![1, 4] }),
                now,
            )
            .unwrap();

        let stored = tracker.habit(user.id, habit.id, now).unwrap();
        assert_eq!(stored.habit, habit);

        let outcome = tracker.complete_habit(user.id, habit.id, Some("laps".into()), now).unwrap();
        assert_eq!(outcome.new_streak, 1);
        let history = tracker.habit_history(user.id, habit.id, None, now).unwrap();
        assert_eq!(history.completions, vec![outcome.completion]);
        assert_eq!(tracker.unlocks(user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_completion_is_rejected_and_rolled_back() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let tracker = Tracker::new(NativeStore::in_memory().unwrap());
        let user = tracker.register_user(ada(), now).unwrap();
        let habit = tracker.create_habit(user.id, NewHabit::new("Run", "health"), now).unwrap();
        tracker.complete_habit(user.id, habit.id, None, now).unwrap();
        let before = tracker.user(user.id).unwrap();

        let err = tracker.complete_habit(user.id, habit.id, None, now).unwrap_err();
        assert!(matches!(err, habitforge_core::Error::AlreadyCompleted { .. }));
        assert_eq!(tracker.user(user.id).unwrap(), before);
    }

    #[test]
    fn test_sequences_and_subject_index() {
        let store = NativeStore::in_memory().unwrap();
        let ids = store
            .write(|ledger| Ok((ledger.next_id(IdKind::Habit)?, ledger.next_id(IdKind::Habit)?)))
            .unwrap();
        assert_eq!(ids, (1, 2));

        let now = Utc::now();
        let user = User::new(UserId::new(1), "sub", "Ada", now);
        store.write(|ledger| ledger.put_user(&user)).unwrap();
        let found = store.read(|view| view.user_by_subject("sub")).unwrap();
        assert_eq!(found.map(|u| u.id), Some(UserId::new(1)));

        let clash = User::new(UserId::new(2), "sub", "Bob", now);
        assert!(store.write(|ledger| ledger.put_user(&clash)).is_err());
    }

    #[test]
    fn test_cascade_delete_matches_memory_store() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let native = Tracker::new(NativeStore::in_memory().unwrap());
        let memory = Tracker::new(MemoryStore::new());

        for removed in [run_and_delete(&native, now), run_and_delete(&memory, now)] {
            assert_eq!(removed, 2);
        }
        let user = native.user(UserId::new(1)).unwrap();
        assert!(native.store().read(|v| v.completions_of_user(user.id)).unwrap().is_empty());
    }

    fn run_and_delete<S: Store>(tracker: &Tracker<S>, now: chrono::DateTime<Utc>) -> usize {
        let user = tracker.register_user(ada(), now).unwrap();
        let habit = tracker.create_habit(user.id, NewHabit::new("Run", "health"), now).unwrap();
        tracker.complete_habit(user.id, habit.id, None, now).unwrap();
        let tomorrow = now + chrono::Duration::days(1);
        tracker.complete_habit(user.id, habit.id, None, tomorrow).unwrap();
        tracker.delete_habit(user.id, habit.id).unwrap()
    }
}

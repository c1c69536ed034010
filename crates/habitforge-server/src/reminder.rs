//! Periodic scan for habits that are still open today

use crate::api::AppState;
use crate::config::ReminderConfig;
use chrono::{DateTime, Utc};
use habitforge_core::Reminder;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Run one scan and log every pending reminder.
///
/// Habits without reminders enabled are counted but not announced.
pub fn scan_once(state: &AppState, now: DateTime<Utc>) -> habitforge_core::Result<Vec<Reminder>> {
    let pending = state.tracker.pending_reminders(now)?;
    let mut announced = 0usize;
    for reminder in pending.iter().filter(|r| r.reminder_enabled) {
        info!(
            user = %reminder.user_id,
            habit = %reminder.habit_id,
            name = %reminder.habit_name,
            at = reminder.reminder_time.as_deref().unwrap_or("-"),
            period = %reminder.period,
            "habit reminder"
        );
        announced += 1;
    }
    debug!(pending = pending.len(), announced, "reminder scan finished");
    Ok(pending)
}

/// Spawn the background scan, or nothing when reminders are disabled
pub fn spawn(state: Arc<AppState>, config: &ReminderConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("reminder scan disabled");
        return None;
    }
    let period = Duration::from_secs(config.interval_secs.max(1));
    info!(interval_secs = period.as_secs(), "reminder scan started");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = scan_once(&state, Utc::now()) {
                error!(error = %e, "reminder scan failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use habitforge_core::{NewHabit, NewUser};
    use habitforge_db::NativeStore;

    fn state() -> AppState {
        AppState::new(NativeStore::in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_scan_lists_open_habits() {
        let state = state();
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 7, 30, 0).unwrap();
        let user = state
            .tracker
            .register_user(
                NewUser {
                    subject: "auth|sam".to_string(),
                    name: "Sam".to_string(),
                    email: String::new(),
                    avatar: None,
                },
                now,
            )
            .unwrap();
        let mut stretch = NewHabit::new("Stretch", "health");
        stretch.reminder_enabled = true;
        stretch.reminder_time = Some("07:00".to_string());
        let stretch = state.tracker.create_habit(user.id, stretch, now).unwrap();
        let read = state
            .tracker
            .create_habit(user.id, NewHabit::new("Read", "learning"), now)
            .unwrap();

        let pending = scan_once(&state, now).unwrap();
        assert_eq!(pending.len(), 2);

        state.tracker.complete_habit(user.id, read.id, None, now).unwrap();
        let pending = scan_once(&state, now).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].habit_id, stretch.id);
        assert!(pending[0].reminder_enabled);
    }

    #[tokio::test]
    async fn test_disabled_scan_is_not_spawned() {
        let config = ReminderConfig {
            enabled: false,
            interval_secs: 60,
        };
        assert!(spawn(Arc::new(state()), &config).is_none());

        let config = ReminderConfig::default();
        let handle = spawn(Arc::new(state()), &config).unwrap();
        handle.abort();
    }
}

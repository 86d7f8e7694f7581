use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use habit_core::clock::Clock;
use habit_core::error::{PlatformError, StoreError};
use habit_core::notifications::{
    NotificationContent, NotificationPlatform, Permission, ScheduledTimer, TimerId,
};
use habit_core::store::{load_json, save_json, KeyValueStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const TIMERS_STORAGE_KEY: &str = "@habitTracker/timers_v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTimer {
    pub timer: ScheduledTimer,
    pub due: NaiveDateTime,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimerBook {
    next_seq: u64,
    timers: Vec<StoredTimer>,
}

/// Timer service for the command-line host. Pending timers live in the blob store with
/// their absolute due time, so they outlive the process; `fire_due` delivers whatever
/// has come due since the last run.
pub struct FileTimerPlatform {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    book: Mutex<TimerBook>,
}

impl FileTimerPlatform {
    pub fn open(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let book: TimerBook = load_json(store.as_ref(), TIMERS_STORAGE_KEY)?.unwrap_or_default();
        debug!(pending = book.timers.len(), "timer book loaded");
        Ok(Self {
            store,
            clock,
            book: Mutex::new(book),
        })
    }

    pub fn timers(&self) -> Vec<StoredTimer> {
        self.book.lock().timers.clone()
    }

    /// Removes and returns every timer due at the clock's current time, earliest first.
    pub fn fire_due(&self) -> Result<Vec<ScheduledTimer>, PlatformError> {
        let now = self.clock.now();
        let mut book = self.book.lock();
        let (mut due, rest): (Vec<StoredTimer>, Vec<StoredTimer>) =
            book.timers.drain(..).partition(|stored| stored.due <= now);
        book.timers = rest;
        if due.is_empty() {
            return Ok(Vec::new());
        }
        self.persist(&book)?;
        due.sort_by_key(|stored| stored.due);
        info!(count = due.len(), "timers fired");
        Ok(due.into_iter().map(|stored| stored.timer).collect())
    }

    fn persist(&self, book: &TimerBook) -> Result<(), PlatformError> {
        save_json(self.store.as_ref(), TIMERS_STORAGE_KEY, book)
            .map_err(|err| PlatformError::Unavailable(err.to_string()))
    }
}

impl NotificationPlatform for FileTimerPlatform {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn schedule_one_shot(
        &self,
        content: NotificationContent,
        delay_seconds: u64,
        channel: &str,
    ) -> Result<TimerId, PlatformError> {
        let delay = i64::try_from(delay_seconds)
            .map_err(|_| PlatformError::Rejected(format!("delay {delay_seconds}s out of range")))?;
        let due = self.clock.now() + Duration::seconds(delay);
        let mut book = self.book.lock();
        book.next_seq += 1;
        let id = TimerId(format!("timer-{}", book.next_seq));
        book.timers.push(StoredTimer {
            timer: ScheduledTimer {
                id: id.clone(),
                content,
                delay_seconds,
                channel: channel.to_string(),
            },
            due,
        });
        if let Err(err) = self.persist(&book) {
            book.timers.pop();
            return Err(err);
        }
        debug!(%id, %due, "timer stored");
        Ok(id)
    }

    fn pending(&self) -> Result<Vec<ScheduledTimer>, PlatformError> {
        Ok(self
            .book
            .lock()
            .timers
            .iter()
            .map(|stored| stored.timer.clone())
            .collect())
    }

    fn cancel(&self, id: &TimerId) -> Result<(), PlatformError> {
        let mut book = self.book.lock();
        let before = book.timers.len();
        book.timers.retain(|stored| &stored.timer.id != id);
        if book.timers.len() == before {
            return Err(PlatformError::UnknownTimer(id.to_string()));
        }
        self.persist(&book)
    }

    fn cancel_all(&self) -> Result<(), PlatformError> {
        let mut book = self.book.lock();
        book.timers.clear();
        self.persist(&book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use habit_core::clock::ManualClock;
    use habit_core::notifications::{NotificationPayload, DAILY_REMINDER_TAG};
    use habit_core::store::{JsonFileStore, MemoryStore};
    use habit_core::ScheduleTime;
    use tempfile::tempdir;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2025, 10, 21)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        ))
    }

    fn reminder() -> NotificationContent {
        NotificationContent {
            title: "Daily check-in".into(),
            body: "Go".into(),
            payload: NotificationPayload::daily_reminder(ScheduleTime::from_hm(9, 0)),
        }
    }

    #[test]
    fn timers_survive_reopening_and_fire_when_due() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir.path()));

        let platform = FileTimerPlatform::open(store.clone(), clock.clone()).unwrap();
        let id = platform.schedule_one_shot(reminder(), 3600, "habits-v2").unwrap();
        assert_eq!(id, TimerId("timer-1".into()));
        drop(platform);

        let reopened = FileTimerPlatform::open(store, clock.clone()).unwrap();
        assert!(reopened.fire_due().unwrap().is_empty());
        clock.advance(Duration::hours(1));
        let fired = reopened.fire_due().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].content.payload.tag(), DAILY_REMINDER_TAG);
        assert!(reopened.timers().is_empty());

        let next = reopened.schedule_one_shot(reminder(), 60, "habits-v2").unwrap();
        assert_eq!(next, TimerId("timer-2".into()));
    }

    #[test]
    fn cancel_by_tag_scans_stored_timers() {
        let store = Arc::new(MemoryStore::new());
        let platform = FileTimerPlatform::open(store.clone(), clock()).unwrap();
        platform.schedule_one_shot(reminder(), 60, "habits-v2").unwrap();
        platform.schedule_one_shot(reminder(), 120, "habits-v2").unwrap();

        assert_eq!(platform.cancel_by_tag(DAILY_REMINDER_TAG).unwrap(), 2);
        assert!(platform.pending().unwrap().is_empty());
        assert_eq!(
            platform.cancel(&TimerId("timer-1".into())),
            Err(PlatformError::UnknownTimer("timer-1".into()))
        );
        let saved = store.raw(TIMERS_STORAGE_KEY).unwrap();
        assert_eq!(saved["timers"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn failed_write_surfaces_as_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let platform = FileTimerPlatform::open(store.clone(), clock()).unwrap();
        store.set_fail_writes(true);
        assert!(matches!(
            platform.schedule_one_shot(reminder(), 60, "habits-v2"),
            Err(PlatformError::Unavailable(_))
        ));
    }
}

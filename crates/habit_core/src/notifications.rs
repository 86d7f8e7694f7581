use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{HabitError, PlatformError};
use crate::habit::{Habit, HabitId, ScheduleTime};
use crate::weekday::Weekday;

pub const HABITS_CHANNEL_ID: &str = "habits-v2";
pub const DAILY_REMINDER_TAG: &str = "daily-reminder";

/// Tag shared by every timer belonging to one habit.
pub fn habit_tag(habit_id: &str) -> String {
    format!("habit-{habit_id}")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// One weekday slot of a habit. Rebuilt from the habit each time it is scheduled and
/// carried inside the timer so a fired timer can be re-armed on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub habit_id: HabitId,
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
    pub tag: String,
}

impl NotificationRequest {
    pub fn for_slot(habit: &Habit, weekday: Weekday) -> Self {
        Self {
            habit_id: habit.id.clone(),
            weekday,
            hour: habit.schedule.time.hour(),
            minute: habit.schedule.time.minute(),
            tag: habit_tag(&habit.id),
        }
    }

    /// One request per scheduled weekday.
    pub fn for_habit(habit: &Habit) -> Vec<Self> {
        habit
            .schedule
            .days
            .iter()
            .map(|day| Self::for_slot(habit, *day))
            .collect()
    }

    pub fn time(&self) -> Result<ScheduleTime, HabitError> {
        ScheduleTime::new(self.hour, self.minute)
    }

    pub fn platform_weekday(&self) -> u8 {
        self.weekday.platform_index()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationPayload {
    Habit(NotificationRequest),
    DailyReminder { tag: String, hour: u32, minute: u32 },
}

impl NotificationPayload {
    pub fn daily_reminder(time: ScheduleTime) -> Self {
        NotificationPayload::DailyReminder {
            tag: DAILY_REMINDER_TAG.to_string(),
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            NotificationPayload::Habit(request) => &request.tag,
            NotificationPayload::DailyReminder { tag, .. } => tag,
        }
    }

    pub fn habit_id(&self) -> Option<&str> {
        match self {
            NotificationPayload::Habit(request) => Some(&request.habit_id),
            NotificationPayload::DailyReminder { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TimerId(pub String);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTimer {
    pub id: TimerId,
    pub content: NotificationContent,
    pub delay_seconds: u64,
    pub channel: String,
}

/// Platform-specific notification adapters implement this trait. The only scheduling
/// primitive is a timer that fires once; weekly repetition is built on top of it.
pub trait NotificationPlatform: Send + Sync {
    fn permission(&self) -> Permission;

    fn request_permission(&self) -> Permission;

    fn schedule_one_shot(
        &self,
        content: NotificationContent,
        delay_seconds: u64,
        channel: &str,
    ) -> Result<TimerId, PlatformError>;

    fn pending(&self) -> Result<Vec<ScheduledTimer>, PlatformError>;

    fn cancel(&self, id: &TimerId) -> Result<(), PlatformError>;

    fn cancel_all(&self) -> Result<(), PlatformError>;

    /// Scans pending timers and cancels those carrying `tag`. Returns how many went.
    fn cancel_by_tag(&self, tag: &str) -> Result<usize, PlatformError> {
        let matching: Vec<TimerId> = self
            .pending()?
            .into_iter()
            .filter(|timer| timer.content.payload.tag() == tag)
            .map(|timer| timer.id)
            .collect();
        for id in &matching {
            self.cancel(id)?;
        }
        Ok(matching.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub timer: ScheduledTimer,
    pub due: NaiveDateTime,
}

#[derive(Debug)]
struct InMemoryState {
    permission: Permission,
    grant_on_request: bool,
    next_id: u64,
    pending: Vec<PendingTimer>,
    submissions: VecDeque<ScheduledTimer>,
    cancelled_tags: VecDeque<String>,
    failing_submissions: u32,
    failing_weekdays: Vec<Weekday>,
}

/// Most recent entries kept in each [`InMemoryPlatform`] log.
pub const HISTORY_LIMIT: usize = 256;

/// Process-local platform: keeps timers in memory and fires them against a [`Clock`].
///
/// Doubles as a test harness: it records submissions and tag cancellations, and can be
/// told to deny permission or fail submissions. Both logs keep only the latest
/// [`HISTORY_LIMIT`] entries, so a long-running host does not grow them without bound.
pub struct InMemoryPlatform {
    clock: Arc<dyn Clock>,
    state: Mutex<InMemoryState>,
}

impl InMemoryPlatform {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(InMemoryState {
                permission: Permission::Granted,
                grant_on_request: true,
                next_id: 1,
                pending: Vec::new(),
                submissions: VecDeque::new(),
                cancelled_tags: VecDeque::new(),
                failing_submissions: 0,
                failing_weekdays: Vec::new(),
            }),
        }
    }

    pub fn set_permission(&self, permission: Permission, grant_on_request: bool) {
        let mut state = self.state.lock();
        state.permission = permission;
        state.grant_on_request = grant_on_request;
    }

    /// Makes the next `count` submissions fail.
    pub fn fail_next_submissions(&self, count: u32) {
        self.state.lock().failing_submissions = count;
    }

    /// Makes every submission for a habit slot on `weekday` fail.
    pub fn fail_weekday(&self, weekday: Weekday) {
        self.state.lock().failing_weekdays.push(weekday);
    }

    /// Recent successful submissions, oldest first.
    pub fn submissions(&self) -> Vec<ScheduledTimer> {
        self.state.lock().submissions.iter().cloned().collect()
    }

    /// Drains the submission log.
    pub fn take_submissions(&self) -> Vec<ScheduledTimer> {
        self.state.lock().submissions.drain(..).collect()
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.state.lock().pending.clone()
    }

    pub fn cancelled_tags(&self) -> Vec<String> {
        self.state.lock().cancelled_tags.iter().cloned().collect()
    }

    /// Removes and returns timers due at the clock's current time, earliest first.
    pub fn take_due(&self) -> Vec<ScheduledTimer> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let (mut due, rest): (Vec<PendingTimer>, Vec<PendingTimer>) =
            state.pending.drain(..).partition(|pending| pending.due <= now);
        state.pending = rest;
        due.sort_by_key(|pending| pending.due);
        due.into_iter().map(|pending| pending.timer).collect()
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<NaiveDateTime> {
        self.state.lock().pending.iter().map(|pending| pending.due).min()
    }
}

impl NotificationPlatform for InMemoryPlatform {
    fn permission(&self) -> Permission {
        self.state.lock().permission
    }

    fn request_permission(&self) -> Permission {
        let mut state = self.state.lock();
        if state.grant_on_request {
            state.permission = Permission::Granted;
        }
        state.permission
    }

    fn schedule_one_shot(
        &self,
        content: NotificationContent,
        delay_seconds: u64,
        channel: &str,
    ) -> Result<TimerId, PlatformError> {
        let due = self.clock.now() + Duration::seconds(delay_seconds as i64);
        let mut state = self.state.lock();
        if state.failing_submissions > 0 {
            state.failing_submissions -= 1;
            return Err(PlatformError::Unavailable("simulated outage".into()));
        }
        if let NotificationPayload::Habit(request) = &content.payload {
            if state.failing_weekdays.contains(&request.weekday) {
                return Err(PlatformError::Rejected(format!(
                    "slot {} refused",
                    request.weekday
                )));
            }
        }
        let id = TimerId(format!("timer-{}", state.next_id));
        state.next_id += 1;
        let timer = ScheduledTimer {
            id: id.clone(),
            content,
            delay_seconds,
            channel: channel.to_string(),
        };
        record(&mut state.submissions, timer.clone());
        state.pending.push(PendingTimer { timer, due });
        Ok(id)
    }

    fn pending(&self) -> Result<Vec<ScheduledTimer>, PlatformError> {
        Ok(self
            .state
            .lock()
            .pending
            .iter()
            .map(|pending| pending.timer.clone())
            .collect())
    }

    fn cancel(&self, id: &TimerId) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state.pending.retain(|pending| &pending.timer.id != id);
        if state.pending.len() == before {
            return Err(PlatformError::UnknownTimer(id.to_string()));
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), PlatformError> {
        self.state.lock().pending.clear();
        Ok(())
    }

    fn cancel_by_tag(&self, tag: &str) -> Result<usize, PlatformError> {
        let mut state = self.state.lock();
        record(&mut state.cancelled_tags, tag.to_string());
        let before = state.pending.len();
        state
            .pending
            .retain(|pending| pending.timer.content.payload.tag() != tag);
        Ok(before - state.pending.len())
    }
}

fn record<T>(log: &mut VecDeque<T>, entry: T) {
    if log.len() == HISTORY_LIMIT {
        log.pop_front();
    }
    log.push_back(entry);
}

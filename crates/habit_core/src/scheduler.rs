use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{PlatformError, SchedulerError};
use crate::habit::{Habit, ScheduleTime};
use crate::notifications::{
    habit_tag, NotificationContent, NotificationPayload, NotificationPlatform,
    NotificationRequest, Permission, TimerId, HABITS_CHANNEL_ID,
};
use crate::occurrence::{self, DEFAULT_EARLY_FIRE_TOLERANCE_SECS, DEFAULT_MIN_DELAY_SECS};
use crate::weekday::Weekday;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerOptions {
    pub channel: String,
    pub min_delay_secs: u64,
    pub rearm_attempts: u32,
    /// A fired timer this close before its slot is treated as that slot.
    pub early_fire_tolerance_secs: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            channel: HABITS_CHANNEL_ID.to_string(),
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            rearm_attempts: 3,
            early_fire_tolerance_secs: DEFAULT_EARLY_FIRE_TOLERANCE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledSlot {
    pub weekday: Weekday,
    pub timer_id: TimerId,
    pub delay_seconds: u64,
}

/// Outcome of scheduling one habit: slots are independent, so some may fail while
/// the rest go through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub scheduled: Vec<ScheduledSlot>,
    pub failed: Vec<(Weekday, PlatformError)>,
}

impl ScheduleReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Turns weekly habit schedules into one-shot timers and keeps them alive by
/// re-submitting every timer when it fires.
pub struct HabitScheduler {
    platform: Arc<dyn NotificationPlatform>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
}

impl HabitScheduler {
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            platform,
            clock,
            options,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn platform(&self) -> &Arc<dyn NotificationPlatform> {
        &self.platform
    }

    /// Checks the current grant and asks once if it is missing.
    pub fn ensure_permission(&self) -> bool {
        if self.platform.permission() == Permission::Granted {
            return true;
        }
        let granted = self.platform.request_permission() == Permission::Granted;
        if !granted {
            info!("notification permission denied, skipping scheduling");
        }
        granted
    }

    /// Submits one timer per scheduled weekday. Callers purge stale timers first.
    pub fn schedule_habit(&self, habit: &Habit, title: &str, body: &str) -> ScheduleReport {
        let now = self.clock.now();
        let mut report = ScheduleReport::default();
        for request in NotificationRequest::for_habit(habit) {
            let weekday = request.weekday;
            let delay = occurrence::weekly_delay(
                weekday,
                habit.schedule.time,
                now,
                self.options.min_delay_secs,
            );
            let content = NotificationContent {
                title: title.to_string(),
                body: body.to_string(),
                payload: NotificationPayload::Habit(request),
            };
            match self
                .platform
                .schedule_one_shot(content, delay, &self.options.channel)
            {
                Ok(timer_id) => {
                    debug!(
                        habit_id = %habit.id,
                        %weekday,
                        delay,
                        %timer_id,
                        "habit slot scheduled"
                    );
                    report.scheduled.push(ScheduledSlot {
                        weekday,
                        timer_id,
                        delay_seconds: delay,
                    });
                }
                Err(err) => {
                    warn!(habit_id = %habit.id, %weekday, %err, "failed to schedule habit slot");
                    report.failed.push((weekday, err));
                }
            }
        }
        report
    }

    pub fn schedule_daily_reminder(
        &self,
        time: ScheduleTime,
        title: &str,
        body: &str,
    ) -> Result<TimerId, PlatformError> {
        let delay = occurrence::daily_delay(time, self.clock.now(), self.options.min_delay_secs);
        let content = NotificationContent {
            title: title.to_string(),
            body: body.to_string(),
            payload: NotificationPayload::daily_reminder(time),
        };
        let timer_id = self
            .platform
            .schedule_one_shot(content, delay, &self.options.channel)?;
        debug!(%time, delay, %timer_id, "daily reminder scheduled");
        Ok(timer_id)
    }

    /// Cancels every timer tagged for the habit. The lookup strategy lives in the
    /// platform's `cancel_by_tag`.
    pub fn cancel_for_habit(&self, habit_id: &str) -> Result<usize, PlatformError> {
        let cancelled = self.platform.cancel_by_tag(&habit_tag(habit_id))?;
        debug!(habit_id, cancelled, "habit timers cancelled");
        Ok(cancelled)
    }

    pub fn cancel_all(&self) -> Result<(), PlatformError> {
        self.platform.cancel_all()
    }

    /// Seconds until the payload's slot comes around again from now.
    pub fn next_delay(&self, payload: &NotificationPayload) -> Result<u64, SchedulerError> {
        let now = self.clock.now();
        let min_delay = self.options.min_delay_secs;
        let delay = match payload {
            NotificationPayload::Habit(request) => {
                occurrence::weekly_delay(request.weekday, request.time()?, now, min_delay)
            }
            NotificationPayload::DailyReminder { hour, minute, .. } => {
                occurrence::daily_delay(ScheduleTime::new(*hour, *minute)?, now, min_delay)
            }
        };
        Ok(delay)
    }

    /// Seconds until the occurrence after the one that just fired. Early deliveries
    /// within the tolerance count from their own slot.
    pub fn rearm_delay(&self, payload: &NotificationPayload) -> Result<u64, SchedulerError> {
        let fired_at = self.clock.now();
        let tolerance = self.options.early_fire_tolerance_secs;
        let min_delay = self.options.min_delay_secs;
        let delay = match payload {
            NotificationPayload::Habit(request) => occurrence::weekly_rearm_delay(
                request.weekday,
                request.time()?,
                fired_at,
                tolerance,
                min_delay,
            ),
            NotificationPayload::DailyReminder { hour, minute, .. } => {
                let time = ScheduleTime::new(*hour, *minute)?;
                occurrence::daily_rearm_delay(time, fired_at, tolerance, min_delay)
            }
        };
        Ok(delay)
    }

    /// Handles a fired timer by submitting the same content for its next occurrence.
    /// Platform failures are retried up to the configured attempt count.
    pub fn on_fire(&self, content: NotificationContent) -> Result<TimerId, SchedulerError> {
        let delay = self.rearm_delay(&content.payload)?;
        let tag = content.payload.tag().to_string();
        let attempts = self.options.rearm_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self
                .platform
                .schedule_one_shot(content.clone(), delay, &self.options.channel)
            {
                Ok(timer_id) => {
                    debug!(%tag, delay, %timer_id, attempt, "timer re-armed");
                    return Ok(timer_id);
                }
                Err(err) => {
                    warn!(%tag, attempt, %err, "re-arm attempt failed");
                    last_error = Some(err);
                }
            }
        }
        let source = last_error
            .unwrap_or_else(|| PlatformError::Unavailable("no re-arm attempt made".into()));
        error!(%tag, attempts, %source, "giving up on re-arming timer, reminders stop here");
        Err(SchedulerError::RearmFailed {
            tag,
            attempts,
            source,
        })
    }
}

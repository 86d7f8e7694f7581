use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::completion::HabitStats;
use crate::error::{HabitError, MotivationError, SchedulerError};
use crate::habit::{Habit, HabitCategory, Schedule, ScheduleTime};
use crate::messages::{MessageSelector, ToneMessages};
use crate::motivation::{MotivationCollection, MotivationItem, MotivationKind};
use crate::notifications::{NotificationContent, NotificationPayload, NotificationPlatform, TimerId};
use crate::registry::HabitRegistry;
use crate::schedule::HabitBuckets;
use crate::scheduler::{HabitScheduler, ScheduleReport, SchedulerOptions};
use crate::settings::{Locale, Settings, SettingsStore, ToneLevel};
use crate::store::{KeyValueStore, MemoryStore};

/// What a full notification re-sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub enabled: bool,
    pub permitted: bool,
    pub daily_reminder: bool,
    pub habit_slots: usize,
    pub failed_slots: usize,
}

pub struct HabitService {
    registry: RwLock<HabitRegistry>,
    settings: RwLock<SettingsStore>,
    motivation: RwLock<MotivationCollection>,
    scheduler: Arc<HabitScheduler>,
    messages: Box<dyn MessageSelector>,
    clock: Arc<dyn Clock>,
}

pub struct HabitServiceBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    platform: Option<Arc<dyn NotificationPlatform>>,
    clock: Option<Arc<dyn Clock>>,
    messages: Option<Box<dyn MessageSelector>>,
    default_settings: Settings,
    options: SchedulerOptions,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            platform: None,
            clock: None,
            messages: None,
            default_settings: Settings::default(),
            options: SchedulerOptions::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notification_platform(mut self, platform: Arc<dyn NotificationPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_messages(mut self, messages: Box<dyn MessageSelector>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Settings used until (and where) the stored record says otherwise.
    pub fn with_default_settings(mut self, settings: Settings) -> Self {
        self.default_settings = settings;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.options.channel = channel.into();
        self
    }

    pub fn with_min_delay(mut self, seconds: u64) -> Self {
        self.options.min_delay_secs = seconds;
        self
    }

    pub fn with_rearm_attempts(mut self, attempts: u32) -> Self {
        self.options.rearm_attempts = attempts.max(1);
        self
    }

    /// Wires the pieces together and hydrates every collection from the store.
    pub fn build(self) -> Result<HabitService> {
        let platform = self
            .platform
            .ok_or_else(|| anyhow!("notification platform not configured"))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let messages = self
            .messages
            .unwrap_or_else(|| Box::new(ToneMessages) as Box<dyn MessageSelector>);

        let scheduler = Arc::new(HabitScheduler::new(platform, clock.clone(), self.options));

        let mut registry =
            HabitRegistry::new(store.clone(), clock.clone()).with_scheduler(scheduler.clone());
        registry.hydrate().context("failed to load habits")?;

        let mut settings = SettingsStore::with_defaults(store.clone(), self.default_settings);
        settings.hydrate().context("failed to load settings")?;

        let mut motivation = MotivationCollection::new(store, clock.clone());
        motivation
            .hydrate()
            .context("failed to load motivation items")?;

        info!(
            habits = registry.habits().len(),
            notifications = settings.settings().notifications_enabled,
            "habit service ready"
        );

        Ok(HabitService {
            registry: RwLock::new(registry),
            settings: RwLock::new(settings),
            motivation: RwLock::new(motivation),
            scheduler,
            messages,
            clock,
        })
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.registry.read().habits().to_vec()
    }

    pub fn habit(&self, id: &str) -> Option<Habit> {
        self.registry.read().get(id).cloned()
    }

    /// Active / upcoming / other, evaluated against the current clock.
    pub fn partition(&self) -> HabitBuckets {
        self.registry.read().partition()
    }

    pub fn stats(&self, id: &str) -> Result<HabitStats, HabitError> {
        self.registry.read().stats(id)
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().settings().clone()
    }

    pub fn scheduler(&self) -> &Arc<HabitScheduler> {
        &self.scheduler
    }

    pub fn subscribe(&self, subscriber: impl Fn(&[Habit]) + Send + Sync + 'static) {
        self.registry.write().subscribe(subscriber);
    }

    /// Creates the habit and, when reminders are on and permitted, schedules its slots.
    #[instrument(skip(self, schedule))]
    pub fn create_habit(
        &self,
        title: &str,
        category: HabitCategory,
        schedule: Schedule,
    ) -> Result<Habit, HabitError> {
        let habit = self.registry.write().create(title, category, schedule)?;
        self.schedule_if_enabled(&habit);
        Ok(habit)
    }

    /// Saves the edit, purges the habit's old timers and schedules the new slots.
    #[instrument(skip(self, schedule))]
    pub fn update_habit(
        &self,
        id: &str,
        title: &str,
        category: HabitCategory,
        schedule: Schedule,
    ) -> Result<Habit, HabitError> {
        let habit = self.registry.write().update(id, title, category, schedule)?;
        if let Err(err) = self.scheduler.cancel_for_habit(id) {
            warn!(habit_id = id, %err, "failed to cancel stale timers");
        }
        self.schedule_if_enabled(&habit);
        Ok(habit)
    }

    #[instrument(skip(self))]
    pub fn remove_habit(&self, id: &str) -> Result<Habit, HabitError> {
        self.registry.write().remove(id)
    }

    pub fn toggle_today(&self, id: &str) -> Result<bool, HabitError> {
        self.registry.write().toggle_today(id)
    }

    pub fn set_completion(&self, id: &str, date_key: &str, value: bool) -> Result<(), HabitError> {
        self.registry
            .write()
            .set_completion_for_date(id, date_key, value)
    }

    pub fn toggle_completion_for_date(&self, id: &str, date_key: &str) -> Result<bool, HabitError> {
        self.registry.write().toggle_completion_for_date(id, date_key)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> SyncSummary {
        self.settings.write().set_notifications_enabled(enabled);
        self.resync_notifications()
    }

    pub fn set_notification_time(&self, time: ScheduleTime) -> SyncSummary {
        self.settings.write().set_notification_time(time);
        self.resync_notifications()
    }

    pub fn set_tone_level(&self, tone: ToneLevel) -> SyncSummary {
        self.settings.write().set_tone_level(tone);
        self.resync_notifications()
    }

    pub fn set_locale(&self, locale: Locale) -> SyncSummary {
        self.settings.write().set_locale(locale);
        self.resync_notifications()
    }

    pub fn set_has_seen_welcome(&self, seen: bool) {
        self.settings.write().set_has_seen_welcome(seen);
    }

    /// Cancels every timer, then (when enabled and permitted) submits the daily reminder
    /// and fresh timers for every habit.
    #[instrument(skip(self))]
    pub fn resync_notifications(&self) -> SyncSummary {
        let settings = self.settings();
        let mut summary = SyncSummary {
            enabled: settings.notifications_enabled,
            ..SyncSummary::default()
        };
        if let Err(err) = self.scheduler.cancel_all() {
            warn!(%err, "failed to cancel scheduled notifications");
        }
        if !settings.notifications_enabled {
            debug!("notifications disabled, all timers cancelled");
            return summary;
        }
        if !self.scheduler.ensure_permission() {
            return summary;
        }
        summary.permitted = true;

        let (title, body) = self.render(&settings);
        match self
            .scheduler
            .schedule_daily_reminder(settings.notification_time, &title, &body)
        {
            Ok(_) => summary.daily_reminder = true,
            Err(err) => warn!(%err, "failed to schedule daily reminder"),
        }

        for habit in self.habits() {
            let report = self.scheduler.schedule_habit(&habit, &title, &body);
            summary.habit_slots += report.scheduled.len();
            summary.failed_slots += report.failed.len();
        }
        info!(
            slots = summary.habit_slots,
            failed = summary.failed_slots,
            "notifications re-synchronised"
        );
        summary
    }

    /// Entry point for a timer delivered by the platform: re-arms it for its next
    /// occurrence. Returns `None` when the timer no longer has anything to remind about.
    #[instrument(skip(self, content), fields(tag = content.payload.tag()))]
    pub fn handle_fired(
        &self,
        content: NotificationContent,
    ) -> Result<Option<TimerId>, SchedulerError> {
        if !self.settings.read().settings().notifications_enabled {
            debug!("notifications disabled, not re-arming");
            return Ok(None);
        }
        if let NotificationPayload::Habit(request) = &content.payload {
            if self.registry.read().get(&request.habit_id).is_none() {
                debug!(habit_id = %request.habit_id, "habit gone, not re-arming");
                return Ok(None);
            }
        }
        self.scheduler.on_fire(content).map(Some)
    }

    pub fn motivation_items(&self) -> Vec<MotivationItem> {
        self.motivation.read().items().to_vec()
    }

    pub fn add_motivation(
        &self,
        url: &str,
        kind: Option<MotivationKind>,
        title: Option<&str>,
    ) -> Result<MotivationItem, MotivationError> {
        self.motivation.write().add(url, kind, title)
    }

    pub fn remove_motivation(&self, id: &str) -> Result<MotivationItem, MotivationError> {
        self.motivation.write().remove(id)
    }

    pub fn rename_motivation(&self, id: &str, title: &str) -> Result<(), MotivationError> {
        self.motivation.write().update_title(id, title)
    }

    pub fn random_motivation(&self, kind: Option<MotivationKind>) -> Option<MotivationItem> {
        self.motivation.read().random_item(kind)
    }

    pub fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }
}

impl HabitService {
    fn render(&self, settings: &Settings) -> (String, String) {
        (
            self.messages.title(settings.locale),
            self.messages.body(settings.locale, settings.tone_level),
        )
    }

    fn schedule_if_enabled(&self, habit: &Habit) -> Option<ScheduleReport> {
        let settings = self.settings();
        if !settings.notifications_enabled {
            return None;
        }
        if !self.scheduler.ensure_permission() {
            return None;
        }
        let (title, body) = self.render(&settings);
        let report = self.scheduler.schedule_habit(habit, &title, &body);
        if !report.is_complete() {
            warn!(
                habit_id = %habit.id,
                failed = report.failed.len(),
                "some habit slots could not be scheduled"
            );
        }
        Some(report)
    }
}

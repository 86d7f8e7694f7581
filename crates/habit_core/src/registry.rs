use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::completion::{self, HabitStats};
use crate::error::{HabitError, StoreError};
use crate::habit::{validate_fields, Habit, HabitCategory, Schedule};
use crate::schedule::{self, HabitBuckets};
use crate::scheduler::HabitScheduler;
use crate::store::{load_json, save_json, KeyValueStore};

pub const HABITS_STORAGE_KEY: &str = "@humiliateMe/habits_v2";

pub type Subscriber = Box<dyn Fn(&[Habit]) + Send + Sync>;

/// Owns the habit collection. Each successful mutation updates memory, writes the full
/// collection back to the store and then notifies subscribers.
///
/// A failed write is logged and does not undo the in-memory change; the next successful
/// write carries the full state, so the store converges on what is in memory.
pub struct HabitRegistry {
    habits: Vec<Habit>,
    hydrated: bool,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    scheduler: Option<Arc<HabitScheduler>>,
    subscribers: Vec<Subscriber>,
}

impl HabitRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            habits: Vec::new(),
            hydrated: false,
            store,
            clock,
            scheduler: None,
            subscribers: Vec::new(),
        }
    }

    /// Lets `remove` purge the habit's timers.
    pub fn with_scheduler(mut self, scheduler: Arc<HabitScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn hydrate(&mut self) -> Result<(), StoreError> {
        self.habits = load_json(self.store.as_ref(), HABITS_STORAGE_KEY)?.unwrap_or_default();
        self.hydrated = true;
        debug!(count = self.habits.len(), "habits hydrated");
        Ok(())
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn subscribe(&mut self, subscriber: impl Fn(&[Habit]) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn get(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    /// Validates and inserts a new habit at the front of the collection. Nothing is
    /// written when validation fails.
    pub fn create(
        &mut self,
        title: &str,
        category: HabitCategory,
        schedule: Schedule,
    ) -> Result<Habit, HabitError> {
        let title = validate_fields(title, &schedule)?;
        let habit = Habit {
            id: Uuid::new_v4().to_string(),
            title,
            category,
            created_at: self.clock.epoch_millis(),
            schedule,
            completions: Default::default(),
        };
        self.habits.insert(0, habit.clone());
        self.commit();
        debug!(habit_id = %habit.id, "habit created");
        Ok(habit)
    }

    /// Replaces title, category and schedule. Timers for the old schedule are the
    /// caller's to cancel and resubmit.
    pub fn update(
        &mut self,
        id: &str,
        title: &str,
        category: HabitCategory,
        schedule: Schedule,
    ) -> Result<Habit, HabitError> {
        let title = validate_fields(title, &schedule)?;
        let habit = self.find_mut(id)?;
        habit.title = title;
        habit.category = category;
        habit.schedule = schedule;
        let updated = habit.clone();
        self.commit();
        debug!(habit_id = id, "habit updated");
        Ok(updated)
    }

    /// Cancels the habit's timers, then drops it from the collection.
    pub fn remove(&mut self, id: &str) -> Result<Habit, HabitError> {
        let index = self
            .habits
            .iter()
            .position(|habit| habit.id == id)
            .ok_or_else(|| HabitError::NotFound(id.to_string()))?;
        if let Some(scheduler) = &self.scheduler {
            if let Err(err) = scheduler.cancel_for_habit(id) {
                warn!(habit_id = id, %err, "failed to cancel timers for removed habit");
            }
        }
        let removed = self.habits.remove(index);
        self.commit();
        debug!(habit_id = id, "habit removed");
        Ok(removed)
    }

    pub fn toggle_today(&mut self, id: &str) -> Result<bool, HabitError> {
        let now = self.clock.now();
        let done = completion::toggle_today(self.find_mut(id)?, now);
        self.commit();
        Ok(done)
    }

    pub fn set_completion_for_date(
        &mut self,
        id: &str,
        date_key: &str,
        value: bool,
    ) -> Result<(), HabitError> {
        let date = completion::parse_date_key(date_key)?;
        let now = self.clock.now();
        completion::set_completion(self.find_mut(id)?, date, value, now)?;
        self.commit();
        Ok(())
    }

    pub fn toggle_completion_for_date(
        &mut self,
        id: &str,
        date_key: &str,
    ) -> Result<bool, HabitError> {
        let date = completion::parse_date_key(date_key)?;
        let now = self.clock.now();
        let done = completion::toggle_completion_for_date(self.find_mut(id)?, date, now)?;
        self.commit();
        Ok(done)
    }

    pub fn stats(&self, id: &str) -> Result<HabitStats, HabitError> {
        let habit = self
            .get(id)
            .ok_or_else(|| HabitError::NotFound(id.to_string()))?;
        Ok(completion::stats(habit, self.clock.now()))
    }

    pub fn partition(&self) -> HabitBuckets {
        schedule::partition(&self.habits, self.clock.now())
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Habit, HabitError> {
        self.habits
            .iter_mut()
            .find(|habit| habit.id == id)
            .ok_or_else(|| HabitError::NotFound(id.to_string()))
    }

    fn commit(&self) {
        if let Err(err) = save_json(self.store.as_ref(), HABITS_STORAGE_KEY, &self.habits) {
            warn!(%err, "failed to persist habits, keeping in-memory state");
        }
        for subscriber in &self.subscribers {
            subscriber(&self.habits);
        }
    }
}

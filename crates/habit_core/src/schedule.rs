use std::collections::BTreeSet;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::habit::{Habit, Schedule, ScheduleTime};
use crate::weekday::Weekday;

pub fn is_scheduled_today(days: &BTreeSet<Weekday>, now: NaiveDateTime) -> bool {
    days.contains(&Weekday::of(now))
}

/// Minute resolution; reaching the exact minute counts.
pub fn is_time_reached(time: ScheduleTime, now: NaiveDateTime) -> bool {
    now.hour() * 60 + now.minute() >= time.minutes_from_midnight()
}

pub fn is_active_now(days: &BTreeSet<Weekday>, time: ScheduleTime, now: NaiveDateTime) -> bool {
    is_scheduled_today(days, now) && is_time_reached(time, now)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HabitState {
    /// Scheduled today and its time has come.
    Active,
    /// Scheduled today, later on.
    Upcoming,
    Other,
}

pub fn classify(schedule: &Schedule, now: NaiveDateTime) -> HabitState {
    if !is_scheduled_today(&schedule.days, now) {
        HabitState::Other
    } else if is_time_reached(schedule.time, now) {
        HabitState::Active
    } else {
        HabitState::Upcoming
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitBuckets {
    pub active: Vec<Habit>,
    pub upcoming: Vec<Habit>,
    pub other: Vec<Habit>,
}

/// Splits habits into the three disjoint home-screen groups, preserving input order.
pub fn partition(habits: &[Habit], now: NaiveDateTime) -> HabitBuckets {
    let mut buckets = HabitBuckets::default();
    for habit in habits {
        let bucket = match classify(&habit.schedule, now) {
            HabitState::Active => &mut buckets.active,
            HabitState::Upcoming => &mut buckets.upcoming,
            HabitState::Other => &mut buckets.other,
        };
        bucket.push(habit.clone());
    }
    buckets
}

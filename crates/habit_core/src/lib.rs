pub mod clock;
pub mod completion;
pub mod error;
pub mod habit;
pub mod messages;
pub mod motivation;
pub mod notifications;
pub mod occurrence;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod store;
pub mod weekday;

pub use crate::habit::{Habit, HabitCategory, Schedule, ScheduleTime};
pub use crate::service::{HabitService, HabitServiceBuilder, SyncSummary};
pub use crate::weekday::Weekday;

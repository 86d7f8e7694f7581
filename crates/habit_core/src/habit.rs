use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::HabitError;
use crate::weekday::Weekday;

pub type HabitId = String;

/// Display grouping only; scheduling never looks at it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HabitCategory {
    Study,
    Exercise,
    Health,
    Work,
    #[default]
    Personal,
    Discipline,
}

impl HabitCategory {
    pub const ALL: [HabitCategory; 6] = [
        HabitCategory::Study,
        HabitCategory::Exercise,
        HabitCategory::Health,
        HabitCategory::Work,
        HabitCategory::Personal,
        HabitCategory::Discipline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HabitCategory::Study => "study",
            HabitCategory::Exercise => "exercise",
            HabitCategory::Health => "health",
            HabitCategory::Work => "work",
            HabitCategory::Personal => "personal",
            HabitCategory::Discipline => "discipline",
        }
    }
}

impl fmt::Display for HabitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HabitCategory {
    type Err = HabitError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| HabitError::InvalidCategory(input.to_string()))
    }
}

/// 24-hour time of day, stored as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleTime {
    hour: u32,
    minute: u32,
}

impl ScheduleTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, HabitError> {
        if hour > 23 || minute > 59 {
            return Err(HabitError::InvalidTime(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// For constants; out-of-range values fail at compile time.
    pub const fn from_hm(hour: u32, minute: u32) -> Self {
        assert!(hour <= 23 && minute <= 59, "time out of range");
        Self { hour, minute }
    }

    pub fn hour(self) -> u32 {
        self.hour
    }

    pub fn minute(self) -> u32 {
        self.minute
    }

    pub fn minutes_from_midnight(self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn seconds_from_midnight(self) -> u32 {
        self.minutes_from_midnight() * 60
    }

    pub fn as_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ScheduleTime {
    type Err = HabitError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || HabitError::InvalidTime(input.to_string());
        let (hour, minute) = input.trim().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ScheduleTime {
    type Error = HabitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleTime> for String {
    fn from(time: ScheduleTime) -> Self {
        time.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub days: BTreeSet<Weekday>,
    pub time: ScheduleTime,
}

impl Schedule {
    pub fn new(days: impl IntoIterator<Item = Weekday>, time: ScheduleTime) -> Self {
        Self {
            days: days.into_iter().collect(),
            time,
        }
    }

    /// `"Mon, Wed - 07:00"`, days in calendar order.
    pub fn label(&self) -> String {
        if self.days.is_empty() {
            return self.time.to_string();
        }
        let days: Vec<&str> = self.days.iter().map(|day| day.label()).collect();
        format!("{} - {}", days.join(", "), self.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub title: String,
    pub category: HabitCategory,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub schedule: Schedule,
    #[serde(default)]
    pub completions: BTreeMap<NaiveDate, bool>,
}

/// Trims the title and checks the invariants shared by create and update.
pub fn validate_fields(title: &str, schedule: &Schedule) -> Result<String, HabitError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(HabitError::EmptyTitle);
    }
    if schedule.days.is_empty() {
        return Err(HabitError::EmptySchedule);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_schedule_time() {
        let time: ScheduleTime = "7:05".parse().unwrap();
        assert_eq!((time.hour(), time.minute()), (7, 5));
        assert_eq!(time.to_string(), "07:05");
        assert_eq!(time.seconds_from_midnight(), 7 * 3600 + 5 * 60);

        assert!("24:00".parse::<ScheduleTime>().is_err());
        assert!("12:60".parse::<ScheduleTime>().is_err());
        assert!("12:5".parse::<ScheduleTime>().is_err());
        assert!("noon".parse::<ScheduleTime>().is_err());
    }

    #[test]
    fn habit_round_trips_through_stored_json_shape() {
        let raw = r#"{
            "id": "1730000000000-abc",
            "title": "Read",
            "category": "study",
            "createdAt": 1730000000000,
            "schedule": { "days": ["wed", "mon", "wed"], "time": "07:00" },
            "completions": { "2025-10-20": true, "2025-10-21": false }
        }"#;
        let habit: Habit = serde_json::from_str(raw).expect("stored habit parses");
        assert_eq!(habit.category, HabitCategory::Study);
        assert_eq!(
            habit.schedule.days.iter().copied().collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Wed]
        );
        assert_eq!(habit.schedule.label(), "Mon, Wed - 07:00");
        assert_eq!(
            habit
                .completions
                .get(&NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()),
            Some(&true)
        );

        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["createdAt"], 1730000000000i64);
        assert_eq!(json["schedule"]["time"], "07:00");
        assert_eq!(json["completions"]["2025-10-21"], false);
    }

    #[test]
    fn rejects_blank_title_and_empty_days() {
        let time = ScheduleTime::new(7, 0).unwrap();
        assert_eq!(
            validate_fields("   ", &Schedule::new([Weekday::Mon], time)),
            Err(HabitError::EmptyTitle)
        );
        assert_eq!(
            validate_fields("Read", &Schedule::new([], time)),
            Err(HabitError::EmptySchedule)
        );
        assert_eq!(
            validate_fields("  Read ", &Schedule::new([Weekday::Mon], time)).unwrap(),
            "Read"
        );
    }

    #[test]
    fn category_parsing_is_case_insensitive() {
        assert_eq!("Exercise".parse::<HabitCategory>().unwrap(), HabitCategory::Exercise);
        assert!("gardening".parse::<HabitCategory>().is_err());
    }
}

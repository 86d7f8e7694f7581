use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::HabitError;

/// Day tags used by habit schedules. Ordering follows the display order, Monday first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }

    /// Local calendar day-of-week index, Sunday = 0.
    pub fn days_from_sunday(self) -> u32 {
        u32::from(self.platform_index()) - 1
    }

    /// Weekday number expected by the platform trigger API (Sunday = 1 .. Saturday = 7).
    pub fn platform_index(self) -> u8 {
        match self {
            Weekday::Sun => 1,
            Weekday::Mon => 2,
            Weekday::Tue => 3,
            Weekday::Wed => 4,
            Weekday::Thu => 5,
            Weekday::Fri => 6,
            Weekday::Sat => 7,
        }
    }

    pub fn from_platform_index(index: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|day| day.platform_index() == index)
    }

    /// Weekday of a local wall-clock moment.
    pub fn of(moment: NaiveDateTime) -> Self {
        moment.weekday().into()
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => chrono::Weekday::Mon,
            Weekday::Tue => chrono::Weekday::Tue,
            Weekday::Wed => chrono::Weekday::Wed,
            Weekday::Thu => chrono::Weekday::Thu,
            Weekday::Fri => chrono::Weekday::Fri,
            Weekday::Sat => chrono::Weekday::Sat,
            Weekday::Sun => chrono::Weekday::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = HabitError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        chrono::Weekday::from_str(input.trim())
            .map(Weekday::from)
            .map_err(|_| HabitError::InvalidWeekday(input.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn platform_table_matches_sunday_first_convention() {
        assert_eq!(Weekday::Sun.platform_index(), 1);
        assert_eq!(Weekday::Mon.platform_index(), 2);
        assert_eq!(Weekday::Sat.platform_index(), 7);
        for day in Weekday::ALL {
            assert_eq!(Weekday::from_platform_index(day.platform_index()), Some(day));
        }
        assert_eq!(Weekday::from_platform_index(0), None);
        assert_eq!(Weekday::from_platform_index(8), None);
    }

    #[test]
    fn sunday_indexes_agree_with_chrono() {
        for day in Weekday::ALL {
            let chrono_day: chrono::Weekday = day.into();
            assert_eq!(day.days_from_sunday(), chrono_day.num_days_from_sunday());
        }
    }

    #[test]
    fn weekday_of_local_moment() {
        // 2025-10-21 is a Tuesday.
        let moment = NaiveDate::from_ymd_opt(2025, 10, 21)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(Weekday::of(moment), Weekday::Tue);
    }

    #[test]
    fn parses_short_and_long_names() {
        assert_eq!("mon".parse::<Weekday>().unwrap(), Weekday::Mon);
        assert_eq!("Thu".parse::<Weekday>().unwrap(), Weekday::Thu);
        assert_eq!("sunday".parse::<Weekday>().unwrap(), Weekday::Sun);
        assert!("monsoon".parse::<Weekday>().is_err());
        assert!("xyz".parse::<Weekday>().is_err());
    }

    #[test]
    fn serializes_lowercase_tags() {
        let json = serde_json::to_string(&vec![Weekday::Tue, Weekday::Thu]).unwrap();
        assert_eq!(json, r#"["tue","thu"]"#);
    }
}

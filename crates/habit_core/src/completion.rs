use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::HabitError;
use crate::habit::Habit;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Result<NaiveDate, HabitError> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT)
        .map_err(|_| HabitError::InvalidDateKey(key.to_string()))
}

pub fn is_completed(habit: &Habit, date: NaiveDate) -> bool {
    habit.completions.get(&date).copied().unwrap_or(false)
}

/// Flips today's entry and returns the new value.
pub fn toggle_today(habit: &mut Habit, now: NaiveDateTime) -> bool {
    let today = now.date();
    let next = !is_completed(habit, today);
    habit.completions.insert(today, next);
    next
}

pub fn set_completion(
    habit: &mut Habit,
    date: NaiveDate,
    value: bool,
    now: NaiveDateTime,
) -> Result<(), HabitError> {
    reject_future(date, now)?;
    habit.completions.insert(date, value);
    Ok(())
}

pub fn toggle_completion_for_date(
    habit: &mut Habit,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<bool, HabitError> {
    reject_future(date, now)?;
    let next = !is_completed(habit, date);
    habit.completions.insert(date, next);
    Ok(next)
}

/// Consecutive completed days ending today. An unfinished today yields zero.
///
/// The walk has no lookback cap: it ends at the first day without a `true` entry,
/// so it never runs longer than the completion map.
pub fn current_streak(habit: &Habit, now: NaiveDateTime) -> u32 {
    let mut day = now.date();
    let mut streak = 0;
    while is_completed(habit, day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

pub fn total_completions(habit: &Habit) -> usize {
    habit.completions.values().filter(|done| **done).count()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub current_streak: u32,
    pub total_completions: usize,
    pub completed_today: bool,
}

pub fn stats(habit: &Habit, now: NaiveDateTime) -> HabitStats {
    HabitStats {
        current_streak: current_streak(habit, now),
        total_completions: total_completions(habit),
        completed_today: is_completed(habit, now.date()),
    }
}

fn reject_future(date: NaiveDate, now: NaiveDateTime) -> Result<(), HabitError> {
    if date > now.date() {
        return Err(HabitError::FutureDate(date));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{HabitCategory, Schedule};
    use crate::weekday::Weekday;
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn habit_with(entries: &[(i64, bool)]) -> Habit {
        let today = now().date();
        Habit {
            id: "h".into(),
            title: "Stretch".into(),
            category: HabitCategory::Health,
            created_at: 0,
            schedule: Schedule::new([Weekday::Mon], "07:00".parse().unwrap()),
            completions: entries
                .iter()
                .map(|(offset, done)| (today - Duration::days(*offset), *done))
                .collect(),
        }
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let habit = habit_with(&[(0, true), (1, true), (2, false), (3, true)]);
        assert_eq!(current_streak(&habit, now()), 2);
    }

    #[test]
    fn unfinished_today_means_no_streak() {
        assert_eq!(current_streak(&habit_with(&[(0, false), (1, true)]), now()), 0);
        assert_eq!(current_streak(&habit_with(&[(1, true), (2, true)]), now()), 0);
    }

    #[test]
    fn streak_crosses_month_boundary_and_is_not_capped() {
        // 2025-03-02 back through February and beyond a hundred days.
        let entries: Vec<(i64, bool)> = (0..150).map(|offset| (offset, true)).collect();
        assert_eq!(current_streak(&habit_with(&entries), now()), 150);
    }

    #[test]
    fn toggling_twice_restores_the_original_state() {
        let mut habit = habit_with(&[]);
        assert!(toggle_today(&mut habit, now()));
        assert!(!toggle_today(&mut habit, now()));
        assert_eq!(habit.completions.get(&now().date()), Some(&false));
        assert_eq!(total_completions(&habit), 0);
    }

    #[test]
    fn future_dates_are_rejected() {
        let mut habit = habit_with(&[]);
        let tomorrow = now().date() + Duration::days(1);
        assert_eq!(
            set_completion(&mut habit, tomorrow, true, now()),
            Err(HabitError::FutureDate(tomorrow))
        );
        assert!(toggle_completion_for_date(&mut habit, tomorrow, now()).is_err());
        assert!(habit.completions.is_empty());

        let last_week = now().date() - Duration::days(7);
        set_completion(&mut habit, last_week, true, now()).unwrap();
        assert_eq!(total_completions(&habit), 1);
    }

    #[test]
    fn stats_summarize_history() {
        let habit = habit_with(&[(0, true), (1, true), (5, true), (6, false)]);
        assert_eq!(
            stats(&habit, now()),
            HabitStats {
                current_streak: 2,
                total_completions: 3,
                completed_today: true,
            }
        );
    }

    #[test]
    fn date_keys_round_trip() {
        let date = parse_date_key("2025-01-09").unwrap();
        assert_eq!(date_key(date), "2025-01-09");
        assert!(parse_date_key("09/01/2025").is_err());
    }
}

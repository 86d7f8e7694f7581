//! Countdown arithmetic for weekly slots on top of a "fire once after N seconds" timer.
//!
//! All values are local wall-clock seconds. A DST shift between submission and firing
//! moves the delivery by the size of the shift; the next re-arm recomputes from the
//! wall clock and lands on the right time again. A delivery that arrives shortly before
//! its slot still counts as that slot, so re-arming never targets the same slot twice.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::habit::ScheduleTime;
use crate::weekday::Weekday;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
/// Smallest delay ever handed to the platform.
pub const DEFAULT_MIN_DELAY_SECS: u64 = 5;
/// How long before its slot a fired timer still counts as that slot: a one-hour DST
/// shift plus clock skew.
pub const DEFAULT_EARLY_FIRE_TOLERANCE_SECS: u64 = 2 * 3600;

/// Seconds from `now` until the next `weekday` at `time`.
///
/// When `weekday` is today and the clock has reached `time` (to the second, equality
/// included), the slot is considered gone and the result is a full week out. The
/// result is always at least one second.
pub fn seconds_until(weekday: Weekday, time: ScheduleTime, now: NaiveDateTime) -> i64 {
    let now_index = i64::from(Weekday::of(now).days_from_sunday());
    let target_index = i64::from(weekday.days_from_sunday());
    let now_secs = i64::from(now.num_seconds_from_midnight());
    let target_secs = i64::from(time.seconds_from_midnight());

    let mut days_until = target_index - now_index;
    if days_until == 0 {
        if now_secs < target_secs {
            return target_secs - now_secs;
        }
        days_until = 7;
    } else if days_until < 0 {
        days_until += 7;
    }

    days_until * SECONDS_PER_DAY + target_secs - now_secs
}

/// Seconds from `now` until `time` comes around again, today or tomorrow.
pub fn seconds_until_daily(time: ScheduleTime, now: NaiveDateTime) -> i64 {
    let now_secs = i64::from(now.num_seconds_from_midnight());
    let target_secs = i64::from(time.seconds_from_midnight());
    if now_secs < target_secs {
        target_secs - now_secs
    } else {
        SECONDS_PER_DAY + target_secs - now_secs
    }
}

/// Seconds from `fired_at` until the slot after the one that just fired.
///
/// A slot no more than `tolerance` seconds ahead is the one being delivered early, so the
/// countdown runs from that slot to its next week instead.
pub fn rearm_seconds(
    weekday: Weekday,
    time: ScheduleTime,
    fired_at: NaiveDateTime,
    tolerance: u64,
) -> i64 {
    skip_early_slot(seconds_until(weekday, time, fired_at), SECONDS_PER_WEEK, tolerance)
}

/// Daily counterpart of [`rearm_seconds`].
pub fn rearm_seconds_daily(time: ScheduleTime, fired_at: NaiveDateTime, tolerance: u64) -> i64 {
    skip_early_slot(seconds_until_daily(time, fired_at), SECONDS_PER_DAY, tolerance)
}

fn skip_early_slot(ahead: i64, period: i64, tolerance: u64) -> i64 {
    if ahead <= i64::try_from(tolerance).unwrap_or(i64::MAX) {
        ahead + period
    } else {
        ahead
    }
}

/// Delay to submit for a weekly slot, never below `min_delay`.
pub fn weekly_delay(
    weekday: Weekday,
    time: ScheduleTime,
    now: NaiveDateTime,
    min_delay: u64,
) -> u64 {
    clamp_delay(seconds_until(weekday, time, now), min_delay)
}

pub fn daily_delay(time: ScheduleTime, now: NaiveDateTime, min_delay: u64) -> u64 {
    clamp_delay(seconds_until_daily(time, now), min_delay)
}

/// Re-arm delay for a fired weekly slot, never below `min_delay`.
pub fn weekly_rearm_delay(
    weekday: Weekday,
    time: ScheduleTime,
    fired_at: NaiveDateTime,
    tolerance: u64,
    min_delay: u64,
) -> u64 {
    clamp_delay(rearm_seconds(weekday, time, fired_at, tolerance), min_delay)
}

pub fn daily_rearm_delay(
    time: ScheduleTime,
    fired_at: NaiveDateTime,
    tolerance: u64,
    min_delay: u64,
) -> u64 {
    clamp_delay(rearm_seconds_daily(time, fired_at, tolerance), min_delay)
}

/// Wall-clock moment of the next occurrence, truncated to whole seconds.
pub fn next_occurrence(
    weekday: Weekday,
    time: ScheduleTime,
    now: NaiveDateTime,
) -> NaiveDateTime {
    let base = now.with_nanosecond(0).unwrap_or(now);
    base + Duration::seconds(seconds_until(weekday, time, now))
}

fn clamp_delay(seconds: i64, min_delay: u64) -> u64 {
    u64::try_from(seconds).unwrap_or(0).max(min_delay)
}

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use habit_core::clock::{Clock, ManualClock};
use habit_core::notifications::{
    habit_tag, InMemoryPlatform, NotificationPayload, NotificationPlatform, Permission,
    DAILY_REMINDER_TAG,
};
use habit_core::occurrence::{weekly_delay, DEFAULT_MIN_DELAY_SECS};
use habit_core::registry::HABITS_STORAGE_KEY;
use habit_core::store::JsonFileStore;
use habit_core::{HabitCategory, HabitService, Schedule, ScheduleTime, Weekday};
use tempfile::tempdir;

fn tuesday_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 21)
        .expect("valid date")
        .and_hms_opt(12, 0, 0)
        .expect("valid time")
}

fn schedule(days: &[Weekday], time: &str) -> Schedule {
    Schedule::new(days.iter().copied(), time.parse().expect("valid time"))
}

fn in_memory_service() -> (Arc<ManualClock>, Arc<InMemoryPlatform>, HabitService) {
    let clock = Arc::new(ManualClock::new(tuesday_noon()));
    let platform = Arc::new(InMemoryPlatform::new(clock.clone()));
    let service = HabitService::builder()
        .with_clock(clock.clone())
        .with_notification_platform(platform.clone())
        .build()
        .expect("build habit service");
    (clock, platform, service)
}

#[test]
fn tuesday_thursday_habit_submits_one_timer_per_weekday() {
    let (clock, platform, service) = in_memory_service();
    let time: ScheduleTime = "16:00".parse().expect("valid time");
    let habit = service
        .create_habit(
            "Gym",
            HabitCategory::Exercise,
            schedule(&[Weekday::Tue, Weekday::Thu], "16:00"),
        )
        .expect("create habit");

    let submissions = platform.submissions();
    assert_eq!(submissions.len(), 2);
    let mut seen = Vec::new();
    for timer in &submissions {
        let NotificationPayload::Habit(request) = &timer.content.payload else {
            panic!("expected a habit payload, got {:?}", timer.content.payload);
        };
        assert_eq!(request.habit_id, habit.id);
        assert_eq!(request.tag, habit_tag(&habit.id));
        assert_eq!(
            timer.delay_seconds,
            weekly_delay(request.weekday, time, clock.now(), DEFAULT_MIN_DELAY_SECS)
        );
        seen.push(request.weekday);
    }
    seen.sort();
    assert_eq!(seen, vec![Weekday::Tue, Weekday::Thu]);
}

#[test]
fn removing_a_habit_cancels_its_timers() {
    let (_clock, platform, service) = in_memory_service();
    let keep = service
        .create_habit("Read", HabitCategory::Study, schedule(&[Weekday::Mon], "07:00"))
        .expect("create habit");
    let drop = service
        .create_habit(
            "Gym",
            HabitCategory::Exercise,
            schedule(&[Weekday::Tue, Weekday::Sat], "18:00"),
        )
        .expect("create habit");

    service.remove_habit(&drop.id).expect("remove habit");

    assert!(platform.cancelled_tags().contains(&habit_tag(&drop.id)));
    let remaining = platform.pending().expect("pending timers");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content.payload.habit_id(), Some(keep.id.as_str()));
    assert!(service.habit(&drop.id).is_none());
}

#[test]
fn denied_permission_keeps_the_habit_and_schedules_nothing() {
    let (_clock, platform, service) = in_memory_service();
    platform.set_permission(Permission::Denied, false);

    let habit = service
        .create_habit("Read", HabitCategory::Study, schedule(&[Weekday::Mon], "07:00"))
        .expect("create habit");
    let summary = service.resync_notifications();

    assert!(summary.enabled);
    assert!(!summary.permitted);
    assert!(platform.submissions().is_empty());
    assert_eq!(service.habits(), vec![habit]);
}

#[test]
fn fire_and_rearm_loop_holds_wall_clock_times_for_two_weeks() {
    let (clock, platform, service) = in_memory_service();
    service
        .create_habit(
            "Run",
            HabitCategory::Exercise,
            schedule(&[Weekday::Mon, Weekday::Wed], "07:00"),
        )
        .expect("create habit");
    service.resync_notifications();

    let end = tuesday_noon() + Duration::days(14);
    let mut habit_fires = Vec::new();
    let mut reminder_fires = Vec::new();
    loop {
        let due = match platform.next_due() {
            Some(due) if due <= end => due,
            _ => break,
        };
        clock.set(due);
        for timer in platform.take_due() {
            if timer.content.payload.tag() == DAILY_REMINDER_TAG {
                reminder_fires.push(due);
            } else {
                habit_fires.push(due);
            }
            service
                .handle_fired(timer.content)
                .expect("re-arm fired timer")
                .expect("timer should be re-armed");
        }
    }

    let seven = NaiveTime::from_hms_opt(7, 0, 0).expect("valid time");
    let nine = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
    assert_eq!(habit_fires.len(), 4);
    for fired in &habit_fires {
        assert_eq!(fired.time(), seven);
        assert!(matches!(Weekday::of(*fired), Weekday::Mon | Weekday::Wed));
    }
    assert_eq!(reminder_fires.len(), 14);
    assert!(reminder_fires.iter().all(|fired| fired.time() == nine));
    // Two habit slots and the daily reminder stay armed.
    assert_eq!(platform.pending_timers().len(), 3);
}

#[test]
fn disabling_notifications_stops_rearming() {
    let (clock, platform, service) = in_memory_service();
    service
        .create_habit("Read", HabitCategory::Study, schedule(&[Weekday::Tue], "16:00"))
        .expect("create habit");
    clock.advance(Duration::hours(4));
    let fired = platform.take_due();
    assert_eq!(fired.len(), 1);

    service.set_notifications_enabled(false);
    let rearmed = service
        .handle_fired(fired[0].content.clone())
        .expect("handle fired timer");
    assert!(rearmed.is_none());
    assert!(platform.pending_timers().is_empty());
}

#[test]
fn json_file_store_round_trips_the_whole_state() {
    let temp = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(tuesday_noon()));
    let platform = Arc::new(InMemoryPlatform::new(clock.clone()));
    let store = Arc::new(JsonFileStore::new(temp.path()));

    let service = HabitService::builder()
        .with_store(store.clone())
        .with_clock(clock.clone())
        .with_notification_platform(platform.clone())
        .build()
        .expect("build habit service");
    let habit = service
        .create_habit("Read", HabitCategory::Study, schedule(&[Weekday::Tue], "07:00"))
        .expect("create habit");
    service.toggle_today(&habit.id).expect("toggle today");
    service
        .set_completion(&habit.id, "2025-10-20", true)
        .expect("backfill yesterday");
    service.set_notification_time("20:15".parse().expect("valid time"));
    service
        .add_motivation("https://example.com/pump-up.mp3", None, None)
        .expect("add motivation");
    assert!(store.path_for(HABITS_STORAGE_KEY).exists());

    let reopened = HabitService::builder()
        .with_store(Arc::new(JsonFileStore::new(temp.path())))
        .with_clock(clock)
        .with_notification_platform(platform)
        .build()
        .expect("rebuild habit service");
    assert_eq!(reopened.habits(), service.habits());
    assert_eq!(reopened.stats(&habit.id).expect("stats").current_streak, 2);
    assert_eq!(
        reopened.settings().notification_time,
        ScheduleTime::from_hm(20, 15)
    );
    assert_eq!(reopened.motivation_items().len(), 1);
}

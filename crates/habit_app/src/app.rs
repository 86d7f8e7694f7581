use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use habit_core::clock::{Clock, SystemClock};
use habit_core::error::HabitError;
use habit_core::notifications::HABITS_CHANNEL_ID;
use habit_core::occurrence::DEFAULT_MIN_DELAY_SECS;
use habit_core::store::{JsonFileStore, KeyValueStore};
use habit_core::{Habit, HabitCategory, HabitService, Schedule, ScheduleTime, Weekday};
use tracing::{debug, info, warn};

use crate::platform::FileTimerPlatform;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub channel: String,
    pub min_delay_secs: u64,
    pub rearm_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("HABIT_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(channel) = std::env::var("HABIT_CHANNEL_ID") {
            if !channel.trim().is_empty() {
                config.channel = channel.trim().to_string();
            }
        }
        if let Ok(delay) = std::env::var("HABIT_MIN_DELAY_SECS") {
            if let Ok(value) = delay.trim().parse::<u64>() {
                config.min_delay_secs = value;
            }
        }
        if let Ok(attempts) = std::env::var("HABIT_REARM_ATTEMPTS") {
            if let Ok(value) = attempts.trim().parse::<u32>() {
                if value > 0 {
                    config.rearm_attempts = value;
                }
            }
        }
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./habit-data"),
            channel: HABITS_CHANNEL_ID.to_string(),
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            rearm_attempts: 3,
        }
    }
}

/// Fields shared by `add` and `edit`.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct HabitDraft {
    /// Habit title
    pub title: String,
    /// One of health, study, work, personal
    #[arg(value_parser = parse_category)]
    pub category: HabitCategory,
    /// Comma-separated weekdays, e.g. "mon,wed,fri"
    #[arg(value_parser = parse_days)]
    pub days: BTreeSet<Weekday>,
    /// Reminder time as HH:MM
    #[arg(value_parser = parse_time)]
    pub time: ScheduleTime,
}

impl HabitDraft {
    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.days.iter().copied(), self.time)
    }
}

#[derive(Parser, Debug)]
#[command(name = "habit_tracker", version, about = "Weekly habit tracker with reminders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command; a bare invocation lists habits.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::List)
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show habits grouped into active, upcoming and other
    List,
    /// Create a habit and arm its reminders
    Add(HabitDraft),
    /// Replace a habit's title, category and schedule
    Edit {
        id: String,
        #[command(flatten)]
        draft: HabitDraft,
    },
    /// Flip today's completion
    Toggle { id: String },
    /// Record a completion for a past or current date
    Set {
        id: String,
        /// Date as YYYY-MM-DD
        date: String,
        /// true/false, on/off, yes/no or 1/0
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        done: bool,
    },
    /// Delete a habit and cancel its reminders
    Remove { id: String },
    /// Print completion statistics as JSON
    Stats { id: String },
    /// Turn reminders on or off
    Notifications {
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        enabled: bool,
    },
    /// Deliver reminders that are due and re-arm them
    Tick,
}

fn parse_category(raw: &str) -> Result<HabitCategory, HabitError> {
    raw.parse()
}

fn parse_time(raw: &str) -> Result<ScheduleTime, HabitError> {
    raw.parse()
}

fn parse_days(raw: &str) -> Result<BTreeSet<Weekday>, HabitError> {
    let days = raw
        .split(',')
        .map(str::trim)
        .filter(|day| !day.is_empty())
        .map(str::parse::<Weekday>)
        .collect::<Result<BTreeSet<_>, _>>()?;
    if days.is_empty() {
        return Err(HabitError::EmptySchedule);
    }
    Ok(days)
}

/// The service plus the timer platform behind it, opened from one data directory.
pub struct Session {
    pub service: HabitService,
    pub timers: Arc<FileTimerPlatform>,
}

impl Session {
    pub fn open(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        info!(path = %config.data_dir.display(), "opening habit data");
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&config.data_dir));
        let timers = Arc::new(
            FileTimerPlatform::open(store.clone(), clock.clone())
                .context("failed to load pending timers")?,
        );
        let service = HabitService::builder()
            .with_store(store)
            .with_clock(clock)
            .with_notification_platform(timers.clone())
            .with_channel(config.channel.clone())
            .with_min_delay(config.min_delay_secs)
            .with_rearm_attempts(config.rearm_attempts)
            .build()
            .context("failed to initialize habit service")?;
        Ok(Self { service, timers })
    }

    /// Runs one command and returns what should be printed.
    pub fn execute(&self, command: Command) -> Result<String> {
        debug!(?command, "executing command");
        let service = &self.service;
        let mut out = String::new();
        match command {
            Command::List => self.render_list(&mut out)?,
            Command::Add(draft) => {
                let habit =
                    service.create_habit(&draft.title, draft.category, draft.schedule())?;
                writeln!(out, "created {} ({})", habit.title, habit.id)?;
            }
            Command::Edit { id, draft } => {
                let habit =
                    service.update_habit(&id, &draft.title, draft.category, draft.schedule())?;
                writeln!(out, "updated {} ({})", habit.title, habit.schedule.label())?;
            }
            Command::Toggle { id } => {
                let done = service.toggle_today(&id)?;
                writeln!(out, "{}", if done { "done today" } else { "not done today" })?;
            }
            Command::Set { id, date, done } => {
                service.set_completion(&id, &date, done)?;
                writeln!(out, "{date}: {}", if done { "done" } else { "not done" })?;
            }
            Command::Remove { id } => {
                let habit = service.remove_habit(&id)?;
                writeln!(out, "removed {}", habit.title)?;
            }
            Command::Stats { id } => {
                let stats = service.stats(&id)?;
                let json = serde_json::to_string_pretty(&stats)
                    .context("failed to render stats")?;
                writeln!(out, "{json}")?;
            }
            Command::Notifications { enabled } => {
                let summary = service.set_notifications_enabled(enabled);
                if !summary.enabled {
                    writeln!(out, "notifications off")?;
                } else if !summary.permitted {
                    writeln!(out, "notifications on, but permission was denied")?;
                } else {
                    writeln!(
                        out,
                        "notifications on: {} habit timers, daily reminder {}",
                        summary.habit_slots,
                        if summary.daily_reminder { "armed" } else { "failed" }
                    )?;
                }
            }
            Command::Tick => self.deliver_due(&mut out)?,
        }
        Ok(out)
    }

    fn render_list(&self, out: &mut String) -> Result<()> {
        let buckets = self.service.partition();
        let today = self.service.now().date();
        for (label, habits) in [
            ("Active", &buckets.active),
            ("Upcoming", &buckets.upcoming),
            ("Other", &buckets.other),
        ] {
            if habits.is_empty() {
                continue;
            }
            writeln!(out, "{label}:")?;
            for habit in habits {
                writeln!(out, "  {}", describe(habit, today))?;
            }
        }
        if out.is_empty() {
            writeln!(out, "no habits yet")?;
        }
        Ok(())
    }

    fn deliver_due(&self, out: &mut String) -> Result<()> {
        let fired = self.timers.fire_due().context("failed to read due timers")?;
        for timer in fired {
            let content = &timer.content;
            writeln!(out, "[{}] {}: {}", timer.channel, content.title, content.body)?;
            match self.service.handle_fired(timer.content) {
                Ok(Some(id)) => debug!(%id, "timer re-armed"),
                Ok(None) => {}
                Err(err) => warn!(%err, "fired timer could not be re-armed"),
            }
        }
        Ok(())
    }
}

fn describe(habit: &Habit, today: chrono::NaiveDate) -> String {
    let mark = if habit.completions.get(&today).copied().unwrap_or(false) {
        "[x]"
    } else {
        "[ ]"
    };
    format!(
        "{mark} {} ({}, {}) {}",
        habit.title,
        habit.category,
        habit.schedule.label(),
        habit.id
    )
}

pub fn run(config: AppConfig, command: Command) -> Result<()> {
    let session = Session::open(&config, Arc::new(SystemClock))?;
    let output = session.execute(command)?;
    print!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use habit_core::clock::ManualClock;
    use tempfile::tempdir;

    fn clock() -> Arc<ManualClock> {
        // Tuesday morning.
        Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2025, 10, 21)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        ))
    }

    fn config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            ..AppConfig::default()
        }
    }

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        let argv = std::iter::once("habit_tracker").chain(args.iter().copied());
        Cli::try_parse_from(argv).map(Cli::into_command)
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(parse(&[]).unwrap(), Command::List);
        let add = parse(&["add", "Read", "study", "mon,wed", "07:00"]).unwrap();
        let Command::Add(draft) = add else {
            panic!("expected add, got {add:?}");
        };
        assert_eq!(draft.category, HabitCategory::Study);
        assert_eq!(draft.schedule().label(), "Mon, Wed - 07:00");
        let edit = parse(&["edit", "abc", "Run", "health", "fri", "18:15"]).unwrap();
        let Command::Edit { id, draft } = edit else {
            panic!("expected edit, got {edit:?}");
        };
        assert_eq!(id, "abc");
        assert_eq!(draft.schedule().label(), "Fri - 18:15");
        assert_eq!(
            parse(&["set", "abc", "2025-10-20", "true"]).unwrap(),
            Command::Set {
                id: "abc".into(),
                date: "2025-10-20".into(),
                done: true
            }
        );
        assert_eq!(
            parse(&["notifications", "off"]).unwrap(),
            Command::Notifications { enabled: false }
        );
        assert_eq!(parse(&["tick"]).unwrap(), Command::Tick);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse(&["add", "Read", "study"]).is_err());
        assert!(parse(&["add", "Read", "napping", "mon", "07:00"]).is_err());
        assert!(parse(&["add", "Read", "study", "someday", "07:00"]).is_err());
        assert!(parse(&["add", "Read", "study", ",", "07:00"]).is_err());
        assert!(parse(&["add", "Read", "study", "mon", "25:00"]).is_err());
        assert!(parse(&["notifications", "maybe"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn invalid_values_report_the_domain_error() {
        let err = parse(&["add", "Read", "study", "someday", "07:00"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("unknown weekday `someday`"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./habit-data"));
        assert_eq!(config.channel, "habits-v2");
        assert_eq!(config.min_delay_secs, 5);
        assert_eq!(config.rearm_attempts, 3);
    }

    #[test]
    fn add_list_and_tick_across_sessions() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let session = Session::open(&config(dir.path()), clock.clone()).unwrap();
        let created = session
            .execute(parse(&["add", "Stretch", "health", "tue", "08:30"]).unwrap())
            .unwrap();
        assert!(created.starts_with("created Stretch"));
        assert_eq!(session.timers.timers().len(), 1);

        let listing = session.execute(Command::List).unwrap();
        assert!(listing.contains("Upcoming:"));
        assert!(listing.contains("[ ] Stretch (health, Tue - 08:30)"));
        drop(session);

        clock.advance(Duration::minutes(30));
        let reopened = Session::open(&config(dir.path()), clock.clone()).unwrap();
        let delivered = reopened.execute(Command::Tick).unwrap();
        assert!(delivered.starts_with("[habits-v2] Daily check-in: "));
        let timers = reopened.timers.timers();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].due, clock.now() + Duration::days(7));

        let id = reopened.service.habits()[0].id.clone();
        reopened.execute(Command::Toggle { id: id.clone() }).unwrap();
        let listing = reopened.execute(Command::List).unwrap();
        assert!(listing.contains("Active:"));
        assert!(listing.contains("[x] Stretch"));

        let stats = reopened.execute(Command::Stats { id }).unwrap();
        assert!(stats.contains("\"currentStreak\": 1"));
    }

    #[test]
    fn notifications_off_clears_stored_timers() {
        let dir = tempdir().unwrap();
        let session = Session::open(&config(dir.path()), clock()).unwrap();
        session
            .execute(parse(&["add", "Read", "study", "mon,fri", "21:00"]).unwrap())
            .unwrap();
        assert_eq!(session.timers.timers().len(), 2);

        let off = session.execute(Command::Notifications { enabled: false }).unwrap();
        assert_eq!(off, "notifications off\n");
        assert!(session.timers.timers().is_empty());

        let on = session.execute(Command::Notifications { enabled: true }).unwrap();
        assert_eq!(on, "notifications on: 2 habit timers, daily reminder armed\n");
        assert_eq!(session.timers.timers().len(), 3);
    }

    #[test]
    fn unknown_habit_is_an_error() {
        let dir = tempdir().unwrap();
        let session = Session::open(&config(dir.path()), clock()).unwrap();
        let err = session
            .execute(Command::Remove { id: "missing".into() })
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}

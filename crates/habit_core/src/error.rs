use chrono::NaiveDate;
use thiserror::Error;

/// Rejections raised while validating or mutating habits.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HabitError {
    #[error("habit title must not be empty")]
    EmptyTitle,
    #[error("habit schedule needs at least one weekday")]
    EmptySchedule,
    #[error("invalid time `{0}`, expected HH:MM")]
    InvalidTime(String),
    #[error("invalid date key `{0}`, expected YYYY-MM-DD")]
    InvalidDateKey(String),
    #[error("cannot record a completion for {0} before that day arrives")]
    FutureDate(NaiveDate),
    #[error("unknown weekday `{0}`")]
    InvalidWeekday(String),
    #[error("unknown habit category `{0}`")]
    InvalidCategory(String),
    #[error("habit `{0}` not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("tone level must be between 0 and 3, got {0}")]
    InvalidToneLevel(u8),
    #[error("unsupported locale `{0}`")]
    InvalidLocale(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MotivationError {
    #[error("motivation url must not be empty")]
    EmptyUrl,
    #[error("cannot tell which kind of media `{0}` points to")]
    UnknownKind(String),
    #[error("motivation item `{0}` not found")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON under `{key}`: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reported by the platform notification service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("notification platform rejected the request: {0}")]
    Rejected(String),
    #[error("notification platform unavailable: {0}")]
    Unavailable(String),
    #[error("timer `{0}` is not scheduled")]
    UnknownTimer(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("fired notification carries an invalid schedule: {0}")]
    InvalidPayload(#[from] HabitError),
    #[error("failed to re-arm `{tag}` after {attempts} attempts: {source}")]
    RearmFailed {
        tag: String,
        attempts: u32,
        #[source]
        source: PlatformError,
    },
}

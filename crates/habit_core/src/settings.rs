use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{SettingsError, StoreError};
use crate::habit::ScheduleTime;
use crate::store::{save_json, KeyValueStore};

pub const SETTINGS_STORAGE_KEY: &str = "@humiliateMe/settings_v1";
const DEFAULT_NOTIFICATION_TIME: ScheduleTime = ScheduleTime::from_hm(9, 0);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
    Ar,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
            Locale::Ar => "ar",
        }
    }

    /// Maps a device language tag (`es-MX`, `ar`) onto a supported locale, English otherwise.
    pub fn from_language_tag(tag: &str) -> Self {
        let language = tag.split(['-', '_']).next().unwrap_or_default();
        language.parse().unwrap_or_default()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = SettingsError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "es" => Ok(Locale::Es),
            "ar" => Ok(Locale::Ar),
            _ => Err(SettingsError::InvalidLocale(input.to_string())),
        }
    }
}

/// Severity of reminder messages, 0 (gentle) to 3 (harsh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ToneLevel(u8);

impl ToneLevel {
    pub const MAX: u8 = 3;

    pub fn new(level: u8) -> Result<Self, SettingsError> {
        if level > Self::MAX {
            return Err(SettingsError::InvalidToneLevel(level));
        }
        Ok(Self(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for ToneLevel {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for ToneLevel {
    type Error = SettingsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToneLevel> for u8 {
    fn from(tone: ToneLevel) -> Self {
        tone.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub locale: Locale,
    pub tone_level: ToneLevel,
    pub has_seen_welcome: bool,
    pub notifications_enabled: bool,
    /// Daily reminder time, independent of habit schedules.
    pub notification_time: ScheduleTime,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            tone_level: ToneLevel::default(),
            has_seen_welcome: false,
            notifications_enabled: true,
            notification_time: DEFAULT_NOTIFICATION_TIME,
        }
    }
}

/// Owns the persisted [`Settings`] record. Setters update memory first and then write the
/// whole record; a failed write is logged and memory stays authoritative.
pub struct SettingsStore {
    settings: Settings,
    hydrated: bool,
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            settings: Settings::default(),
            hydrated: false,
            store,
        }
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>, defaults: Settings) -> Self {
        Self {
            settings: defaults,
            hydrated: false,
            store,
        }
    }

    /// Fields missing from the saved record keep the values this store started with.
    pub fn hydrate(&mut self) -> Result<(), StoreError> {
        if let Some(saved) = self.store.load_value(SETTINGS_STORAGE_KEY)? {
            self.settings = merge_over(&self.settings, saved)?;
        }
        self.hydrated = true;
        Ok(())
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_locale(&mut self, locale: Locale) -> &Settings {
        self.settings.locale = locale;
        self.persist()
    }

    pub fn set_tone_level(&mut self, tone_level: ToneLevel) -> &Settings {
        self.settings.tone_level = tone_level;
        self.persist()
    }

    pub fn set_has_seen_welcome(&mut self, seen: bool) -> &Settings {
        self.settings.has_seen_welcome = seen;
        self.persist()
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) -> &Settings {
        self.settings.notifications_enabled = enabled;
        self.persist()
    }

    pub fn set_notification_time(&mut self, time: ScheduleTime) -> &Settings {
        self.settings.notification_time = time;
        self.persist()
    }

    fn persist(&self) -> &Settings {
        if let Err(err) = save_json(self.store.as_ref(), SETTINGS_STORAGE_KEY, &self.settings) {
            warn!(%err, "failed to persist settings");
        }
        &self.settings
    }
}

fn merge_over(defaults: &Settings, saved: Value) -> Result<Settings, StoreError> {
    let serde_err = |source| StoreError::Serde {
        key: SETTINGS_STORAGE_KEY.to_string(),
        source,
    };
    let fields = match saved {
        Value::Object(fields) => fields,
        other => return serde_json::from_value(other).map_err(serde_err),
    };
    let mut merged = serde_json::to_value(defaults).map_err(serde_err)?;
    if let Some(base) = merged.as_object_mut() {
        base.extend(fields);
    }
    serde_json::from_value(merged).map_err(serde_err)
}

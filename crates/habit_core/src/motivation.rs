use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{MotivationError, StoreError};
use crate::store::{load_json, save_json, KeyValueStore};

pub const MOTIVATION_STORAGE_KEY: &str = "@humiliateMe/motivation_v1";

const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];
const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".wav", ".m4a", ".aac", ".ogg"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MotivationKind {
    Youtube,
    Tiktok,
    Image,
    Audio,
}

impl fmt::Display for MotivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotivationKind::Youtube => "youtube",
            MotivationKind::Tiktok => "tiktok",
            MotivationKind::Image => "image",
            MotivationKind::Audio => "audio",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MotivationItem {
    pub id: String,
    pub kind: MotivationKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: i64,
}

/// Guesses the media kind from the link itself.
pub fn detect_kind(raw: &str) -> Option<MotivationKind> {
    let lower = raw.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return None;
    }
    if lower.contains("youtube.com/watch?v=")
        || lower.contains("youtu.be/")
        || lower.contains("youtube.com/shorts/")
    {
        return Some(MotivationKind::Youtube);
    }
    if lower.contains("tiktok.com/") {
        return Some(MotivationKind::Tiktok);
    }
    let path = lower.split('?').next().unwrap_or_default();
    if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Some(MotivationKind::Image);
    }
    if AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Some(MotivationKind::Audio);
    }
    None
}

/// Video id of a YouTube watch, shorts or youtu.be link.
pub fn youtube_id(input: &str) -> Option<String> {
    let Ok(url) = Url::parse(input.trim()) else {
        return youtube_id_fallback(input);
    };
    let host = url.host_str()?.trim_start_matches("www.");
    let mut segments = url.path_segments()?.filter(|segment| !segment.is_empty());
    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" => {
            if url.path().starts_with("/watch") {
                url.query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else if url.path().starts_with("/shorts/") {
                segments.nth(1).map(str::to_string)
            } else {
                None
            }
        }
        _ => None,
    };
    id.filter(|id| !id.is_empty())
}

fn youtube_id_fallback(input: &str) -> Option<String> {
    ["youtu.be/", "v=", "shorts/"].iter().find_map(|marker| {
        let start = input.find(marker)? + marker.len();
        let id: String = input[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        (id.len() >= 6).then_some(id)
    })
}

/// Saved motivation links, newest first.
pub struct MotivationCollection {
    items: Vec<MotivationItem>,
    hydrated: bool,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl MotivationCollection {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Vec::new(),
            hydrated: false,
            store,
            clock,
        }
    }

    pub fn hydrate(&mut self) -> Result<(), StoreError> {
        self.items = load_json(self.store.as_ref(), MOTIVATION_STORAGE_KEY)?.unwrap_or_default();
        self.hydrated = true;
        Ok(())
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn items(&self) -> &[MotivationItem] {
        &self.items
    }

    pub fn add(
        &mut self,
        url: &str,
        kind: Option<MotivationKind>,
        title: Option<&str>,
    ) -> Result<MotivationItem, MotivationError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(MotivationError::EmptyUrl);
        }
        let resolved = kind
            .or_else(|| detect_kind(trimmed))
            .or_else(|| {
                (trimmed.contains("youtu") && youtube_id(trimmed).is_some())
                    .then_some(MotivationKind::Youtube)
            })
            .ok_or_else(|| MotivationError::UnknownKind(trimmed.to_string()))?;

        let item = MotivationItem {
            id: Uuid::new_v4().to_string(),
            kind: resolved,
            url: trimmed.to_string(),
            title: non_empty(title),
            created_at: self.clock.epoch_millis(),
        };
        self.items.insert(0, item.clone());
        self.persist();
        Ok(item)
    }

    pub fn remove(&mut self, id: &str) -> Result<MotivationItem, MotivationError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| MotivationError::NotFound(id.to_string()))?;
        let removed = self.items.remove(index);
        self.persist();
        Ok(removed)
    }

    /// A blank title clears it.
    pub fn update_title(&mut self, id: &str, title: &str) -> Result<(), MotivationError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| MotivationError::NotFound(id.to_string()))?;
        item.title = non_empty(Some(title));
        self.persist();
        Ok(())
    }

    pub fn random_item(&self, kind: Option<MotivationKind>) -> Option<MotivationItem> {
        let pool: Vec<&MotivationItem> = self
            .items
            .iter()
            .filter(|item| kind.map_or(true, |wanted| item.kind == wanted))
            .collect();
        pool.choose(&mut rand::thread_rng()).map(|item| (*item).clone())
    }

    fn persist(&self) {
        if let Err(err) = save_json(self.store.as_ref(), MOTIVATION_STORAGE_KEY, &self.items) {
            warn!(%err, "failed to persist motivation items");
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

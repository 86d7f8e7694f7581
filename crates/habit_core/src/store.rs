use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// Flat key/value blob store. Every write replaces the whole value under a key.
pub trait KeyValueStore: Send + Sync {
    fn load_value(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn save_value(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(value) = store.load_value(key)? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })?;
    store.save_value(key, value)
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load_value(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            })
    }

    fn save_value(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(io_err)?;
        let path = self.path_for(key);
        let payload = serde_json::to_vec_pretty(&value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;
        // Write then rename so a crash never leaves a half-written blob behind.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(io_err)?;
        fs::rename(&staging, &path).map_err(io_err)?;
        tracing::debug!(key, path = %path.display(), "blob saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Value>,
    writes: usize,
    fail_writes: bool,
}

/// Volatile store, handy for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.state.read().writes
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.state.read().entries.get(key).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.write().fail_writes = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn load_value(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.state.read().entries.get(key).cloned())
    }

    fn save_value(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.fail_writes {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        state.writes += 1;
        state.entries.insert(key.to_string(), value);
        Ok(())
    }
}

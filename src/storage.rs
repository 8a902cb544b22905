use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;
use tracing::{error, warn};

pub const THEME_KEY: &str = "theme";
pub const FAVORITES_KEY: &str = "favorites";
pub const API_KEY_KEY: &str = "user_youtube_api_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable string slots keyed by name. Writes replace the whole value.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

fn lock(slots: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.slots).contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.slots).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.slots).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.slots).remove(key);
        Ok(())
    }
}

/// Slots kept as one JSON object on disk, rewritten after every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    slots: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let slots = load_slots(&path);
        Self {
            path,
            slots: Mutex::new(slots),
        }
    }

    fn persist(&self, slots: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(slots)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.slots).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut slots = lock(&self.slots);
        slots.insert(key.to_string(), value.to_string());
        self.persist(&slots)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut slots = lock(&self.slots);
        if slots.remove(key).is_some() {
            self.persist(&slots)?;
        }
        Ok(())
    }
}

fn load_slots(path: &Path) -> BTreeMap<String, String> {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(slots) => slots,
            Err(err) => {
                error!("failed to parse prefs file {}: {err}", path.display());
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            warn!("failed to read prefs file {}: {err}", path.display());
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("tube_insight_{name}_{}_{nanos}.json", std::process::id()));
        path
    }

    #[test]
    fn memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("theme"), None);
        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
        store.remove("theme").unwrap();
        assert!(!store.contains("theme"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path("reopen");
        {
            let store = FileStore::open(&path);
            store.set(THEME_KEY, "light").unwrap();
            store.set(FAVORITES_KEY, r#"["a"]"#).unwrap();
            store.remove(FAVORITES_KEY).unwrap();
        }

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("light"));
        assert_eq!(reopened.get(FAVORITES_KEY), None);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{not json").unwrap();
        let store = FileStore::open(&path);
        assert_eq!(store.get(THEME_KEY), None);
        let _ = fs::remove_file(path);
    }
}

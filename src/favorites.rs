use crate::database::{Database, DatabaseError};
use crate::storage::{KeyValueStore, StoreError, API_KEY_KEY, FAVORITES_KEY, THEME_KEY};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::warn;

/// Favourite channel ids kept as one JSON array under a fixed key. Every
/// operation reads the whole array and writes it back; concurrent writers
/// are not coordinated and the last write wins.
pub struct FavoritesStore<S> {
    store: S,
}

impl<S: KeyValueStore> FavoritesStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list_favorites(&self) -> Vec<String> {
        let Some(raw) = self.store.get(FAVORITES_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids,
            Err(err) => {
                warn!("ignoring unreadable favorites slot: {err}");
                Vec::new()
            }
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.list_favorites().iter().any(|favorite| favorite == id)
    }

    /// Flips membership of `id` and returns the new state.
    pub fn toggle_favorite(&self, id: &str) -> Result<bool, StoreError> {
        let mut ids = self.list_favorites();
        let now_favorite = match ids.iter().position(|favorite| favorite == id) {
            Some(index) => {
                ids.remove(index);
                false
            }
            None => {
                ids.push(id.to_string());
                true
            }
        };
        self.write(&ids)?;
        Ok(now_favorite)
    }

    /// Adding an id that is already present is a no-op.
    pub fn add(&self, id: &str) -> Result<(), StoreError> {
        let mut ids = self.list_favorites();
        if ids.iter().any(|favorite| favorite == id) {
            return Ok(());
        }
        ids.push(id.to_string());
        self.write(&ids)
    }

    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut ids = self.list_favorites();
        let before = ids.len();
        ids.retain(|favorite| favorite != id);
        if ids.len() == before {
            return Ok(());
        }
        self.write(&ids)
    }

    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.write(&[])
    }

    /// Pulls favourites from the remote database, if one is configured, and
    /// merges them after the local ones. Returns how many ids were added.
    pub async fn sync_from(&self, database: &Database) -> Result<usize, DatabaseError> {
        let remote = database.backend()?.list().await?;
        let mut ids = self.list_favorites();
        let before = ids.len();
        for id in remote {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        let added = ids.len() - before;
        if added > 0 {
            self.write(&ids)?;
        }
        Ok(added)
    }

    fn write(&self, ids: &[String]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(ids)?;
        self.store.set(FAVORITES_KEY, &payload)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

/// Theme flag and personal API key, each in its own slot.
pub struct Preferences<S> {
    store: S,
}

impl<S: KeyValueStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn theme(&self) -> Theme {
        self.store
            .get(THEME_KEY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    pub fn toggle_theme(&self) -> Result<Theme, StoreError> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn api_key(&self) -> Option<String> {
        self.store
            .get(API_KEY_KEY)
            .filter(|key| !key.trim().is_empty())
    }

    /// Stores the trimmed key. Blank input clears the slot entirely.
    pub fn set_api_key(&self, input: &str) -> Result<(), StoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            self.store.remove(API_KEY_KEY)
        } else {
            self.store.set(API_KEY_KEY, trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::FavoritesBackend;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    #[test]
    fn toggle_adds_then_removes() {
        let store = Arc::new(MemoryStore::new());
        let favorites = FavoritesStore::new(Arc::clone(&store));

        assert!(favorites.toggle_favorite("abc").unwrap());
        assert_eq!(favorites.list_favorites(), vec!["abc".to_string()]);
        assert_eq!(store.get(FAVORITES_KEY).as_deref(), Some(r#"["abc"]"#));

        assert!(!favorites.toggle_favorite("abc").unwrap());
        assert!(favorites.list_favorites().is_empty());
        assert_eq!(store.get(FAVORITES_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn duplicate_add_is_noop_and_order_kept() {
        let favorites = FavoritesStore::new(MemoryStore::new());
        favorites.add("b").unwrap();
        favorites.add("a").unwrap();
        favorites.add("b").unwrap();
        assert_eq!(favorites.list_favorites(), vec!["b".to_string(), "a".to_string()]);
        assert!(favorites.is_favorite("a"));
        assert!(!favorites.is_favorite("A"));

        favorites.remove("b").unwrap();
        assert_eq!(favorites.list_favorites(), vec!["a".to_string()]);
        favorites.clear_all().unwrap();
        assert!(favorites.list_favorites().is_empty());
    }

    #[test]
    fn unreadable_slot_reads_as_empty() {
        let store = MemoryStore::new();
        store.set(FAVORITES_KEY, "not json").unwrap();
        let favorites = FavoritesStore::new(store);
        assert!(favorites.list_favorites().is_empty());
        assert!(favorites.toggle_favorite("x").unwrap());
    }

    #[test]
    fn api_key_round_trip_and_clear() {
        let store = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(Arc::clone(&store));

        prefs.set_api_key("  AIza-secret ").unwrap();
        let reloaded = Preferences::new(Arc::clone(&store));
        assert_eq!(reloaded.api_key().as_deref(), Some("AIza-secret"));

        reloaded.set_api_key("").unwrap();
        assert!(!store.contains(API_KEY_KEY));
        assert_eq!(prefs.api_key(), None);
    }

    #[test]
    fn theme_defaults_and_toggles() {
        let prefs = Preferences::new(MemoryStore::new());
        assert_eq!(prefs.theme(), Theme::Light);
        assert_eq!(prefs.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(prefs.theme(), Theme::Dark);
    }

    struct FixedBackend(Vec<String>);

    #[async_trait]
    impl FavoritesBackend for FixedBackend {
        async fn list(&self) -> Result<Vec<String>, DatabaseError> {
            Ok(self.0.clone())
        }

        async fn add(&self, _id: &str) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn remove(&self, _id: &str) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn sync_merges_remote_ids() {
        let favorites = FavoritesStore::new(MemoryStore::new());
        favorites.add("local").unwrap();

        let database = Database::with_backend(Arc::new(FixedBackend(vec![
            "remote".into(),
            "local".into(),
        ])));
        assert_eq!(favorites.sync_from(&database).await.unwrap(), 1);
        assert_eq!(
            favorites.list_favorites(),
            vec!["local".to_string(), "remote".to_string()]
        );
    }

    #[tokio::test]
    async fn sync_without_database_reports_unavailable() {
        let favorites = FavoritesStore::new(MemoryStore::new());
        let result = favorites.sync_from(&Database::unavailable()).await;
        assert!(matches!(result, Err(DatabaseError::Unavailable)));
    }
}

use crate::models::PublicConfig;
use crate::storage::StoreError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const FAVORITES_TABLE: &str = "favorites";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database is not configured")]
    Unavailable,
    #[error("database request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("database responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<String>, DatabaseError>;
    async fn add(&self, id: &str) -> Result<(), DatabaseError>;
    async fn remove(&self, id: &str) -> Result<(), DatabaseError>;
}

/// Remote favourites storage, which may be absent.
#[derive(Clone, Default)]
pub struct Database {
    backend: Option<Arc<dyn FavoritesBackend>>,
}

impl Database {
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn FavoritesBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Builds a Supabase-backed handle when both URL and key are present.
    pub fn from_public_config(config: &PublicConfig, http: Client) -> Self {
        if config.supabase_url.trim().is_empty() || config.supabase_anon_key.trim().is_empty() {
            return Self::unavailable();
        }
        Self::with_backend(Arc::new(SupabaseBackend::new(
            http,
            &config.supabase_url,
            &config.supabase_anon_key,
        )))
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Result<&Arc<dyn FavoritesBackend>, DatabaseError> {
        self.backend.as_ref().ok_or(DatabaseError::Unavailable)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FavoriteRow {
    channel_id: String,
}

/// PostgREST access to a `favorites(channel_id text unique)` table.
pub struct SupabaseBackend {
    http: Client,
    table_url: String,
    anon_key: String,
}

impl SupabaseBackend {
    pub fn new(http: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            table_url: format!("{}/rest/v1/{FAVORITES_TABLE}", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.http
            .request(method, &self.table_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, DatabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(DatabaseError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl FavoritesBackend for SupabaseBackend {
    async fn list(&self) -> Result<Vec<String>, DatabaseError> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "channel_id")])
            .send()
            .await?;
        let rows: Vec<FavoriteRow> = check(response).await?.json().await?;
        debug!("loaded {} remote favorites", rows.len());
        Ok(rows.into_iter().map(|row| row.channel_id).collect())
    }

    async fn add(&self, id: &str) -> Result<(), DatabaseError> {
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "resolution=ignore-duplicates")
            .json(&FavoriteRow {
                channel_id: id.to_string(),
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), DatabaseError> {
        let filter = format!("eq.{id}");
        let response = self
            .request(reqwest::Method::DELETE)
            .query(&[("channel_id", filter.as_str())])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_unavailable() {
        let database = Database::from_public_config(&PublicConfig::default(), Client::new());
        assert!(!database.is_available());
        assert!(matches!(database.backend(), Err(DatabaseError::Unavailable)));
    }

    #[test]
    fn configured_database_is_available() {
        let config = PublicConfig {
            supabase_url: "https://example.supabase.co/".into(),
            supabase_anon_key: "anon".into(),
        };
        let database = Database::from_public_config(&config, Client::new());
        assert!(database.is_available());
    }

    #[test]
    fn table_url_strips_trailing_slash() {
        let backend = SupabaseBackend::new(Client::new(), "https://x.supabase.co/", "k");
        assert_eq!(backend.table_url, "https://x.supabase.co/rest/v1/favorites");
    }
}

use crate::models::PublicConfig;
use std::env::{self, VarError};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_SITE_URL: &str = "https://tube-insight.app";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub youtube_api_key: Option<String>,
    pub youtube_api_base: String,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub site_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            youtube_api_key: optional("YOUTUBE_API_KEY"),
            youtube_api_base: optional("YOUTUBE_API_BASE")
                .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE.to_string()),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_api_base: optional("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            gemini_model: optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            site_url: optional("SITE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Public database settings handed to the dashboard. Read on every request
/// so a redeploy with new values needs no restart of clients. Unset values
/// are empty strings; a value that is not valid unicode is an error.
pub fn public_config_from_env() -> Result<PublicConfig, VarError> {
    Ok(PublicConfig {
        supabase_url: read_or_empty("SUPABASE_URL")?,
        supabase_anon_key: read_or_empty("SUPABASE_ANON_KEY")?,
    })
}

fn read_or_empty(name: &str) -> Result<String, VarError> {
    match env::var(name) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(VarError::NotPresent) => Ok(String::new()),
        Err(err) => Err(err),
    }
}

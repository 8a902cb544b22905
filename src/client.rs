use crate::models::{Channel, ChannelItem, Page, PlaylistItem, SearchItem, Video, VideoItem};
use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Retries applied to transient network failures unless a call opts out.
pub const DEFAULT_RETRIES: u32 = 3;
pub const MAX_RESULTS: u32 = 50;
const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 1_000;

const QUOTA_REASONS: [&str; 3] = ["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("upstream quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("unreadable response: {0}")]
    Parse(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl FetchError {
    pub fn is_quota(&self) -> bool {
        matches!(self, FetchError::QuotaExceeded(_))
    }

    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `resource` with `params` and returns the decoded body, error
    /// shaped or not.
    async fn get_json(&self, resource: &str, params: &[(String, String)]) -> Result<Value, FetchError>;
}

async fn read_json(response: reqwest::Response) -> Result<Value, FetchError> {
    let status = response.status();
    let body = response.text().await?;
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(FetchError::Upstream {
            status: status.as_u16(),
            message: body,
        }),
        Err(err) => Err(FetchError::Parse(err.to_string())),
    }
}

/// Talks to `GET {base}/api/proxy?path=<resource>&...`. No key is sent.
pub struct ProxyTransport {
    http: Client,
    endpoint: Url,
}

impl ProxyTransport {
    pub fn new(http: Client, base: &str) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(base)?.join("/api/proxy")?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    async fn get_json(&self, resource: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("path", resource)])
            .query(params)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Talks to the upstream API directly, appending `key`.
pub struct DirectTransport {
    http: Client,
    base: String,
    key: String,
}

impl DirectTransport {
    pub fn new(http: Client, base: &str, key: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn get_json(&self, resource: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        let url = Url::parse(&format!("{}/{}", self.base, resource.trim_start_matches('/')))
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("key", self.key.as_str())])
            .send()
            .await?;
        read_json(response).await
    }
}

/// Picks the transport for a dashboard session: a stored personal key goes
/// straight upstream and never reaches this service; otherwise the proxy.
pub fn session_transport(
    http: Client,
    proxy_base: &str,
    upstream_base: &str,
    personal_key: Option<&str>,
) -> Result<Arc<dyn Transport>, url::ParseError> {
    match personal_key.filter(|key| !key.trim().is_empty()) {
        Some(key) => Ok(Arc::new(DirectTransport::new(http, upstream_base, key))),
        None => Ok(Arc::new(ProxyTransport::new(http, proxy_base)?)),
    }
}

/// Turns an error-shaped body into a [`FetchError`]; passes others through.
pub fn check_payload(value: Value) -> Result<Value, FetchError> {
    let Some(error) = value.get("error") else {
        return Ok(value);
    };

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .unwrap_or("unknown upstream error")
        .to_string();
    let status = error.get("code").and_then(Value::as_u64).unwrap_or(0) as u16;
    let quota_reason = error
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors.iter().any(|entry| {
                entry
                    .get("reason")
                    .and_then(Value::as_str)
                    .is_some_and(|reason| QUOTA_REASONS.contains(&reason))
            })
        })
        .unwrap_or(false);

    if quota_reason || message.to_lowercase().contains("quota") {
        return Err(FetchError::QuotaExceeded(message));
    }
    Err(FetchError::Upstream { status, message })
}

/// Decodes the `items` array. Absent means empty; entries that do not match
/// the expected shape are dropped.
pub fn extract_items<T: DeserializeOwned>(value: &Value) -> Vec<T> {
    let Some(items) = value.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("skipping malformed item: {err}");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub retry: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { retry: true }
    }
}

impl FetchOptions {
    pub fn no_retry() -> Self {
        Self { retry: false }
    }
}

/// Responses keyed by the full request (resource plus sorted parameters).
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<String, Arc<Value>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn key(resource: &str, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{resource}?{}", query.join("&"))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: String, value: Arc<Value>) {
        self.inner.insert(key, value);
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[derive(Clone)]
pub struct DataClient {
    transport: Arc<dyn Transport>,
    cache: QueryCache,
    retries: u32,
}

impl DataClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_cache(transport, QueryCache::new())
    }

    pub fn with_cache(transport: Arc<dyn Transport>, cache: QueryCache) -> Self {
        Self {
            transport,
            cache,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Cached fetch of one resource. Only network failures are retried, and
    /// only when `options.retry` is set.
    pub async fn fetch(
        &self,
        resource: &str,
        params: &[(String, String)],
        options: FetchOptions,
    ) -> Result<Arc<Value>, FetchError> {
        let key = QueryCache::key(resource, params);
        if let Some(hit) = self.cache.get(&key) {
            debug!("cache hit for {key}");
            return Ok(hit);
        }

        let mut attempt = 0;
        loop {
            let result = self
                .transport
                .get_json(resource, params)
                .await
                .and_then(check_payload);
            match result {
                Ok(value) => {
                    let value = Arc::new(value);
                    self.cache.insert(key, Arc::clone(&value));
                    return Ok(value);
                }
                Err(err) if err.is_transient() && options.retry && attempt < self.retries => {
                    attempt += 1;
                    debug!("retrying {resource} after network failure (attempt {attempt}): {err}");
                }
                Err(err) => {
                    if err.is_quota() {
                        warn!("quota exceeded fetching {resource}");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Batch lookup by id, split into requests of at most [`MAX_RESULTS`]
    /// ids. Results come back in the order the ids were given.
    pub async fn channels(&self, ids: &[String]) -> Result<Vec<Channel>, FetchError> {
        let mut channels = Vec::with_capacity(ids.len());
        for batch in ids.chunks(MAX_RESULTS as usize) {
            let joined = batch.join(",");
            let value = self
                .fetch(
                    "channels",
                    &params(&[
                        ("part", "snippet,statistics,contentDetails"),
                        ("id", joined.as_str()),
                        ("maxResults", "50"),
                    ]),
                    FetchOptions::default(),
                )
                .await?;
            channels.extend(extract_items::<ChannelItem>(&value).into_iter().map(Channel::from));
        }
        Ok(in_request_order(channels, ids, |channel| &channel.id))
    }

    pub async fn channel(&self, id: &str) -> Result<Option<Channel>, FetchError> {
        Ok(self.channels(&[id.to_string()]).await?.into_iter().next())
    }

    pub async fn channel_by_handle(&self, handle: &str) -> Result<Option<Channel>, FetchError> {
        let handle = if handle.starts_with('@') {
            handle.to_string()
        } else {
            format!("@{handle}")
        };
        let value = self
            .fetch(
                "channels",
                &params(&[("part", "snippet,statistics,contentDetails"), ("forHandle", handle.as_str())]),
                FetchOptions::default(),
            )
            .await?;
        Ok(extract_items::<ChannelItem>(&value)
            .into_iter()
            .next()
            .map(Channel::from))
    }

    pub async fn videos(&self, ids: &[String]) -> Result<Vec<Video>, FetchError> {
        let mut videos = Vec::with_capacity(ids.len());
        for batch in ids.chunks(MAX_RESULTS as usize) {
            let joined = batch.join(",");
            let value = self
                .fetch(
                    "videos",
                    &params(&[
                        ("part", "snippet,statistics,contentDetails"),
                        ("id", joined.as_str()),
                        ("maxResults", "50"),
                    ]),
                    FetchOptions::default(),
                )
                .await?;
            videos.extend(extract_items::<VideoItem>(&value).into_iter().map(Video::from));
        }
        Ok(in_request_order(videos, ids, |video| &video.id))
    }

    /// One page of search results. Search is the most quota-hungry call, so
    /// it is never retried automatically.
    pub async fn search(
        &self,
        query: &[(String, String)],
        page_token: Option<&str>,
    ) -> Result<Page<SearchItem>, FetchError> {
        let mut request = query.to_vec();
        if let Some(token) = page_token {
            request.push(("pageToken".to_string(), token.to_string()));
        }
        let value = self.fetch("search", &request, FetchOptions::no_retry()).await?;
        Ok(Page {
            items: extract_items(&value),
            next_page_token: value
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub async fn playlist_video_ids(&self, playlist_id: &str, max: u32) -> Result<Vec<String>, FetchError> {
        let max = max.clamp(1, MAX_RESULTS).to_string();
        let value = self
            .fetch(
                "playlistItems",
                &params(&[
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", max.as_str()),
                ]),
                FetchOptions::default(),
            )
            .await?;
        Ok(extract_items::<PlaylistItem>(&value)
            .iter()
            .filter_map(|item| item.video_id().map(str::to_string))
            .collect())
    }

    /// Recent uploads: playlist lookup, then video details. The second call
    /// is skipped when the first yields nothing.
    pub async fn uploads(&self, channel: &Channel, max: u32) -> Result<Vec<Video>, FetchError> {
        let Some(playlist_id) = channel.uploads_playlist_id.as_deref() else {
            return Ok(Vec::new());
        };
        let ids = self.playlist_video_ids(playlist_id, max).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.videos(&ids).await
    }

    pub async fn popular_videos(
        &self,
        region: &str,
        category: Option<&str>,
        size: u32,
    ) -> Result<Vec<Video>, FetchError> {
        let size = size.clamp(1, MAX_RESULTS).to_string();
        let mut request = params(&[
            ("part", "snippet,statistics,contentDetails"),
            ("chart", "mostPopular"),
            ("regionCode", region),
            ("maxResults", size.as_str()),
        ]);
        if let Some(category) = category {
            request.push(("videoCategoryId".to_string(), category.to_string()));
        }
        let value = self.fetch("videos", &request, FetchOptions::default()).await?;
        Ok(extract_items::<VideoItem>(&value)
            .into_iter()
            .map(Video::from)
            .collect())
    }

    /// Search for channels, then load their statistics. Returned in search
    /// order.
    pub async fn search_channels(&self, query: &str, size: u32) -> Result<Vec<Channel>, FetchError> {
        let size = size.clamp(1, MAX_RESULTS).to_string();
        let page = self
            .search(
                &params(&[("part", "snippet"), ("type", "channel"), ("q", query), ("maxResults", size.as_str())]),
                None,
            )
            .await?;
        let ids = unique_ids(page.items.iter().filter_map(SearchItem::channel_id));
        self.channels(&ids).await
    }
}

pub(crate) fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids {
        if !id.is_empty() && !seen.iter().any(|existing: &String| existing == id) {
            seen.push(id.to_string());
        }
    }
    seen
}

/// Upstream batch lookups do not promise ordering; restore the order the ids
/// were requested in.
fn in_request_order<T>(items: Vec<T>, ids: &[String], id_of: impl Fn(&T) -> &String) -> Vec<T> {
    let position: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    let mut keyed: Vec<(usize, T)> = items
        .into_iter()
        .map(|item| {
            let index = position.get(id_of(&item).as_str()).copied().unwrap_or(usize::MAX);
            (index, item)
        })
        .collect();
    keyed.sort_by_key(|(index, _)| *index);
    keyed.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Scripted transport: responses are matched by resource name and
    /// served in order; the last one repeats.
    #[derive(Default)]
    pub struct FakeTransport {
        responses: Mutex<HashMap<String, Vec<Result<Value, FetchError>>>>,
        pub calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, resource: &str, response: Result<Value, FetchError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(resource.to_string())
                .or_default()
                .push(response);
            self
        }

        pub fn call_count(&self, resource: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(called, _)| called == resource)
                .count()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get_json(&self, resource: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((resource.to_string(), params.to_vec()));
            let mut responses = self.responses.lock().unwrap();
            let queue = responses
                .get_mut(resource)
                .unwrap_or_else(|| panic!("no scripted response for {resource}"));
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            }
        }
    }
}

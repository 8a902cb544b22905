use crate::ai::{
    build_channel_prompt, build_success_prompt, build_thumbnail_prompt, fetch_image, AnalysisError,
    AnalyzeRequest, AnalyzeResponse, SuccessAnalysis, ThumbnailAnalysis,
};
use crate::client::DataClient;
use crate::config::public_config_from_env;
use crate::dashboard::{self, ChannelReport, RankingView};
use crate::errors::AppError;
use crate::favorites::Theme;
use crate::models::{PublicConfig, Video};
use crate::ranking::{RankedRow, RankingKind, RankingQuery, SortKey, DEFAULT_PAGE_SIZE};
use crate::state::AppState;
use crate::ui::{render_index, robots_txt, sitemap_xml};
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, warn};

const STATIC_CACHE_CONTROL: &str = "public, max-age=86400";

pub async fn index(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Html<String> {
    let theme = params
        .get("theme")
        .and_then(|raw| raw.parse::<Theme>().ok())
        .unwrap_or_default();
    Html(render_index(theme, &state.config.site_url))
}

/// Only plain resource names such as `channels` or `playlistItems` may be
/// forwarded upstream.
fn valid_resource(path: &str) -> bool {
    !path.contains("..")
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '_' || c == '-')
}

pub async fn proxy(
    State(state): State<AppState>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(mut params) = params?;
    let path = params
        .remove("path")
        .map(|path| path.trim().trim_matches('/').to_string())
        .filter(|path| !path.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing path parameter"))?;
    if !valid_resource(&path) {
        return Err(AppError::bad_request("Invalid path parameter"));
    }
    let key = state
        .config
        .youtube_api_key
        .as_deref()
        .ok_or_else(|| AppError::internal_message("YouTube API key is not configured"))?;

    params.remove("key");
    let url = format!("{}/{}", state.config.youtube_api_base.trim_end_matches('/'), path);
    debug!("forwarding proxy request to {path}");

    let upstream = state
        .http
        .get(url)
        .query(&params)
        .query(&[("key", key)])
        .send()
        .await
        .map_err(|err| {
            error!("proxy request to {path} failed: {err}");
            AppError::bad_gateway("Failed to reach upstream API")
        })?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    if !status.is_success() {
        warn!("upstream answered {status} for {path}");
    }
    let body: Bytes = upstream.bytes().await.map_err(|err| {
        error!("failed to read upstream body for {path}: {err}");
        AppError::bad_gateway("Failed to read upstream response")
    })?;

    Ok((
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response())
}

pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(payload) = payload?;
    if payload.channel_title.trim().is_empty() {
        return Err(AppError::bad_request("channelTitle is required"));
    }
    let analysis = state
        .gemini
        .generate_text(&build_channel_prompt(&payload))
        .await?;
    Ok(Json(AnalyzeResponse { analysis }))
}

pub async fn public_config() -> (StatusCode, Json<PublicConfig>) {
    match public_config_from_env() {
        Ok(config) => (StatusCode::OK, Json(config)),
        Err(err) => {
            error!("failed to read public config: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(PublicConfig::default()))
        }
    }
}

fn static_headers(content_type: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(STATIC_CACHE_CONTROL));
    headers
}

pub async fn robots(State(state): State<AppState>) -> (HeaderMap, String) {
    (static_headers("text/plain; charset=utf-8"), robots_txt(&state.config.site_url))
}

pub async fn sitemap(State(state): State<AppState>) -> (HeaderMap, String) {
    (static_headers("application/xml; charset=utf-8"), sitemap_xml(&state.config.site_url))
}

fn data_client(state: &AppState) -> Result<&DataClient, AppError> {
    state
        .data
        .as_ref()
        .ok_or_else(|| AppError::internal_message("YouTube API key is not configured"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub size: Option<u32>,
    pub sort: Option<String>,
    pub region: Option<String>,
    pub page_token: Option<String>,
}

fn parse_sort(raw: Option<&str>, kind: RankingKind) -> Result<SortKey, AppError> {
    let key = match raw {
        Some(raw) => raw.parse::<SortKey>().map_err(AppError::bad_request)?,
        None => kind.default_key(),
    };
    if !kind.supports(key) {
        return Err(AppError::bad_request(format!(
            "sort key '{key}' does not apply to {} rankings",
            kind.as_str()
        )));
    }
    Ok(key)
}

pub async fn ranking(
    State(state): State<AppState>,
    params: Result<Query<RankingParams>, QueryRejection>,
) -> Result<Json<RankingView>, AppError> {
    let Query(params) = params?;
    let kind = match params.kind.as_deref() {
        Some(raw) => raw.parse::<RankingKind>().map_err(AppError::bad_request)?,
        None => RankingKind::Channel,
    };
    let order = parse_sort(params.sort.as_deref(), kind)?;
    let query = RankingQuery::new(kind, params.q)
        .with_category(params.category)
        .with_size(params.size.unwrap_or(DEFAULT_PAGE_SIZE))
        .with_order(order)
        .with_region(params.region);
    if !query.is_chart() && query.search_text().is_empty() {
        return Err(AppError::bad_request("q or category is required"));
    }

    let client = data_client(&state)?;
    let view = dashboard::ranking(client, &query, params.page_token.as_deref(), Utc::now()).await?;
    Ok(Json(view))
}

pub async fn channel_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChannelReport>, AppError> {
    let client = data_client(&state)?;
    let report = dashboard::channel_report(client, &id, Utc::now()).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct FavoritesParams {
    #[serde(default)]
    pub ids: String,
    pub sort: Option<String>,
}

pub async fn favorites(
    State(state): State<AppState>,
    params: Result<Query<FavoritesParams>, QueryRejection>,
) -> Result<Json<Vec<RankedRow>>, AppError> {
    let Query(params) = params?;
    let ids: Vec<String> = params
        .ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    let order = parse_sort(params.sort.as_deref(), RankingKind::Channel)?;
    if ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let client = data_client(&state)?;
    let rows = dashboard::favorites_view(client, &ids, order, Utc::now()).await?;
    Ok(Json(rows))
}

async fn load_video(client: &DataClient, id: &str) -> Result<Video, AppError> {
    client
        .videos(&[id.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found(format!("video {id} not found")))
}

pub async fn video_insight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessAnalysis>, AppError> {
    let client = data_client(&state)?;
    let video = load_video(client, &id).await?;
    let subscribers = client
        .channel(&video.channel_id)
        .await?
        .map(|channel| channel.subscriber_count)
        .unwrap_or(0);
    let prompt = build_success_prompt(&video.title, &video.channel_title, video.view_count, subscribers);
    let analysis = state.gemini.generate_json::<SuccessAnalysis>(&prompt).await?;
    Ok(Json(analysis))
}

pub async fn thumbnail_insight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThumbnailAnalysis>, AppError> {
    let client = data_client(&state)?;
    let video = load_video(client, &id).await?;
    let thumbnail = video
        .thumbnails
        .best()
        .ok_or_else(|| AppError::not_found(format!("video {id} has no thumbnail")))?;
    if !state.gemini.is_configured() {
        return Err(AnalysisError::MissingKey.into());
    }
    let image = fetch_image(&state.http, thumbnail).await?;
    let analysis = state
        .gemini
        .generate_json_with_image::<ThumbnailAnalysis>(&build_thumbnail_prompt(&video.title), &image)
        .await?;
    Ok(Json(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_are_restricted() {
        assert!(valid_resource("channels"));
        assert!(valid_resource("playlistItems"));
        assert!(!valid_resource("../etc/passwd"));
        assert!(!valid_resource("https://evil.example/x"));
        assert!(!valid_resource("videos?key=x"));
    }

    #[test]
    fn sort_must_match_ranking_kind() {
        assert_eq!(parse_sort(None, RankingKind::Video).unwrap(), SortKey::ViewCount);
        assert!(parse_sort(Some("velocity"), RankingKind::Channel).is_err());
        assert!(parse_sort(Some("nonsense"), RankingKind::Video).is_err());
        assert_eq!(
            parse_sort(Some("efficiencyRatio"), RankingKind::Channel).unwrap(),
            SortKey::EfficiencyRatio
        );
    }
}

use crate::metrics::parse_count_value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Upstream counts arrive as decimal strings, occasionally as numbers, and
/// sometimes not at all. Anything unreadable collapses to zero.
fn de_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(parse_count_value).unwrap_or(0))
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailRef {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailSet {
    pub default: Option<ThumbnailRef>,
    pub medium: Option<ThumbnailRef>,
    pub high: Option<ThumbnailRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnails {
    pub default: Option<String>,
    pub medium: Option<String>,
    pub high: Option<String>,
}

impl Thumbnails {
    /// Largest available thumbnail.
    pub fn best(&self) -> Option<&str> {
        self.high
            .as_deref()
            .or(self.medium.as_deref())
            .or(self.default.as_deref())
    }
}

impl From<ThumbnailSet> for Thumbnails {
    fn from(set: ThumbnailSet) -> Self {
        Self {
            default: set.default.map(|t| t.url),
            medium: set.medium.map(|t| t.url),
            high: set.high.map(|t| t.url),
        }
    }
}

// --- raw upstream shapes -------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub custom_url: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: ThumbnailSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    #[serde(default, deserialize_with = "de_count")]
    pub view_count: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub subscriber_count: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub video_count: u64,
    #[serde(default)]
    pub hidden_subscriber_count: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    #[serde(default)]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub id: String,
    #[serde(default)]
    pub snippet: ChannelSnippet,
    #[serde(default)]
    pub statistics: ChannelStatistics,
    #[serde(default)]
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    pub published_at: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub thumbnails: ThumbnailSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    #[serde(default, deserialize_with = "de_count")]
    pub view_count: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub like_count: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub comment_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoContentDetails {
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchId {
    #[serde(default)]
    pub kind: String,
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
    pub playlist_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub id: SearchId,
    #[serde(default)]
    pub snippet: SearchSnippet,
}

impl SearchItem {
    /// Channel id for channel results, or the owning channel for videos.
    pub fn channel_id(&self) -> Option<&str> {
        self.id
            .channel_id
            .as_deref()
            .or(Some(self.snippet.channel_id.as_str()).filter(|id| !id.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    #[serde(default)]
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub snippet: PlaylistItemSnippet,
    pub content_details: Option<PlaylistItemContentDetails>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()
            .and_then(|details| details.video_id.as_deref())
            .or(self.snippet.resource_id.video_id.as_deref())
    }
}

// --- snapshots ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub title: String,
    pub description: String,
    pub custom_url: Option<String>,
    pub thumbnails: Thumbnails,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
    pub hidden_subscriber_count: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub uploads_playlist_id: Option<String>,
}

impl From<ChannelItem> for Channel {
    fn from(item: ChannelItem) -> Self {
        Self {
            published_at: parse_timestamp(item.snippet.published_at.as_deref()),
            id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            custom_url: item.snippet.custom_url,
            thumbnails: item.snippet.thumbnails.into(),
            subscriber_count: item.statistics.subscriber_count,
            view_count: item.statistics.view_count,
            video_count: item.statistics.video_count,
            hidden_subscriber_count: item.statistics.hidden_subscriber_count,
            uploads_playlist_id: item.content_details.related_playlists.uploads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub category_id: Option<String>,
    pub tags: Vec<String>,
    pub thumbnails: Thumbnails,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub duration: String,
}

impl From<VideoItem> for Video {
    fn from(item: VideoItem) -> Self {
        Self {
            published_at: parse_timestamp(item.snippet.published_at.as_deref()),
            id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            channel_id: item.snippet.channel_id,
            channel_title: item.snippet.channel_title,
            category_id: item.snippet.category_id,
            tags: item.snippet.tags,
            thumbnails: item.snippet.thumbnails.into(),
            view_count: item.statistics.view_count,
            like_count: item.statistics.like_count,
            comment_count: item.statistics.comment_count,
            duration: item.content_details.duration,
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: None,
        }
    }
}

// --- endpoint bodies ------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

/// `{"error": ...}`, plus `"quotaExceeded": true` when the upstream quota
/// ran out.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub quota_exceeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_item_converts_with_string_counts() {
        let item: ChannelItem = serde_json::from_value(json!({
            "id": "UC123",
            "snippet": {
                "title": "Example",
                "description": "desc",
                "publishedAt": "2020-01-02T03:04:05Z",
                "thumbnails": { "high": { "url": "https://img/high.jpg" } }
            },
            "statistics": {
                "viewCount": "1500",
                "subscriberCount": "300",
                "videoCount": "12"
            },
            "contentDetails": { "relatedPlaylists": { "uploads": "UU123" } }
        }))
        .unwrap();

        let channel = Channel::from(item);
        assert_eq!(channel.view_count, 1500);
        assert_eq!(channel.subscriber_count, 300);
        assert_eq!(channel.video_count, 12);
        assert_eq!(channel.uploads_playlist_id.as_deref(), Some("UU123"));
        assert_eq!(channel.thumbnails.best(), Some("https://img/high.jpg"));
        assert!(channel.published_at.is_some());
    }

    #[test]
    fn malformed_counts_become_zero() {
        let item: VideoItem = serde_json::from_value(json!({
            "id": "v1",
            "statistics": { "viewCount": "N/A", "likeCount": 7 }
        }))
        .unwrap();

        let video = Video::from(item);
        assert_eq!(video.view_count, 0);
        assert_eq!(video.like_count, 7);
        assert_eq!(video.comment_count, 0);
        assert!(video.published_at.is_none());
    }

    #[test]
    fn playlist_item_prefers_content_details() {
        let item: PlaylistItem = serde_json::from_value(json!({
            "snippet": { "resourceId": { "videoId": "from-snippet" } },
            "contentDetails": { "videoId": "from-details" }
        }))
        .unwrap();
        assert_eq!(item.video_id(), Some("from-details"));
    }
}

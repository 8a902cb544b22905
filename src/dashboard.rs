use crate::client::{unique_ids, DataClient, FetchError};
use crate::metrics::{
    aggregate_engagement, average_views, estimated_monthly_revenue, growth_table, uploads_per_day,
    ChannelMetrics, CpmBand, GrowthPoint, RevenueRange, VideoMetrics,
};
use crate::mock::{MockDataGenerator, PlaceholderPanel};
use crate::models::{Channel, SearchItem, Video};
use crate::ranking::{rank_at, to_rows, RankedRow, RankingKind, RankingQuery, SortKey};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

pub const RECENT_UPLOADS: u32 = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRow {
    #[serde(flatten)]
    pub video: Video,
    pub metrics: VideoMetrics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
    pub channel: Channel,
    pub metrics: ChannelMetrics,
    pub recent_videos: Vec<VideoRow>,
    pub engagement_rate: Option<f64>,
    pub average_views: f64,
    pub uploads_per_day: f64,
    pub revenue: Vec<RevenueRange>,
    pub subscriber_growth: Vec<GrowthPoint>,
    pub placeholders: PlaceholderPanel,
}

pub fn build_channel_report(channel: Channel, videos: Vec<Video>, now: DateTime<Utc>) -> ChannelReport {
    let average = average_views(&videos);
    let cadence = uploads_per_day(&videos, now);
    let recent_videos = videos
        .iter()
        .map(|video| VideoRow {
            metrics: VideoMetrics::compute(video, channel.subscriber_count, now),
            video: video.clone(),
        })
        .collect();

    ChannelReport {
        metrics: ChannelMetrics::compute(&channel),
        engagement_rate: aggregate_engagement(&videos),
        average_views: average,
        uploads_per_day: cadence,
        revenue: vec![
            estimated_monthly_revenue(average, cadence, CpmBand::USD),
            estimated_monthly_revenue(average, cadence, CpmBand::KRW),
        ],
        subscriber_growth: growth_table(channel.subscriber_count),
        placeholders: MockDataGenerator::seeded(&channel.id).panel(),
        recent_videos,
        channel,
    }
}

/// Channel detail: the channel must resolve before its uploads can be
/// requested, since the uploads playlist id comes from it.
pub async fn channel_report(
    client: &DataClient,
    id: &str,
    now: DateTime<Utc>,
) -> Result<ChannelReport, FetchError> {
    let channel = if id.starts_with('@') {
        client.channel_by_handle(id).await?
    } else {
        client.channel(id).await?
    };
    let channel = channel.ok_or_else(|| FetchError::NotFound(format!("channel {id}")))?;
    let videos = client.uploads(&channel, RECENT_UPLOADS).await?;
    Ok(build_channel_report(channel, videos, now))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingView {
    pub kind: RankingKind,
    pub sort: SortKey,
    pub query: String,
    pub rows: Vec<RankedRow>,
    pub next_page_token: Option<String>,
}

pub async fn ranking(
    client: &DataClient,
    query: &RankingQuery,
    page_token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RankingView, FetchError> {
    debug!("loading ranking {}", query.cache_key());
    if query.is_chart() {
        let videos = client
            .popular_videos(&query.region, query.category.as_deref(), query.size)
            .await?;
        return Ok(RankingView {
            kind: query.kind,
            sort: query.order,
            query: String::new(),
            rows: to_rows(&rank_at(&videos, query.order, now), query.order, now),
            next_page_token: None,
        });
    }

    let page = client.search(&query.to_params(), page_token).await?;
    let rows = match query.kind {
        RankingKind::Channel => {
            let ids = unique_ids(page.items.iter().filter_map(SearchItem::channel_id));
            let channels = client.channels(&ids).await?;
            to_rows(&rank_at(&channels, query.order, now), query.order, now)
        }
        RankingKind::Video => {
            let ids = unique_ids(page.items.iter().filter_map(|item| item.id.video_id.as_deref()));
            let videos = client.videos(&ids).await?;
            to_rows(&rank_at(&videos, query.order, now), query.order, now)
        }
    };

    Ok(RankingView {
        kind: query.kind,
        sort: query.order,
        query: query.search_text(),
        rows,
        next_page_token: page.next_page_token,
    })
}

/// Favourites view: the stored ids, fetched fresh and ranked.
pub async fn favorites_view(
    client: &DataClient,
    ids: &[String],
    key: SortKey,
    now: DateTime<Utc>,
) -> Result<Vec<RankedRow>, FetchError> {
    let channels = client.channels(ids).await?;
    Ok(to_rows(&rank_at(&channels, key, now), key, now))
}

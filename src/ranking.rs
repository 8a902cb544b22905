use crate::metrics::{
    efficiency_ratio, efficiency_value, engagement_rate, format_compact, velocity, viral_grade,
    ViralGrade,
};
use crate::models::{Channel, Video};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, str::FromStr};

pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_REGION: &str = "US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    SubscriberCount,
    ViewCount,
    EfficiencyRatio,
    LikeCount,
    CommentCount,
    Velocity,
    EngagementRate,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::SubscriberCount => "subscriberCount",
            SortKey::ViewCount => "viewCount",
            SortKey::EfficiencyRatio => "efficiencyRatio",
            SortKey::LikeCount => "likeCount",
            SortKey::CommentCount => "commentCount",
            SortKey::Velocity => "velocity",
            SortKey::EngagementRate => "engagementRate",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "subscriberCount" => Ok(SortKey::SubscriberCount),
            "viewCount" => Ok(SortKey::ViewCount),
            "efficiencyRatio" => Ok(SortKey::EfficiencyRatio),
            "likeCount" => Ok(SortKey::LikeCount),
            "commentCount" => Ok(SortKey::CommentCount),
            "velocity" => Ok(SortKey::Velocity),
            "engagementRate" => Ok(SortKey::EngagementRate),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

/// Something that can be placed in a ranking table.
pub trait Rankable: Clone {
    /// Sort keys that make sense for this kind of snapshot.
    const KEYS: &'static [SortKey];

    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn thumbnail(&self) -> Option<&str>;

    /// Numeric value for `key`. Missing data must come back as zero.
    fn sort_value(&self, key: SortKey, now: DateTime<Utc>) -> f64;

    fn display_value(&self, key: SortKey, now: DateTime<Utc>) -> String {
        let value = self.sort_value(key, now);
        match key {
            SortKey::EfficiencyRatio | SortKey::Velocity => format!("{value:.2}"),
            SortKey::EngagementRate => format!("{value:.2}%"),
            _ => format_compact(value as u64),
        }
    }

    fn grade(&self) -> Option<ViralGrade> {
        None
    }
}

impl Rankable for Channel {
    const KEYS: &'static [SortKey] = &[
        SortKey::SubscriberCount,
        SortKey::ViewCount,
        SortKey::EfficiencyRatio,
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn thumbnail(&self) -> Option<&str> {
        self.thumbnails.best()
    }

    fn sort_value(&self, key: SortKey, _now: DateTime<Utc>) -> f64 {
        match key {
            SortKey::SubscriberCount => self.subscriber_count as f64,
            SortKey::ViewCount => self.view_count as f64,
            SortKey::EfficiencyRatio => efficiency_value(self.view_count, self.subscriber_count),
            _ => 0.0,
        }
    }

    fn display_value(&self, key: SortKey, now: DateTime<Utc>) -> String {
        match key {
            SortKey::EfficiencyRatio => {
                efficiency_ratio(self.view_count, self.subscriber_count).to_string()
            }
            _ => format_compact(self.sort_value(key, now) as u64),
        }
    }

    fn grade(&self) -> Option<ViralGrade> {
        Some(viral_grade(self.view_count, self.subscriber_count))
    }
}

impl Rankable for Video {
    const KEYS: &'static [SortKey] = &[
        SortKey::ViewCount,
        SortKey::LikeCount,
        SortKey::CommentCount,
        SortKey::Velocity,
        SortKey::EngagementRate,
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn thumbnail(&self) -> Option<&str> {
        self.thumbnails.best()
    }

    fn sort_value(&self, key: SortKey, now: DateTime<Utc>) -> f64 {
        match key {
            SortKey::ViewCount => self.view_count as f64,
            SortKey::LikeCount => self.like_count as f64,
            SortKey::CommentCount => self.comment_count as f64,
            SortKey::Velocity => self
                .published_at
                .map(|published| velocity(self.view_count, published, now))
                .unwrap_or(0.0),
            SortKey::EngagementRate => {
                engagement_rate(self.like_count, self.comment_count, self.view_count).unwrap_or(0.0)
            }
            _ => 0.0,
        }
    }
}

pub fn rank<T: Rankable>(items: &[T], key: SortKey) -> Vec<T> {
    rank_at(items, key, Utc::now())
}

/// Returns a new vector sorted descending by `key`. The sort is stable so
/// equal values keep their fetch order; the input is left untouched.
pub fn rank_at<T: Rankable>(items: &[T], key: SortKey, now: DateTime<Utc>) -> Vec<T> {
    let mut keyed: Vec<(f64, &T)> = items
        .iter()
        .map(|item| {
            let value = item.sort_value(key, now);
            (if value.is_finite() { value } else { 0.0 }, item)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    keyed.into_iter().map(|(_, item)| item.clone()).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRow {
    pub rank: usize,
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub value: f64,
    pub display: String,
    pub grade: Option<ViralGrade>,
}

pub fn to_rows<T: Rankable>(ranked: &[T], key: SortKey, now: DateTime<Utc>) -> Vec<RankedRow> {
    ranked
        .iter()
        .enumerate()
        .map(|(index, item)| RankedRow {
            rank: index + 1,
            id: item.id().to_string(),
            title: item.title().to_string(),
            thumbnail: item.thumbnail().map(str::to_string),
            value: item.sort_value(key, now),
            display: item.display_value(key, now),
            grade: item.grade(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RankingKind {
    Channel,
    Video,
}

impl RankingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingKind::Channel => "channel",
            RankingKind::Video => "video",
        }
    }

    pub fn default_key(self) -> SortKey {
        match self {
            RankingKind::Channel => SortKey::SubscriberCount,
            RankingKind::Video => SortKey::ViewCount,
        }
    }

    pub fn supports(self, key: SortKey) -> bool {
        match self {
            RankingKind::Channel => Channel::KEYS.contains(&key),
            RankingKind::Video => Video::KEYS.contains(&key),
        }
    }
}

impl FromStr for RankingKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "channel" | "channels" => Ok(RankingKind::Channel),
            "video" | "videos" => Ok(RankingKind::Video),
            other => Err(format!("unknown ranking type '{other}'")),
        }
    }
}

/// What to fetch for a ranking view. Filters and page size become upstream
/// query parameters; changing any of them means a new fetch, never a local
/// re-filter of rows already held.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingQuery {
    pub kind: RankingKind,
    pub query: String,
    pub category: Option<String>,
    pub size: u32,
    pub order: SortKey,
    pub region: String,
}

impl RankingQuery {
    pub fn new(kind: RankingKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
            category: None,
            size: DEFAULT_PAGE_SIZE,
            order: kind.default_key(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self
    }

    pub fn with_order(mut self, order: SortKey) -> Self {
        self.order = order;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        if let Some(region) = region.filter(|value| !value.trim().is_empty()) {
            self.region = region.trim().to_uppercase();
        }
        self
    }

    /// A video ranking without free text reads the most-popular chart; the
    /// category is then an upstream category id rather than a keyword.
    pub fn is_chart(&self) -> bool {
        self.kind == RankingKind::Video && self.query.trim().is_empty()
    }

    /// Search string sent upstream: category keyword and free text.
    pub fn search_text(&self) -> String {
        match &self.category {
            Some(category) => format!("{} {}", category.trim(), self.query.trim())
                .trim()
                .to_string(),
            None => self.query.trim().to_string(),
        }
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let upstream_order = match self.order {
            SortKey::ViewCount => "viewCount",
            _ => "relevance",
        };
        vec![
            ("part".to_string(), "snippet".to_string()),
            ("type".to_string(), self.kind.as_str().to_string()),
            ("q".to_string(), self.search_text()),
            ("maxResults".to_string(), self.size.to_string()),
            ("order".to_string(), upstream_order.to_string()),
        ]
    }

    /// Composite cache key over everything that changes the upstream result.
    pub fn cache_key(&self) -> String {
        format!(
            "ranking:{}:{}:{}:{}:{}",
            self.kind.as_str(),
            self.search_text(),
            self.size,
            self.order,
            self.region
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Thumbnails;

    #[derive(Debug, Clone)]
    struct Row {
        id: u32,
        v: f64,
    }

    impl Rankable for Row {
        const KEYS: &'static [SortKey] = &[SortKey::ViewCount];

        fn id(&self) -> &str {
            "row"
        }

        fn title(&self) -> &str {
            "row"
        }

        fn thumbnail(&self) -> Option<&str> {
            None
        }

        fn sort_value(&self, _key: SortKey, _now: DateTime<Utc>) -> f64 {
            self.v
        }
    }

    fn channel(id: &str, subscribers: u64, views: u64) -> Channel {
        Channel {
            id: id.into(),
            title: format!("channel {id}"),
            description: String::new(),
            custom_url: None,
            thumbnails: Thumbnails::default(),
            subscriber_count: subscribers,
            view_count: views,
            video_count: 1,
            hidden_subscriber_count: false,
            published_at: None,
            uploads_playlist_id: None,
        }
    }

    #[test]
    fn sort_is_stable_and_descending() {
        let input = vec![
            Row { id: 1, v: 10.0 },
            Row { id: 2, v: 10.0 },
            Row { id: 3, v: 20.0 },
        ];
        let ranked = rank(&input, SortKey::ViewCount);
        let ids: Vec<u32> = ranked.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        let original: Vec<u32> = input.iter().map(|row| row.id).collect();
        assert_eq!(original, vec![1, 2, 3]);
    }

    #[test]
    fn non_finite_values_sort_as_zero() {
        let input = vec![
            Row { id: 1, v: f64::NAN },
            Row { id: 2, v: 5.0 },
            Row { id: 3, v: 0.0 },
        ];
        let ids: Vec<u32> = rank(&input, SortKey::ViewCount).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn malformed_view_count_sorts_last() {
        let item: crate::models::ChannelItem = serde_json::from_str(
            r#"{"id":"bad","statistics":{"viewCount":"N/A","subscriberCount":"10"}}"#,
        )
        .unwrap();
        let parsed = Channel::from(item);
        let input = vec![parsed, channel("a", 10, 50), channel("b", 10, 5)];
        let ranked = rank(&input, SortKey::ViewCount);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "bad"]);
    }

    #[test]
    fn efficiency_ranking_puts_zero_subscribers_last() {
        let input = vec![channel("none", 0, 1_000), channel("low", 100, 200), channel("high", 10, 500)];
        let now = Utc::now();
        let ranked = rank_at(&input, SortKey::EfficiencyRatio, now);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low", "none"]);

        let rows = to_rows(&ranked, SortKey::EfficiencyRatio, now);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].display, "50.00");
        assert_eq!(rows[2].display, "N/A");
        assert_eq!(rows[2].grade, Some(ViralGrade::NotAvailable));
    }

    #[test]
    fn sort_keys_parse_from_wire_names() {
        assert_eq!("subscriberCount".parse::<SortKey>(), Ok(SortKey::SubscriberCount));
        assert_eq!("efficiencyRatio".parse::<SortKey>(), Ok(SortKey::EfficiencyRatio));
        assert!("bogus".parse::<SortKey>().is_err());
        assert!(RankingKind::Channel.supports(SortKey::EfficiencyRatio));
        assert!(!RankingKind::Channel.supports(SortKey::Velocity));
    }

    #[test]
    fn query_maps_filters_to_upstream_params() {
        let query = RankingQuery::new(RankingKind::Video, "speedrun")
            .with_category(Some("gaming".into()))
            .with_size(500)
            .with_order(SortKey::ViewCount);
        assert_eq!(query.size, MAX_PAGE_SIZE);
        assert_eq!(query.search_text(), "gaming speedrun");
        let params = query.to_params();
        assert!(params.contains(&("maxResults".to_string(), "50".to_string())));
        assert!(params.contains(&("type".to_string(), "video".to_string())));
        assert!(params.contains(&("order".to_string(), "viewCount".to_string())));

        let smaller = query.clone().with_size(10);
        assert_ne!(query.cache_key(), smaller.cache_key());
        assert!(!query.is_chart());
    }

    #[test]
    fn video_ranking_without_text_reads_the_chart() {
        let chart = RankingQuery::new(RankingKind::Video, " ")
            .with_category(Some("20".into()))
            .with_region(Some("kr".into()));
        assert!(chart.is_chart());
        assert_eq!(chart.region, "KR");
        assert!(!RankingQuery::new(RankingKind::Channel, "").is_chart());
        assert_eq!(RankingQuery::new(RankingKind::Video, "").with_region(None).region, DEFAULT_REGION);
    }
}

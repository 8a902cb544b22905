use crate::models::{Channel, Video};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

pub const NOT_AVAILABLE: &str = "N/A";

/// Views per subscriber, or the `N/A` sentinel when there is no audience to
/// divide by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Value(f64),
    NotAvailable,
}

impl Ratio {
    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Value(value) => Some(value),
            Ratio::NotAvailable => None,
        }
    }

    pub fn percent(self) -> Option<f64> {
        self.value().map(|value| value * 100.0)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Value(value) => write!(f, "{value:.2}"),
            Ratio::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Value(value) => serializer.serialize_f64(*value),
            Ratio::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Raw numeric efficiency, zero when `subscribers` is zero. Used as a sort
/// key where a sentinel cannot be ordered.
pub fn efficiency_value(views: u64, subscribers: u64) -> f64 {
    if subscribers > 0 {
        views as f64 / subscribers as f64
    } else {
        0.0
    }
}

pub fn efficiency_ratio(views: u64, subscribers: u64) -> Ratio {
    if subscribers > 0 {
        Ratio::Value(efficiency_value(views, subscribers))
    } else {
        Ratio::NotAvailable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViralGrade {
    #[serde(rename = "S+")]
    SPlus,
    S,
    A,
    B,
    C,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl ViralGrade {
    /// Tier table over a views-to-subscribers percentage. Every boundary is
    /// strictly greater-than.
    pub fn from_percent(percent: f64) -> Self {
        if percent > 200.0 {
            ViralGrade::SPlus
        } else if percent > 100.0 {
            ViralGrade::S
        } else if percent > 50.0 {
            ViralGrade::A
        } else if percent > 20.0 {
            ViralGrade::B
        } else {
            ViralGrade::C
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViralGrade::SPlus => "S+",
            ViralGrade::S => "S",
            ViralGrade::A => "A",
            ViralGrade::B => "B",
            ViralGrade::C => "C",
            ViralGrade::NotAvailable => NOT_AVAILABLE,
        }
    }
}

impl fmt::Display for ViralGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn viral_grade(views: u64, subscribers: u64) -> ViralGrade {
    match efficiency_ratio(views, subscribers).percent() {
        Some(percent) => ViralGrade::from_percent(percent),
        None => ViralGrade::NotAvailable,
    }
}

/// `(likes + comments) / views` as a percentage; `None` without views.
pub fn engagement_rate(likes: u64, comments: u64, views: u64) -> Option<f64> {
    if views == 0 {
        return None;
    }
    Some((likes as f64 + comments as f64) * 100.0 / views as f64)
}

pub fn aggregate_engagement(videos: &[Video]) -> Option<f64> {
    let (likes, comments, views) = videos.iter().fold((0u64, 0u64, 0u64), |acc, video| {
        (
            acc.0.saturating_add(video.like_count),
            acc.1.saturating_add(video.comment_count),
            acc.2.saturating_add(video.view_count),
        )
    });
    engagement_rate(likes, comments, views)
}

/// Views per hour since publication. Elapsed time is floored at one hour so
/// a video published minutes ago does not spike.
pub fn velocity(view_count: u64, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - published_at).num_seconds() as f64 / 3600.0;
    view_count as f64 / hours.max(1.0)
}

/// A CPM band (revenue per thousand views). The two presets are separate
/// display bands and must not be converted into each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpmBand {
    pub label: &'static str,
    pub low: f64,
    pub high: f64,
}

impl CpmBand {
    pub const USD: CpmBand = CpmBand {
        label: "USD",
        low: 0.5,
        high: 4.0,
    };

    pub const KRW: CpmBand = CpmBand {
        label: "KRW",
        low: 1500.0,
        high: 4500.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenueRange {
    pub currency: &'static str,
    pub min: f64,
    pub max: f64,
}

pub fn estimated_monthly_revenue(avg_views: f64, uploads_per_day: f64, band: CpmBand) -> RevenueRange {
    let monthly_views = avg_views * uploads_per_day * 30.0;
    RevenueRange {
        currency: band.label,
        min: monthly_views / 1000.0 * band.low,
        max: monthly_views / 1000.0 * band.high,
    }
}

pub fn average_views(videos: &[Video]) -> f64 {
    if videos.is_empty() {
        return 0.0;
    }
    let total: u64 = videos.iter().map(|video| video.view_count).sum();
    total as f64 / videos.len() as f64
}

/// Upload cadence over the window spanned by `videos`, counted from the
/// oldest publish date up to `now` (at least one day).
pub fn uploads_per_day(videos: &[Video], now: DateTime<Utc>) -> f64 {
    let dates: Vec<DateTime<Utc>> = videos.iter().filter_map(|video| video.published_at).collect();
    let Some(oldest) = dates.iter().min() else {
        return 0.0;
    };
    let days = ((now - *oldest).num_seconds() as f64 / 86_400.0).max(1.0);
    dates.len() as f64 / days
}

/// Fixed heuristic growth rates. Not a statistical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Horizon {
    SixMonths,
    OneYear,
}

impl Horizon {
    pub const ALL: [Horizon; 2] = [Horizon::SixMonths, Horizon::OneYear];

    pub fn rate(self) -> f64 {
        match self {
            Horizon::SixMonths => 0.15,
            Horizon::OneYear => 0.35,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::SixMonths => "6 months",
            Horizon::OneYear => "1 year",
        }
    }
}

/// Projected increase over `horizon`.
pub fn growth_projection(current: u64, horizon: Horizon) -> f64 {
    current as f64 * horizon.rate()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub horizon: Horizon,
    pub label: &'static str,
    pub projected_gain: f64,
}

pub fn growth_table(current: u64) -> Vec<GrowthPoint> {
    Horizon::ALL
        .iter()
        .map(|horizon| GrowthPoint {
            horizon: *horizon,
            label: horizon.label(),
            projected_gain: growth_projection(current, *horizon),
        })
        .collect()
}

/// Parses a count field. Blank, negative, non-finite or otherwise malformed
/// input yields zero.
pub fn parse_count(raw: &str) -> u64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if let Ok(value) = cleaned.parse::<u64>() {
        return value;
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value as u64,
        _ => 0,
    }
}

pub fn parse_count_value(value: &serde_json::Value) -> u64 {
    match value {
        serde_json::Value::String(raw) => parse_count(raw),
        serde_json::Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S` or `P1DT2H`.
/// Unparseable input is zero.
pub fn parse_iso8601_duration(raw: &str) -> u64 {
    let Some(body) = raw.trim().strip_prefix('P') else {
        return 0;
    };
    let mut total = 0u64;
    let mut digits = String::new();
    let mut in_time = false;
    for c in body.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => digits.push(c),
            unit => {
                let amount = digits.parse::<u64>().unwrap_or(0);
                digits.clear();
                let seconds = match (unit, in_time) {
                    ('W', false) => 604_800,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return 0,
                };
                total = total.saturating_add(amount.saturating_mul(seconds));
            }
        }
    }
    total
}

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// `950`, `1.2K`, `3.4M`, `5.6B`.
pub fn format_compact(value: u64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e3, "K"), (1e6, "M"), (1e9, "B")];
    let as_float = value as f64;
    let Some(mut unit) = UNITS.iter().rposition(|(scale, _)| as_float >= *scale) else {
        return value.to_string();
    };
    let mut scaled = round_tenth(as_float / UNITS[unit].0);
    // 999_999 rounds to 1000.0K; promote it to 1M.
    if scaled >= 1000.0 && unit + 1 < UNITS.len() {
        unit += 1;
        scaled = round_tenth(as_float / UNITS[unit].0);
    }
    let text = format!("{scaled:.1}");
    format!("{}{}", text.strip_suffix(".0").unwrap_or(&text), UNITS[unit].1)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMetrics {
    pub efficiency_ratio: Ratio,
    pub average_views_per_video: f64,
}

impl ChannelMetrics {
    pub fn compute(channel: &Channel) -> Self {
        let average_views_per_video = if channel.video_count > 0 {
            channel.view_count as f64 / channel.video_count as f64
        } else {
            0.0
        };
        Self {
            efficiency_ratio: efficiency_ratio(channel.view_count, channel.subscriber_count),
            average_views_per_video,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetrics {
    pub velocity: f64,
    pub engagement_rate: Option<f64>,
    pub viral_grade: ViralGrade,
    pub duration_seconds: u64,
}

impl VideoMetrics {
    /// `subscribers` is the owning channel's audience; pass zero when it is
    /// unknown and the grade reports `N/A`.
    pub fn compute(video: &Video, subscribers: u64, now: DateTime<Utc>) -> Self {
        Self {
            velocity: video
                .published_at
                .map(|published| velocity(video.view_count, published, now))
                .unwrap_or(0.0),
            engagement_rate: engagement_rate(video.like_count, video.comment_count, video.view_count),
            viral_grade: viral_grade(video.view_count, subscribers),
            duration_seconds: parse_iso8601_duration(&video.duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Thumbnails;
    use chrono::Duration;

    fn video(views: u64, likes: u64, comments: u64, published_at: Option<DateTime<Utc>>) -> Video {
        Video {
            id: "v".into(),
            title: "t".into(),
            description: String::new(),
            channel_id: "c".into(),
            channel_title: "ct".into(),
            category_id: None,
            tags: Vec::new(),
            thumbnails: Thumbnails::default(),
            published_at,
            view_count: views,
            like_count: likes,
            comment_count: comments,
            duration: "PT4M5S".into(),
        }
    }

    #[test]
    fn efficiency_divides_views_by_subscribers() {
        assert_eq!(efficiency_ratio(500, 100), Ratio::Value(5.0));
        assert_eq!(efficiency_ratio(0, 100), Ratio::Value(0.0));
    }

    #[test]
    fn efficiency_without_subscribers_is_not_available() {
        let ratio = efficiency_ratio(500, 0);
        assert_eq!(ratio, Ratio::NotAvailable);
        assert_eq!(ratio.to_string(), "N/A");
        assert_eq!(efficiency_value(500, 0), 0.0);
        assert_eq!(serde_json::to_value(ratio).unwrap(), serde_json::json!("N/A"));
    }

    #[test]
    fn viral_grade_boundaries_are_strict() {
        assert_eq!(ViralGrade::from_percent(200.0), ViralGrade::S);
        assert_eq!(ViralGrade::from_percent(200.01), ViralGrade::SPlus);
        assert_eq!(ViralGrade::from_percent(100.0), ViralGrade::A);
        assert_eq!(ViralGrade::from_percent(50.0), ViralGrade::B);
        assert_eq!(ViralGrade::from_percent(20.0), ViralGrade::C);
        assert_eq!(viral_grade(200, 100), ViralGrade::S);
        assert_eq!(viral_grade(20_001, 10_000), ViralGrade::SPlus);
        assert_eq!(viral_grade(0, 10), ViralGrade::C);
        assert_eq!(viral_grade(10, 0), ViralGrade::NotAvailable);
        assert_eq!(ViralGrade::SPlus.to_string(), "S+");
    }

    #[test]
    fn engagement_guards_zero_views() {
        assert_eq!(engagement_rate(10, 10, 0), None);
        assert_eq!(engagement_rate(40, 10, 1000), Some(5.0));

        let now = Utc::now();
        let videos = [video(1000, 30, 10, Some(now)), video(1000, 50, 10, Some(now))];
        assert_eq!(aggregate_engagement(&videos), Some(5.0));
        assert_eq!(aggregate_engagement(&[]), None);
    }

    #[test]
    fn velocity_floors_elapsed_time_at_one_hour() {
        let now = Utc::now();
        assert_eq!(velocity(3600, now - Duration::minutes(30), now), 3600.0);
        assert_eq!(velocity(3600, now + Duration::hours(2), now), 3600.0);
        assert_eq!(velocity(7200, now - Duration::hours(4), now), 1800.0);
    }

    #[test]
    fn revenue_presets_stay_distinct() {
        let usd = estimated_monthly_revenue(10_000.0, 1.0, CpmBand::USD);
        assert_eq!(usd.min, 150.0);
        assert_eq!(usd.max, 1200.0);

        let krw = estimated_monthly_revenue(10_000.0, 1.0, CpmBand::KRW);
        assert_eq!(krw.min, 450_000.0);
        assert_eq!(krw.max, 1_350_000.0);
        assert_eq!(krw.currency, "KRW");
    }

    #[test]
    fn upload_cadence_spans_oldest_video() {
        let now = Utc::now();
        let videos = [
            video(1, 0, 0, Some(now - Duration::days(10))),
            video(1, 0, 0, Some(now - Duration::days(5))),
            video(1, 0, 0, None),
        ];
        let cadence = uploads_per_day(&videos, now);
        assert!((cadence - 0.2).abs() < 1e-9);
        assert_eq!(uploads_per_day(&[], now), 0.0);
    }

    #[test]
    fn growth_uses_fixed_rates() {
        assert!((growth_projection(1000, Horizon::SixMonths) - 150.0).abs() < 1e-9);
        assert!((growth_projection(1000, Horizon::OneYear) - 350.0).abs() < 1e-9);
        assert_eq!(growth_table(100).len(), 2);
    }

    #[test]
    fn malformed_counts_parse_to_zero() {
        assert_eq!(parse_count("N/A"), 0);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("-5"), 0);
        assert_eq!(parse_count("NaN"), 0);
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count(" 42 "), 42);
        assert_eq!(parse_count_value(&serde_json::json!(12.7)), 12);
        assert_eq!(parse_count_value(&serde_json::json!(null)), 0);
    }

    #[test]
    fn durations_parse_and_format() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration("garbage"), 0);
        assert_eq!(format_duration(3723), "1:02:03");
        assert_eq!(format_duration(245), "4:05");
    }

    #[test]
    fn compact_formatting() {
        assert_eq!(format_compact(950), "950");
        assert_eq!(format_compact(1000), "1K");
        assert_eq!(format_compact(1240), "1.2K");
        assert_eq!(format_compact(3_400_000), "3.4M");
        assert_eq!(format_compact(5_600_000_000), "5.6B");
        assert_eq!(format_compact(999_999), "1M");
        assert_eq!(format_compact(999_949), "999.9K");
        assert_eq!(format_compact(999_999_999), "1B");
    }

    #[test]
    fn video_metrics_bundle() {
        let now = Utc::now();
        let metrics = VideoMetrics::compute(&video(300, 20, 10, Some(now - Duration::hours(3))), 100, now);
        assert_eq!(metrics.velocity, 100.0);
        assert_eq!(metrics.engagement_rate, Some(10.0));
        assert_eq!(metrics.viral_grade, ViralGrade::SPlus);
        assert_eq!(metrics.duration_seconds, 245);
    }
}

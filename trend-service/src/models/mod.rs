use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One crawled metric row per video per platform per calendar day.
///
/// Written by the external ingestion process; read-only to this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub video_id: String,
    pub platform: String,
    pub snapshot_date: NaiveDate,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
}

/// A single point of a per-video history chart, enriched with
/// day-over-day increases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPoint {
    pub snapshot_date: NaiveDate,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub daily_view_increase: i64,
    pub daily_like_increase: i64,
    pub daily_comment_increase: i64,
}

/// Static video metadata plus the denormalized "current" metric triple.
///
/// The metric triple is a fallback for videos that have no snapshot yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: Option<String>,
    pub platform: String,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub crawled_at: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
    pub total_score: Option<f64>,
    pub trend_score: Option<f64>,
}

/// Explainability breakdown of a surge score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgeComponents {
    pub growth_factor: f64,
    pub velocity_factor: f64,
    pub popularity_factor: f64,
    pub freshness_factor: f64,
}

/// The externally visible unit returned by every ranking operation:
/// a [`VideoSummary`] enriched with computed ranking fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedVideo {
    #[serde(flatten)]
    pub video: VideoSummary,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_view_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_bonus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surge_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surge_components: Option<SurgeComponents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_rank: Option<i32>,
}

impl RankedVideo {
    /// Wrap a bare summary with no computed fields yet.
    pub fn from_summary(video: VideoSummary) -> Self {
        Self {
            video,
            normalized_view_score: None,
            view_velocity: None,
            view_count_change: None,
            like_count_change: None,
            comment_count_change: None,
            growth_rate_percentage: None,
            age_minutes: None,
            age_hours: None,
            freshness_score: None,
            freshness_bonus: None,
            surge_score: None,
            surge_components: None,
            trending_rank: None,
        }
    }
}

/// Per-(category, platform, date) rollup maintained by the aggregation
/// pipeline; read-only to this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTrend {
    pub category: String,
    pub platform: String,
    pub date: NaiveDate,
    pub video_count: Option<i64>,
    pub avg_total_score: Option<f64>,
    pub growth_rate: Option<f64>,
    pub rank: Option<i32>,
}

/// The four named buckets of the featured surface plus a short
/// natural-language summary of the hottest categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturedResponse {
    pub popular: Vec<RankedVideo>,
    pub rising: Vec<RankedVideo>,
    pub categories: Vec<CategoryTrend>,
    pub recommended: Vec<RankedVideo>,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> VideoSummary {
        VideoSummary {
            video_id: "vid-1".to_string(),
            title: "Test video".to_string(),
            channel_id: "chan-1".to_string(),
            channel_title: Some("Test Channel".to_string()),
            platform: "youtube".to_string(),
            category: Some("Music".to_string()),
            summary: None,
            view_count: 1000,
            like_count: 50,
            comment_count: 10,
            published_at: None,
            crawled_at: None,
            thumbnail_url: None,
            total_score: Some(0.8),
            trend_score: None,
        }
    }

    #[test]
    fn ranked_video_serializes_flat_and_skips_none() {
        let ranked = RankedVideo {
            surge_score: Some(12.5),
            ..RankedVideo::from_summary(sample_summary())
        };

        let json = serde_json::to_value(&ranked).unwrap();
        // Summary fields flattened to the top level
        assert_eq!(json["video_id"], "vid-1");
        assert_eq!(json["view_count"], 1000);
        assert_eq!(json["surge_score"], 12.5);
        // Unset computed fields are omitted entirely
        assert!(json.get("trending_rank").is_none());
        assert!(json.get("view_velocity").is_none());
    }

    #[test]
    fn featured_response_round_trips() {
        let response = FeaturedResponse {
            popular: vec![RankedVideo::from_summary(sample_summary())],
            rising: vec![],
            categories: vec![],
            recommended: vec![],
            summary: "Not enough trend data yet.".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        let back: FeaturedResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.popular.len(), 1);
        assert_eq!(back.popular[0].video.video_id, "vid-1");
        assert_eq!(back.summary, response.summary);
    }
}

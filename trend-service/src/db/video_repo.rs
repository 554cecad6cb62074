/// Trend Repository
///
/// Candidate queries for the popular/rising/surge rankings plus the
/// best-effort trend-score cache write. Channel-size normalization and
/// previous-snapshot values are resolved here with window aggregates and
/// lateral lookups; all scoring math happens in the service layer.
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::error;

use crate::error::{AppError, Result};
use crate::models::{CategoryTrend, VideoSummary};

/// A raw ranking candidate: video metadata, the current metric triple
/// (snapshot-first, video-table fallback) and the aggregates the
/// partitioners need.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
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

    /// Mean view count over the candidate's channel (window aggregate).
    pub channel_avg_view: Option<f64>,
    /// View/like/comment counts at the prior snapshot anchor, absent when
    /// the video has no snapshot there.
    pub prev_view_count: Option<i64>,
    pub prev_like_count: Option<i64>,
    pub prev_comment_count: Option<i64>,
}

impl CandidateRow {
    pub fn into_summary(self) -> VideoSummary {
        VideoSummary {
            video_id: self.video_id,
            title: self.title,
            channel_id: self.channel_id,
            channel_title: self.channel_title,
            platform: self.platform,
            category: self.category,
            summary: self.summary,
            view_count: self.view_count,
            like_count: self.like_count,
            comment_count: self.comment_count,
            published_at: self.published_at,
            crawled_at: self.crawled_at,
            thumbnail_url: self.thumbnail_url,
            total_score: self.total_score,
            trend_score: self.trend_score,
        }
    }
}

#[async_trait]
pub trait TrendStore: Send + Sync {
    /// Candidates for the popular bucket, pre-ordered by channel-normalized
    /// view score.
    async fn fetch_popular_candidates(
        &self,
        limit: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>>;

    /// Candidates for the rising bucket with the `velocity_days`-old
    /// snapshot resolved per video.
    async fn fetch_rising_candidates(
        &self,
        limit: i64,
        velocity_days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>>;

    /// Candidates for the surge ranking: videos published or crawled within
    /// `days` days, with current and `velocity_days`-old snapshot values.
    async fn fetch_surge_candidates(
        &self,
        limit: i64,
        days: i64,
        velocity_days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>>;

    /// Recently published videos of one category, score-ordered, with the
    /// one-day-old snapshot resolved for delta enrichment.
    async fn fetch_category_candidates(
        &self,
        category: &str,
        limit: i64,
        days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>>;

    /// Latest-date category rollups, rank-ordered.
    async fn fetch_hot_category_trends(
        &self,
        platform: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CategoryTrend>>;

    /// Single video with its denormalized current metric triple.
    async fn fetch_video_summary(
        &self,
        video_id: &str,
        platform: &str,
    ) -> Result<Option<VideoSummary>>;

    /// Cache the surge score into the score record. Idempotent by
    /// video_id, last writer wins; callers treat failure as non-fatal.
    async fn upsert_trend_score(
        &self,
        video_id: &str,
        platform: &str,
        score: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

pub struct PgTrendStore {
    pool: PgPool,
}

impl PgTrendStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrendStore for PgTrendStore {
    async fn fetch_popular_candidates(
        &self,
        limit: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            WITH base AS (
                SELECT
                    v.video_id,
                    v.title,
                    v.channel_id,
                    COALESCE(ch.title, v.channel_id) AS channel_title,
                    v.platform,
                    vs.category,
                    vs.summary,
                    COALESCE(v.view_count, 0) AS view_count,
                    COALESCE(v.like_count, 0) AS like_count,
                    COALESCE(v.comment_count, 0) AS comment_count,
                    v.published_at,
                    v.crawled_at,
                    v.thumbnail_url,
                    sc.total_score,
                    sc.trend_score,
                    AVG(v.view_count) OVER (PARTITION BY v.channel_id)::FLOAT8 AS channel_avg_view
                FROM video v
                LEFT JOIN video_sentiment vs ON vs.video_id = v.video_id
                LEFT JOIN video_score sc ON sc.video_id = v.video_id
                LEFT JOIN channel ch ON ch.channel_id = v.channel_id
                WHERE ($1::VARCHAR IS NULL OR v.platform = $1)
            )
            SELECT
                base.*,
                NULL::BIGINT AS prev_view_count,
                NULL::BIGINT AS prev_like_count,
                NULL::BIGINT AS prev_comment_count
            FROM base
            ORDER BY CASE
                         WHEN channel_avg_view > 0 THEN view_count / channel_avg_view
                         ELSE view_count::FLOAT8
                     END DESC NULLS LAST,
                     COALESCE(total_score, view_count::FLOAT8) DESC NULLS LAST,
                     view_count DESC,
                     crawled_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(platform)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch popular candidates: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows)
    }

    async fn fetch_rising_candidates(
        &self,
        limit: i64,
        velocity_days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>> {
        let prev_anchor = Utc::now().date_naive() - Duration::days(velocity_days.max(1));

        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                v.video_id,
                v.title,
                v.channel_id,
                COALESCE(ch.title, v.channel_id) AS channel_title,
                v.platform,
                vs.category,
                vs.summary,
                COALESCE(curr.view_count, v.view_count, 0) AS view_count,
                COALESCE(curr.like_count, v.like_count, 0) AS like_count,
                COALESCE(curr.comment_count, v.comment_count, 0) AS comment_count,
                v.published_at,
                v.crawled_at,
                v.thumbnail_url,
                sc.total_score,
                sc.trend_score,
                AVG(v.view_count) OVER (PARTITION BY v.channel_id)::FLOAT8 AS channel_avg_view,
                prev.view_count AS prev_view_count,
                prev.like_count AS prev_like_count,
                prev.comment_count AS prev_comment_count
            FROM video v
            LEFT JOIN video_sentiment vs ON vs.video_id = v.video_id
            LEFT JOIN video_score sc ON sc.video_id = v.video_id
            LEFT JOIN channel ch ON ch.channel_id = v.channel_id
            LEFT JOIN LATERAL (
                SELECT s.view_count, s.like_count, s.comment_count
                FROM video_metrics_snapshot s
                WHERE s.video_id = v.video_id AND s.platform = v.platform
                ORDER BY s.snapshot_date DESC
                LIMIT 1
            ) curr ON TRUE
            LEFT JOIN LATERAL (
                SELECT s.view_count, s.like_count, s.comment_count
                FROM video_metrics_snapshot s
                WHERE s.video_id = v.video_id
                  AND s.platform = v.platform
                  AND s.snapshot_date <= $3
                ORDER BY s.snapshot_date DESC
                LIMIT 1
            ) prev ON TRUE
            WHERE ($1::VARCHAR IS NULL OR v.platform = $1)
            ORDER BY GREATEST(COALESCE(curr.view_count, v.view_count, 0)
                              - COALESCE(prev.view_count, 0), 0) DESC,
                     crawled_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(platform)
        .bind(limit.max(0))
        .bind(prev_anchor)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch rising candidates: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows)
    }

    async fn fetch_surge_candidates(
        &self,
        limit: i64,
        days: i64,
        velocity_days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>> {
        let to_date = Utc::now().date_naive();
        let from_date = to_date - Duration::days((days - 1).max(0));
        let prev_anchor = to_date - Duration::days(velocity_days.max(1));

        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                v.video_id,
                v.title,
                v.channel_id,
                COALESCE(ch.title, v.channel_id) AS channel_title,
                v.platform,
                vs.category,
                vs.summary,
                COALESCE(curr.view_count, v.view_count, 0) AS view_count,
                COALESCE(curr.like_count, v.like_count, 0) AS like_count,
                COALESCE(curr.comment_count, v.comment_count, 0) AS comment_count,
                v.published_at,
                v.crawled_at,
                v.thumbnail_url,
                sc.total_score,
                sc.trend_score,
                NULL::FLOAT8 AS channel_avg_view,
                prev.view_count AS prev_view_count,
                prev.like_count AS prev_like_count,
                prev.comment_count AS prev_comment_count
            FROM video v
            LEFT JOIN video_sentiment vs ON vs.video_id = v.video_id
            LEFT JOIN video_score sc ON sc.video_id = v.video_id
            LEFT JOIN channel ch ON ch.channel_id = v.channel_id
            LEFT JOIN LATERAL (
                SELECT s.view_count, s.like_count, s.comment_count
                FROM video_metrics_snapshot s
                WHERE s.video_id = v.video_id
                  AND s.platform = v.platform
                  AND s.snapshot_date <= $4
                ORDER BY s.snapshot_date DESC
                LIMIT 1
            ) curr ON TRUE
            LEFT JOIN LATERAL (
                SELECT s.view_count, s.like_count, s.comment_count
                FROM video_metrics_snapshot s
                WHERE s.video_id = v.video_id
                  AND s.platform = v.platform
                  AND s.snapshot_date <= $5
                ORDER BY s.snapshot_date DESC
                LIMIT 1
            ) prev ON TRUE
            WHERE COALESCE(v.published_at::DATE, v.crawled_at::DATE) BETWEEN $3 AND $4
              AND ($1::VARCHAR IS NULL OR v.platform = $1)
            ORDER BY CASE
                         WHEN COALESCE(curr.view_count, v.view_count, 0)
                              - COALESCE(prev.view_count, 0) > 0 THEN 1
                         ELSE 0
                     END DESC,
                     COALESCE(curr.view_count, v.view_count, 0)
                         - COALESCE(prev.view_count, 0) DESC,
                     COALESCE(curr.comment_count, v.comment_count, 0)
                         - COALESCE(prev.comment_count, 0) DESC,
                     COALESCE(curr.view_count, v.view_count, 0) DESC,
                     COALESCE(sc.total_score, 0) DESC,
                     v.published_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(platform)
        .bind(limit.max(0))
        .bind(from_date)
        .bind(to_date)
        .bind(prev_anchor)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch surge candidates: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows)
    }

    async fn fetch_category_candidates(
        &self,
        category: &str,
        limit: i64,
        days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<CandidateRow>> {
        let until_date = Utc::now().date_naive();
        let since_date = until_date - Duration::days(days.max(0));
        let prev_anchor = until_date - Duration::days(1);

        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                v.video_id,
                v.title,
                v.channel_id,
                COALESCE(ch.title, v.channel_id) AS channel_title,
                v.platform,
                vs.category,
                vs.summary,
                COALESCE(v.view_count, 0) AS view_count,
                COALESCE(v.like_count, 0) AS like_count,
                COALESCE(v.comment_count, 0) AS comment_count,
                v.published_at,
                v.crawled_at,
                v.thumbnail_url,
                sc.total_score,
                sc.trend_score,
                NULL::FLOAT8 AS channel_avg_view,
                prev.view_count AS prev_view_count,
                prev.like_count AS prev_like_count,
                prev.comment_count AS prev_comment_count
            FROM video v
            LEFT JOIN video_sentiment vs ON vs.video_id = v.video_id
            LEFT JOIN video_score sc ON sc.video_id = v.video_id
            LEFT JOIN channel ch ON ch.channel_id = v.channel_id
            LEFT JOIN LATERAL (
                SELECT s.view_count, s.like_count, s.comment_count
                FROM video_metrics_snapshot s
                WHERE s.video_id = v.video_id
                  AND s.platform = v.platform
                  AND s.snapshot_date <= $5
                ORDER BY s.snapshot_date DESC
                LIMIT 1
            ) prev ON TRUE
            WHERE vs.category = $1
              AND v.published_at::DATE BETWEEN $3 AND $4
              AND ($6::VARCHAR IS NULL OR v.platform = $6)
            ORDER BY COALESCE(sc.total_score, v.view_count::FLOAT8) DESC NULLS LAST,
                     v.crawled_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(category)
        .bind(limit.max(0))
        .bind(since_date)
        .bind(until_date)
        .bind(prev_anchor)
        .bind(platform)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch category candidates: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows)
    }

    async fn fetch_hot_category_trends(
        &self,
        platform: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CategoryTrend>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,         // category
                String,         // platform
                NaiveDate,      // date
                Option<i64>,    // video_count
                Option<f64>,    // avg_total_score
                Option<f64>,    // growth_rate
                Option<i32>,    // rank
            ),
        >(
            r#"
            SELECT ct.category,
                   ct.platform,
                   ct.date,
                   ct.video_count,
                   ct.avg_total_score,
                   ct.growth_rate,
                   ct.rank
            FROM category_trend ct
            JOIN (
                SELECT category, platform, MAX(date) AS max_date
                FROM category_trend
                WHERE ($1::VARCHAR IS NULL OR platform = $1)
                GROUP BY category, platform
            ) latest
              ON ct.category = latest.category
             AND ct.platform = latest.platform
             AND ct.date = latest.max_date
            WHERE ($1::VARCHAR IS NULL OR ct.platform = $1)
            ORDER BY ct.rank ASC NULLS LAST, ct.video_count DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(platform)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch category trends: {}", e);
            AppError::Database(e.to_string())
        })?
        .into_iter()
        .map(
            |(category, platform, date, video_count, avg_total_score, growth_rate, rank)| {
                CategoryTrend {
                    category,
                    platform,
                    date,
                    video_count,
                    avg_total_score,
                    growth_rate,
                    rank,
                }
            },
        )
        .collect();

        Ok(rows)
    }

    async fn fetch_video_summary(
        &self,
        video_id: &str,
        platform: &str,
    ) -> Result<Option<VideoSummary>> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                v.video_id,
                v.title,
                v.channel_id,
                COALESCE(ch.title, v.channel_id) AS channel_title,
                v.platform,
                vs.category,
                vs.summary,
                COALESCE(v.view_count, 0) AS view_count,
                COALESCE(v.like_count, 0) AS like_count,
                COALESCE(v.comment_count, 0) AS comment_count,
                v.published_at,
                v.crawled_at,
                v.thumbnail_url,
                sc.total_score,
                sc.trend_score,
                NULL::FLOAT8 AS channel_avg_view,
                NULL::BIGINT AS prev_view_count,
                NULL::BIGINT AS prev_like_count,
                NULL::BIGINT AS prev_comment_count
            FROM video v
            LEFT JOIN video_sentiment vs ON vs.video_id = v.video_id
            LEFT JOIN video_score sc ON sc.video_id = v.video_id
            LEFT JOIN channel ch ON ch.channel_id = v.channel_id
            WHERE v.video_id = $1 AND v.platform = $2
            "#,
        )
        .bind(video_id)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch video summary: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(row.map(CandidateRow::into_summary))
    }

    async fn upsert_trend_score(
        &self,
        video_id: &str,
        platform: &str,
        score: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO video_score (video_id, platform, trend_score, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (video_id) DO UPDATE SET
                trend_score = EXCLUDED.trend_score,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(video_id)
        .bind(platform)
        .bind(score)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to upsert trend score for {}: {}", video_id, e);
            AppError::Database(e.to_string())
        })?;

        Ok(())
    }
}

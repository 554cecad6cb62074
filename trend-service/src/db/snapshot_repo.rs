/// Snapshot Accessor
///
/// Point-in-time metric snapshot reads. Purely advisory: gaps in the
/// daily series and empty histories come back as `None`/empty, never as
/// errors.
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::error;

use crate::error::{AppError, Result};
use crate::models::MetricSnapshot;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Full daily series for a video, ascending by snapshot date.
    async fn get_series(&self, video_id: &str, platform: &str) -> Result<Vec<MetricSnapshot>>;

    /// Most recent snapshot with `snapshot_date <= date`.
    async fn latest_at_or_before(
        &self,
        video_id: &str,
        platform: &str,
        date: NaiveDate,
    ) -> Result<Option<MetricSnapshot>>;

    /// Most recent snapshot at or before `before_date` whose view count
    /// differs from `current_view_count`.
    ///
    /// Resolves a meaningful prior baseline when the naive "N days ago"
    /// snapshot equals the current value (stale or duplicate crawl).
    /// `None` means no differing value exists; callers treat the delta as
    /// zero rather than fabricating one.
    async fn nearest_earlier_distinct(
        &self,
        video_id: &str,
        platform: &str,
        current_view_count: i64,
        before_date: NaiveDate,
    ) -> Result<Option<MetricSnapshot>>;

    /// Mean view count across all videos of a channel, `None` when the
    /// channel has no videos.
    async fn channel_average_view_count(&self, channel_id: &str) -> Result<Option<f64>>;
}

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type SnapshotTuple = (String, String, NaiveDate, i64, i64, i64);

fn into_snapshot(
    (video_id, platform, snapshot_date, view_count, like_count, comment_count): SnapshotTuple,
) -> MetricSnapshot {
    MetricSnapshot {
        video_id,
        platform,
        snapshot_date,
        view_count,
        like_count,
        comment_count,
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn get_series(&self, video_id: &str, platform: &str) -> Result<Vec<MetricSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotTuple>(
            r#"
            SELECT video_id, platform, snapshot_date, view_count, like_count, comment_count
            FROM video_metrics_snapshot
            WHERE video_id = $1 AND platform = $2
            ORDER BY snapshot_date ASC
            "#,
        )
        .bind(video_id)
        .bind(platform)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch snapshot series: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows.into_iter().map(into_snapshot).collect())
    }

    async fn latest_at_or_before(
        &self,
        video_id: &str,
        platform: &str,
        date: NaiveDate,
    ) -> Result<Option<MetricSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotTuple>(
            r#"
            SELECT video_id, platform, snapshot_date, view_count, like_count, comment_count
            FROM video_metrics_snapshot
            WHERE video_id = $1 AND platform = $2 AND snapshot_date <= $3
            ORDER BY snapshot_date DESC
            LIMIT 1
            "#,
        )
        .bind(video_id)
        .bind(platform)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch latest snapshot: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(row.map(into_snapshot))
    }

    async fn nearest_earlier_distinct(
        &self,
        video_id: &str,
        platform: &str,
        current_view_count: i64,
        before_date: NaiveDate,
    ) -> Result<Option<MetricSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotTuple>(
            r#"
            SELECT video_id, platform, snapshot_date, view_count, like_count, comment_count
            FROM video_metrics_snapshot
            WHERE video_id = $1
              AND platform = $2
              AND snapshot_date <= $3
              AND view_count <> $4
            ORDER BY snapshot_date DESC
            LIMIT 1
            "#,
        )
        .bind(video_id)
        .bind(platform)
        .bind(before_date)
        .bind(current_view_count)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch distinct prior snapshot: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(row.map(into_snapshot))
    }

    async fn channel_average_view_count(&self, channel_id: &str) -> Result<Option<f64>> {
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT AVG(view_count)::FLOAT8
            FROM video
            WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch channel average view count: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(avg)
    }
}

/// Trend query surface
///
/// Read-side operations next to the featured buckets: category rankings,
/// category-scoped recommendations with snapshot-delta enrichment, and
/// per-video history series for trend charts.
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::warn;

use crate::db::snapshot_repo::SnapshotStore;
use crate::db::video_repo::TrendStore;
use crate::error::Result;
use crate::models::{CategoryTrend, MetricSnapshot, RankedVideo, SnapshotPoint};

pub struct TrendQueryService {
    store: Arc<dyn TrendStore>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl TrendQueryService {
    pub fn new(store: Arc<dyn TrendStore>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { store, snapshots }
    }

    /// Latest category ranking for the trends tab.
    pub async fn get_hot_categories(
        &self,
        platform: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CategoryTrend>> {
        self.store.fetch_hot_category_trends(platform, limit).await
    }

    /// Score-ordered recent videos of one category, enriched with
    /// day-over-day count changes.
    pub async fn get_recommended_by_category(
        &self,
        category: &str,
        limit: i64,
        days: i64,
        platform: Option<&str>,
    ) -> Result<Vec<RankedVideo>> {
        let rows = self
            .store
            .fetch_category_candidates(category, limit, days, platform)
            .await?;

        let anchor = Utc::now().date_naive() - Duration::days(1);
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let view_now = row.view_count;
            let like_now = row.like_count;
            let comment_now = row.comment_count;

            let mut view_prev = row.prev_view_count.unwrap_or(0);
            let mut like_prev = row.prev_like_count.unwrap_or(0);
            let mut comment_prev = row.prev_comment_count.unwrap_or(0);

            // Stale-crawl fallback, same rule as the surge scorer
            if view_prev == view_now && view_prev > 0 {
                match self
                    .snapshots
                    .nearest_earlier_distinct(&row.video_id, &row.platform, view_now, anchor)
                    .await
                {
                    Ok(Some(snapshot)) => {
                        view_prev = snapshot.view_count;
                        like_prev = snapshot.like_count;
                        comment_prev = snapshot.comment_count;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            video_id = %row.video_id,
                            error = %e,
                            "Distinct prior snapshot lookup failed"
                        );
                    }
                }
            }

            let delta_views = view_now - view_prev;
            let growth_percentage = if view_prev > 0 {
                let raw = delta_views as f64 / view_prev as f64 * 100.0;
                (raw * 10.0).round() / 10.0
            } else {
                0.0
            };

            let mut item = RankedVideo::from_summary(row.into_summary());
            item.view_count_change = Some(delta_views);
            item.like_count_change = Some(like_now - like_prev);
            item.comment_count_change = Some(comment_now - comment_prev);
            item.growth_rate_percentage = Some(growth_percentage);
            items.push(item);
        }

        Ok(items)
    }

    /// Daily snapshot history for one video, with day-over-day increases.
    ///
    /// Falls back to a single synthetic point from the denormalized
    /// current triple when the video has no snapshots yet.
    pub async fn get_video_history(
        &self,
        video_id: &str,
        platform: &str,
        days: i64,
    ) -> Result<Vec<SnapshotPoint>> {
        let since = Utc::now().date_naive() - Duration::days(days.max(0));
        let series = self.snapshots.get_series(video_id, platform).await?;
        let points = history_points(&series, since);
        if !points.is_empty() {
            return Ok(points);
        }

        let Some(summary) = self.store.fetch_video_summary(video_id, platform).await? else {
            return Ok(Vec::new());
        };

        Ok(vec![SnapshotPoint {
            snapshot_date: Utc::now().date_naive(),
            view_count: summary.view_count,
            like_count: summary.like_count,
            comment_count: summary.comment_count,
            daily_view_increase: 0,
            daily_like_increase: 0,
            daily_comment_increase: 0,
        }])
    }
}

/// Window an ascending snapshot series and attach day-over-day deltas.
/// The first retained point has no predecessor and reports zero increases.
fn history_points(series: &[MetricSnapshot], since: NaiveDate) -> Vec<SnapshotPoint> {
    let windowed: Vec<&MetricSnapshot> = series
        .iter()
        .filter(|s| s.snapshot_date >= since)
        .collect();

    windowed
        .iter()
        .enumerate()
        .map(|(i, snapshot)| {
            let previous = if i > 0 { Some(windowed[i - 1]) } else { None };
            SnapshotPoint {
                snapshot_date: snapshot.snapshot_date,
                view_count: snapshot.view_count,
                like_count: snapshot.like_count,
                comment_count: snapshot.comment_count,
                daily_view_increase: previous
                    .map(|p| snapshot.view_count - p.view_count)
                    .unwrap_or(0),
                daily_like_increase: previous
                    .map(|p| snapshot.like_count - p.like_count)
                    .unwrap_or(0),
                daily_comment_increase: previous
                    .map(|p| snapshot.comment_count - p.comment_count)
                    .unwrap_or(0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(date: (i32, u32, u32), views: i64, likes: i64, comments: i64) -> MetricSnapshot {
        MetricSnapshot {
            video_id: "vid".to_string(),
            platform: "youtube".to_string(),
            snapshot_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            view_count: views,
            like_count: likes,
            comment_count: comments,
        }
    }

    #[test]
    fn history_points_compute_daily_increases() {
        let series = vec![
            snapshot((2025, 6, 1), 100, 10, 1),
            snapshot((2025, 6, 2), 250, 25, 4),
            snapshot((2025, 6, 3), 240, 30, 6),
        ];

        let points = history_points(&series, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].daily_view_increase, 0);
        assert_eq!(points[1].daily_view_increase, 150);
        // Re-measurement noise can go negative; it is reported as-is
        assert_eq!(points[2].daily_view_increase, -10);
        assert_eq!(points[2].daily_like_increase, 5);
    }

    #[test]
    fn history_points_window_resets_first_delta() {
        let series = vec![
            snapshot((2025, 6, 1), 100, 0, 0),
            snapshot((2025, 6, 5), 500, 0, 0),
            snapshot((2025, 6, 6), 600, 0, 0),
        ];

        // The June 1st point falls outside the window, so June 5th becomes
        // the first point with a zero delta
        let points = history_points(&series, NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].daily_view_increase, 0);
        assert_eq!(points[1].daily_view_increase, 100);
    }

    #[test]
    fn history_points_empty_series() {
        let points = history_points(&[], NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(points.is_empty());
    }
}

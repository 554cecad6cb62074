/// Surge Scorer
///
/// Combines short-term growth, view velocity, log-scale popularity and
/// freshness decay into one composite score per candidate, assigns a
/// dense trending rank, and caches each score back into the score record
/// as a best-effort side effect.
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::db::snapshot_repo::SnapshotStore;
use crate::db::video_repo::{CandidateRow, TrendStore};
use crate::error::Result;
use crate::models::{RankedVideo, SurgeComponents};

/// Exponential freshness decay rate (lambda).
///
/// exp(-0.05 * age_hours): ~0.30 at 24h, ~0.09 at 48h.
pub const FRESHNESS_DECAY_RATE: f64 = 0.05;

/// Videos with no prior snapshot and more views than this get a
/// synthesized prior instead of a meaningless 0% growth signal.
pub const COLD_START_MIN_VIEWS: i64 = 1000;

/// Prior-count synthesis for cold-start candidates.
///
/// Production behavior intentionally smooths cold-start noise with a
/// random draw; the seam exists so tests can pin the output.
pub trait ColdStartEstimator: Send + Sync {
    fn synthesize_prev(&self, current: i64) -> i64;
}

/// Draws a prior in the 70-90% band of the current count.
pub struct RandomizedColdStart {
    rng: Mutex<StdRng>,
}

impl RandomizedColdStart {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded variant for reproducible output.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomizedColdStart {
    fn default() -> Self {
        Self::new()
    }
}

impl ColdStartEstimator for RandomizedColdStart {
    fn synthesize_prev(&self, current: i64) -> i64 {
        let fraction = self
            .rng
            .lock()
            .map(|mut rng| rng.gen_range(0.70..0.90))
            .unwrap_or(0.8);
        (current as f64 * fraction) as i64
    }
}

/// Freshness terms for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Freshness {
    pub age_minutes: Option<f64>,
    pub age_hours: Option<f64>,
    pub score: f64,
    pub bonus: f64,
    pub with_bonus: f64,
}

/// Freshness decay with an age-bracket bonus. Unknown upload time gets
/// neutral defaults (score 0.5, bonus 1.0).
pub fn freshness_at(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Freshness {
    match published_at {
        Some(published) => {
            let age_seconds = (now - published).num_seconds().max(0) as f64;
            let age_minutes = age_seconds / 60.0;
            let age_hours = age_minutes / 60.0;

            let score = (-FRESHNESS_DECAY_RATE * age_hours).exp();
            let bonus = if age_hours <= 24.0 {
                1.5
            } else if age_hours <= 48.0 {
                1.2
            } else if age_hours <= 72.0 {
                1.1
            } else {
                1.0
            };

            Freshness {
                age_minutes: Some(age_minutes),
                age_hours: Some(age_hours),
                score,
                bonus,
                with_bonus: score * bonus,
            }
        }
        None => Freshness {
            age_minutes: None,
            age_hours: None,
            score: 0.5,
            bonus: 1.0,
            with_bonus: 0.5,
        },
    }
}

/// Composite surge score and its explainability breakdown.
///
/// surge = growth*100 + velocity/1000 + 0.1*ln(max(views,1)+10)
///         + freshness_with_bonus*50
pub fn surge_score(
    growth_rate: f64,
    view_velocity: f64,
    view_count_now: i64,
    freshness_with_bonus: f64,
) -> (f64, SurgeComponents) {
    let growth_factor = growth_rate * 100.0;
    let velocity_factor = view_velocity / 1000.0;
    let popularity_factor = 0.1 * ((view_count_now.max(1) as f64) + 10.0).ln();
    let freshness_factor = freshness_with_bonus * 50.0;

    let total = growth_factor + velocity_factor + popularity_factor + freshness_factor;
    (
        total,
        SurgeComponents {
            growth_factor: round2(growth_factor),
            velocity_factor: round2(velocity_factor),
            popularity_factor: round2(popularity_factor),
            freshness_factor: round2(freshness_factor),
        },
    )
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone)]
pub struct SurgeParams {
    pub platform: Option<String>,
    pub limit: i64,
    pub days: i64,
    pub velocity_days: i64,
}

impl Default for SurgeParams {
    fn default() -> Self {
        Self {
            platform: None,
            limit: 30,
            days: 3,
            velocity_days: 1,
        }
    }
}

pub struct SurgeScorer {
    store: Arc<dyn TrendStore>,
    snapshots: Arc<dyn SnapshotStore>,
    cold_start: Arc<dyn ColdStartEstimator>,
}

impl SurgeScorer {
    pub fn new(store: Arc<dyn TrendStore>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            snapshots,
            cold_start: Arc::new(RandomizedColdStart::new()),
        }
    }

    pub fn with_cold_start(mut self, estimator: Arc<dyn ColdStartEstimator>) -> Self {
        self.cold_start = estimator;
        self
    }

    /// Compute the surge ranking over the candidate window.
    ///
    /// Re-reading the same inputs reproduces the same ranking regardless
    /// of whether the score cache writes succeed.
    pub async fn rank(&self, params: &SurgeParams) -> Result<Vec<RankedVideo>> {
        let velocity_days = params.velocity_days.max(1);
        let rows = self
            .store
            .fetch_surge_candidates(
                params.limit,
                params.days,
                velocity_days,
                params.platform.as_deref(),
            )
            .await?;

        let now = Utc::now();
        let mut scored: Vec<(f64, RankedVideo)> = Vec::with_capacity(rows.len());
        for row in rows {
            scored.push(self.score_row(row, now, velocity_days).await);
        }

        // Stable sort: equal full-precision scores keep candidate order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut items: Vec<RankedVideo> = scored.into_iter().map(|(_, item)| item).collect();
        for (index, item) in items.iter_mut().enumerate() {
            item.trending_rank = Some(index as i32 + 1);
        }

        // Cache writes are fire-and-forget; a failure never affects the
        // returned ranking.
        for item in &items {
            if let Some(score) = item.surge_score {
                if let Err(e) = self
                    .store
                    .upsert_trend_score(&item.video.video_id, &item.video.platform, score, now)
                    .await
                {
                    warn!(
                        video_id = %item.video.video_id,
                        error = %e,
                        "Trend score cache write failed"
                    );
                }
            }
        }

        info!(count = items.len(), "Surge ranking computed");
        Ok(items)
    }

    /// Score one candidate; returns the full-precision score for sorting
    /// alongside the display item.
    async fn score_row(
        &self,
        row: CandidateRow,
        now: DateTime<Utc>,
        velocity_days: i64,
    ) -> (f64, RankedVideo) {
        let view_now = row.view_count;
        let like_now = row.like_count;
        let comment_now = row.comment_count;

        // Raw velocity against the anchor snapshot; a negative value under
        // re-measurement noise is tolerated, not clamped
        let view_velocity =
            (view_now - row.prev_view_count.unwrap_or(0)) as f64 / velocity_days as f64;

        let mut view_prev = row.prev_view_count.unwrap_or(0);
        let mut like_prev = row.prev_like_count.unwrap_or(0);
        let mut comment_prev = row.prev_comment_count.unwrap_or(0);

        // Stale-crawl fallback: the anchor snapshot equals the current
        // value, so look for the nearest earlier differing one
        if view_prev == view_now && view_prev > 0 {
            let anchor = now.date_naive() - Duration::days(velocity_days);
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
                // No differing value in history: the delta stays zero
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

        // Cold start: synthesize a prior instead of reporting 0% growth
        if view_prev == 0 && view_now > COLD_START_MIN_VIEWS {
            view_prev = self.cold_start.synthesize_prev(view_now);
            like_prev = self.cold_start.synthesize_prev(like_now);
            comment_prev = self.cold_start.synthesize_prev(comment_now);
        }

        let delta_views = view_now - view_prev;
        let growth_rate = if view_prev > 0 {
            delta_views as f64 / view_prev as f64
        } else {
            0.0
        };

        let freshness = freshness_at(row.published_at, now);
        let (score, components) =
            surge_score(growth_rate, view_velocity, view_now, freshness.with_bonus);

        let mut item = RankedVideo::from_summary(row.into_summary());
        item.view_velocity = Some(view_velocity);
        item.view_count_change = Some(delta_views);
        item.like_count_change = Some(like_now - like_prev);
        item.comment_count_change = Some(comment_now - comment_prev);
        item.growth_rate_percentage = Some(if growth_rate != 0.0 {
            round1(growth_rate * 100.0)
        } else {
            0.0
        });
        item.age_minutes = freshness.age_minutes;
        item.age_hours = freshness.age_hours;
        item.freshness_score = Some(round4(freshness.score));
        item.freshness_bonus = Some(freshness.bonus);
        item.surge_score = Some(round2(score));
        item.surge_components = Some(components);

        (score, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_is_one_at_age_zero() {
        let now = Utc::now();
        let fresh = freshness_at(Some(now), now);
        assert!((fresh.score - 1.0).abs() < 1e-9);
        assert_eq!(fresh.bonus, 1.5);
        assert!((fresh.with_bonus - 1.5).abs() < 1e-9);
    }

    #[test]
    fn freshness_strictly_decreases_with_age() {
        let now = Utc::now();
        let at_1h = freshness_at(Some(now - Duration::hours(1)), now);
        let at_6h = freshness_at(Some(now - Duration::hours(6)), now);
        let at_23h = freshness_at(Some(now - Duration::hours(23)), now);

        assert!(at_1h.score > at_6h.score);
        assert!(at_6h.score > at_23h.score);
        // Decay checkpoints: ~0.30 at 24h, ~0.09 at 48h
        let at_24h = freshness_at(Some(now - Duration::hours(24)), now);
        let at_48h = freshness_at(Some(now - Duration::hours(48)), now);
        assert!((at_24h.score - 0.301).abs() < 0.01);
        assert!((at_48h.score - 0.091).abs() < 0.01);
    }

    #[test]
    fn freshness_bonus_brackets() {
        let now = Utc::now();
        assert_eq!(freshness_at(Some(now - Duration::hours(12)), now).bonus, 1.5);
        assert_eq!(freshness_at(Some(now - Duration::hours(30)), now).bonus, 1.2);
        assert_eq!(freshness_at(Some(now - Duration::hours(60)), now).bonus, 1.1);
        assert_eq!(freshness_at(Some(now - Duration::hours(100)), now).bonus, 1.0);
    }

    #[test]
    fn freshness_neutral_defaults_without_publish_time() {
        let now = Utc::now();
        let fresh = freshness_at(None, now);
        assert_eq!(fresh.score, 0.5);
        assert_eq!(fresh.bonus, 1.0);
        assert_eq!(fresh.with_bonus, 0.5);
        assert_eq!(fresh.age_minutes, None);
        assert_eq!(fresh.age_hours, None);
    }

    #[test]
    fn surge_score_matches_formula() {
        let (total, components) = surge_score(1.0, 1000.0, 1000, 1.0);

        let expected =
            100.0 + 1.0 + 0.1 * (1010.0_f64).ln() + 50.0;
        assert!((total - expected).abs() < 1e-9);
        assert_eq!(components.growth_factor, 100.0);
        assert_eq!(components.velocity_factor, 1.0);
        assert_eq!(components.freshness_factor, 50.0);
    }

    #[test]
    fn surge_score_is_deterministic() {
        let (a, _) = surge_score(0.37, 420.0, 123_456, 0.8);
        let (b, _) = surge_score(0.37, 420.0, 123_456, 0.8);
        assert_eq!(a, b);
    }

    #[test]
    fn surge_score_popularity_floor() {
        // Zero and negative-free counts use ln(max(views,1) + 10)
        let (zero_views, _) = surge_score(0.0, 0.0, 0, 0.5);
        let (one_view, _) = surge_score(0.0, 0.0, 1, 0.5);
        assert_eq!(zero_views, one_view);
    }

    #[test]
    fn seeded_cold_start_is_reproducible_and_bounded() {
        let first = RandomizedColdStart::with_seed(42);
        let second = RandomizedColdStart::with_seed(42);

        let a: Vec<i64> = (0..5).map(|_| first.synthesize_prev(10_000)).collect();
        let b: Vec<i64> = (0..5).map(|_| second.synthesize_prev(10_000)).collect();
        assert_eq!(a, b);

        for prev in a {
            assert!(prev >= 7000 && prev < 9000);
        }
    }
}

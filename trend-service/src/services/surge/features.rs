/// Windowed Feature Extraction
///
/// Computes short-horizon deltas, growth rates, velocities and channel
/// baseline ratios from a fine-grained (timestamp, view_count) series.
/// Every output is independently optional: a missing feature means
/// "insufficient history", which downstream scoring treats differently
/// from a computed zero.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Observation windows in minutes.
pub const WINDOW_10M: i64 = 10;
pub const WINDOW_30M: i64 = 30;
pub const WINDOW_1H: i64 = 60;
pub const WINDOW_6H: i64 = 360;

/// A single view-count measurement, e.g. one crawl tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewSample {
    pub timestamp: DateTime<Utc>,
    pub view_count: i64,
}

/// Feature bundle used for spike detection. Never persisted; recomputed
/// fresh on every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurgeFeatures {
    pub delta_views_10m: Option<f64>,
    pub delta_views_30m: Option<f64>,
    pub delta_views_1h: Option<f64>,
    pub delta_views_6h: Option<f64>,

    pub growth_rate_10m: Option<f64>,
    pub growth_rate_30m: Option<f64>,
    pub growth_rate_1h: Option<f64>,
    pub growth_rate_6h: Option<f64>,

    /// Short-window growth minus longer-window growth.
    pub acceleration_10m_vs_30m: Option<f64>,

    pub age_minutes: Option<f64>,
    pub age_hours: Option<f64>,

    /// Mean first-10-minutes velocity over the channel's recent uploads.
    pub baseline_velocity_10m_per_min: Option<f64>,
    pub velocity_10m_per_min: Option<f64>,
    pub ratio_velocity_10m_to_baseline: Option<f64>,
}

/// Most recent view count at or before `target_time`.
///
/// `history` must be ascending by timestamp.
fn reference_view(history: &[ViewSample], target_time: DateTime<Utc>) -> Option<i64> {
    let mut reference = None;
    for sample in history {
        if sample.timestamp <= target_time {
            reference = Some(sample.view_count);
        } else {
            break;
        }
    }
    reference
}

/// Compute surge features for a single video.
///
/// * `samples` - (timestamp, view_count) series; sorted internally.
/// * `published_at` - upload time, if known.
/// * `channel_baseline_velocities_10m` - first-10-minutes velocities
///   (views/min) measured on the channel's recent uploads; used to express
///   the current velocity as a multiple of the channel's usual launch.
pub fn compute_surge_features(
    samples: &[ViewSample],
    published_at: Option<DateTime<Utc>>,
    channel_baseline_velocities_10m: &[f64],
) -> SurgeFeatures {
    let mut history = samples.to_vec();
    history.sort_by_key(|s| s.timestamp);
    let Some(now_sample) = history.last().copied() else {
        return SurgeFeatures::default();
    };

    let now = now_sample.timestamp;
    let views_now = now_sample.view_count;

    let window = |window_minutes: i64| -> (Option<f64>, Option<f64>, Option<f64>) {
        let target_time = now - Duration::minutes(window_minutes);
        let Some(prev_views) = reference_view(&history, target_time) else {
            return (None, None, None);
        };

        let delta = (views_now - prev_views) as f64;
        // Zero baselines are deliberately treated as 1 so growth stays
        // numeric; downstream scoring depends on a value always existing.
        let base = if prev_views > 0 { prev_views as f64 } else { 1.0 };
        let growth = delta / base;

        let elapsed_minutes = ((now - target_time).num_seconds() as f64 / 60.0).max(1.0);
        let velocity_per_min = delta / elapsed_minutes;
        (Some(delta), Some(growth), Some(velocity_per_min))
    };

    let (delta_10m, growth_10m, velocity_10m) = window(WINDOW_10M);
    let (delta_30m, growth_30m, _) = window(WINDOW_30M);
    let (delta_1h, growth_1h, _) = window(WINDOW_1H);
    let (delta_6h, growth_6h, _) = window(WINDOW_6H);

    let acceleration_10m_vs_30m = match (growth_10m, growth_30m) {
        (Some(short), Some(long)) => Some(short - long),
        _ => None,
    };

    let (age_minutes, age_hours) = match published_at {
        Some(published) => {
            let minutes = ((now - published).num_seconds() as f64 / 60.0).max(0.0);
            (Some(minutes), Some(minutes / 60.0))
        }
        None => (None, None),
    };

    let mut baseline_velocity_10m_per_min = None;
    let mut ratio_velocity_10m_to_baseline = None;
    if !channel_baseline_velocities_10m.is_empty() {
        let baseline = channel_baseline_velocities_10m.iter().sum::<f64>()
            / channel_baseline_velocities_10m.len() as f64;
        baseline_velocity_10m_per_min = Some(baseline);
        if let Some(velocity) = velocity_10m {
            if baseline > 0.0 {
                ratio_velocity_10m_to_baseline = Some(velocity / baseline);
            }
        }
    }

    SurgeFeatures {
        delta_views_10m: delta_10m,
        delta_views_30m: delta_30m,
        delta_views_1h: delta_1h,
        delta_views_6h: delta_6h,
        growth_rate_10m: growth_10m,
        growth_rate_30m: growth_30m,
        growth_rate_1h: growth_1h,
        growth_rate_6h: growth_6h,
        acceleration_10m_vs_30m,
        age_minutes,
        age_hours,
        baseline_velocity_10m_per_min,
        velocity_10m_per_min: velocity_10m,
        ratio_velocity_10m_to_baseline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(minutes_ago: i64, views: i64, now: DateTime<Utc>) -> ViewSample {
        ViewSample {
            timestamp: now - Duration::minutes(minutes_ago),
            view_count: views,
        }
    }

    #[test]
    fn empty_series_yields_all_none() {
        let features = compute_surge_features(&[], None, &[]);
        assert_eq!(features, SurgeFeatures::default());
    }

    #[test]
    fn computes_window_deltas_and_growth() {
        let now = Utc::now();
        let samples = vec![
            sample(40, 1000, now),
            sample(15, 1500, now),
            sample(0, 2000, now),
        ];

        let features = compute_surge_features(&samples, None, &[]);

        // 10m window: reference is the sample from 15 minutes ago
        assert_eq!(features.delta_views_10m, Some(500.0));
        assert!((features.growth_rate_10m.unwrap() - 500.0 / 1500.0).abs() < 1e-9);
        // 30m window: reference is the sample from 40 minutes ago
        assert_eq!(features.delta_views_30m, Some(1000.0));
        assert_eq!(features.growth_rate_30m, Some(1.0));
        // No sample old enough for the 1h and 6h windows
        assert_eq!(features.delta_views_1h, None);
        assert_eq!(features.growth_rate_6h, None);
    }

    #[test]
    fn insufficient_history_is_none_not_zero() {
        let now = Utc::now();
        let samples = vec![sample(5, 900, now), sample(0, 1000, now)];

        let features = compute_surge_features(&samples, None, &[]);
        assert_eq!(features.delta_views_10m, None);
        assert_eq!(features.growth_rate_10m, None);
        assert_eq!(features.velocity_10m_per_min, None);
    }

    #[test]
    fn zero_baseline_divides_by_one() {
        let now = Utc::now();
        let samples = vec![sample(20, 0, now), sample(0, 400, now)];

        let features = compute_surge_features(&samples, None, &[]);
        assert_eq!(features.delta_views_10m, Some(400.0));
        // delta / max(prev, 1) with prev == 0
        assert_eq!(features.growth_rate_10m, Some(400.0));
    }

    #[test]
    fn velocity_uses_window_elapsed_minutes() {
        let now = Utc::now();
        let samples = vec![sample(60, 0, now), sample(0, 600, now)];

        let features = compute_surge_features(&samples, None, &[]);
        // Reference time is exactly now - 60m, so velocity is 600 / 60
        assert!((features.velocity_10m_per_min.unwrap() - 600.0 / 10.0).abs() < 1e-9);
        let one_hour = compute_surge_features(&samples, None, &[])
            .growth_rate_1h
            .is_some();
        assert!(one_hour);
    }

    #[test]
    fn acceleration_requires_both_growth_windows() {
        let now = Utc::now();
        let with_both = vec![
            sample(35, 1000, now),
            sample(12, 1200, now),
            sample(0, 1800, now),
        ];
        let features = compute_surge_features(&with_both, None, &[]);
        let growth_10m = features.growth_rate_10m.unwrap();
        let growth_30m = features.growth_rate_30m.unwrap();
        assert_eq!(
            features.acceleration_10m_vs_30m,
            Some(growth_10m - growth_30m)
        );

        let missing_30m = vec![sample(12, 1200, now), sample(0, 1800, now)];
        let features = compute_surge_features(&missing_30m, None, &[]);
        assert!(features.growth_rate_10m.is_some());
        assert_eq!(features.acceleration_10m_vs_30m, None);
    }

    #[test]
    fn age_is_floored_at_zero() {
        let now = Utc::now();
        let samples = vec![sample(0, 100, now)];

        // published_at after the last sample (clock skew between sources)
        let features =
            compute_surge_features(&samples, Some(now + Duration::minutes(5)), &[]);
        assert_eq!(features.age_minutes, Some(0.0));
        assert_eq!(features.age_hours, Some(0.0));

        let features = compute_surge_features(&samples, Some(now - Duration::hours(2)), &[]);
        assert!((features.age_hours.unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn baseline_ratio_needs_positive_baseline() {
        let now = Utc::now();
        let samples = vec![sample(10, 1000, now), sample(0, 1600, now)];

        let features = compute_surge_features(&samples, None, &[30.0, 30.0]);
        assert_eq!(features.baseline_velocity_10m_per_min, Some(30.0));
        let velocity = features.velocity_10m_per_min.unwrap();
        assert!((features.ratio_velocity_10m_to_baseline.unwrap() - velocity / 30.0).abs() < 1e-9);

        // All-zero baseline samples: the mean is 0, so no ratio
        let features = compute_surge_features(&samples, None, &[0.0, 0.0]);
        assert_eq!(features.baseline_velocity_10m_per_min, Some(0.0));
        assert_eq!(features.ratio_velocity_10m_to_baseline, None);
    }

    #[test]
    fn unsorted_samples_are_handled() {
        let now = Utc::now();
        let samples = vec![
            sample(0, 2000, now),
            sample(40, 1000, now),
            sample(15, 1500, now),
        ];

        let features = compute_surge_features(&samples, None, &[]);
        assert_eq!(features.delta_views_10m, Some(500.0));
        assert_eq!(features.delta_views_30m, Some(1000.0));
    }
}

//! Prometheus metrics for the background ranking jobs.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::time::Duration;

static REFRESH_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "surge_refresh_runs_total",
        "Total surge refresh cycles (success/error)",
        &["status"]
    )
    .expect("Failed to register surge refresh runs metric")
});

static REFRESH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "surge_refresh_duration_seconds",
        "Duration of surge refresh cycles",
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register surge refresh duration metric")
});

static LAST_RANKED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "surge_refresh_last_ranked",
        "Number of videos ranked in the last surge refresh cycle"
    )
    .expect("Failed to register surge refresh last ranked metric")
});

/// Record a refresh cycle result (success/error).
pub fn record_refresh_run(status: &str) {
    REFRESH_RUNS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a refresh cycle duration.
pub fn record_refresh_duration(duration: Duration) {
    REFRESH_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Set the size of the last computed ranking.
pub fn set_last_ranked(count: usize) {
    LAST_RANKED.set(count as i64);
}

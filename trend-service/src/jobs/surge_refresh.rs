//! Surge Refresh Background Job
//!
//! Periodically recomputes the surge ranking over the configured
//! candidate window. The ranking itself is read-path work; running it on
//! a timer keeps the cached trend scores warm so dashboard reads see
//! recent values without paying the computation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::metrics;
use crate::services::surge::{SurgeParams, SurgeScorer};

/// Configuration for the surge refresh loop.
#[derive(Clone)]
pub struct SurgeRefreshConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub params: SurgeParams,
}

impl Default for SurgeRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5 * 60),
            params: SurgeParams::default(),
        }
    }
}

/// Run the surge refresh loop until the process exits.
pub async fn run(scorer: Arc<SurgeScorer>, config: SurgeRefreshConfig) {
    if !config.enabled {
        tracing::info!("Surge refresh disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        limit = config.params.limit,
        days = config.params.days,
        "Starting surge refresh background job"
    );

    loop {
        let cycle_start = Instant::now();

        match scorer.rank(&config.params).await {
            Ok(items) => {
                metrics::record_refresh_run("success");
                metrics::record_refresh_duration(cycle_start.elapsed());
                metrics::set_last_ranked(items.len());
                tracing::info!(
                    ranked = items.len(),
                    duration_ms = cycle_start.elapsed().as_millis() as u64,
                    "Surge refresh cycle completed"
                );
            }
            Err(e) => {
                metrics::record_refresh_run("error");
                tracing::warn!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis() as u64,
                    "Surge refresh cycle failed"
                );
            }
        }

        sleep(config.interval).await;
    }
}

//! Featured Cache Warmer
//!
//! Pre-assembles the default featured response on a timer so interactive
//! reads hit the Redis cache instead of paying the store queries and the
//! embedding round-trip. Only runs when the assembler has a cache
//! attached; a failed cycle is logged and retried on the next tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::services::featured::{FeaturedAssembler, FeaturedParams};

/// Run the featured warm loop until the process exits.
pub async fn run(assembler: Arc<FeaturedAssembler>, params: FeaturedParams, interval: Duration) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Starting featured cache warmer"
    );

    loop {
        let cycle_start = Instant::now();

        match assembler.get_featured(&params).await {
            Ok(response) => {
                tracing::info!(
                    popular = response.popular.len(),
                    rising = response.rising.len(),
                    duration_ms = cycle_start.elapsed().as_millis() as u64,
                    "Featured warm cycle completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis() as u64,
                    "Featured warm cycle failed"
                );
            }
        }

        sleep(interval).await;
    }
}

use std::io;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trend_ranking::cache::FeaturedCache;
use trend_ranking::config::Config;
use trend_ranking::db::{PgSnapshotStore, PgTrendStore};
use trend_ranking::jobs::{featured_warmer, surge_refresh};
use trend_ranking::services::featured::{FeaturedAssembler, FeaturedParams};
use trend_ranking::services::similarity::{HttpEmbeddingClient, SimilarityEngine};
use trend_ranking::services::surge::{SurgeParams, SurgeScorer};

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting trend-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Initialize database pool
    let pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(PgTrendStore::new(pool.clone()));
    let snapshots = Arc::new(PgSnapshotStore::new(pool));

    let provider = Arc::new(HttpEmbeddingClient::new(&config.embedding));
    let similarity = Arc::new(SimilarityEngine::new(provider));

    // Featured cache is optional; without Redis the warmer stays off and
    // reads just pay the assembly cost
    let featured_cache = match &config.redis.url {
        Some(url) => match FeaturedCache::connect(url, config.redis.featured_ttl_secs).await {
            Ok(cache) => {
                tracing::info!("Featured cache connected");
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, featured cache disabled");
                None
            }
        },
        None => None,
    };

    let scorer = Arc::new(SurgeScorer::new(store.clone(), snapshots.clone()));
    let refresh_config = surge_refresh::SurgeRefreshConfig {
        enabled: config.ranking.refresh_enabled,
        interval: Duration::from_secs(config.ranking.refresh_interval_secs),
        params: SurgeParams {
            platform: None,
            limit: config.ranking.surge_limit,
            days: config.ranking.surge_days,
            velocity_days: config.ranking.velocity_days,
        },
    };

    match featured_cache {
        Some(cache) => {
            let assembler = Arc::new(
                FeaturedAssembler::new(store, similarity).with_cache(cache),
            );
            let warm_params = FeaturedParams {
                velocity_days: config.ranking.velocity_days,
                ..FeaturedParams::default()
            };
            let warm_interval = Duration::from_secs(config.redis.featured_ttl_secs);
            tokio::join!(
                surge_refresh::run(scorer, refresh_config),
                featured_warmer::run(assembler, warm_params, warm_interval),
            );
        }
        None => {
            surge_refresh::run(scorer, refresh_config).await;
        }
    }

    Ok(())
}

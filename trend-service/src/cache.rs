//! Redis-backed cache for assembled featured responses.
//!
//! Strictly fail-open: read and write errors are logged at `warn` and
//! otherwise ignored, so a Redis outage only costs latency. Responses to
//! free-text queries are never cached (they are per-request).

use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::FeaturedResponse;

#[derive(Clone)]
pub struct FeaturedCache {
    client: ConnectionManager,
    ttl_secs: u64,
}

impl FeaturedCache {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Redis(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Redis(format!("Failed to create Redis connection: {}", e)))?;

        Ok(Self {
            client: manager,
            ttl_secs,
        })
    }

    pub fn key(
        platform: Option<&str>,
        limit_popular: usize,
        limit_rising: usize,
        velocity_days: i64,
    ) -> String {
        format!(
            "trends:featured:{}:{}:{}:{}",
            platform.unwrap_or("all"),
            limit_popular,
            limit_rising,
            velocity_days
        )
    }

    pub async fn get(&self, key: &str) -> Option<FeaturedResponse> {
        let value: Option<String> = match redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.client.clone())
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!("Redis GET failed for {}: {}", key, e);
                return None;
            }
        };

        let json = value?;
        match serde_json::from_str::<FeaturedResponse>(&json) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!("Featured cache deserialization failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, response: &FeaturedResponse) {
        let json = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(e) => {
                warn!("Featured cache serialization failed for {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.clone())
            .await
        {
            warn!("Redis SETEX failed for {}: {}", key, e);
            return;
        }

        debug!("Cached featured response at {} with TTL={}s", key, self.ttl_secs);
    }
}

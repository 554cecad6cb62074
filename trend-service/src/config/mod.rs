use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub embedding: EmbeddingConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis is optional; without it the featured cache is disabled.
    pub url: Option<String>,
    pub featured_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible embeddings endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Candidate window in days for the surge ranking.
    pub surge_days: i64,
    pub surge_limit: i64,
    /// Offset in days for the previous-snapshot velocity baseline.
    pub velocity_days: i64,
    pub refresh_enabled: bool,
    pub refresh_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL").ok(),
                featured_ttl_secs: std::env::var("FEATURED_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            },
            embedding: EmbeddingConfig {
                endpoint: std::env::var("EMBEDDING_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string()),
                api_key: std::env::var("EMBEDDING_API_KEY").ok(),
                model: std::env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                timeout_secs: std::env::var("EMBEDDING_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            ranking: RankingConfig {
                surge_days: std::env::var("SURGE_WINDOW_DAYS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                surge_limit: std::env::var("SURGE_LIMIT")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
                velocity_days: std::env::var("VELOCITY_DAYS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
                refresh_enabled: std::env::var("SURGE_REFRESH_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                refresh_interval_secs: std::env::var("SURGE_REFRESH_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            },
        })
    }
}

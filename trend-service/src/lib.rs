pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the engine surface
pub use services::{
    compute_surge_features, cosine_similarity, EmbeddingProvider, FeaturedAssembler,
    FeaturedParams, HttpEmbeddingClient, SimilarityEngine, SurgeFeatures, SurgeParams,
    SurgeScorer, TrendQueryService, ViewSample,
};

//! Service layer for trend-service
//!
//! - surge: windowed feature extraction and composite surge scoring
//! - partition: popular/rising orderings and the diversity pass
//! - similarity: embedding-based dedup, query rerank, intent classification
//! - featured: assembly of the UI-facing buckets
//! - queries: category and per-video read operations

pub mod featured;
pub mod partition;
pub mod queries;
pub mod similarity;
pub mod surge;

pub use featured::{summarize_trends, FeaturedAssembler, FeaturedParams};
pub use partition::{enforce_diversity, rank_popular, rank_rising};
pub use queries::TrendQueryService;
pub use similarity::{
    cosine_similarity, EmbeddingProvider, HttpEmbeddingClient, IntentPrototype, SimilarityEngine,
};
pub use surge::{
    compute_surge_features, ColdStartEstimator, RandomizedColdStart, SurgeFeatures, SurgeParams,
    SurgeScorer, ViewSample,
};

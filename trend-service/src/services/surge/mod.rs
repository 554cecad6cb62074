/// Surge detection: windowed feature extraction and composite scoring.
pub mod features;
pub mod scorer;

pub use features::{compute_surge_features, SurgeFeatures, ViewSample};
pub use scorer::{
    ColdStartEstimator, RandomizedColdStart, SurgeParams, SurgeScorer,
};

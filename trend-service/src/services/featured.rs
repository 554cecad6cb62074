/// Featured Assembler
///
/// Orchestrates the store, the partitioners and the similarity engine
/// into the four named buckets of the featured surface: popular, rising,
/// categories and (query-driven) recommended. Secondary steps degrade
/// silently; the output shape never changes, only its precision.
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::cache::FeaturedCache;
use crate::db::video_repo::TrendStore;
use crate::error::Result;
use crate::models::{CategoryTrend, FeaturedResponse, RankedVideo};
use crate::services::partition;
use crate::services::similarity::SimilarityEngine;

/// Fixed size of the categories bucket.
const CATEGORY_LIMIT: i64 = 5;

#[derive(Debug, Clone)]
pub struct FeaturedParams {
    pub limit_popular: usize,
    pub limit_rising: usize,
    pub velocity_days: i64,
    pub platform: Option<String>,
    pub query: Option<String>,
}

impl Default for FeaturedParams {
    fn default() -> Self {
        Self {
            limit_popular: 5,
            limit_rising: 5,
            velocity_days: 1,
            platform: None,
            query: None,
        }
    }
}

pub struct FeaturedAssembler {
    store: Arc<dyn TrendStore>,
    similarity: Arc<SimilarityEngine>,
    cache: Option<FeaturedCache>,
}

impl FeaturedAssembler {
    pub fn new(store: Arc<dyn TrendStore>, similarity: Arc<SimilarityEngine>) -> Self {
        Self {
            store,
            similarity,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: FeaturedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Assemble the featured buckets.
    ///
    /// Empty windows produce empty buckets; only a primary store failure
    /// surfaces as an error.
    pub async fn get_featured(&self, params: &FeaturedParams) -> Result<FeaturedResponse> {
        let velocity_days = params.velocity_days.max(1);
        let platform = params.platform.as_deref();
        let query = params.query.as_deref().filter(|q| !q.is_empty());

        // Query responses are per-request; only the plain surface is cached
        let cache_key = FeaturedCache::key(
            platform,
            params.limit_popular,
            params.limit_rising,
            velocity_days,
        );
        if query.is_none() {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&cache_key).await {
                    debug!(key = %cache_key, "Featured cache hit");
                    return Ok(hit);
                }
            }
        }

        // Over-fetch so dedup and diversity still fill the buckets
        let (popular_rows, rising_rows) = tokio::try_join!(
            self.store
                .fetch_popular_candidates(params.limit_popular as i64 * 2, platform),
            self.store.fetch_rising_candidates(
                params.limit_rising as i64 * 2,
                velocity_days,
                platform
            ),
        )?;

        let popular = partition::rank_popular(popular_rows);
        let rising = partition::rank_rising(rising_rows, velocity_days);

        let popular = self.similarity.dedup(popular).await;
        let rising = self.similarity.dedup(rising).await;

        let categories = self
            .store
            .fetch_hot_category_trends(platform, CATEGORY_LIMIT)
            .await?;

        let recommended = match query {
            Some(query) => {
                self.recommend(
                    query,
                    &popular,
                    &rising,
                    params.limit_popular.max(params.limit_rising),
                )
                .await
            }
            None => Vec::new(),
        };

        let mut popular = popular;
        popular.truncate(params.limit_popular);
        let popular = partition::enforce_diversity(popular);

        let mut rising = rising;
        rising.truncate(params.limit_rising);
        let rising = partition::enforce_diversity(rising);

        let summary = summarize_trends(&categories);

        let response = FeaturedResponse {
            popular,
            rising,
            categories,
            recommended,
            summary,
        };

        if params.query.is_none() {
            if let Some(cache) = &self.cache {
                cache.set(&cache_key, &response).await;
            }
        }

        Ok(response)
    }

    /// Merge popular and rising (minus exact duplicates), rerank against
    /// the query and cut to size.
    async fn recommend(
        &self,
        query: &str,
        popular: &[RankedVideo],
        rising: &[RankedVideo],
        limit: usize,
    ) -> Vec<RankedVideo> {
        let seen: HashSet<&str> = popular
            .iter()
            .map(|item| item.video.video_id.as_str())
            .collect();

        let mut combined: Vec<RankedVideo> = popular.to_vec();
        combined.extend(
            rising
                .iter()
                .filter(|item| !seen.contains(item.video.video_id.as_str()))
                .cloned(),
        );

        let mut reranked = self.similarity.rerank_by_query(query, combined).await;
        reranked.truncate(limit);
        partition::enforce_diversity(reranked)
    }
}

/// Short natural-language summary of the top category aggregates.
pub fn summarize_trends(categories: &[CategoryTrend]) -> String {
    if categories.is_empty() {
        return "Not enough trend data yet.".to_string();
    }

    let lines: Vec<String> = categories
        .iter()
        .take(3)
        .map(|trend| {
            let rank = trend
                .rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            let growth = trend
                .growth_rate
                .map(|g| format!("{:.1}%", g * 100.0))
                .unwrap_or_else(|| "-".to_string());
            format!("{} (rank={}, growth={})", trend.category, rank, growth)
        })
        .collect();

    format!("Top categories right now: {}", lines.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trend(category: &str, rank: i32, growth: Option<f64>) -> CategoryTrend {
        CategoryTrend {
            category: category.to_string(),
            platform: "youtube".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            video_count: Some(10),
            avg_total_score: None,
            growth_rate: growth,
            rank: Some(rank),
        }
    }

    #[test]
    fn summary_lists_top_three_categories() {
        let categories = vec![
            trend("Music", 1, Some(0.42)),
            trend("Gaming", 2, Some(0.13)),
            trend("Food", 3, None),
            trend("News", 4, Some(0.01)),
        ];

        let summary = summarize_trends(&categories);
        assert!(summary.starts_with("Top categories right now: "));
        assert!(summary.contains("Music (rank=1, growth=42.0%)"));
        assert!(summary.contains("Food (rank=3, growth=-)"));
        assert!(!summary.contains("News"));
    }

    #[test]
    fn summary_degrades_without_data() {
        assert_eq!(summarize_trends(&[]), "Not enough trend data yet.");
    }
}

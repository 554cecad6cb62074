/// Similarity Engine
///
/// Embedding-based post-processing for ranked lists: near-duplicate
/// suppression, free-text query re-ranking, and coarse intent
/// classification. Every operation fails open: if the provider is down
/// or answers with the wrong shape, the input comes back untouched.
pub mod embedding;

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::models::RankedVideo;

pub use embedding::{EmbeddingProvider, HttpEmbeddingClient};

/// Candidates whose pairwise similarity reaches this value are duplicates.
pub const DEDUP_THRESHOLD: f64 = 0.9;

/// Minimum lead the best intent prototype needs over the runner-up.
pub const INTENT_AMBIGUITY_MARGIN: f64 = 0.05;

pub const DEFAULT_INTENT_LABEL: &str = "general";

/// Cosine similarity of two vectors, 0.0 when either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b).sqrt()
}

/// A labeled description used as a nearest-neighbour anchor for intent
/// classification.
#[derive(Debug, Clone)]
pub struct IntentPrototype {
    pub label: String,
    pub description: String,
}

impl IntentPrototype {
    pub fn new(label: &str, description: &str) -> Self {
        Self {
            label: label.to_string(),
            description: description.to_string(),
        }
    }
}

/// Default prototype set for the chat-context builder.
pub fn default_intent_prototypes() -> Vec<IntentPrototype> {
    vec![
        IntentPrototype::new(
            "trend",
            "asking which videos or topics are trending, surging or popular right now",
        ),
        IntentPrototype::new(
            "recommend",
            "asking for suggestions on what to watch next or content similar to something",
        ),
        IntentPrototype::new(
            "stats",
            "asking for concrete numbers such as view counts, growth rates or rankings",
        ),
    ]
}

pub struct SimilarityEngine {
    provider: Arc<dyn EmbeddingProvider>,
    dedup_threshold: f64,
    intent_prototypes: Vec<IntentPrototype>,
    intent_fallback: String,
    // Lazily computed once per engine instance; single-flight on first use,
    // retried on provider failure.
    prototype_embeddings: OnceCell<Vec<Vec<f32>>>,
}

impl SimilarityEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            dedup_threshold: DEDUP_THRESHOLD,
            intent_prototypes: default_intent_prototypes(),
            intent_fallback: DEFAULT_INTENT_LABEL.to_string(),
            prototype_embeddings: OnceCell::new(),
        }
    }

    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    pub fn with_intent_prototypes(
        mut self,
        prototypes: Vec<IntentPrototype>,
        fallback: &str,
    ) -> Self {
        self.intent_prototypes = prototypes;
        self.intent_fallback = fallback.to_string();
        self
    }

    /// Text representation used for candidate embeddings.
    fn item_text(video: &RankedVideo) -> String {
        let summary = &video.video;
        [
            summary.title.as_str(),
            summary.category.as_deref().unwrap_or(""),
            summary.summary.as_deref().unwrap_or(""),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Greedy near-duplicate suppression; the first occurrence wins.
    ///
    /// Provider failure or a malformed response returns the input as-is.
    pub async fn dedup(&self, items: Vec<RankedVideo>) -> Vec<RankedVideo> {
        if items.len() < 2 {
            return items;
        }

        let texts: Vec<String> = items.iter().map(Self::item_text).collect();
        let embeddings = match self.provider.embed(&texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => embeddings,
            Ok(embeddings) => {
                warn!(
                    expected = texts.len(),
                    got = embeddings.len(),
                    "Embedding count mismatch, skipping dedup"
                );
                return items;
            }
            Err(e) => {
                warn!(error = %e, "Embedding provider unavailable, skipping dedup");
                return items;
            }
        };

        let mut kept: Vec<RankedVideo> = Vec::with_capacity(items.len());
        let mut kept_embeddings: Vec<Vec<f32>> = Vec::with_capacity(items.len());
        for (item, embedding) in items.into_iter().zip(embeddings) {
            let duplicate = kept_embeddings
                .iter()
                .any(|kept| cosine_similarity(&embedding, kept) >= self.dedup_threshold);
            if duplicate {
                debug!(video_id = %item.video.video_id, "Dropped near-duplicate candidate");
                continue;
            }
            kept.push(item);
            kept_embeddings.push(embedding);
        }
        kept
    }

    /// Reorder candidates by similarity to a free-text query.
    ///
    /// The query and all candidate texts go out in one batched call. Ties
    /// and provider failures preserve the input order.
    pub async fn rerank_by_query(
        &self,
        query: &str,
        items: Vec<RankedVideo>,
    ) -> Vec<RankedVideo> {
        if items.is_empty() || query.is_empty() {
            return items;
        }

        let mut texts: Vec<String> = Vec::with_capacity(items.len() + 1);
        texts.push(query.to_string());
        texts.extend(items.iter().map(Self::item_text));

        let embeddings = match self.provider.embed(&texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => embeddings,
            Ok(_) | Err(_) => {
                warn!("Embedding provider unavailable, keeping original order");
                return items;
            }
        };

        let query_embedding = &embeddings[0];
        let mut scored: Vec<(f64, RankedVideo)> = items
            .into_iter()
            .zip(embeddings[1..].iter())
            .map(|(item, embedding)| (cosine_similarity(query_embedding, embedding), item))
            .collect();

        // Stable: equal similarities keep their input order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, item)| item).collect()
    }

    /// Classify free text by nearest intent prototype.
    ///
    /// Returns the fallback label when the provider is unavailable or when
    /// the top two scores are too close to call.
    pub async fn classify_intent(&self, text: &str) -> String {
        if text.is_empty() || self.intent_prototypes.is_empty() {
            return self.intent_fallback.clone();
        }

        let prototypes = match self
            .prototype_embeddings
            .get_or_try_init(|| async {
                let descriptions: Vec<String> = self
                    .intent_prototypes
                    .iter()
                    .map(|p| p.description.clone())
                    .collect();
                let embeddings = self.provider.embed(&descriptions).await?;
                if embeddings.len() != descriptions.len() {
                    return Err(crate::error::AppError::Embedding(
                        "prototype embedding count mismatch".to_string(),
                    ));
                }
                Ok::<_, crate::error::AppError>(embeddings)
            })
            .await
        {
            Ok(prototypes) => prototypes,
            Err(e) => {
                warn!(error = %e, "Prototype embedding failed, using fallback intent");
                return self.intent_fallback.clone();
            }
        };

        let query = match self.provider.embed(&[text.to_string()]).await {
            Ok(mut embeddings) if embeddings.len() == 1 => embeddings.remove(0),
            Ok(_) | Err(_) => {
                warn!("Query embedding failed, using fallback intent");
                return self.intent_fallback.clone();
            }
        };

        let mut scored: Vec<(f64, &str)> = prototypes
            .iter()
            .zip(self.intent_prototypes.iter())
            .map(|(embedding, prototype)| {
                (
                    cosine_similarity(&query, embedding),
                    prototype.label.as_str(),
                )
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        match scored.as_slice() {
            [] => self.intent_fallback.clone(),
            [(_, label)] => (*label).to_string(),
            [(top_score, label), (second_score, _), ..] => {
                if top_score - second_score < INTENT_AMBIGUITY_MARGIN {
                    self.intent_fallback.clone()
                } else {
                    (*label).to_string()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::VideoSummary;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider returning canned vectors keyed by exact text.
    struct FakeProvider {
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(entries: Vec<(&str, Vec<f32>)>) -> Self {
            Self {
                vectors: entries
                    .into_iter()
                    .map(|(text, vector)| (text.to_string(), vector))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or(vec![0.0, 0.0]))
                .collect())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            Err(AppError::Embedding("provider down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Provider answering with the wrong number of vectors.
    struct TruncatingProvider;

    #[async_trait]
    impl EmbeddingProvider for TruncatingProvider {
        async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }

        fn name(&self) -> &str {
            "truncating"
        }
    }

    fn video(id: &str, title: &str) -> RankedVideo {
        RankedVideo::from_summary(VideoSummary {
            video_id: id.to_string(),
            title: title.to_string(),
            channel_id: format!("chan-{}", id),
            channel_title: None,
            platform: "youtube".to_string(),
            category: None,
            summary: None,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            published_at: None,
            crawled_at: None,
            thumbnail_url: None,
            total_score: None,
            trend_score: None,
        })
    }

    #[test]
    fn cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
        // Zero magnitude is defined as zero similarity, not NaN
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        // Length mismatch is treated as unrelated
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn dedup_drops_near_duplicates_keeping_first() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("cat video", vec![1.0, 0.0]),
            ("cat video again", vec![1.0, 0.001]),
            ("cooking show", vec![0.0, 1.0]),
        ]));
        let engine = SimilarityEngine::new(provider);

        let items = vec![
            video("a", "cat video"),
            video("b", "cat video again"),
            video("c", "cooking show"),
        ];
        let kept = engine.dedup(items).await;
        let ids: Vec<&str> = kept.iter().map(|v| v.video.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn dedup_is_idempotent() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("one", vec![1.0, 0.0]),
            ("two", vec![0.9, 0.5]),
            ("three", vec![0.0, 1.0]),
        ]));
        let engine = SimilarityEngine::new(provider);

        let items = vec![video("a", "one"), video("b", "two"), video("c", "three")];
        let once = engine.dedup(items).await;
        let twice = engine.dedup(once.clone()).await;
        let once_ids: Vec<&str> = once.iter().map(|v| v.video.video_id.as_str()).collect();
        let twice_ids: Vec<&str> = twice.iter().map(|v| v.video.video_id.as_str()).collect();
        assert_eq!(once_ids, twice_ids);
    }

    #[tokio::test]
    async fn dedup_threshold_boundary_is_inclusive() {
        let a = vec![2.0, 1.0];
        let b = vec![1.0, 2.0];
        let boundary = cosine_similarity(&a, &b);

        let provider = Arc::new(FakeProvider::new(vec![
            ("first", a.clone()),
            ("second", b.clone()),
        ]));

        // Similarity exactly at the threshold: the second item is removed
        let engine =
            SimilarityEngine::new(provider.clone()).with_dedup_threshold(boundary);
        let kept = engine
            .dedup(vec![video("a", "first"), video("b", "second")])
            .await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].video.video_id, "a");

        // Just above the similarity: both survive
        let engine = SimilarityEngine::new(provider).with_dedup_threshold(boundary + 1e-6);
        let kept = engine
            .dedup(vec![video("a", "first"), video("b", "second")])
            .await;
        assert_eq!(kept.len(), 2);
    }

    #[tokio::test]
    async fn dedup_fails_open_on_provider_error() {
        let engine = SimilarityEngine::new(Arc::new(FailingProvider));
        let items = vec![video("a", "one"), video("b", "two")];
        let kept = engine.dedup(items.clone()).await;
        assert_eq!(kept.len(), items.len());
    }

    #[tokio::test]
    async fn dedup_fails_open_on_length_mismatch() {
        let engine = SimilarityEngine::new(Arc::new(TruncatingProvider));
        let items = vec![video("a", "one"), video("b", "two")];
        let kept = engine.dedup(items).await;
        assert_eq!(kept.len(), 2);
    }

    #[tokio::test]
    async fn rerank_orders_by_query_similarity() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("kpop dance", vec![1.0, 0.0]),
            ("street food tour", vec![0.0, 1.0]),
            ("idol dance practice", vec![0.9, 0.1]),
        ]));
        let engine = SimilarityEngine::new(provider);

        let items = vec![
            video("food", "street food tour"),
            video("practice", "idol dance practice"),
        ];
        let reranked = engine.rerank_by_query("kpop dance", items).await;
        let ids: Vec<&str> = reranked.iter().map(|v| v.video.video_id.as_str()).collect();
        assert_eq!(ids, vec!["practice", "food"]);
    }

    #[tokio::test]
    async fn rerank_preserves_order_when_provider_down() {
        let engine = SimilarityEngine::new(Arc::new(FailingProvider));
        let items = vec![video("a", "one"), video("b", "two"), video("c", "three")];
        let reranked = engine.rerank_by_query("anything", items).await;
        let ids: Vec<&str> = reranked.iter().map(|v| v.video.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn intent_classification_with_clear_winner() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("trending now", vec![1.0, 0.0]),
            ("what to watch", vec![0.0, 1.0]),
            ("what is surging today", vec![0.95, 0.05]),
        ]));
        let engine = SimilarityEngine::new(provider).with_intent_prototypes(
            vec![
                IntentPrototype::new("trend", "trending now"),
                IntentPrototype::new("recommend", "what to watch"),
            ],
            "general",
        );

        let label = engine.classify_intent("what is surging today").await;
        assert_eq!(label, "trend");
    }

    #[tokio::test]
    async fn intent_classification_falls_back_when_ambiguous() {
        // Query equidistant from both prototypes
        let provider = Arc::new(FakeProvider::new(vec![
            ("trending now", vec![1.0, 0.0]),
            ("what to watch", vec![0.0, 1.0]),
            ("hmm", vec![1.0, 1.0]),
        ]));
        let engine = SimilarityEngine::new(provider).with_intent_prototypes(
            vec![
                IntentPrototype::new("trend", "trending now"),
                IntentPrototype::new("recommend", "what to watch"),
            ],
            "general",
        );

        let label = engine.classify_intent("hmm").await;
        assert_eq!(label, "general");
    }

    #[tokio::test]
    async fn intent_classification_falls_back_when_provider_down() {
        let engine = SimilarityEngine::new(Arc::new(FailingProvider));
        let label = engine.classify_intent("what is trending").await;
        assert_eq!(label, DEFAULT_INTENT_LABEL);
    }

    #[tokio::test]
    async fn prototype_embeddings_are_computed_once() {
        let provider = Arc::new(FakeProvider::new(vec![
            ("trending now", vec![1.0, 0.0]),
            ("query one", vec![0.9, 0.0]),
            ("query two", vec![0.8, 0.0]),
        ]));
        let engine = SimilarityEngine::new(provider.clone()).with_intent_prototypes(
            vec![IntentPrototype::new("trend", "trending now")],
            "general",
        );

        engine.classify_intent("query one").await;
        engine.classify_intent("query two").await;

        // One call for the prototypes, one per query
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}

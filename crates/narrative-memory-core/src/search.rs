//! Hybrid ranker: metadata filtering, vector similarity, and weighted fusion.
//!
//! The ranker operates entirely through the [`MetadataStore`] and
//! [`VectorIndex`] traits, with no database or configuration dependencies.
//! The calling application builds a [`RetrievalRequest`] and passes in the
//! store handles it wants ranked against.
//!
//! # Ranking Algorithm
//!
//! 1. Filter: fetch a candidate pool of `max(candidate_pool_size, top_k × 20)`
//!    records matching the time range and filters. Empty pool → `[]`.
//! 2. Similarity: score the pool's ids with `query_subset`, requesting
//!    `min(pool, max(top_k × 6, 30))` hits. If that yields nothing, fall
//!    back to `query_global` for `max(top_k × 2, 10)` hits and keep only
//!    those inside the pool.
//! 3. Fuse: `score = w_vector × similarity + w_emotion × bonus + w_recency × recency`,
//!    where `bonus` is 1.0 when the candidate's emotion equals the filter's
//!    target emotion and `recency` is the candidate's timestamp normalized
//!    over the pool's observed span (0.5 when undefined).
//! 4. Sort by score (desc, stable) and truncate to `top_k`.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ChunkRecord, Emotion, Rating, TimeScope, VoiceMode};
use crate::store::{ChunkFilters, MetadataStore, TimeRange, VectorIndex};

/// Default minimum candidate pool size.
pub const DEFAULT_CANDIDATE_POOL_SIZE: usize = 300;

/// Recency assigned when a candidate's position in time is undefined.
pub const NEUTRAL_RECENCY: f64 = 0.5;

/// Fusion weights. Non-negative; they need not sum to 1 and are not
/// renormalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalWeights {
    pub vector: f64,
    pub emotion: f64,
    pub recency: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            vector: 0.75,
            emotion: 0.15,
            recency: 0.10,
        }
    }
}

/// Bundles all inputs for a single retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
    pub query: &'a str,
    pub range: TimeRange,
    pub filters: ChunkFilters,
    /// Maximum results. Zero yields an empty result.
    pub top_k: usize,
    pub weights: RetrievalWeights,
}

impl<'a> RetrievalRequest<'a> {
    pub fn new(query: &'a str, top_k: usize) -> Self {
        Self {
            query,
            range: TimeRange::default(),
            filters: ChunkFilters::default(),
            top_k,
            weights: RetrievalWeights::default(),
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_filters(mut self, filters: ChunkFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_weights(mut self, weights: RetrievalWeights) -> Self {
        self.weights = weights;
        self
    }
}

/// Per-signal inputs to a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub similarity: f64,
    pub emotion_bonus: f64,
    pub recency: f64,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    pub id: String,
    /// Fused score, rounded to 6 decimals.
    pub score: f64,
    /// Cosine similarity, rounded to 6 decimals.
    pub similarity: f64,
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub text: String,
    pub emotion: Emotion,
    pub time_scope: TimeScope,
    pub intensity: Rating,
    pub voice_mode: VoiceMode,
    pub authenticity: Rating,
    pub specificity: Rating,
    pub cliche: Rating,
    pub breakdown: ScoreBreakdown,
}

impl RankedChunk {
    fn new(record: &ChunkRecord, score: f64, breakdown: ScoreBreakdown) -> Self {
        let a = &record.annotation;
        Self {
            id: record.id.clone(),
            score: round6(score),
            similarity: round6(breakdown.similarity),
            source: record.source.clone(),
            timestamp: record.timestamp,
            text: record.text.clone(),
            emotion: a.emotion,
            time_scope: a.time_scope,
            intensity: a.intensity,
            voice_mode: a.voice_mode,
            authenticity: a.authenticity,
            specificity: a.specificity,
            cliche: a.cliche,
            breakdown,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn round6(value: f64) -> f64 {
    finite_or_zero((value * 1_000_000.0).round() / 1_000_000.0)
}

/// Observed timestamp span of a candidate pool.
#[derive(Debug, Clone, Copy)]
struct TimeSpan {
    min: DateTime<Utc>,
    max: DateTime<Utc>,
}

impl TimeSpan {
    fn of(records: &[ChunkRecord]) -> Option<Self> {
        let mut stamps = records.iter().filter_map(|r| r.timestamp);
        let first = stamps.next()?;
        let (min, max) = stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
        Some(Self { min, max })
    }
}

/// Normalize `timestamp` into `[0, 1]` between `min` and `max`.
///
/// Returns [`NEUTRAL_RECENCY`] when the timestamp is missing or the pool
/// has fewer than two distinct timestamps.
pub fn recency_score(
    timestamp: Option<&DateTime<Utc>>,
    min: Option<&DateTime<Utc>>,
    max: Option<&DateTime<Utc>>,
) -> f64 {
    let (Some(ts), Some(min), Some(max)) = (timestamp, min, max) else {
        return NEUTRAL_RECENCY;
    };
    if min >= max {
        return NEUTRAL_RECENCY;
    }
    let span = (*max - *min).num_milliseconds() as f64;
    if span <= 0.0 {
        return NEUTRAL_RECENCY;
    }
    let offset = (*ts - *min).num_milliseconds() as f64;
    (offset / span).clamp(0.0, 1.0)
}

/// Ranks chunks for a query against a metadata store and a vector index.
///
/// Each [`retrieve`](Self::retrieve) call is a single call-and-return
/// pass: the candidate pool is fetched once and treated as a snapshot.
/// Upserts that land while a query is in flight may or may not show up in
/// that query's results (read skew); nothing is locked across the pass.
pub struct HybridRanker<'s, M: ?Sized, V: ?Sized> {
    metadata: &'s M,
    index: &'s V,
    candidate_pool_size: usize,
}

impl<'s, M, V> HybridRanker<'s, M, V>
where
    M: MetadataStore + ?Sized,
    V: VectorIndex + ?Sized,
{
    pub fn new(metadata: &'s M, index: &'s V, candidate_pool_size: usize) -> Self {
        Self {
            metadata,
            index,
            candidate_pool_size: candidate_pool_size.max(1),
        }
    }

    pub fn candidate_pool_size(&self) -> usize {
        self.candidate_pool_size
    }

    /// Run the filter → similarity → fuse → truncate pass.
    pub async fn retrieve(&self, req: &RetrievalRequest<'_>) -> Result<Vec<RankedChunk>> {
        let top_k = req.top_k;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let pool_limit = self.candidate_pool_size.max(top_k.saturating_mul(20));
        let candidates = self
            .metadata
            .filter(&req.range, &req.filters, pool_limit)
            .await?;
        if candidates.is_empty() {
            tracing::debug!(query = req.query, "empty candidate pool");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = candidates.iter().map(|r| r.id.clone()).collect();
        let by_id: HashMap<&str, &ChunkRecord> =
            candidates.iter().map(|r| (r.id.as_str(), r)).collect();

        let subset_k = candidates.len().min(top_k.saturating_mul(6).max(30));
        let mut hits = self.index.query_subset(req.query, &ids, subset_k).await?;
        if hits.is_empty() {
            let global_k = top_k.saturating_mul(2).max(10);
            hits = self.index.query_global(req.query, global_k).await?;
            hits.retain(|h| by_id.contains_key(h.id.as_str()));
            tracing::debug!(
                query = req.query,
                kept = hits.len(),
                "subset query empty, used global fallback"
            );
        }

        let span = TimeSpan::of(&candidates);
        let (min_ts, max_ts) = (span.map(|s| s.min), span.map(|s| s.max));
        let target_emotion = req.filters.emotion;
        let w = req.weights;

        let mut ranked: Vec<RankedChunk> = hits
            .iter()
            .filter_map(|hit| {
                let record = *by_id.get(hit.id.as_str())?;
                let similarity = finite_or_zero(hit.similarity);
                let emotion_bonus = match target_emotion {
                    Some(target) if record.annotation.emotion == target => 1.0,
                    _ => 0.0,
                };
                let recency =
                    recency_score(record.timestamp.as_ref(), min_ts.as_ref(), max_ts.as_ref());
                let score = finite_or_zero(
                    w.vector * similarity + w.emotion * emotion_bonus + w.recency * recency,
                );
                Some(RankedChunk::new(
                    record,
                    score,
                    ScoreBreakdown {
                        similarity,
                        emotion_bonus,
                        recency,
                    },
                ))
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);

        tracing::debug!(
            query = req.query,
            pool = candidates.len(),
            hits = hits.len(),
            returned = ranked.len(),
            "retrieval complete"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::chunk::{ChunkingParams, SemanticChunker};
    use crate::embedding::{EmbeddingProvider, HashEmbedder};
    use crate::labeling::label_heuristic;
    use crate::models::{parse_timestamp, Annotation, RawDocument};
    use crate::store::memory::{InMemoryMetadataStore, InMemoryVectorIndex};
    use crate::store::{HitMetadata, VectorHit};

    /// One dimension per known word; counts occurrences.
    struct AxisEmbedder;

    const AXES: [&str; 3] = ["clock", "sea", "rain"];

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }

        fn dims(&self) -> usize {
            AXES.len()
        }

        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lowered = t.to_lowercase();
                    AXES.iter()
                        .map(|axis| lowered.split_whitespace().filter(|w| w == axis).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    fn record(id: &str, text: &str, ts: Option<&str>) -> ChunkRecord {
        ChunkRecord {
            id: id.into(),
            source: "journal.md".into(),
            text: text.into(),
            timestamp: ts.and_then(parse_timestamp),
            word_count: text.split_whitespace().count(),
            annotation: Annotation::default(),
        }
    }

    async fn stores(
        records: &[ChunkRecord],
    ) -> (InMemoryMetadataStore, InMemoryVectorIndex<AxisEmbedder>) {
        let metadata = InMemoryMetadataStore::new();
        let index = InMemoryVectorIndex::new(AxisEmbedder);
        metadata.upsert(records).await.unwrap();
        index.upsert(records).await.unwrap();
        (metadata, index)
    }

    /// Counts calls and returns nothing.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataStore for CountingStore {
        async fn upsert(&self, _records: &[ChunkRecord]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn filter(
            &self,
            _range: &TimeRange,
            _filters: &ChunkFilters,
            _limit: usize,
        ) -> anyhow::Result<Vec<ChunkRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn count(&self) -> anyhow::Result<usize> {
            Ok(0)
        }
    }

    /// Subset queries find nothing; global queries return fixed hits.
    struct GlobalOnlyIndex {
        hits: Vec<VectorHit>,
    }

    #[async_trait]
    impl VectorIndex for GlobalOnlyIndex {
        async fn upsert(&self, _records: &[ChunkRecord]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn query_subset(
            &self,
            _query: &str,
            _ids: &[String],
            _top_k: usize,
        ) -> anyhow::Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }

        async fn query_global(&self, _query: &str, top_k: usize) -> anyhow::Result<Vec<VectorHit>> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }

        async fn count(&self) -> anyhow::Result<usize> {
            Ok(self.hits.len())
        }
    }

    fn hit(id: &str, similarity: f64) -> VectorHit {
        let r = record(id, "text", None);
        VectorHit {
            id: id.into(),
            similarity,
            text: r.text.clone(),
            metadata: HitMetadata::from(&r),
        }
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty() {
        let (metadata, index) = stores(&[]).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 5))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_zero_top_k_makes_no_store_calls() {
        let metadata = CountingStore::default();
        let index = GlobalOnlyIndex { hits: vec![] };
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 0))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ranks_by_similarity() {
        let records = [
            record("sea", "sea sea", Some("2024-01-01")),
            record("clock", "clock", Some("2024-01-01")),
            record("mixed", "clock sea", Some("2024-01-01")),
        ];
        let (metadata, index) = stores(&records).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 5))
            .await
            .unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["clock", "mixed", "sea"]);
        // one distinct timestamp: neutral recency for all
        assert!(out.iter().all(|r| r.breakdown.recency == NEUTRAL_RECENCY));
        assert!((out[0].score - (0.75 + 0.10 * 0.5)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_top_k_cap() {
        let records: Vec<ChunkRecord> = (0..12)
            .map(|i| record(&format!("c{i}"), "clock rain", None))
            .collect();
        let (metadata, index) = stores(&records).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 3))
            .await
            .unwrap();
        assert_eq!(out.len(), 3);

        let all = ranker
            .retrieve(&RetrievalRequest::new("clock", 50))
            .await
            .unwrap();
        assert_eq!(all.len(), 12);
    }

    #[tokio::test]
    async fn test_ties_keep_similarity_order() {
        let records: Vec<ChunkRecord> = (0..4)
            .map(|i| record(&format!("c{i}"), "clock", Some("2024-01-01")))
            .collect();
        let (metadata, index) = stores(&records).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 4))
            .await
            .unwrap();
        // pool order is newest insertion first; equal scores keep it
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c3", "c2", "c1", "c0"]);
    }

    #[tokio::test]
    async fn test_recency_normalized_over_pool() {
        let records = [
            record("old", "clock", Some("2024-01-01T00:00:00Z")),
            record("mid", "clock", Some("2024-01-02T00:00:00Z")),
            record("new", "clock", Some("2024-01-03T00:00:00Z")),
            record("undated", "clock", None),
        ];
        let (metadata, index) = stores(&records).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 10))
            .await
            .unwrap();
        let recency: HashMap<&str, f64> = out
            .iter()
            .map(|r| (r.id.as_str(), r.breakdown.recency))
            .collect();
        assert_eq!(recency["old"], 0.0);
        assert_eq!(recency["mid"], 0.5);
        assert_eq!(recency["new"], 1.0);
        assert_eq!(recency["undated"], NEUTRAL_RECENCY);
        assert_eq!(out[0].id, "new");
    }

    #[test]
    fn test_recency_score_degenerate_span() {
        let t = parse_timestamp("2024-01-01").unwrap();
        assert_eq!(recency_score(Some(&t), Some(&t), Some(&t)), NEUTRAL_RECENCY);
        assert_eq!(recency_score(None, Some(&t), Some(&t)), NEUTRAL_RECENCY);
        assert_eq!(recency_score(Some(&t), None, None), NEUTRAL_RECENCY);
    }

    #[tokio::test]
    async fn test_time_range_limits_pool() {
        let records = [
            record("jan", "clock", Some("2024-01-15")),
            record("feb", "clock", Some("2024-02-15")),
            record("undated", "clock", None),
        ];
        let (metadata, index) = stores(&records).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let range = TimeRange::new(parse_timestamp("2024-02-01"), parse_timestamp("2024-02-28"));
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 5).with_range(range))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "feb");
    }

    #[tokio::test]
    async fn test_divergent_hits_are_dropped() {
        let metadata = InMemoryMetadataStore::new();
        let index = InMemoryVectorIndex::new(AxisEmbedder);
        let a = record("a", "clock", None);
        let b = record("b", "clock", None);
        let ghost = record("ghost", "clock", None);
        metadata.upsert(&[a.clone(), b]).await.unwrap();
        index.upsert(&[a, ghost]).await.unwrap();

        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 5))
            .await
            .unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[tokio::test]
    async fn test_global_fallback_filtered_to_pool() {
        let metadata = InMemoryMetadataStore::new();
        metadata
            .upsert(&[record("a", "clock", None), record("b", "sea", None)])
            .await
            .unwrap();
        let index = GlobalOnlyIndex {
            hits: vec![hit("outside", 0.99), hit("b", 0.5), hit("a", 0.4)],
        };
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 5))
            .await
            .unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(out[0].similarity, 0.5);
    }

    #[tokio::test]
    async fn test_non_finite_similarity_coerced() {
        let metadata = InMemoryMetadataStore::new();
        metadata.upsert(&[record("a", "clock", None)]).await.unwrap();
        let index = GlobalOnlyIndex {
            hits: vec![hit("a", f64::NAN)],
        };
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 5))
            .await
            .unwrap();
        assert_eq!(out[0].similarity, 0.0);
        assert!((out[0].score - 0.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_emotion_bonus_only_for_target_match() {
        let joyful = record("joy", "rain", None).with_annotation(Annotation {
            emotion: Emotion::Joy,
            ..Annotation::default()
        });
        let sad = record("sad", "clock", None).with_annotation(Annotation {
            emotion: Emotion::Sadness,
            ..Annotation::default()
        });
        let (metadata, index) = stores(&[joyful, sad]).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);

        // without a target emotion no bonus is awarded
        let plain = ranker
            .retrieve(&RetrievalRequest::new("clock", 5))
            .await
            .unwrap();
        assert!(plain.iter().all(|r| r.breakdown.emotion_bonus == 0.0));
        assert_eq!(plain[0].id, "sad");

        let filters = ChunkFilters {
            emotion: Some(Emotion::Joy),
            ..ChunkFilters::default()
        };
        let targeted = ranker
            .retrieve(&RetrievalRequest::new("clock", 5).with_filters(filters))
            .await
            .unwrap();
        assert_eq!(targeted.len(), 1);
        assert_eq!(targeted[0].id, "joy");
        assert_eq!(targeted[0].breakdown.emotion_bonus, 1.0);
    }

    #[tokio::test]
    async fn test_weights_are_not_renormalized() {
        let (metadata, index) = stores(&[record("a", "clock", None)]).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let weights = RetrievalWeights {
            vector: 2.0,
            emotion: 0.0,
            recency: 1.0,
        };
        let out = ranker
            .retrieve(&RetrievalRequest::new("clock", 1).with_weights(weights))
            .await
            .unwrap();
        assert!((out[0].score - 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_monotonic_in_vector_weight() {
        // "best" has top similarity but is the oldest, so recency
        // initially ranks it last
        let records = [
            record("best", "clock", Some("2024-01-01")),
            record("mid", "clock sea", Some("2024-01-02")),
            record("low", "clock sea sea", Some("2024-01-03")),
        ];
        let (metadata, index) = stores(&records).await;
        let ranker = HybridRanker::new(&metadata, &index, 300);

        let mut last_rank = usize::MAX;
        for vector in [0.0, 0.05, 0.2, 0.75, 2.0] {
            let weights = RetrievalWeights {
                vector,
                emotion: 0.15,
                recency: 0.10,
            };
            let out = ranker
                .retrieve(&RetrievalRequest::new("clock", 3).with_weights(weights))
                .await
                .unwrap();
            let rank = out.iter().position(|r| r.id == "best").unwrap();
            assert!(rank <= last_rank, "rank worsened at vector weight {vector}");
            last_rank = rank;
        }
        assert_eq!(last_rank, 0);
    }

    #[tokio::test]
    async fn test_hallway_single_chunk_scenario() {
        let chunker = SemanticChunker::new(ChunkingParams::default());
        let doc = RawDocument::new("memories.txt", "I remember the hallway clock freezing at 2:17.")
            .with_timestamp(parse_timestamp("2019-11-03"));
        let chunks = chunker.chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        let labeled = label_heuristic(chunks);
        assert_eq!(labeled[0].annotation.time_scope, TimeScope::Past);

        let metadata = InMemoryMetadataStore::new();
        let index = InMemoryVectorIndex::new(HashEmbedder::default());
        metadata.upsert(&labeled).await.unwrap();
        index.upsert(&labeled).await.unwrap();

        let filters = ChunkFilters {
            time_scope: Some(TimeScope::Past),
            emotion: Some(labeled[0].annotation.emotion),
            ..ChunkFilters::default()
        };
        let ranker = HybridRanker::new(&metadata, &index, 300);
        let out = ranker
            .retrieve(&RetrievalRequest::new("hallway clock", 5).with_filters(filters))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, labeled[0].id);
        assert_eq!(out[0].breakdown.emotion_bonus, 1.0);
        assert!(out[0].similarity > 0.0);
        let expected = 0.75 * out[0].breakdown.similarity + 0.15 + 0.10 * NEUTRAL_RECENCY;
        assert!((out[0].score - expected).abs() < 1e-6);
    }
}

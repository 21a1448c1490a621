//! Storage abstractions for Narrative Memory.
//!
//! Two collaborators back the ranker:
//!
//! - [`MetadataStore`] holds [`ChunkRecord`]s and answers time-range and
//!   label filters with a recency-ordered candidate pool.
//! - [`VectorIndex`] holds one embedding per chunk and answers similarity
//!   queries, either restricted to a set of ids or over the whole index.
//!
//! Both are async (via `async-trait`) so that SQLite-backed
//! implementations can be used directly; in-memory implementations in
//! [`memory`] return immediately-ready futures. Implementations must be
//! `Send + Sync` and safe for concurrent reads. Each `upsert` call is one
//! batch; serializing concurrent writers is the store's job.
//!
//! # Operations
//!
//! | Trait | Method | Purpose |
//! |-------|--------|---------|
//! | [`MetadataStore`] | [`upsert`](MetadataStore::upsert) | Insert or replace records by id |
//! | [`MetadataStore`] | [`filter`](MetadataStore::filter) | Filtered candidate pool, newest first |
//! | [`MetadataStore`] | [`count`](MetadataStore::count) | Number of stored records |
//! | [`VectorIndex`] | [`upsert`](VectorIndex::upsert) | Embed and store record texts |
//! | [`VectorIndex`] | [`query_subset`](VectorIndex::query_subset) | Similarity over given ids only |
//! | [`VectorIndex`] | [`query_global`](VectorIndex::query_global) | Similarity over everything |
//! | [`VectorIndex`] | [`count`](VectorIndex::count) | Number of stored vectors |

pub mod memory;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ChunkRecord, Emotion, Rating, TimeScope, VoiceMode};

/// Inclusive time window. A record without a timestamp falls outside
/// any window that has at least one bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: Option<&DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(ts) = timestamp else {
            return false;
        };
        self.start.map_or(true, |start| *ts >= start) && self.end.map_or(true, |end| *ts <= end)
    }
}

/// Equality and threshold filters over chunk annotations.
///
/// `None` means "no constraint". String and label filters are exact
/// matches; numeric filters are inclusive thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFilters {
    pub source: Option<String>,
    /// Target category label. Also drives the ranker's match bonus.
    pub emotion: Option<Emotion>,
    pub time_scope: Option<TimeScope>,
    pub voice_mode: Option<VoiceMode>,
    pub min_intensity: Option<u8>,
    pub max_intensity: Option<u8>,
    pub min_authenticity: Option<u8>,
    pub min_specificity: Option<u8>,
}

impl ChunkFilters {
    pub fn matches(&self, record: &ChunkRecord) -> bool {
        let a = &record.annotation;
        let at_least = |min: Option<u8>, value: Rating| min.map_or(true, |m| value.get() >= m);

        self.source
            .as_deref()
            .filter(|s| !s.is_empty())
            .map_or(true, |s| record.source == s)
            && self.emotion.map_or(true, |e| a.emotion == e)
            && self.time_scope.map_or(true, |t| a.time_scope == t)
            && self.voice_mode.map_or(true, |v| a.voice_mode == v)
            && at_least(self.min_intensity, a.intensity)
            && self.max_intensity.map_or(true, |m| a.intensity.get() <= m)
            && at_least(self.min_authenticity, a.authenticity)
            && at_least(self.min_specificity, a.specificity)
    }
}

/// Metadata stored alongside a vector, returned with every hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitMetadata {
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub emotion: Emotion,
    pub time_scope: TimeScope,
    pub intensity: Rating,
    pub voice_mode: VoiceMode,
}

impl From<&ChunkRecord> for HitMetadata {
    fn from(record: &ChunkRecord) -> Self {
        Self {
            source: record.source.clone(),
            timestamp: record.timestamp,
            emotion: record.annotation.emotion,
            time_scope: record.annotation.time_scope,
            intensity: record.annotation.intensity,
            voice_mode: record.annotation.voice_mode,
        }
    }
}

/// A scored hit from a [`VectorIndex`] query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Chunk id.
    pub id: String,
    /// Cosine similarity in `[-1, 1]`, never NaN.
    pub similarity: f64,
    pub text: String,
    pub metadata: HitMetadata,
}

/// Sort hits by similarity, highest first. Stable: equal similarities
/// keep their input order.
pub fn sort_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
}

/// Store of chunk records answering filtered, recency-ordered queries.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert records, replacing any existing record with the same id.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Return records inside `range` that satisfy `filters`, ordered by
    /// timestamp descending (missing timestamps last), then by insertion
    /// time descending, truncated to `limit`.
    async fn filter(
        &self,
        range: &TimeRange,
        filters: &ChunkFilters,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}

/// Similarity index over chunk texts.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and store each record's text with its metadata, replacing any
    /// existing entry with the same id.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Score exactly the entries named in `ids` against `query`, returning
    /// up to `top_k` hits by descending similarity. Ids without a stored
    /// vector are skipped.
    async fn query_subset(&self, query: &str, ids: &[String], top_k: usize)
        -> Result<Vec<VectorHit>>;

    /// Score every stored entry against `query`, returning up to `top_k`
    /// hits by descending similarity.
    async fn query_global(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>>;

    /// Number of stored vectors.
    async fn count(&self) -> Result<usize>;
}

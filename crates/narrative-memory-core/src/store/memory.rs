//! In-memory [`MetadataStore`] and [`VectorIndex`] implementations for
//! testing and embedding in other programs.
//!
//! Both use `Vec`s behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over the stored vectors.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};
use crate::models::ChunkRecord;

use super::{sort_hits, ChunkFilters, HitMetadata, MetadataStore, TimeRange, VectorHit, VectorIndex};

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

struct StoredRecord {
    /// Insertion sequence; kept across replacements like `created_at`.
    seq: u64,
    record: ChunkRecord,
}

#[derive(Default)]
struct MetadataInner {
    records: Vec<StoredRecord>,
    next_seq: u64,
}

/// In-memory metadata store.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    inner: RwLock<MetadataInner>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first; records without a timestamp sort after all dated ones.
fn recency_order(a: &StoredRecord, b: &StoredRecord) -> Ordering {
    match (&a.record.timestamp, &b.record.timestamp) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.seq.cmp(&a.seq))
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        for record in records {
            if let Some(existing) = inner.records.iter_mut().find(|r| r.record.id == record.id) {
                existing.record = record.clone();
                continue;
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.records.push(StoredRecord {
                seq,
                record: record.clone(),
            });
        }
        Ok(())
    }

    async fn filter(
        &self,
        range: &TimeRange,
        filters: &ChunkFilters,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut matched: Vec<&StoredRecord> = inner
            .records
            .iter()
            .filter(|r| range.contains(r.record.timestamp.as_ref()) && filters.matches(&r.record))
            .collect();
        matched.sort_by(|a, b| recency_order(a, b));
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|r| r.record.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned)?.records.len())
    }
}

struct StoredVector {
    id: String,
    text: String,
    metadata: HitMetadata,
    vector: Vec<f32>,
}

/// In-memory vector index that embeds with `E`.
pub struct InMemoryVectorIndex<E> {
    embedder: E,
    entries: RwLock<Vec<StoredVector>>,
}

impl<E: EmbeddingProvider> InMemoryVectorIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Store records with precomputed vectors, one per record.
    pub fn upsert_with_vectors(&self, records: &[ChunkRecord], vectors: Vec<Vec<f32>>) -> Result<()> {
        if records.len() != vectors.len() {
            bail!(
                "vector count mismatch: {} records, {} vectors",
                records.len(),
                vectors.len()
            );
        }
        let mut entries = self.entries.write().map_err(poisoned)?;
        for (record, vector) in records.iter().zip(vectors) {
            let entry = StoredVector {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: HitMetadata::from(record),
                vector,
            };
            match entries.iter_mut().find(|e| e.id == record.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Ok(())
    }

    fn score<'a>(query: &[f32], entries: impl Iterator<Item = &'a StoredVector>) -> Vec<VectorHit> {
        entries
            .map(|e| VectorHit {
                id: e.id.clone(),
                similarity: cosine_similarity(query, &e.vector) as f64,
                text: e.text.clone(),
                metadata: e.metadata.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl<E: EmbeddingProvider> VectorIndex for InMemoryVectorIndex<E> {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        self.upsert_with_vectors(records, vectors)
    }

    async fn query_subset(
        &self,
        query: &str,
        ids: &[String],
        top_k: usize,
    ) -> Result<Vec<VectorHit>> {
        if ids.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(&self.embedder, query).await?;
        let entries = self.entries.read().map_err(poisoned)?;
        let by_id: HashMap<&str, &StoredVector> =
            entries.iter().map(|e| (e.id.as_str(), e)).collect();

        let mut seen = HashSet::new();
        let selected = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| by_id.get(id.as_str()).copied());
        let mut hits = Self::score(&query_vec, selected);
        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn query_global(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(&self.embedder, query).await?;
        let entries = self.entries.read().map_err(poisoned)?;
        let mut hits = Self::score(&query_vec, entries.iter());
        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}

//! Index and query pipeline.
//!
//! [`Pipeline`] wires the SQLite stores, the configured embedding
//! provider, the chunker, and the labeler together by explicit
//! construction:
//!
//! ```text
//! ingest ──► chunk ──► label ──► upsert metadata ──► upsert vectors
//! ```
//!
//! Retrieval runs the [`HybridRanker`] over the same stores, and
//! [`Pipeline::draft`] feeds retrieved hits to the configured drafter.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use narrative_memory_core::chunk::SemanticChunker;
use narrative_memory_core::search::{HybridRanker, RankedChunk, RetrievalRequest};
use narrative_memory_core::store::{ChunkFilters, MetadataStore, TimeRange, VectorIndex};

use crate::config::Config;
use crate::db;
use crate::drafting::{build_drafter, draft_from_hits, Draft, Drafter};
use crate::embedding::create_provider;
use crate::ingest::ingest_paths;
use crate::labeling::{build_labeler, label_chunks, label_heuristic, Labeler};
use crate::migrate;
use crate::sqlite_store::{SqliteMetadataStore, SqliteVectorIndex};

/// Counts reported by [`Pipeline::ingest_and_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents_ingested: usize,
    pub chunks_created: usize,
    pub chunks_labeled: usize,
    pub metadata_total: usize,
    pub vectors_total: usize,
}

/// Counts from a dry run: what an ingest would produce, nothing written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestPreview {
    pub documents: usize,
    pub chunks: usize,
    pub words: usize,
}

/// Chunk `paths` without touching the database.
pub fn preview(config: &Config, paths: &[PathBuf]) -> Result<IngestPreview> {
    let docs = ingest_paths(paths, &config.ingest)?;
    let chunks = SemanticChunker::new(config.chunking.params()).chunk_documents(&docs);
    Ok(IngestPreview {
        documents: docs.len(),
        chunks: chunks.len(),
        words: chunks.iter().map(|c| c.word_count).sum(),
    })
}

/// Run the `ingest` command and print the resulting counts.
pub async fn run_ingest(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    if dry_run {
        let p = preview(config, paths)?;
        println!("Ingest plan (dry run):");
        println!("  documents: {}", p.documents);
        println!("  chunks:    {}", p.chunks);
        println!("  words:     {}", p.words);
        return Ok(());
    }

    let pipeline = Pipeline::open(config.clone()).await?;
    let report = pipeline.ingest_and_index(paths).await?;
    pipeline.close().await;

    println!("Ingest complete:");
    println!("  documents_ingested: {}", report.documents_ingested);
    println!("  chunks_created:     {}", report.chunks_created);
    println!("  chunks_labeled:     {}", report.chunks_labeled);
    println!("  metadata_total:     {}", report.metadata_total);
    println!("  vectors_total:      {}", report.vectors_total);
    Ok(())
}

pub struct Pipeline {
    config: Config,
    pool: SqlitePool,
    metadata: SqliteMetadataStore,
    index: SqliteVectorIndex,
    chunker: SemanticChunker,
    labeler: Option<Box<dyn Labeler>>,
    drafter: Box<dyn Drafter>,
}

impl Pipeline {
    /// Open the database (creating the schema if needed) and build every
    /// collaborator from `config`.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::migrate(&pool).await?;

        let embedder = Arc::from(create_provider(&config.embedding)?);
        let labeler = if config.labeling.enabled {
            build_labeler(&config.labeling)?
        } else {
            None
        };
        let drafter = build_drafter(&config.drafting)?;

        Ok(Self {
            metadata: SqliteMetadataStore::new(pool.clone()),
            index: SqliteVectorIndex::new(pool.clone(), embedder, config.embedding.batch_size),
            chunker: SemanticChunker::new(config.chunking.params()),
            labeler,
            drafter,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata(&self) -> &SqliteMetadataStore {
        &self.metadata
    }

    pub fn index(&self) -> &SqliteVectorIndex {
        &self.index
    }

    /// Ingest `paths`, chunk, label, and persist to both stores.
    pub async fn ingest_and_index(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        let docs = ingest_paths(paths, &self.config.ingest)?;
        let chunks = self.chunker.chunk_documents(&docs);
        let chunks_created = chunks.len();
        tracing::info!(
            documents = docs.len(),
            chunks = chunks_created,
            "chunked documents"
        );

        let labeling = &self.config.labeling;
        let labeled = if labeling.enabled {
            label_chunks(
                self.labeler.as_deref(),
                labeling.fallback_heuristic,
                labeling.batch_size,
                chunks,
            )
            .await
        } else {
            label_heuristic(chunks)
        };

        self.metadata.upsert(&labeled).await?;
        self.index.upsert(&labeled).await?;

        let report = IngestReport {
            documents_ingested: docs.len(),
            chunks_created,
            chunks_labeled: labeled.len(),
            metadata_total: self.metadata.count().await?,
            vectors_total: self.index.count().await?,
        };
        tracing::info!(
            metadata_total = report.metadata_total,
            vectors_total = report.vectors_total,
            "indexed chunks"
        );
        Ok(report)
    }

    /// Hybrid retrieval with the configured weights. `top_k` falls back
    /// to `retrieval.default_top_k`.
    pub async fn retrieve(
        &self,
        query: &str,
        range: TimeRange,
        filters: ChunkFilters,
        top_k: Option<usize>,
    ) -> Result<Vec<RankedChunk>> {
        let retrieval = &self.config.retrieval;
        let ranker = HybridRanker::new(&self.metadata, &self.index, retrieval.candidate_pool_size);
        let request = RetrievalRequest::new(query, top_k.unwrap_or(retrieval.default_top_k))
            .with_range(range)
            .with_filters(filters)
            .with_weights(retrieval.weights());
        ranker.retrieve(&request).await
    }

    /// Summarize `hits` (or the default retrieval for `query` when `None`)
    /// and refine `seed` against the summary.
    pub async fn draft(
        &self,
        query: &str,
        seed: &str,
        hits: Option<Vec<RankedChunk>>,
    ) -> Result<Draft> {
        let hits = match hits {
            Some(hits) => hits,
            None => {
                self.retrieve(query, TimeRange::default(), ChunkFilters::default(), None)
                    .await?
            }
        };
        let max_items = self.config.drafting.max_items;
        Ok(draft_from_hits(self.drafter.as_ref(), &hits, seed, max_items).await)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

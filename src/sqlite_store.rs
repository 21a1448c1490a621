//! SQLite-backed [`MetadataStore`] and [`VectorIndex`] implementations.
//!
//! Both wrap a [`SqlitePool`] over the schema created by
//! [`migrate`](crate::migrate): chunk metadata lives in `chunks`, one
//! embedding per chunk (plus the metadata echoed on every hit) lives in
//! `chunk_vectors`. Similarity search is brute-force cosine over the
//! stored BLOBs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use narrative_memory_core::embedding::{
    blob_to_vec, cosine_similarity, embed_query, vec_to_blob, EmbeddingProvider,
};
use narrative_memory_core::models::{
    format_timestamp, parse_timestamp, Annotation, ChunkRecord, Emotion, Rating, TimeScope,
    VoiceMode,
};
use narrative_memory_core::store::{
    sort_hits, ChunkFilters, HitMetadata, MetadataStore, TimeRange, VectorHit, VectorIndex,
};

/// Ids per `IN (...)` clause, well under SQLite's bound-parameter limit.
const ID_BATCH: usize = 500;

const CHUNK_COLUMNS: &str = "id, source, timestamp, text, emotion, time_scope, intensity, \
    voice_mode, authenticity_score, specificity_score, cliche_score, word_count";

const VECTOR_COLUMNS: &str =
    "chunk_id, text, source, timestamp, emotion, time_scope, intensity, voice_mode, embedding";

fn rating(row: &SqliteRow, column: &str) -> Rating {
    Rating::new(row.get::<i64, _>(column))
}

fn row_to_record(row: &SqliteRow) -> ChunkRecord {
    let timestamp: Option<String> = row.get("timestamp");
    let word_count: i64 = row.get("word_count");
    ChunkRecord {
        id: row.get("id"),
        source: row.get("source"),
        text: row.get("text"),
        timestamp: timestamp.as_deref().and_then(parse_timestamp),
        word_count: word_count.max(0) as usize,
        annotation: Annotation {
            emotion: Emotion::parse(row.get("emotion")),
            time_scope: TimeScope::parse(row.get("time_scope")),
            intensity: rating(row, "intensity"),
            voice_mode: VoiceMode::parse(row.get("voice_mode")),
            authenticity: rating(row, "authenticity_score"),
            specificity: rating(row, "specificity_score"),
            cliche: rating(row, "cliche_score"),
        },
    }
}

/// SQLite implementation of [`MetadataStore`].
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Chunk counts grouped by `column` (`source` or `emotion`), largest first.
    pub async fn counts_by(&self, column: &str) -> Result<Vec<(String, i64)>> {
        let column = match column {
            "source" | "emotion" | "time_scope" | "voice_mode" => column,
            other => bail!("cannot group chunks by '{}'", other),
        };
        let rows = sqlx::query(&format!(
            "SELECT {column} AS label, COUNT(*) AS n FROM chunks GROUP BY {column} ORDER BY n DESC, label ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("label"), row.get("n")))
            .collect())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let a = &record.annotation;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source, timestamp, text, emotion, time_scope, intensity,
                                    voice_mode, authenticity_score, specificity_score,
                                    cliche_score, word_count, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    timestamp = excluded.timestamp,
                    text = excluded.text,
                    emotion = excluded.emotion,
                    time_scope = excluded.time_scope,
                    intensity = excluded.intensity,
                    voice_mode = excluded.voice_mode,
                    authenticity_score = excluded.authenticity_score,
                    specificity_score = excluded.specificity_score,
                    cliche_score = excluded.cliche_score,
                    word_count = excluded.word_count
                "#,
            )
            .bind(&record.id)
            .bind(&record.source)
            .bind(record.timestamp_iso())
            .bind(&record.text)
            .bind(a.emotion.as_str())
            .bind(a.time_scope.as_str())
            .bind(a.intensity.get() as i64)
            .bind(a.voice_mode.as_str())
            .bind(a.authenticity.get() as i64)
            .bind(a.specificity.get() as i64)
            .bind(a.cliche.get() as i64)
            .bind(record.word_count as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn filter(
        &self,
        range: &TimeRange,
        filters: &ChunkFilters,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE 1 = 1"));

        if let Some(start) = &range.start {
            qb.push(" AND timestamp IS NOT NULL AND timestamp >= ")
                .push_bind(format_timestamp(start));
        }
        if let Some(end) = &range.end {
            qb.push(" AND timestamp IS NOT NULL AND timestamp <= ")
                .push_bind(format_timestamp(end));
        }
        if let Some(source) = filters.source.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND source = ").push_bind(source.to_string());
        }
        if let Some(emotion) = filters.emotion {
            qb.push(" AND emotion = ").push_bind(emotion.as_str());
        }
        if let Some(time_scope) = filters.time_scope {
            qb.push(" AND time_scope = ").push_bind(time_scope.as_str());
        }
        if let Some(voice_mode) = filters.voice_mode {
            qb.push(" AND voice_mode = ").push_bind(voice_mode.as_str());
        }
        if let Some(min) = filters.min_intensity {
            qb.push(" AND intensity >= ").push_bind(min as i64);
        }
        if let Some(max) = filters.max_intensity {
            qb.push(" AND intensity <= ").push_bind(max as i64);
        }
        if let Some(min) = filters.min_authenticity {
            qb.push(" AND authenticity_score >= ").push_bind(min as i64);
        }
        if let Some(min) = filters.min_specificity {
            qb.push(" AND specificity_score >= ").push_bind(min as i64);
        }

        qb.push(" ORDER BY timestamp IS NULL, timestamp DESC, created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit.min(i64::MAX as usize) as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as usize)
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SQLite implementation of [`VectorIndex`].
///
/// Upserts re-embed a chunk only when its text hash or the embedding model
/// changed; otherwise just the stored metadata is refreshed.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            pool,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    async fn query_vec(&self, query: &str) -> Result<Vec<f32>> {
        embed_query(self.embedder.as_ref(), query).await
    }

    async fn stored_hash(&self, chunk_id: &str) -> Result<Option<(String, String)>> {
        let row = sqlx::query("SELECT hash, model FROM chunk_vectors WHERE chunk_id = ?")
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get("hash"), r.get("model"))))
    }
}

fn row_to_hit(row: &SqliteRow, query_vec: &[f32]) -> VectorHit {
    let blob: Vec<u8> = row.get("embedding");
    let timestamp: Option<String> = row.get("timestamp");
    VectorHit {
        id: row.get("chunk_id"),
        similarity: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
        text: row.get("text"),
        metadata: HitMetadata {
            source: row.get("source"),
            timestamp: timestamp.as_deref().and_then(parse_timestamp),
            emotion: Emotion::parse(row.get("emotion")),
            time_scope: TimeScope::parse(row.get("time_scope")),
            intensity: rating(row, "intensity"),
            voice_mode: VoiceMode::parse(row.get("voice_mode")),
        },
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let model = self.embedder.model_name().to_string();

        let mut stale: Vec<(&ChunkRecord, String)> = Vec::new();
        let mut fresh: Vec<&ChunkRecord> = Vec::new();
        for record in records {
            let text_hash = hash_text(&record.text);
            match self.stored_hash(&record.id).await? {
                Some((hash, stored_model)) if hash == text_hash && stored_model == model => {
                    fresh.push(record)
                }
                _ => stale.push((record, text_hash)),
            }
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(stale.len());
        for batch in stale.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(r, _)| r.text.clone()).collect();
            let embedded = self.embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                bail!(
                    "embedding provider returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                );
            }
            vectors.extend(embedded);
        }

        let mut tx = self.pool.begin().await?;
        for ((record, text_hash), vector) in stale.iter().zip(vectors.iter()) {
            let meta = HitMetadata::from(*record);
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, text, hash, model, dims, source, timestamp,
                                           emotion, time_scope, intensity, voice_mode, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    text = excluded.text,
                    hash = excluded.hash,
                    model = excluded.model,
                    dims = excluded.dims,
                    source = excluded.source,
                    timestamp = excluded.timestamp,
                    emotion = excluded.emotion,
                    time_scope = excluded.time_scope,
                    intensity = excluded.intensity,
                    voice_mode = excluded.voice_mode,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(&record.text)
            .bind(text_hash)
            .bind(&model)
            .bind(vector.len() as i64)
            .bind(&meta.source)
            .bind(record.timestamp_iso())
            .bind(meta.emotion.as_str())
            .bind(meta.time_scope.as_str())
            .bind(meta.intensity.get() as i64)
            .bind(meta.voice_mode.as_str())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        for record in &fresh {
            let meta = HitMetadata::from(*record);
            sqlx::query(
                r#"
                UPDATE chunk_vectors
                SET source = ?, timestamp = ?, emotion = ?, time_scope = ?,
                    intensity = ?, voice_mode = ?
                WHERE chunk_id = ?
                "#,
            )
            .bind(&meta.source)
            .bind(record.timestamp_iso())
            .bind(meta.emotion.as_str())
            .bind(meta.time_scope.as_str())
            .bind(meta.intensity.get() as i64)
            .bind(meta.voice_mode.as_str())
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(
            embedded = stale.len(),
            unchanged = fresh.len(),
            model = %model,
            "vector upsert"
        );
        Ok(())
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
        let query_vec = self.query_vec(query).await?;

        let mut by_id: HashMap<String, VectorHit> = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(ID_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {VECTOR_COLUMNS} FROM chunk_vectors WHERE chunk_id IN ("
            ));
            let mut separated = qb.separated(", ");
            for id in batch {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in &rows {
                let hit = row_to_hit(row, &query_vec);
                by_id.insert(hit.id.clone(), hit);
            }
        }

        // Requested order first, so equal similarities keep pool order
        let mut hits: Vec<VectorHit> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn query_global(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.query_vec(query).await?;
        let rows = sqlx::query(&format!(
            "SELECT {VECTOR_COLUMNS} FROM chunk_vectors ORDER BY rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<VectorHit> = rows.iter().map(|row| row_to_hit(row, &query_vec)).collect();
        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as usize)
    }
}

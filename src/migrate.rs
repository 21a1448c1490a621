use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool. Idempotent.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Chunk metadata. Timestamps are fixed-width UTC RFC 3339 strings.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            timestamp TEXT,
            text TEXT NOT NULL,
            emotion TEXT NOT NULL,
            time_scope TEXT NOT NULL,
            intensity INTEGER NOT NULL,
            voice_mode TEXT NOT NULL,
            authenticity_score INTEGER NOT NULL,
            specificity_score INTEGER NOT NULL,
            cliche_score INTEGER NOT NULL,
            word_count INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One embedding per chunk, with the metadata returned on every hit
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            source TEXT NOT NULL,
            timestamp TEXT,
            emotion TEXT NOT NULL,
            time_scope TEXT NOT NULL,
            intensity INTEGER NOT NULL,
            voice_mode TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_chunks_timestamp ON chunks(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_chunks_emotion ON chunks(emotion)",
        "CREATE INDEX IF NOT EXISTS idx_chunks_time_scope ON chunks(time_scope)",
        "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    Ok(())
}

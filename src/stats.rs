//! Database statistics overview.
//!
//! Summarizes what's indexed: chunk and vector counts, embedding
//! coverage, and per-source and per-emotion breakdowns. Used by
//! `nmem stats`.

use anyhow::Result;

use narrative_memory_core::store::MetadataStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteMetadataStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let metadata = SqliteMetadataStore::new(pool.clone());

    let total_chunks = metadata.count().await?;
    let total_vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(&pool)
        .await?;
    let total_vectors = total_vectors.max(0) as usize;
    let by_source = metadata.counts_by("source").await?;
    let by_emotion = metadata.counts_by("emotion").await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Narrative Memory — Database Stats");
    println!("=================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_vectors,
        total_chunks,
        if total_chunks > 0 {
            (total_vectors * 100) / total_chunks
        } else {
            0
        }
    );

    print_breakdown("By source:", "SOURCE", &by_source);
    print_breakdown("By emotion:", "EMOTION", &by_emotion);
    println!();

    pool.close().await;
    Ok(())
}

fn print_breakdown(title: &str, header: &str, rows: &[(String, i64)]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("  {}", title);
    println!("  {:<48} {:>8}", header, "CHUNKS");
    println!("  {}", "-".repeat(57));
    for (label, count) in rows {
        println!("  {:<48} {:>8}", label, count);
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}

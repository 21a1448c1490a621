//! # Narrative Memory CLI (`nmem`)
//!
//! The `nmem` binary indexes personal writing (journals, notes, chat
//! exports) into semantically coherent chunks and retrieves them with a
//! hybrid ranker that blends vector similarity, an emotion match bonus,
//! and recency.
//!
//! ## Usage
//!
//! ```bash
//! nmem --config ./config/nmem.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nmem init` | Create the SQLite database and run schema migrations |
//! | `nmem ingest <path>...` | Ingest, chunk, label, and index files or directories |
//! | `nmem search "<query>"` | Hybrid retrieval with time and label filters |
//! | `nmem draft "<query>"` | Summarize retrieved context and refine a seed draft |
//! | `nmem stats` | Show chunk counts and label breakdowns |
//!
//! ## Examples
//!
//! ```bash
//! nmem init
//! nmem ingest ~/journal ~/exports/chat.json
//! nmem search "the old train platform" --emotion nostalgia --since 2024-01-01
//! nmem search "kitchen at night" --limit 3 --json
//! nmem draft "kitchen at night" --seed "The kettle knows my name"
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=narrative_memory=debug` for ranker
//! stage details.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use narrative_memory::search::SearchOptions;
use narrative_memory::{config, drafting, migrate, pipeline, search, stats};

/// Narrative Memory CLI: semantic chunking and hybrid retrieval over
/// personal writing.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/nmem.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "nmem",
    about = "Narrative Memory — semantic chunking and hybrid retrieval over personal writing",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/nmem.toml`. Database, chunking, retrieval,
    /// embedding, and labeling settings are read from this file.
    #[arg(long, global = true, default_value = "./config/nmem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `chunks` and
    /// `chunk_vectors` tables. Running it again is safe.
    Init,

    /// Ingest files or directories.
    ///
    /// Reads `.txt`, `.md`, and `.json` sources (per the configured globs),
    /// chunks them on paragraph and sentence boundaries, attaches weak
    /// labels, and stores chunks plus embeddings in SQLite.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Dry run: show document and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed chunks.
    ///
    /// Filters a recency-ordered candidate pool by time range and labels,
    /// then ranks it by similarity, emotion match, and recency.
    Search {
        /// The search query string.
        query: String,

        /// Only chunks dated on or after this time (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        since: Option<String>,

        /// Only chunks dated on or before this time (YYYY-MM-DD covers the whole day).
        #[arg(long)]
        until: Option<String>,

        /// Restrict to one source (file path, or `path#index` for JSON arrays).
        #[arg(long)]
        source: Option<String>,

        /// Target emotion; filters the pool and earns the match bonus.
        #[arg(long)]
        emotion: Option<String>,

        /// Temporal scope: past, present, future, timeless, mixed, unknown.
        #[arg(long)]
        time_scope: Option<String>,

        /// Voice: confessional, observational, dialogue, imagistic, boastful, reflective, unknown.
        #[arg(long)]
        voice: Option<String>,

        /// Minimum intensity (1-5).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        min_intensity: Option<u8>,

        /// Maximum intensity (1-5).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        max_intensity: Option<u8>,

        /// Minimum authenticity score (1-5).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        min_authenticity: Option<u8>,

        /// Minimum specificity score (1-5).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        min_specificity: Option<u8>,

        /// Maximum number of results (defaults to `retrieval.default_top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Show the per-signal score breakdown.
        #[arg(long)]
        explain: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Draft from retrieved context.
    ///
    /// Retrieves chunks for the query, summarizes the top hits into
    /// writing cues, and refines the seed text against them.
    Draft {
        /// The retrieval query.
        query: String,

        /// Seed line or block to refine. A built-in line is used when empty.
        #[arg(long, default_value = "")]
        seed: String,

        /// Number of hits to retrieve (defaults to `retrieval.default_top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Print the summary and draft as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    Stats,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("narrative_memory=info,narrative_memory_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, dry_run } => {
            pipeline::run_ingest(&cfg, &paths, dry_run).await?;
        }
        Commands::Search {
            query,
            since,
            until,
            source,
            emotion,
            time_scope,
            voice,
            min_intensity,
            max_intensity,
            min_authenticity,
            min_specificity,
            limit,
            explain,
            json,
        } => {
            let opts = SearchOptions {
                since,
                until,
                source,
                emotion,
                time_scope,
                voice,
                min_intensity,
                max_intensity,
                min_authenticity,
                min_specificity,
                limit,
                explain,
                json,
            };
            search::run_search(&cfg, &query, &opts).await?;
        }
        Commands::Draft {
            query,
            seed,
            limit,
            json,
        } => {
            drafting::run_draft(&cfg, &query, &seed, limit, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

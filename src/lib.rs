//! # Narrative Memory
//!
//! A local-first memory engine for personal writing.
//!
//! Narrative Memory ingests journals, notes, and chat exports, splits them
//! into semantically coherent chunks, attaches weak labels (emotion,
//! temporal scope, voice, quality scores), and retrieves them with a hybrid
//! ranker that blends vector similarity, an emotion match bonus, and
//! recency. Retrieved context can seed a summarize-then-refine drafting
//! round. The pure logic lives in `narrative_memory_core`; this crate
//! adds SQLite persistence, embedding, labeling and drafting providers,
//! file ingestion, and the `nmem` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │   Ingest    │──▶│     Pipeline     │──▶│    SQLite     │
//! │ txt/md/json │   │ Chunk+Label+Embed│   │ chunks+vectors│
//! └─────────────┘   └──────────────────┘   └───────┬───────┘
//!                                                  │
//!                                                  ▼
//!                                          ┌───────────────┐
//!                                          │ HybridRanker  │
//!                                          │  (nmem search)│
//!                                          └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! nmem init                         # create database
//! nmem ingest ./journal             # chunk, label, embed
//! nmem search "the station at midnight" --emotion nostalgia
//! nmem draft "the station at midnight" --seed "Last train again"
//! nmem stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite metadata store and vector index |
//! | [`embedding`] | Embedding providers (hash, OpenAI, local) |
//! | [`labeling`] | Labeler selection and the Gemini labeler |
//! | [`drafting`] | Drafter selection, the Gemini drafter, and the `draft` command |
//! | [`gemini`] | Gemini `generateContent` client |
//! | [`ingest`] | File and JSON ingestion |
//! | [`pipeline`] | Ingest/index and retrieval orchestration |
//! | [`search`] | The `search` command |
//! | [`stats`] | The `stats` command |

pub mod config;
pub mod db;
pub mod drafting;
pub mod embedding;
pub mod gemini;
pub mod ingest;
pub mod labeling;
pub mod migrate;
pub mod pipeline;
pub mod search;
pub mod sqlite_store;
pub mod stats;

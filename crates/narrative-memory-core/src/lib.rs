//! # Narrative Memory Core
//!
//! Shared, I/O-free logic for Narrative Memory: chunk records and their
//! annotation vocabulary, the semantic chunker, the labeling capability,
//! the embedding trait, store abstractions, the hybrid ranker, and the
//! drafting capability.
//!
//! This crate contains no tokio, sqlx, filesystem, or network
//! dependencies. Concrete SQLite stores, remote embedding providers, and
//! the remote labeler and drafter live in the `narrative-memory` app crate.

pub mod chunk;
pub mod drafting;
pub mod embedding;
pub mod labeling;
pub mod models;
pub mod search;
pub mod store;

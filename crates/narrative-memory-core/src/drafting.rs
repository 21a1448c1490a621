//! Drafting from retrieved context.
//!
//! A [`Drafter`] turns ranked hits into writing notes and then refines a
//! seed text against those notes. [`HeuristicDrafter`] works offline:
//! its summary is a numbered list of labeled cues and its refinement is a
//! fixed two-line extension of the seed. Remote drafters (the Gemini
//! client in the app crate) implement the same trait.
//!
//! [`draft_from_hits`] drives one round and substitutes fixed fallbacks
//! when a drafter fails or returns nothing, so a draft is always produced.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::search::RankedChunk;

/// Hits summarized per round unless configured otherwise.
pub const DEFAULT_MAX_ITEMS: usize = 6;

/// Summary used when retrieval found nothing.
pub const NO_CONTEXT_SUMMARY: &str = "No relevant narrative context found.";

/// Summary used when the drafter failed or returned blank text.
pub const NO_SUMMARY: &str = "No summary generated.";

/// Seed used when the caller gives a blank one.
pub const DEFAULT_SEED: &str = "I keep chasing the same memory in different songs.";

/// Words of chunk text kept per cue.
const CUE_WORDS: usize = 28;

/// Output of one drafting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub summary: String,
    pub draft: String,
}

/// Summarizes retrieved context and refines a seed against it.
#[async_trait]
pub trait Drafter: Send + Sync {
    /// Short identifier used in logs (e.g. `"heuristic"`, `"gemini"`).
    fn name(&self) -> &str;

    /// Writing notes for `hits`. Called only with a non-empty slice.
    async fn summarize(&self, hits: &[RankedChunk]) -> Result<String>;

    /// Refine `seed` using `summary`. `seed` is never blank.
    async fn refine(&self, seed: &str, summary: &str) -> Result<String>;
}

/// Offline drafter. Deterministic and infallible.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDrafter;

impl HeuristicDrafter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Drafter for HeuristicDrafter {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn summarize(&self, hits: &[RankedChunk]) -> Result<String> {
        Ok(context_cues(hits))
    }

    async fn refine(&self, seed: &str, _summary: &str) -> Result<String> {
        Ok(format!(
            "Refined Draft (heuristic):\n{}\n\
             I keep the room in frame, not just the feeling.\n\
             I name the hour, the street, the version of me still speaking.",
            seed
        ))
    }
}

/// One numbered `[emotion/time_scope] snippet...` line per hit, under a
/// `Context cues:` header.
pub fn context_cues(hits: &[RankedChunk]) -> String {
    let lines: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let snippet = hit
                .text
                .split_whitespace()
                .take(CUE_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            format!("{}. [{}/{}] {}...", i + 1, hit.emotion, hit.time_scope, snippet)
        })
        .collect();
    format!("Context cues:\n{}", lines.join("\n"))
}

/// Summarize the first `max_items` hits, then refine `seed`.
///
/// No hits skips the summary call. A failed or blank summary becomes
/// [`NO_SUMMARY`]; a failed or blank refinement returns the seed itself.
pub async fn draft_from_hits(
    drafter: &dyn Drafter,
    hits: &[RankedChunk],
    seed: &str,
    max_items: usize,
) -> Draft {
    let selected = &hits[..hits.len().min(max_items.max(1))];

    let summary = if selected.is_empty() {
        NO_CONTEXT_SUMMARY.to_string()
    } else {
        match drafter.summarize(selected).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => NO_SUMMARY.to_string(),
            Err(e) => {
                tracing::warn!(drafter = drafter.name(), error = %e, "context summary failed");
                NO_SUMMARY.to_string()
            }
        }
    };

    let seed = if seed.trim().is_empty() {
        DEFAULT_SEED
    } else {
        seed
    };

    let draft = match drafter.refine(seed, &summary).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => seed.to_string(),
        Err(e) => {
            tracing::warn!(drafter = drafter.name(), error = %e, "draft refinement failed");
            seed.to_string()
        }
    };

    Draft { summary, draft }
}

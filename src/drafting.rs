//! Drafter selection, the Gemini drafter, and the `nmem draft` command.
//!
//! The offline drafter and the round driver live in
//! `narrative_memory_core::drafting`. [`GeminiDrafter`] summarizes hits at
//! a low temperature and writes the draft at a higher one.

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use narrative_memory_core::drafting::{draft_from_hits, Draft, Drafter, HeuristicDrafter};
use narrative_memory_core::search::RankedChunk;
use narrative_memory_core::store::{ChunkFilters, TimeRange};

use crate::config::{Config, DraftingConfig};
use crate::gemini::{api_key_from_env, GeminiClient};
use crate::pipeline::Pipeline;

const SUMMARY_TEMPERATURE: f32 = 0.2;
const DRAFT_TEMPERATURE: f32 = 0.7;

/// Drafter backed by the Gemini API. Requires `GEMINI_API_KEY`.
pub struct GeminiDrafter {
    client: GeminiClient,
}

impl GeminiDrafter {
    pub fn new(config: &DraftingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(&config.model, api_key, config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Drafter for GeminiDrafter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn summarize(&self, hits: &[RankedChunk]) -> Result<String> {
        self.client
            .generate(&summary_prompt(hits), SUMMARY_TEMPERATURE)
            .await
    }

    async fn refine(&self, seed: &str, summary: &str) -> Result<String> {
        self.client
            .generate(&draft_prompt(seed, summary), DRAFT_TEMPERATURE)
            .await
    }
}

/// Prompt asking for grounded writing notes over `hits`, given as a
/// JSON array of `{source, timestamp, emotion, time_scope, text}`.
pub fn summary_prompt(hits: &[RankedChunk]) -> String {
    let chunks: Vec<serde_json::Value> = hits
        .iter()
        .map(|h| {
            serde_json::json!({
                "source": h.source,
                "timestamp": h.timestamp,
                "emotion": h.emotion,
                "time_scope": h.time_scope,
                "text": h.text,
            })
        })
        .collect();

    format!(
        "Summarize these retrieved memory chunks into actionable writing notes.\n\
         Keep facts grounded in the chunks. No invented details.\n\
         Return 5-8 bullet points with emotional arc, imagery anchors, and narrative tension.\n\n\
         Chunks:\n{}",
        serde_json::Value::Array(chunks)
    )
}

pub fn draft_prompt(seed: &str, summary: &str) -> String {
    format!(
        "You are helping draft lyrics.\n\
         Given the context summary and seed text, produce one polished 8-12 line draft.\n\
         Prioritize specificity, emotional honesty, and fresh phrasing.\n\
         Avoid cliches.\n\n\
         Context Summary:\n{}\n\n\
         Seed Text:\n{}\n",
        summary, seed
    )
}

/// Build the drafter for `config`. The Gemini provider without
/// `GEMINI_API_KEY` falls back to the heuristic drafter.
pub fn build_drafter(config: &DraftingConfig) -> Result<Box<dyn Drafter>> {
    match config.provider.as_str() {
        "heuristic" => Ok(Box::new(HeuristicDrafter::new())),
        "gemini" => match api_key_from_env() {
            Some(key) => Ok(Box::new(GeminiDrafter::new(config, key)?)),
            None => {
                tracing::warn!("GEMINI_API_KEY not set; using heuristic drafter");
                Ok(Box::new(HeuristicDrafter::new()))
            }
        },
        other => bail!("Unknown drafting provider: {}", other),
    }
}

/// Run the `draft` command: retrieve context for `query`, then summarize
/// and refine `seed`.
pub async fn run_draft(
    config: &Config,
    query: &str,
    seed: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let pipeline = Pipeline::open(config.clone()).await?;
    let hits = if query.trim().is_empty() {
        Vec::new()
    } else {
        pipeline
            .retrieve(query, TimeRange::default(), ChunkFilters::default(), limit)
            .await?
    };
    let draft = pipeline.draft(query, seed, Some(hits)).await?;
    pipeline.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
        return Ok(());
    }

    println!("Summary:");
    println!("{}", draft.summary);
    println!();
    println!("Draft:");
    println!("{}", draft.draft);
    Ok(())
}

//! Labeler selection and the Gemini-backed weak labeler.
//!
//! The heuristic rules and the batch driver live in
//! `narrative_memory_core::labeling`. [`GeminiLabeler`] sends one prompt
//! per batch to the Gemini `generateContent` endpoint and parses the
//! `{"labels": [...]}` object out of the reply. Any transport or parse
//! failure is returned as an error so the driver can fall back.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;

pub use narrative_memory_core::labeling::{label_chunks, label_heuristic, HeuristicLabeler, Labeler};
use narrative_memory_core::models::{Annotation, ChunkRecord, Emotion, TimeScope, VoiceMode};

use crate::config::LabelingConfig;
use crate::gemini::{api_key_from_env, GeminiClient};

/// Characters of chunk text sent per chunk.
const MAX_PROMPT_CHARS: usize = 1800;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

/// Weak labeler backed by the Gemini API. Requires `GEMINI_API_KEY`.
pub struct GeminiLabeler {
    client: GeminiClient,
}

impl GeminiLabeler {
    pub fn new(config: &LabelingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(&config.model, api_key, config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Labeler for GeminiLabeler {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn annotate(&self, chunks: &[ChunkRecord]) -> Result<HashMap<String, Annotation>> {
        if chunks.is_empty() {
            return Ok(HashMap::new());
        }
        let raw = self.client.generate(&build_prompt(chunks), 0.0).await?;
        parse_labels(&raw)
    }
}

fn allowed<T: Copy>(values: &[T], as_str: fn(&T) -> &'static str) -> String {
    let names: Vec<&str> = values.iter().map(as_str).collect();
    format!("{:?}", names)
}

/// Build the batch prompt: rules, allowed vocabularies, the expected
/// output shape, then the chunks as a JSON array of `{id, text}`.
pub fn build_prompt(chunks: &[ChunkRecord]) -> String {
    let payload: Vec<serde_json::Value> = chunks
        .iter()
        .map(|c| {
            let text: String = c.text.chars().take(MAX_PROMPT_CHARS).collect();
            serde_json::json!({"id": c.id, "text": text})
        })
        .collect();

    format!(
        r#"You are a conservative weak-labeling engine for personal writing memory chunks.

Rules:
1) Use only the text evidence in each chunk.
2) Never invent facts or names.
3) If uncertain, set emotion/time_scope/voice_mode to "unknown".
4) Scores must be integers 1-5.
5) Output STRICT JSON only, no markdown and no extra commentary.

Allowed emotion values: {emotions}
Allowed time_scope values: {scopes}
Allowed voice_mode values: {voices}

Return exactly:
{{
  "labels": [
    {{
      "id": "chunk-id",
      "emotion": "unknown",
      "time_scope": "unknown",
      "intensity": 3,
      "voice_mode": "unknown",
      "authenticity_score": 3,
      "specificity_score": 3,
      "cliche_score": 3
    }}
  ]
}}

Chunks:
{chunks}
"#,
        emotions = allowed(Emotion::ALL, Emotion::as_str),
        scopes = allowed(TimeScope::ALL, TimeScope::as_str),
        voices = allowed(VoiceMode::ALL, VoiceMode::as_str),
        chunks = serde_json::Value::Array(payload),
    )
}

/// Parse `raw` as JSON, or else the outermost `{...}` span inside it.
pub fn extract_json_object(raw: &str) -> Option<serde_json::Value> {
    let raw = raw.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        return Some(value);
    }
    let span = JSON_OBJECT.find(raw)?;
    serde_json::from_str(span.as_str()).ok()
}

/// Parse a model reply into annotations keyed by chunk id.
///
/// Items without an `id` are skipped. Label values are normalized
/// through [`Annotation::from_payload`].
pub fn parse_labels(raw: &str) -> Result<HashMap<String, Annotation>> {
    let parsed =
        extract_json_object(raw).ok_or_else(|| anyhow::anyhow!("labeler reply is not JSON"))?;
    let labels = parsed
        .get("labels")
        .and_then(|l| l.as_array())
        .ok_or_else(|| anyhow::anyhow!("labeler reply has no labels array"))?;

    let mut out = HashMap::with_capacity(labels.len());
    for item in labels {
        let id = match item.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => continue,
        };
        if !item.is_object() {
            continue;
        }
        out.insert(id, Annotation::from_payload(item));
    }
    Ok(out)
}

/// Build the primary labeler for `config`.
///
/// Returns `None` when the Gemini provider is selected but
/// `GEMINI_API_KEY` is unset; the caller then falls back to heuristics
/// (or keeps defaults).
pub fn build_labeler(config: &LabelingConfig) -> Result<Option<Box<dyn Labeler>>> {
    match config.provider.as_str() {
        "heuristic" => Ok(Some(Box::new(HeuristicLabeler::new()))),
        "gemini" => match api_key_from_env() {
            Some(key) => Ok(Some(Box::new(GeminiLabeler::new(config, key)?))),
            None => {
                tracing::warn!("GEMINI_API_KEY not set; gemini labeling unavailable");
                Ok(None)
            }
        },
        other => bail!("Unknown labeling provider: {}", other),
    }
}

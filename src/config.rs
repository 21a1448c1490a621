//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` has defaults, so a minimal config is just:
//!
//! ```toml
//! [db]
//! path = "data/nmem.sqlite"
//! ```
//!
//! API keys are never read from the file; providers look up
//! `OPENAI_API_KEY` and `GEMINI_API_KEY` in the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use narrative_memory_core::chunk::ChunkingParams;
use narrative_memory_core::drafting::DEFAULT_MAX_ITEMS;
use narrative_memory_core::search::RetrievalWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub labeling: LabelingConfig,
    #[serde(default)]
    pub drafting: DraftingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default = "default_hard_max_words")]
    pub hard_max_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            max_words: default_max_words(),
            hard_max_words: default_hard_max_words(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            min_words: self.min_words,
            max_words: self.max_words,
            hard_max_words: self.hard_max_words,
        }
    }
}

fn default_min_words() -> usize {
    80
}
fn default_max_words() -> usize {
    300
}
fn default_hard_max_words() -> usize {
    380
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_emotion_weight")]
    pub emotion_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool_size: default_candidate_pool_size(),
            default_top_k: default_top_k(),
            vector_weight: default_vector_weight(),
            emotion_weight: default_emotion_weight(),
            recency_weight: default_recency_weight(),
        }
    }
}

impl RetrievalConfig {
    pub fn weights(&self) -> RetrievalWeights {
        RetrievalWeights {
            vector: self.vector_weight,
            emotion: self.emotion_weight,
            recency: self.recency_weight,
        }
    }
}

fn default_candidate_pool_size() -> usize {
    300
}
fn default_top_k() -> usize {
    5
}
fn default_vector_weight() -> f64 {
    0.75
}
fn default_emotion_weight() -> f64 {
    0.15
}
fn default_recency_weight() -> f64 {
    0.10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    if cfg!(feature = "local-embeddings-fastembed") {
        "local".to_string()
    } else {
        "hash".to_string()
    }
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_labeling_provider")]
    pub provider: String,
    #[serde(default = "default_labeling_model")]
    pub model: String,
    #[serde(default = "default_labeling_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub fallback_heuristic: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_labeling_provider(),
            model: default_labeling_model(),
            batch_size: default_labeling_batch_size(),
            fallback_heuristic: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_labeling_provider() -> String {
    "heuristic".to_string()
}
fn default_labeling_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_labeling_batch_size() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct DraftingConfig {
    #[serde(default = "default_labeling_provider")]
    pub provider: String,
    #[serde(default = "default_labeling_model")]
    pub model: String,
    /// Hits passed to the summary step.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            provider: default_labeling_provider(),
            model: default_labeling_model(),
            max_items: default_max_items(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.json".to_string(),
    ]
}

impl Config {
    /// Defaults everywhere with the offline hash embedder, database at
    /// `path`.
    pub fn minimal(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                ..EmbeddingConfig::default()
            },
            labeling: LabelingConfig::default(),
            drafting: DraftingConfig::default(),
            ingest: IngestConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.min_words == 0 {
            bail!("chunking.min_words must be > 0");
        }
        if c.min_words > c.max_words || c.max_words > c.hard_max_words {
            bail!(
                "chunking requires min_words <= max_words <= hard_max_words (got {} / {} / {})",
                c.min_words,
                c.max_words,
                c.hard_max_words
            );
        }

        let r = &self.retrieval;
        if r.candidate_pool_size < 1 {
            bail!("retrieval.candidate_pool_size must be >= 1");
        }
        if r.default_top_k < 1 {
            bail!("retrieval.default_top_k must be >= 1");
        }
        for (name, w) in [
            ("vector_weight", r.vector_weight),
            ("emotion_weight", r.emotion_weight),
            ("recency_weight", r.recency_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                bail!("retrieval.{} must be a finite number >= 0", name);
            }
        }

        let e = &self.embedding;
        match e.provider.as_str() {
            "hash" => {
                if e.dims == Some(0) {
                    bail!("embedding.dims must be > 0");
                }
            }
            "openai" => {
                if e.model.is_none() {
                    bail!("embedding.model must be specified when provider is 'openai'");
                }
                if e.dims.is_none() || e.dims == Some(0) {
                    bail!("embedding.dims must be > 0 when provider is 'openai'");
                }
            }
            "local" => {
                if !cfg!(feature = "local-embeddings-fastembed") {
                    bail!("embedding provider 'local' requires --features local-embeddings-fastembed");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, openai, or local.",
                other
            ),
        }
        if e.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }

        let l = &self.labeling;
        match l.provider.as_str() {
            "heuristic" | "gemini" => {}
            other => bail!(
                "Unknown labeling provider: '{}'. Must be heuristic or gemini.",
                other
            ),
        }
        if l.batch_size == 0 {
            bail!("labeling.batch_size must be >= 1");
        }

        let d = &self.drafting;
        match d.provider.as_str() {
            "heuristic" | "gemini" => {}
            other => bail!(
                "Unknown drafting provider: '{}'. Must be heuristic or gemini.",
                other
            ),
        }
        if d.max_items == 0 {
            bail!("drafting.max_items must be >= 1");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.is_relative() {
        if let Some(base) = path.parent() {
            config.db.path = base.join(&config.db.path);
        }
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"nmem.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.min_words, 80);
        assert_eq!(config.chunking.max_words, 300);
        assert_eq!(config.chunking.hard_max_words, 380);
        assert_eq!(config.retrieval.candidate_pool_size, 300);
        assert_eq!(config.retrieval.default_top_k, 5);
        let expected = if cfg!(feature = "local-embeddings-fastembed") {
            "local"
        } else {
            "hash"
        };
        assert_eq!(config.embedding.provider, expected);
        assert_eq!(config.labeling.provider, "heuristic");
        assert_eq!(config.labeling.batch_size, 12);
        assert!(config.labeling.fallback_heuristic);
        assert_eq!(config.ingest.include_globs.len(), 3);
        assert_eq!(config.drafting.provider, "heuristic");
        assert_eq!(config.drafting.max_items, 6);
    }

    #[test]
    fn test_minimal_config_is_offline() {
        let config = Config::minimal("nmem.sqlite");
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.labeling.provider, "heuristic");
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_inverted_chunk_bounds() {
        let err = parse("[db]\npath = \"x\"\n[chunking]\nmin_words = 400\n").unwrap_err();
        assert!(err.to_string().contains("min_words <= max_words"));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let err = parse("[db]\npath = \"x\"\n[retrieval]\nrecency_weight = -0.1\n").unwrap_err();
        assert!(err.to_string().contains("recency_weight"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
        let err = parse(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_rejects_unknown_providers() {
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"chroma\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[labeling]\nprovider = \"gpt\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[drafting]\nprovider = \"gpt\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[drafting]\nmax_items = 0\n").is_err());
    }

    #[test]
    fn test_load_config_resolves_relative_db_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nmem.toml");
        std::fs::write(&path, "[db]\npath = \"data/nmem.sqlite\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.db.path, tmp.path().join("data/nmem.sqlite"));
    }
}

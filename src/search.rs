//! The `nmem search` command: parse CLI filters, run hybrid retrieval,
//! print ranked chunks.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use narrative_memory_core::models::{parse_timestamp, Emotion, TimeScope, VoiceMode};
use narrative_memory_core::search::RankedChunk;
use narrative_memory_core::store::{ChunkFilters, TimeRange};

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Raw search options as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub since: Option<String>,
    pub until: Option<String>,
    pub source: Option<String>,
    pub emotion: Option<String>,
    pub time_scope: Option<String>,
    pub voice: Option<String>,
    pub min_intensity: Option<u8>,
    pub max_intensity: Option<u8>,
    pub min_authenticity: Option<u8>,
    pub min_specificity: Option<u8>,
    pub limit: Option<usize>,
    pub explain: bool,
    pub json: bool,
}

impl SearchOptions {
    pub fn time_range(&self) -> Result<TimeRange> {
        let start = self
            .since
            .as_deref()
            .map(|raw| parse_bound(raw, false))
            .transpose()
            .context("invalid --since")?;
        let end = self
            .until
            .as_deref()
            .map(|raw| parse_bound(raw, true))
            .transpose()
            .context("invalid --until")?;
        Ok(TimeRange::new(start, end))
    }

    pub fn filters(&self) -> Result<ChunkFilters> {
        Ok(ChunkFilters {
            source: self.source.clone(),
            emotion: parse_label(self.emotion.as_deref(), "emotion", Emotion::parse)?,
            time_scope: parse_label(self.time_scope.as_deref(), "time scope", TimeScope::parse)?,
            voice_mode: parse_label(self.voice.as_deref(), "voice", VoiceMode::parse)?,
            min_intensity: self.min_intensity,
            max_intensity: self.max_intensity,
            min_authenticity: self.min_authenticity,
            min_specificity: self.min_specificity,
        })
    }
}

/// Parse a `--since` / `--until` value. A bare date as an upper bound
/// covers the whole day.
pub fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(naive) = time {
            return Ok(naive.and_utc());
        }
    }
    match parse_timestamp(raw) {
        Some(ts) => Ok(ts),
        None => bail!("'{}' is not a date (YYYY-MM-DD) or RFC 3339 timestamp", raw),
    }
}

/// Parse an optional label, rejecting values outside the allowed set.
/// `unknown` itself is allowed and matches unlabeled chunks.
fn parse_label<T: PartialEq + Default>(
    raw: Option<&str>,
    what: &str,
    parse: fn(&str) -> T,
) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = parse(raw);
    if value == T::default() && !raw.trim().eq_ignore_ascii_case("unknown") {
        bail!("unknown {} '{}'", what, raw);
    }
    Ok(Some(value))
}

pub async fn run_search(config: &Config, query: &str, opts: &SearchOptions) -> Result<()> {
    let range = opts.time_range()?;
    let filters = opts.filters()?;

    let results = if query.trim().is_empty() {
        Vec::new()
    } else {
        let pipeline = Pipeline::open(config.clone()).await?;
        let results = pipeline.retrieve(query, range, filters, opts.limit).await?;
        pipeline.close().await;
        results
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let weights = config.retrieval.weights();
    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
        if opts.explain {
            let b = &result.breakdown;
            println!(
                "    score: {:.2}×sim {:.4} + {:.2}×emotion {:.0} + {:.2}×recency {:.4}",
                weights.vector,
                b.similarity,
                weights.emotion,
                b.emotion_bonus,
                weights.recency,
                b.recency
            );
        }
        println!("    id: {}", result.id);
        println!();
    }

    Ok(())
}

fn print_result(rank: usize, result: &RankedChunk) {
    let date = result
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    println!(
        "{}. [{:.4}] {} ({})",
        rank, result.score, result.source, date
    );
    println!(
        "    emotion: {}  time: {}  voice: {}  intensity: {}",
        result.emotion, result.time_scope, result.voice_mode, result.intensity
    );
    println!(
        "    quality: authenticity {}  specificity {}  cliche {}",
        result.authenticity, result.specificity, result.cliche
    );
    println!("    similarity: {:.4}", result.similarity);
    println!("    excerpt: \"{}\"", excerpt(&result.text, 40));
}

/// First `max_words` words on one line.
fn excerpt(text: &str, max_words: usize) -> String {
    let mut words = text.split_whitespace();
    let head: Vec<&str> = words.by_ref().take(max_words).collect();
    let mut out = head.join(" ");
    if words.next().is_some() {
        out.push_str(" …");
    }
    out
}

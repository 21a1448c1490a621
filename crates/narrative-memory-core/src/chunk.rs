//! Boundary-aware semantic chunker.
//!
//! Splits document text into [`ChunkRecord`]s that are topically
//! coherent and bounded in length. Word counts are measured in `\w+`
//! tokens.
//!
//! # Algorithm
//!
//! 1. **Segment** on blank lines. A line that starts with a turn marker
//!    (`user:`, `speaker 2:`, `verse -`, `chorus:` …) also opens a new
//!    segment. Lines inside a segment are joined with single spaces.
//! 2. **Split** any segment longer than `hard_max_words` at sentence
//!    boundaries (`.`, `!`, `?` followed by whitespace), packing sentences
//!    greedily up to `hard_max_words`. A single sentence that is itself
//!    over the hard maximum is cut at whitespace.
//! 3. **Pack** segments greedily: append while the total stays within
//!    `max_words`; if the open chunk is still under `min_words`, keep
//!    appending up to `hard_max_words`; otherwise close it.
//! 4. **Tail merge**: if the last chunk is under `min_words` and fits
//!    into the previous one within `hard_max_words`, merge the two. This
//!    looks at the last two chunks only, once.
//!
//! Output boundaries are deterministic for a given text and
//! [`ChunkingParams`]; only the generated ids differ between runs.
//!
//! # Example
//!
//! ```rust
//! use narrative_memory_core::chunk::{ChunkingParams, SemanticChunker};
//! use narrative_memory_core::models::RawDocument;
//!
//! let chunker = SemanticChunker::new(ChunkingParams::default());
//! let doc = RawDocument::new("notes.txt", "I remember the hallway clock freezing at 2:17.");
//! let chunks = chunker.chunk_document(&doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].word_count, 9);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::models::{Annotation, ChunkRecord, RawDocument};

static TURN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(user|assistant|speaker\s*\d*|verse|chorus|bridge|hook|freestyle)\s*[:\-]")
        .expect("valid regex")
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

/// Word-count boundaries for the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    /// Soft minimum: chunks under this keep absorbing segments.
    pub min_words: usize,
    /// Soft maximum: the normal packing limit.
    pub max_words: usize,
    /// Hard maximum: never exceeded.
    pub hard_max_words: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            min_words: 80,
            max_words: 300,
            hard_max_words: 380,
        }
    }
}

/// Count `\w+` word tokens in `text`.
pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Iterate over the `\w+` word tokens of `text`.
pub fn word_tokens(text: &str) -> impl Iterator<Item = &str> {
    WORD.find_iter(text).map(|m| m.as_str())
}

/// Whether `line` opens a dialogue or verse turn.
pub fn is_turn_marker(line: &str) -> bool {
    TURN_MARKER.is_match(line)
}

/// Split normalized text into paragraph / turn segments.
///
/// Segments without a word token (blank lines, `---` rules, stray
/// punctuation) are dropped. CRLF and lone CR are treated as newlines.
pub fn split_segments(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw_line in normalized.split('\n') {
        let line = raw_line.trim();
        if line.is_empty() {
            flush_segment(&mut current, &mut segments);
            continue;
        }
        if is_turn_marker(line) && !current.is_empty() {
            flush_segment(&mut current, &mut segments);
        }
        current.push(line);
    }
    flush_segment(&mut current, &mut segments);

    segments
}

fn flush_segment(current: &mut Vec<&str>, segments: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let joined = current.join(" ");
    let trimmed = joined.trim();
    if word_count(trimmed) > 0 {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

/// Split text after `.`, `!`, or `?` when followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // The terminator is a single ASCII byte.
        let piece = text[start..m.start() + 1].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Cut text at whitespace into pieces of at most `max_words` words.
fn split_at_words(text: &str, max_words: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut cur_words = 0;
    for token in text.split_whitespace() {
        let w = word_count(token);
        if !current.is_empty() && cur_words + w > max_words {
            out.push(current.join(" "));
            current.clear();
            cur_words = 0;
        }
        current.push(token);
        cur_words += w;
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

/// A chunk being accumulated during packing.
#[derive(Default)]
struct Pending {
    parts: Vec<String>,
    words: usize,
}

impl Pending {
    fn push(&mut self, text: String, words: usize) {
        self.parts.push(text);
        self.words += words;
    }

    fn take(&mut self) -> Option<(String, usize)> {
        if self.parts.is_empty() {
            return None;
        }
        let text = self.parts.join(" ").trim().to_string();
        let words = self.words;
        self.parts.clear();
        self.words = 0;
        Some((text, words))
    }
}

/// Creates bounded chunks around paragraph and turn boundaries.
#[derive(Debug, Clone, Default)]
pub struct SemanticChunker {
    params: ChunkingParams,
}

impl SemanticChunker {
    pub fn new(params: ChunkingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChunkingParams {
        &self.params
    }

    /// Chunk every document, preserving document order.
    pub fn chunk_documents(&self, docs: &[RawDocument]) -> Vec<ChunkRecord> {
        docs.iter().flat_map(|doc| self.chunk_document(doc)).collect()
    }

    /// Chunk one document. Text without a word token yields no chunks.
    ///
    /// Each chunk gets a fresh UUID and inherits the document's source and
    /// timestamp. Annotations start at their sentinel defaults.
    pub fn chunk_document(&self, doc: &RawDocument) -> Vec<ChunkRecord> {
        let chunks: Vec<ChunkRecord> = self
            .pack(&doc.text)
            .into_iter()
            .map(|(text, word_count)| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                source: doc.source.clone(),
                text,
                timestamp: doc.timestamp,
                word_count,
                annotation: Annotation::default(),
            })
            .collect();

        tracing::debug!(source = %doc.source, chunks = chunks.len(), "chunked document");
        chunks
    }

    /// Chunk boundaries only, as `(text, word_count)` pairs.
    pub fn chunk_text(&self, text: &str) -> Vec<(String, usize)> {
        self.pack(text)
    }

    fn split_long_segment(&self, segment: String) -> Vec<String> {
        let hard = self.params.hard_max_words;
        if word_count(&segment) <= hard {
            return vec![segment];
        }

        let mut out = Vec::new();
        let mut current = Pending::default();
        for sentence in split_sentences(&segment) {
            let pieces = if word_count(&sentence) > hard {
                split_at_words(&sentence, hard)
            } else {
                vec![sentence]
            };
            for piece in pieces {
                let w = word_count(&piece);
                if !current.parts.is_empty() && current.words + w > hard {
                    out.extend(current.take().map(|(text, _)| text));
                }
                current.push(piece, w);
            }
        }
        out.extend(current.take().map(|(text, _)| text));
        out
    }

    fn pack(&self, text: &str) -> Vec<(String, usize)> {
        let ChunkingParams {
            min_words,
            max_words,
            hard_max_words,
        } = self.params;

        let expanded: Vec<String> = split_segments(text)
            .into_iter()
            .flat_map(|seg| self.split_long_segment(seg))
            .collect();

        let mut out: Vec<(String, usize)> = Vec::new();
        let mut current = Pending::default();

        for seg in expanded {
            let seg_words = word_count(&seg);
            if current.parts.is_empty() {
                current.push(seg, seg_words);
                continue;
            }

            let proposed = current.words + seg_words;
            if proposed <= max_words {
                current.push(seg, seg_words);
                continue;
            }

            // Prefer slightly over the soft maximum to a too-short chunk.
            if current.words < min_words && proposed <= hard_max_words {
                current.push(seg, seg_words);
                continue;
            }

            out.extend(current.take());
            current.push(seg, seg_words);
        }
        out.extend(current.take());

        if out.len() >= 2 {
            let (_, last_words) = out[out.len() - 1];
            let (_, prev_words) = out[out.len() - 2];
            if last_words < min_words && prev_words + last_words <= hard_max_words {
                if let Some((last_text, last_words)) = out.pop() {
                    if let Some(prev) = out.last_mut() {
                        prev.0 = format!("{} {}", prev.0, last_text).trim().to_string();
                        prev.1 += last_words;
                    }
                }
            }
        }

        out
    }
}

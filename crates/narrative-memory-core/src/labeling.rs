//! Weak semantic labeling.
//!
//! A [`Labeler`] maps chunks to [`Annotation`]s. The offline
//! [`HeuristicLabeler`] applies deterministic keyword rules; remote
//! labelers (the Gemini client in the app crate) implement the same trait.
//! [`label_chunks`] drives a primary labeler batch by batch and falls back
//! to the heuristic rules where the primary fails or omits a chunk.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::models::{Annotation, ChunkRecord, Emotion, Rating, TimeScope, VoiceMode};

/// Produces annotations for a batch of chunks.
#[async_trait]
pub trait Labeler: Send + Sync {
    /// Short identifier used in logs (e.g. `"heuristic"`, `"gemini"`).
    fn name(&self) -> &str;

    /// Annotate a batch. The returned map is keyed by chunk id and may be
    /// partial; missing ids are handled by the caller.
    async fn annotate(&self, chunks: &[ChunkRecord]) -> Result<HashMap<String, Annotation>>;
}

const EMOTION_RULES: &[(Emotion, &[&str])] = &[
    (Emotion::Nostalgia, &["miss", "remember", "back then", "used to"]),
    (Emotion::Love, &["love", "kiss", "heart"]),
    (Emotion::Anger, &["angry", "rage", "mad", "furious"]),
    (Emotion::Sadness, &["sad", "cry", "alone", "hurt"]),
    (Emotion::Hope, &["hope", "dream", "soon", "someday"]),
    (Emotion::Calm, &["calm", "quiet", "peace"]),
];

const PAST_MARKERS: &[&str] = &[
    "yesterday", "back then", "used to", "was ", "were ", "remember", "remembered", "said ",
    "told ", "wrote ", "knew ", "forgot", "left ", "lost ", "once ", " ago", "when i was",
    "had been", "i'd ", "i had ",
];

const PRESENT_MARKERS: &[&str] = &[
    "now", "today", "right now", "am ", "currently", "at this moment", "i'm ", "i am ",
];

const FUTURE_MARKERS: &[&str] = &[
    "tomorrow", "will ", "someday", "next year", "going to", "want to", "plan to", "hope to",
    "i'll ",
];

const CLICHE_PHRASES: &[&str] = &[
    "broken heart",
    "set me free",
    "in the dark",
    "one more chance",
    "tears in the rain",
];

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,4}\b").expect("valid number regex"));
static MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\b",
    )
    .expect("valid month regex")
});
static PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(avenue|street|station|city|room|kitchen)\b").expect("valid place regex")
});
static FIRST_PERSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(i|me|my|mine)\b").expect("valid pronoun regex"));
static SINCERITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(feel|felt|truth|real)\b").expect("valid sincerity regex"));

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Deterministic keyword-rule labeler. Needs no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicLabeler;

impl HeuristicLabeler {
    pub fn new() -> Self {
        Self
    }

    /// Label one text. Matching is substring-based on the lowercased text,
    /// so "mad" also fires inside "made".
    pub fn label(&self, text: &str) -> Annotation {
        let text = text.to_lowercase();

        let emotion = EMOTION_RULES
            .iter()
            .find(|(_, keywords)| contains_any(&text, keywords))
            .map(|(emotion, _)| *emotion)
            .unwrap_or_default();

        let time_scope = if contains_any(&text, PAST_MARKERS) {
            TimeScope::Past
        } else if contains_any(&text, PRESENT_MARKERS) {
            TimeScope::Present
        } else if contains_any(&text, FUTURE_MARKERS) {
            TimeScope::Future
        } else {
            TimeScope::Unknown
        };

        let voice_mode = if contains_any(&text, &["i ", "my ", "me "]) {
            VoiceMode::Reflective
        } else {
            VoiceMode::Observational
        };

        let absolutes = usize::from(contains_any(&text, &["never", "always"]));
        let intensity = 1 + (text.matches('!').count() + absolutes).min(4);

        let specificity = 2
            + usize::from(NUMBER.is_match(&text))
            + usize::from(MONTH.is_match(&text))
            + usize::from(PLACE.is_match(&text));

        let authenticity = 3
            + usize::from(FIRST_PERSON.is_match(&text))
            + usize::from(SINCERITY.is_match(&text));

        let cliches = CLICHE_PHRASES.iter().filter(|p| text.contains(*p)).count();
        let cliche = 1 + cliches.min(4);

        Annotation {
            emotion,
            time_scope,
            intensity: Rating::new(intensity as i64),
            voice_mode,
            authenticity: Rating::new(authenticity as i64),
            specificity: Rating::new(specificity as i64),
            cliche: Rating::new(cliche as i64),
        }
    }
}

#[async_trait]
impl Labeler for HeuristicLabeler {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn annotate(&self, chunks: &[ChunkRecord]) -> Result<HashMap<String, Annotation>> {
        Ok(chunks
            .iter()
            .map(|c| (c.id.clone(), self.label(&c.text)))
            .collect())
    }
}

/// Apply the heuristic rules to every chunk.
pub fn label_heuristic(chunks: Vec<ChunkRecord>) -> Vec<ChunkRecord> {
    let labeler = HeuristicLabeler;
    chunks
        .into_iter()
        .map(|c| {
            let annotation = labeler.label(&c.text);
            c.with_annotation(annotation)
        })
        .collect()
}

/// Label `chunks` with `primary`, batch by batch.
///
/// A batch whose primary call fails (or with no primary at all) gets
/// heuristic labels when `fallback_heuristic` is set and keeps its
/// sentinel defaults otherwise. A chunk the primary omits is treated the
/// same way individually. Output order equals input order.
pub async fn label_chunks(
    primary: Option<&dyn Labeler>,
    fallback_heuristic: bool,
    batch_size: usize,
    chunks: Vec<ChunkRecord>,
) -> Vec<ChunkRecord> {
    let fallback = HeuristicLabeler;
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter().peekable();

    while iter.peek().is_some() {
        let batch: Vec<ChunkRecord> = iter.by_ref().take(batch_size).collect();

        let labels = match primary {
            Some(labeler) => match labeler.annotate(&batch).await {
                Ok(labels) => Some(labels),
                Err(e) => {
                    tracing::warn!(
                        labeler = labeler.name(),
                        batch = batch.len(),
                        error = %e,
                        "labeling batch failed"
                    );
                    None
                }
            },
            None => None,
        };

        for chunk in batch {
            let annotation = labels.as_ref().and_then(|l| l.get(&chunk.id)).copied();
            let chunk = match annotation {
                Some(a) => chunk.with_annotation(a),
                None if fallback_heuristic => {
                    let a = fallback.label(&chunk.text);
                    chunk.with_annotation(a)
                }
                None => chunk,
            };
            out.push(chunk);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    fn chunk(id: &str, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.into(),
            source: "notes.txt".into(),
            text: text.into(),
            timestamp: None,
            word_count: text.split_whitespace().count(),
            annotation: Annotation::default(),
        }
    }

    struct FailingLabeler;

    #[async_trait]
    impl Labeler for FailingLabeler {
        fn name(&self) -> &str {
            "failing"
        }

        async fn annotate(&self, _chunks: &[ChunkRecord]) -> Result<HashMap<String, Annotation>> {
            bail!("service unavailable")
        }
    }

    /// Labels only the first chunk of each batch as joy.
    struct PartialLabeler;

    #[async_trait]
    impl Labeler for PartialLabeler {
        fn name(&self) -> &str {
            "partial"
        }

        async fn annotate(&self, chunks: &[ChunkRecord]) -> Result<HashMap<String, Annotation>> {
            let mut map = HashMap::new();
            if let Some(first) = chunks.first() {
                map.insert(
                    first.id.clone(),
                    Annotation {
                        emotion: Emotion::Joy,
                        ..Annotation::default()
                    },
                );
            }
            Ok(map)
        }
    }

    #[test]
    fn test_heuristic_emotion_order() {
        let h = HeuristicLabeler::new();
        // nostalgia wins over love when both fire
        assert_eq!(h.label("I miss the love we had").emotion, Emotion::Nostalgia);
        assert_eq!(h.label("she kissed my heart").emotion, Emotion::Love);
        assert_eq!(h.label("a quiet evening").emotion, Emotion::Calm);
        assert_eq!(h.label("the bus arrives").emotion, Emotion::Unknown);
    }

    #[test]
    fn test_heuristic_time_scope() {
        let h = HeuristicLabeler::new();
        assert_eq!(h.label("Yesterday it rained").time_scope, TimeScope::Past);
        assert_eq!(h.label("Right now it rains").time_scope, TimeScope::Present);
        assert_eq!(h.label("Tomorrow it rains").time_scope, TimeScope::Future);
        assert_eq!(h.label("Rain falls").time_scope, TimeScope::Unknown);
    }

    #[test]
    fn test_heuristic_scores() {
        let h = HeuristicLabeler::new();
        let a = h.label("I never felt so real! In March, 1999, on Elm Street!");
        assert_eq!(a.voice_mode, VoiceMode::Reflective);
        // two '!' plus "never"
        assert_eq!(a.intensity.get(), 4);
        // number + month + place
        assert_eq!(a.specificity.get(), 5);
        // first person + sincerity word
        assert_eq!(a.authenticity.get(), 5);
        assert_eq!(a.cliche.get(), 1);

        let plain = h.label("Clouds drift over hills.");
        assert_eq!(plain.voice_mode, VoiceMode::Observational);
        assert_eq!(plain.intensity.get(), 1);
        assert_eq!(plain.specificity.get(), 2);
        assert_eq!(plain.authenticity.get(), 3);
    }

    #[test]
    fn test_heuristic_cliche_count() {
        let h = HeuristicLabeler::new();
        let a = h.label("a broken heart in the dark, tears in the rain");
        assert_eq!(a.cliche.get(), 4);
    }

    #[tokio::test]
    async fn test_label_chunks_primary_failure_falls_back() {
        let chunks = vec![chunk("a", "I remember the old house"), chunk("b", "quiet snow")];
        let labeled = label_chunks(Some(&FailingLabeler), true, 12, chunks).await;
        assert_eq!(labeled[0].annotation.emotion, Emotion::Nostalgia);
        assert_eq!(labeled[1].annotation.emotion, Emotion::Calm);
    }

    #[tokio::test]
    async fn test_label_chunks_failure_without_fallback_keeps_defaults() {
        let chunks = vec![chunk("a", "I remember the old house")];
        let labeled = label_chunks(Some(&FailingLabeler), false, 12, chunks).await;
        assert_eq!(labeled[0].annotation, Annotation::default());
    }

    #[tokio::test]
    async fn test_label_chunks_no_primary_uses_heuristic() {
        let chunks = vec![chunk("a", "someday we will rise")];
        let labeled = label_chunks(None, true, 12, chunks).await;
        assert_eq!(labeled[0].annotation.emotion, Emotion::Hope);
        assert_eq!(labeled[0].annotation.time_scope, TimeScope::Future);
    }

    #[tokio::test]
    async fn test_label_chunks_missing_ids_fall_back_per_chunk() {
        let chunks = vec![
            chunk("a", "quiet room"),
            chunk("b", "quiet room"),
            chunk("c", "quiet room"),
        ];
        // batches [a, b] and [c]; the primary labels a and c only
        let labeled = label_chunks(Some(&PartialLabeler), true, 2, chunks).await;
        assert_eq!(labeled[0].annotation.emotion, Emotion::Joy);
        assert_eq!(labeled[1].annotation.emotion, Emotion::Calm);
        assert_eq!(labeled[2].annotation.emotion, Emotion::Joy);
        let ids: Vec<&str> = labeled.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_label_heuristic_keeps_identity() {
        let labeled = label_heuristic(vec![chunk("x", "I was angry")]);
        assert_eq!(labeled[0].id, "x");
        assert_eq!(labeled[0].text, "I was angry");
        assert_eq!(labeled[0].annotation.emotion, Emotion::Anger);
    }
}

//! Core data models used throughout Narrative Memory.
//!
//! A [`RawDocument`] is the normalized text of one ingested source. The
//! chunker turns it into [`ChunkRecord`]s, which carry an [`Annotation`]
//! (categorical labels plus 1–5 ratings) that starts at sentinel values
//! and is later replaced wholesale by a labeler.
//!
//! Labels are closed vocabularies: any value outside the allowed set
//! parses to `Unknown`, never to an error.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Normalized document text before chunking.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Source identifier (a path, or `path#index` for JSON arrays).
    pub source: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $($variant,)+
            #[default]
            Unknown,
        }

        impl $name {
            /// Every allowed value, `Unknown` last.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+ $name::Unknown];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unknown => "unknown",
                }
            }

            /// Case-insensitive parse; anything outside the set is `Unknown`.
            pub fn parse(raw: &str) -> Self {
                match raw.trim().to_lowercase().as_str() {
                    $($label => $name::$variant,)+
                    _ => $name::Unknown,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok($name::parse(&raw))
            }
        }
    };
}

label_enum! {
    /// Dominant emotion of a chunk. This is the category label the ranker
    /// awards its match bonus on.
    Emotion {
        Joy => "joy",
        Sadness => "sadness",
        Anger => "anger",
        Fear => "fear",
        Nostalgia => "nostalgia",
        Hope => "hope",
        Love => "love",
        Regret => "regret",
        Conflict => "conflict",
        Calm => "calm",
    }
}

label_enum! {
    /// When the narrated events happen relative to the writer.
    TimeScope {
        Past => "past",
        Present => "present",
        Future => "future",
        Timeless => "timeless",
        Mixed => "mixed",
    }
}

label_enum! {
    /// Narrative voice or writing style.
    VoiceMode {
        Confessional => "confessional",
        Observational => "observational",
        Dialogue => "dialogue",
        Imagistic => "imagistic",
        Boastful => "boastful",
        Reflective => "reflective",
    }
}

/// An integer rating clamped to `1..=5`. Defaults to the neutral `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    pub const NEUTRAL: Rating = Rating(3);

    pub fn new(value: i64) -> Self {
        Rating(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Read a rating from loosely-typed JSON (integer, float, or numeric
    /// string). Anything else yields [`Rating::NEUTRAL`].
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        let parsed = match value {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.map(Rating::new).unwrap_or(Rating::NEUTRAL)
    }
}

impl Default for Rating {
    fn default() -> Self {
        Rating::NEUTRAL
    }
}

impl From<i64> for Rating {
    fn from(value: i64) -> Self {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self {
        r.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Weak semantic labels attached to a chunk.
///
/// Produced by a [`Labeler`](crate::labeling::Labeler) and merged into a
/// record with [`ChunkRecord::with_annotation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub emotion: Emotion,
    pub time_scope: TimeScope,
    pub intensity: Rating,
    pub voice_mode: VoiceMode,
    pub authenticity: Rating,
    pub specificity: Rating,
    pub cliche: Rating,
}

impl Annotation {
    /// Normalize a labeler's JSON payload through the allowed value sets.
    ///
    /// Recognized keys: `emotion`, `time_scope`, `voice_mode`, `intensity`,
    /// `authenticity_score`, `specificity_score`, `cliche_score`.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let label = |key: &str| -> String {
            match payload.get(key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => String::new(),
            }
        };
        Annotation {
            emotion: Emotion::parse(&label("emotion")),
            time_scope: TimeScope::parse(&label("time_scope")),
            voice_mode: VoiceMode::parse(&label("voice_mode")),
            intensity: Rating::from_json(payload.get("intensity")),
            authenticity: Rating::from_json(payload.get("authenticity_score")),
            specificity: Rating::from_json(payload.get("specificity_score")),
            cliche: Rating::from_json(payload.get("cliche_score")),
        }
    }
}

/// The unit of storage and retrieval.
///
/// Identity, provenance, and text are fixed when the chunker creates the
/// record; only the [`Annotation`] is replaced afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub source: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub word_count: usize,
    #[serde(flatten)]
    pub annotation: Annotation,
}

impl ChunkRecord {
    /// Consume the record and return it with `annotation` merged in.
    pub fn with_annotation(self, annotation: Annotation) -> Self {
        Self { annotation, ..self }
    }

    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    pub fn timestamp_iso(&self) -> Option<String> {
        self.timestamp.as_ref().map(format_timestamp)
    }
}

/// Format a timestamp as fixed-width UTC RFC 3339 (`2024-05-01T09:30:00Z`).
///
/// Every stored timestamp uses this format so that lexicographic order
/// equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Leniently parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with offset, naive date-times (assumed UTC), and
/// bare `YYYY-MM-DD` dates (midnight UTC). Returns `None` for anything
/// unparsable; callers treat that as "no timestamp".
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_case_insensitive() {
        assert_eq!(Emotion::parse("Nostalgia"), Emotion::Nostalgia);
        assert_eq!(TimeScope::parse(" PAST "), TimeScope::Past);
        assert_eq!(VoiceMode::parse("dialogue"), VoiceMode::Dialogue);
    }

    #[test]
    fn test_label_out_of_set_collapses_to_unknown() {
        assert_eq!(Emotion::parse("melancholy"), Emotion::Unknown);
        assert_eq!(TimeScope::parse(""), TimeScope::Unknown);
        assert_eq!(VoiceMode::parse("42"), VoiceMode::Unknown);
    }

    #[test]
    fn test_label_serde_uses_lowercase_strings() {
        let json = serde_json::to_string(&Emotion::Hope).unwrap();
        assert_eq!(json, "\"hope\"");
        let back: Emotion = serde_json::from_str("\"furious\"").unwrap();
        assert_eq!(back, Emotion::Unknown);
    }

    #[test]
    fn test_rating_clamps() {
        assert_eq!(Rating::new(0).get(), 1);
        assert_eq!(Rating::new(9).get(), 5);
        assert_eq!(Rating::new(4).get(), 4);
        assert_eq!(Rating::default().get(), 3);
    }

    #[test]
    fn test_rating_from_json() {
        assert_eq!(Rating::from_json(Some(&serde_json::json!(4))).get(), 4);
        assert_eq!(Rating::from_json(Some(&serde_json::json!("2"))).get(), 2);
        assert_eq!(Rating::from_json(Some(&serde_json::json!(7.9))).get(), 5);
        assert_eq!(Rating::from_json(Some(&serde_json::json!("high"))).get(), 3);
        assert_eq!(Rating::from_json(None).get(), 3);
    }

    #[test]
    fn test_annotation_from_payload() {
        let payload = serde_json::json!({
            "emotion": "REGRET",
            "time_scope": "someday",
            "voice_mode": "confessional",
            "intensity": 5,
            "authenticity_score": "4",
            "specificity_score": null,
        });
        let a = Annotation::from_payload(&payload);
        assert_eq!(a.emotion, Emotion::Regret);
        assert_eq!(a.time_scope, TimeScope::Unknown);
        assert_eq!(a.voice_mode, VoiceMode::Confessional);
        assert_eq!(a.intensity.get(), 5);
        assert_eq!(a.authenticity.get(), 4);
        assert_eq!(a.specificity, Rating::NEUTRAL);
        assert_eq!(a.cliche, Rating::NEUTRAL);
    }

    #[test]
    fn test_with_annotation_keeps_identity() {
        let record = ChunkRecord {
            id: "c1".into(),
            source: "notes.txt".into(),
            text: "quiet kitchen".into(),
            timestamp: None,
            word_count: 2,
            annotation: Annotation::default(),
        };
        let annotation = Annotation {
            emotion: Emotion::Calm,
            ..Annotation::default()
        };
        let labeled = record.clone().with_annotation(annotation);
        assert_eq!(labeled.id, record.id);
        assert_eq!(labeled.text, record.text);
        assert_eq!(labeled.annotation.emotion, Emotion::Calm);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2024-03-05T10:00:00+02:00").unwrap();
        assert_eq!(format_timestamp(&a), "2024-03-05T08:00:00Z");
        let b = parse_timestamp("2024-03-05 10:00:00").unwrap();
        assert_eq!(format_timestamp(&b), "2024-03-05T10:00:00Z");
        let c = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(format_timestamp(&c), "2024-03-05T00:00:00Z");
    }

    #[test]
    fn test_parse_timestamp_malformed_is_none() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("last tuesday").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
    }
}

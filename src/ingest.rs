//! File ingestion: turn local text and JSON sources into [`RawDocument`]s.
//!
//! Directories are walked recursively and filtered with the configured
//! include/exclude globs (matched against paths relative to the directory).
//! Files named explicitly are matched by file name against the include
//! globs only. `.json` files are parsed as conversation-style exports;
//! everything else is read as plain text.
//!
//! All text goes through [`normalize_text`] before it reaches the chunker.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use walkdir::WalkDir;

use narrative_memory_core::models::{parse_timestamp, RawDocument};

use crate::config::IngestConfig;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static FILENAME_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20\d{2}[-_]\d{2}[-_]\d{2})").expect("valid regex"));

/// Keys whose values are read before any other key of a JSON object.
const PREFERRED_KEYS: &[&str] = &["parts", "text", "content", "message"];

/// Keys checked, in order, for a JSON document's timestamp.
const TIMESTAMP_KEYS: &[&str] = &["create_time", "timestamp", "update_time"];

/// Load every document under `paths`.
///
/// Fails if a path does not exist or a glob is invalid. Files that
/// cannot be read are skipped with a warning.
pub fn ingest_paths(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<RawDocument>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    for root in paths {
        if root.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if include_set.is_match(&name) {
                documents.extend(load_file(root));
            } else {
                tracing::warn!(
                    path = %root.display(),
                    "skipping file not matched by include_globs"
                );
            }
            continue;
        }
        if !root.is_dir() {
            bail!("Input path does not exist: {}", root.display());
        }

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }

            documents.extend(load_file(path));
        }
    }

    tracing::info!(documents = documents.len(), "ingested documents");
    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn load_file(path: &Path) -> Vec<RawDocument> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return Vec::new();
        }
    };
    let raw = String::from_utf8_lossy(&bytes);
    let source = path.display().to_string();

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        load_json(&source, &raw)
    } else {
        vec![RawDocument::new(source, normalize_text(&raw)).with_timestamp(filename_timestamp(path))]
    }
}

fn load_json(source: &str, raw: &str) -> Vec<RawDocument> {
    let data: serde_json::Value = match serde_json::from_str(raw) {
        Ok(data) => data,
        Err(_) => return vec![RawDocument::new(source, normalize_text(raw))],
    };

    match &data {
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| json_document(format!("{}#{}", source, idx), item))
            .collect(),
        serde_json::Value::Object(_) => json_document(source.to_string(), &data)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

fn json_document(source: String, node: &serde_json::Value) -> Option<RawDocument> {
    let mut strings = Vec::new();
    collect_strings(node, &mut strings);

    let mut seen = std::collections::HashSet::new();
    strings.retain(|s| seen.insert(s.clone()));

    let text = normalize_text(&strings.join("\n\n"));
    if text.is_empty() {
        return None;
    }
    Some(RawDocument::new(source, text).with_timestamp(json_timestamp(node)))
}

/// Depth-first string leaves, preferred keys of each object first.
fn collect_strings(node: &serde_json::Value, out: &mut Vec<String>) {
    match node {
        serde_json::Value::String(s) => {
            let cleaned = s.trim();
            if !cleaned.is_empty() {
                out.push(cleaned.to_string());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for key in PREFERRED_KEYS {
                if let Some(value) = map.get(*key) {
                    collect_strings(value, out);
                }
            }
            for value in map.values() {
                collect_strings(value, out);
            }
        }
        _ => {}
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Timestamp of a JSON object from the first non-empty timestamp key.
/// Numbers are Unix seconds; strings are ISO-8601.
fn json_timestamp(node: &serde_json::Value) -> Option<DateTime<Utc>> {
    let value = TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| node.get(*key))
        .find(|v| is_truthy(v))?;

    match value {
        serde_json::Value::Number(n) => {
            let secs = n.as_f64().filter(|f| f.is_finite())?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
        }
        serde_json::Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Date embedded in a file name, e.g. `journal_2024_03_09.txt`.
pub fn filename_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_string_lossy();
    let found = FILENAME_DATE.captures(&name)?.get(1)?;
    parse_timestamp(&found.as_str().replace('_', "-"))
}

/// Normalize line endings, collapse runs of blank lines, and trim.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    EXCESS_NEWLINES
        .replace_all(&unified, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a\r\nb\rc\n\n\n\n\nd  \n"), "a\nb\nc\n\nd");
        assert_eq!(normalize_text("\n\n\n"), "");
    }

    #[test]
    fn test_filename_timestamp() {
        let ts = filename_timestamp(Path::new("notes/journal_2024_03_09.txt")).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap());
        assert!(filename_timestamp(Path::new("1999-01-01.txt")).is_none());
        assert!(filename_timestamp(Path::new("2024-13-40.txt")).is_none());
        assert!(filename_timestamp(Path::new("plain.md")).is_none());
    }

    #[test]
    fn test_json_array_documents() {
        let raw = r#"[
            {"title": "Kitchen", "message": {"parts": ["The kettle sang.", "The kettle sang."]},
             "create_time": 1700000000},
            {"meta": 42},
            {"text": "Second entry", "timestamp": "2024-05-01T10:00:00Z"}
        ]"#;
        let docs = load_json("export.json", raw);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "export.json#0");
        assert_eq!(docs[0].text, "The kettle sang.\n\nKitchen");
        assert_eq!(docs[0].timestamp, DateTime::from_timestamp(1_700_000_000, 0));
        assert_eq!(docs[1].source, "export.json#2");
        assert_eq!(
            docs[1].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_json_timestamp_skips_empty_keys() {
        let node = serde_json::json!({"create_time": null, "timestamp": "", "update_time": 60});
        assert_eq!(json_timestamp(&node), DateTime::from_timestamp(60, 0));
    }

    #[test]
    fn test_invalid_json_kept_as_text() {
        let docs = load_json("broken.json", "{not json\r\n\r\n\r\n\r\nat all");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "{not json\n\nat all");
        assert!(docs[0].timestamp.is_none());
    }

    #[test]
    fn test_ingest_directory_with_globs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("2024/day_2024-01-15.md"), "Morning walk.").unwrap();
        fs::write(root.join("notes.txt"), "Plain note.").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("drafts/skip.txt"), "Draft.").unwrap();

        let config = IngestConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..IngestConfig::default()
        };
        let docs = ingest_paths(&[root.to_path_buf()], &config).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].source.ends_with("day_2024-01-15.md"));
        assert_eq!(
            docs[0].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
        assert!(docs[1].source.ends_with("notes.txt"));
    }

    #[test]
    fn test_ingest_explicit_file_and_missing_path() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("letter.txt");
        fs::write(&file, "Dear you").unwrap();
        let docs = ingest_paths(&[file], &IngestConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Dear you");

        let missing = tmp.path().join("nope");
        assert!(ingest_paths(&[missing], &IngestConfig::default()).is_err());
    }

    #[test]
    fn test_explicit_file_with_unsupported_extension_skipped() {
        let tmp = TempDir::new().unwrap();
        let rtf = tmp.path().join("letter.rtf");
        let png = tmp.path().join("photo.png");
        let md = tmp.path().join("entry.md");
        fs::write(&rtf, "Dear you").unwrap();
        fs::write(&png, [0u8, 1, 2]).unwrap();
        fs::write(&md, "Kept entry.").unwrap();

        let docs = ingest_paths(&[rtf, png, md], &IngestConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].source.ends_with("entry.md"));

        let config = IngestConfig {
            include_globs: vec!["**/*.rtf".to_string()],
            ..IngestConfig::default()
        };
        let docs = ingest_paths(&[tmp.path().join("letter.rtf")], &config).unwrap();
        assert_eq!(docs.len(), 1);
    }
}

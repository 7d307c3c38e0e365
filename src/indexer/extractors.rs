//! Per-module extraction policies.
//!
//! Each memory module has its own parsing policy turning on-disk source
//! files into indexable items:
//!
//! | Policy | Modules | Unit of extraction |
//! |--------|---------|--------------------|
//! | [`NoteExtractor`] | notes | one record per file, emotion marker parsed |
//! | [`TranscriptExtractor`] | transcripts | one record per query/response exchange |
//! | [`SectionExtractor`] | identity, active_focus, episodic, semantic, documents | one record per `##` header block |
//! | [`BulletExtractor`] | people, links | one record per top-level bullet |
//!
//! Every extracted item carries a stable `seed` (relative path, path plus
//! header, or content hash) from which the deterministic record identifier
//! is derived. Extraction is read-only and tolerant: unreadable files are
//! logged and skipped, a missing module directory yields zero items.

use crate::models::RecordFields;
use crate::{Result, current_timestamp};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Emotion/intensity marker embedded in note files, e.g.
/// `[emotion: joy intensity: 0.8]`.
#[allow(clippy::unwrap_used)] // pattern is a compile-time constant
static EMOTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[emotion:\s*(?P<name>[a-zA-Z_]+)\s+intensity:\s*(?P<intensity>[0-9.]+)\]")
        .unwrap()
});

/// Role markers splitting transcripts into exchanges.
#[allow(clippy::unwrap_used)] // pattern is a compile-time constant
static ROLE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?P<role>User|Assistant):\s*").unwrap());

/// One indexable item discovered in a module's sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedItem {
    /// Stable identity of the item within its module (relative path,
    /// `path#header`, or content hash). Feeds the deterministic record id.
    pub seed: String,
    /// The item's content.
    pub content: String,
    /// Scalar metadata parsed from the source.
    pub fields: RecordFields,
}

/// A module-specific extraction policy.
pub trait ModuleExtractor: Send + Sync {
    /// Walks the module's source directory and returns all indexable items.
    ///
    /// A missing directory yields an empty list. Unreadable files are
    /// logged and skipped; they never abort the walk.
    ///
    /// # Errors
    ///
    /// Returns an error only on non-recoverable failures.
    fn extract(&self, module_dir: &Path) -> Result<Vec<ExtractedItem>>;
}

/// Notes policy: one record per markdown file.
pub struct NoteExtractor;

impl ModuleExtractor for NoteExtractor {
    fn extract(&self, module_dir: &Path) -> Result<Vec<ExtractedItem>> {
        let mut items = Vec::new();

        for (relative, content, modified) in read_markdown_files(module_dir) {
            let (body, front) = split_front_matter(&content);
            let mut fields = fields_from_front_matter(front.as_ref(), modified)
                .with_source_path(relative.clone());

            // An inline emotion marker overrides front-matter intensity.
            let body = if let Some(caps) = EMOTION_MARKER.captures(&body) {
                if let Some(intensity) = caps
                    .name("intensity")
                    .and_then(|m| m.as_str().parse::<f32>().ok())
                {
                    fields.emotion_intensity = intensity.clamp(0.0, 1.0);
                }
                if let Some(name) = caps.name("name") {
                    fields.tags.push(format!("emotion:{}", name.as_str()));
                }
                EMOTION_MARKER.replace_all(&body, "").trim().to_string()
            } else {
                body.trim().to_string()
            };

            if body.is_empty() {
                continue;
            }

            items.push(ExtractedItem {
                seed: relative,
                content: body,
                fields,
            });
        }

        Ok(items)
    }
}

/// Transcripts policy: one record per query/response exchange.
pub struct TranscriptExtractor;

impl ModuleExtractor for TranscriptExtractor {
    fn extract(&self, module_dir: &Path) -> Result<Vec<ExtractedItem>> {
        let mut items = Vec::new();

        for (relative, content, modified) in read_markdown_files(module_dir) {
            for exchange in split_exchanges(&content) {
                let seed = content_hash(&exchange);
                items.push(ExtractedItem {
                    seed,
                    content: exchange,
                    fields: RecordFields::at(modified).with_source_path(relative.clone()),
                });
            }
        }

        Ok(items)
    }
}

/// Header-delimited policy: one record per `##` block.
///
/// Files without headers yield a single whole-file record.
pub struct SectionExtractor;

impl ModuleExtractor for SectionExtractor {
    fn extract(&self, module_dir: &Path) -> Result<Vec<ExtractedItem>> {
        let mut items = Vec::new();

        for (relative, content, modified) in read_markdown_files(module_dir) {
            let (body, front) = split_front_matter(&content);
            let fields = fields_from_front_matter(front.as_ref(), modified)
                .with_source_path(relative.clone());

            let sections = split_sections(&body);
            if sections.is_empty() {
                let trimmed = body.trim();
                if !trimmed.is_empty() {
                    items.push(ExtractedItem {
                        seed: relative.clone(),
                        content: trimmed.to_string(),
                        fields: fields.clone(),
                    });
                }
                continue;
            }

            for (header, section) in sections {
                items.push(ExtractedItem {
                    seed: format!("{relative}#{header}"),
                    content: section,
                    fields: fields.clone(),
                });
            }
        }

        Ok(items)
    }
}

/// Bullet-list policy: one record per top-level `- ` bullet.
pub struct BulletExtractor;

impl ModuleExtractor for BulletExtractor {
    fn extract(&self, module_dir: &Path) -> Result<Vec<ExtractedItem>> {
        let mut items = Vec::new();

        for (relative, content, modified) in read_markdown_files(module_dir) {
            for line in content.lines() {
                let Some(bullet) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))
                else {
                    continue;
                };
                let bullet = bullet.trim();
                if bullet.is_empty() {
                    continue;
                }
                items.push(ExtractedItem {
                    seed: format!("{relative}#{}", content_hash(bullet)),
                    content: bullet.to_string(),
                    fields: RecordFields::at(modified).with_source_path(relative.clone()),
                });
            }
        }

        Ok(items)
    }
}

/// Hex sha256 of content, used as a stable seed for unnamed items.
fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Splits transcript text into exchanges at `User:` boundaries.
///
/// Each exchange spans one `User:` turn and everything up to (but not
/// including) the next one, so a query and its response index together.
fn split_exchanges(content: &str) -> Vec<String> {
    let starts: Vec<usize> = ROLE_MARKER
        .captures_iter(content)
        .filter(|c| c.name("role").is_some_and(|r| r.as_str() == "User"))
        .filter_map(|c| c.get(0).map(|m| m.start()))
        .collect();

    if starts.is_empty() {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    let mut exchanges = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(content.len());
        let exchange = content[start..end].trim();
        if !exchange.is_empty() {
            exchanges.push(exchange.to_string());
        }
    }
    exchanges
}

/// Splits markdown into `(header, block)` pairs at `##` boundaries.
fn split_sections(content: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in content.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            if let Some((name, lines)) = current.take() {
                push_section(&mut sections, name, &lines);
            }
            current = Some((header.trim().to_string(), vec![line]));
        } else if let Some((_, ref mut lines)) = current {
            lines.push(line);
        }
    }

    if let Some((name, lines)) = current {
        push_section(&mut sections, name, &lines);
    }
    sections
}

fn push_section(sections: &mut Vec<(String, String)>, name: String, lines: &[&str]) {
    let block = lines.join("\n").trim().to_string();
    if !block.is_empty() {
        sections.push((name, block));
    }
}

/// Splits optional YAML front matter off a document.
///
/// Returns the body and the parsed metadata, if any. Malformed front
/// matter is treated as body text.
fn split_front_matter(content: &str) -> (String, Option<serde_json::Value>) {
    let trimmed = content.trim_start();
    let Some(rest) = trimmed.strip_prefix("---") else {
        return (content.to_string(), None);
    };
    let rest = rest.trim_start_matches(['\r', '\n']);

    let Some(end) = rest.find("\n---") else {
        return (content.to_string(), None);
    };

    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);

    serde_yaml_ng::from_str::<serde_json::Value>(yaml).map_or_else(
        |_| (content.to_string(), None),
        |meta| (body.to_string(), Some(meta)),
    )
}

/// Builds record fields from front-matter metadata and file mtime.
fn fields_from_front_matter(meta: Option<&serde_json::Value>, modified: u64) -> RecordFields {
    let mut fields = RecordFields::at(modified);

    let Some(meta) = meta else {
        return fields;
    };

    if let Some(importance) = meta.get("importance").and_then(serde_json::Value::as_f64) {
        #[allow(clippy::cast_possible_truncation)]
        {
            fields.importance = (importance as f32).clamp(0.0, 1.0);
        }
    }
    if let Some(intensity) = meta
        .get("emotion_intensity")
        .and_then(serde_json::Value::as_f64)
    {
        #[allow(clippy::cast_possible_truncation)]
        {
            fields.emotion_intensity = (intensity as f32).clamp(0.0, 1.0);
        }
    }
    if let Some(location) = meta.get("location").and_then(serde_json::Value::as_str) {
        fields.location = Some(location.to_string());
    }
    if let Some(tags) = meta.get("tags").and_then(serde_json::Value::as_array) {
        fields.tags.extend(
            tags.iter()
                .filter_map(serde_json::Value::as_str)
                .map(String::from),
        );
    }

    fields
}

/// Recursively collects markdown files under a directory.
///
/// Returns `(relative path, content, modified timestamp)` triples sorted by
/// path for deterministic iteration. A missing directory yields nothing.
fn read_markdown_files(root: &Path) -> Vec<(String, String, u64)> {
    let mut paths = Vec::new();
    collect_markdown_paths(root, &mut paths);
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable source file");
                continue;
            }
        };
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();
        files.push((relative, content, modified_secs(&path)));
    }
    files
}

fn collect_markdown_paths(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_markdown_paths(&path, out);
        } else if path.extension().is_some_and(|e| e == "md") {
            out.push(path);
        }
    }
}

fn modified_secs(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or_else(current_timestamp, |d| d.as_secs())
}

// Allow non-const functions that use f32::clamp (not const-stable yet)
#![allow(clippy::missing_const_for_fn)]

//! Indexed record types and memory module taxonomy.
//!
//! One [`IndexedRecord`] is one unit of retrievable content: a note, a
//! document excerpt, a conversation exchange, or a core-identity component.
//! Records are re-creatable (re-indexing the same source reproduces the
//! same identifier) but never updated in place; a changed source produces
//! a new identifier.
//!
//! # Memory Modules
//!
//! | Module | Content | Priority |
//! |--------|---------|----------|
//! | `Identity` | Core-identity components | 0 (highest) |
//! | `ActiveFocus` | Working-memory items | 1 |
//! | `Notes` | Free-form notes with emotion markers | 2 |
//! | `Episodic` | Dated event records | 3 |
//! | `Semantic` | Distilled knowledge | 4 |
//! | `Documents` | Reference documents | 5 |
//! | `People` | Person profiles | 6 |
//! | `Transcripts` | Conversation transcripts | 7 |
//! | `Links` | Associative link lists | 8 (lowest) |
//!
//! The priority order governs global budget trimming in the context
//! assembler and is fixed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Unique identifier for an indexed record.
///
/// Deterministic from `(module, source path or content hash)` so that
/// re-indexing is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID from a raw string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the deterministic identifier for an item of a module.
    ///
    /// The seed is the item's stable identity within its module: a relative
    /// file path, a `path#header` pair, or the item's content. Identical
    /// `(module, seed)` pairs always produce identical identifiers.
    #[must_use]
    pub fn deterministic(module: MemoryModule, seed: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(module.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(seed.as_bytes());
        let digest = hasher.finalize();
        Self(format!("{}_{}", module.as_str(), &hex::encode(digest)[..16]))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One named category of memory source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryModule {
    /// Core-identity components. Highest retrieval priority; importance is
    /// forced to 0.9 during scoring.
    Identity,
    /// Working-memory items. Temporal score is forced to 1.0 (always "now").
    ActiveFocus,
    /// Free-form notes, optionally carrying an emotion/intensity marker.
    Notes,
    /// Dated event records, one per header block.
    Episodic,
    /// Distilled knowledge, one per header block.
    Semantic,
    /// Reference documents, one per header block.
    Documents,
    /// Person profiles, one per bullet.
    People,
    /// Conversation transcripts, split into query/response exchanges.
    Transcripts,
    /// Associative link lists, one per bullet.
    Links,
}

impl MemoryModule {
    /// Returns all modules in fixed priority order (highest first).
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Identity,
            Self::ActiveFocus,
            Self::Notes,
            Self::Episodic,
            Self::Semantic,
            Self::Documents,
            Self::People,
            Self::Transcripts,
            Self::Links,
        ]
    }

    /// Returns the module name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::ActiveFocus => "active_focus",
            Self::Notes => "notes",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Documents => "documents",
            Self::People => "people",
            Self::Transcripts => "transcripts",
            Self::Links => "links",
        }
    }

    /// Parses a module from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "identity" | "core" => Some(Self::Identity),
            "active_focus" | "active" | "working" => Some(Self::ActiveFocus),
            "notes" | "note" => Some(Self::Notes),
            "episodic" => Some(Self::Episodic),
            "semantic" => Some(Self::Semantic),
            "documents" | "docs" => Some(Self::Documents),
            "people" | "person" => Some(Self::People),
            "transcripts" | "transcript" | "conversations" => Some(Self::Transcripts),
            "links" | "associations" => Some(Self::Links),
            _ => None,
        }
    }

    /// Fixed trim priority: lower values are trimmed last when the global
    /// token budget is exhausted.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Identity => 0,
            Self::ActiveFocus => 1,
            Self::Notes => 2,
            Self::Episodic => 3,
            Self::Semantic => 4,
            Self::Documents => 5,
            Self::People => 6,
            Self::Transcripts => 7,
            Self::Links => 8,
        }
    }

    /// Default vector-index collection name for this module.
    #[must_use]
    pub fn default_collection(&self) -> String {
        format!("memory_{}", self.as_str())
    }

    /// Human-readable heading used when rendering context blocks.
    #[must_use]
    pub const fn display_heading(&self) -> &'static str {
        match self {
            Self::Identity => "Core Identity",
            Self::ActiveFocus => "Active Focus",
            Self::Notes => "Notes",
            Self::Episodic => "Episodic Memory",
            Self::Semantic => "Semantic Memory",
            Self::Documents => "Documents",
            Self::People => "People",
            Self::Transcripts => "Conversations",
            Self::Links => "Associations",
        }
    }
}

impl fmt::Display for MemoryModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown memory module: {s}"))
    }
}

/// Classification of content entering through the orchestrator.
///
/// Only `ConsolidatedFact` passes the quality gate guarding the
/// relationship graph; raw notes and transcripts never pollute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A vetted, deduplicated fact eligible for graph insertion.
    ConsolidatedFact,
    /// A raw, unreviewed note.
    #[default]
    Note,
    /// One turn of a conversation.
    ConversationTurn,
    /// A document or document excerpt.
    Document,
    /// An unclassified observation.
    Observation,
}

impl ItemType {
    /// Returns the item type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConsolidatedFact => "consolidated_fact",
            Self::Note => "note",
            Self::ConversationTurn => "conversation_turn",
            Self::Document => "document",
            Self::Observation => "observation",
        }
    }

    /// Parses an item type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "consolidated_fact" | "consolidated" => Some(Self::ConsolidatedFact),
            "note" => Some(Self::Note),
            "conversation_turn" | "turn" => Some(Self::ConversationTurn),
            "document" => Some(Self::Document),
            "observation" => Some(Self::Observation),
            _ => None,
        }
    }

    /// Whether this item type passes the graph quality gate.
    #[must_use]
    pub const fn is_consolidated(&self) -> bool {
        matches!(self, Self::ConsolidatedFact)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scalar metadata attached to an indexed record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordFields {
    /// Importance of the record (0.0 to 1.0).
    pub importance: f32,
    /// Recorded emotional intensity (0.0 to 1.0).
    pub emotion_intensity: f32,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Optional location tag.
    pub location: Option<String>,
    /// Categorization tags.
    pub tags: Vec<String>,
    /// Source file path relative to the memory root, when file-derived.
    pub source_path: Option<String>,
}

impl RecordFields {
    /// Creates fields with the given creation timestamp and neutral scores.
    #[must_use]
    pub fn at(created_at: u64) -> Self {
        Self {
            importance: 0.5,
            emotion_intensity: 0.0,
            created_at,
            location: None,
            tags: Vec::new(),
            source_path: None,
        }
    }

    /// Sets the importance score.
    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Sets the emotional intensity.
    #[must_use]
    pub fn with_emotion_intensity(mut self, intensity: f32) -> Self {
        self.emotion_intensity = intensity.clamp(0.0, 1.0);
        self
    }

    /// Sets the location tag.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the source path.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// One unit of retrievable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// Stable, deterministic identifier.
    pub id: RecordId,
    /// Source module.
    pub module: MemoryModule,
    /// Raw content.
    pub content: String,
    /// Scalar metadata.
    pub fields: RecordFields,
}

impl IndexedRecord {
    /// Creates a new indexed record.
    #[must_use]
    pub fn new(
        id: RecordId,
        module: MemoryModule,
        content: impl Into<String>,
        fields: RecordFields,
    ) -> Self {
        Self {
            id,
            module,
            content: content.into(),
            fields,
        }
    }

    /// Approximate token count of the content (length / 4).
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.content.len() / 4
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_deterministic() {
        let a = RecordId::deterministic(MemoryModule::Notes, "daily/2024-01-01.md");
        let b = RecordId::deterministic(MemoryModule::Notes, "daily/2024-01-01.md");
        let c = RecordId::deterministic(MemoryModule::Notes, "daily/2024-01-02.md");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("notes_"));
    }

    #[test]
    fn test_record_id_module_scoped() {
        // Same seed under different modules must not collide.
        let a = RecordId::deterministic(MemoryModule::Notes, "x.md");
        let b = RecordId::deterministic(MemoryModule::Semantic, "x.md");
        assert_ne!(a, b);
    }

    #[test]
    fn test_module_parse() {
        assert_eq!(MemoryModule::parse("identity"), Some(MemoryModule::Identity));
        assert_eq!(MemoryModule::parse("core"), Some(MemoryModule::Identity));
        assert_eq!(
            MemoryModule::parse("active-focus"),
            Some(MemoryModule::ActiveFocus)
        );
        assert_eq!(MemoryModule::parse("TRANSCRIPT"), Some(MemoryModule::Transcripts));
        assert_eq!(MemoryModule::parse("unknown"), None);
    }

    #[test]
    fn test_module_priority_order() {
        let mut last = None;
        for module in MemoryModule::all() {
            if let Some(prev) = last {
                assert!(module.priority() > prev, "all() must be priority-ordered");
            }
            last = Some(module.priority());
        }
    }

    #[test]
    fn test_item_type_gate() {
        assert!(ItemType::ConsolidatedFact.is_consolidated());
        assert!(!ItemType::Note.is_consolidated());
        assert!(!ItemType::ConversationTurn.is_consolidated());
        assert_eq!(
            ItemType::parse("consolidated_fact"),
            Some(ItemType::ConsolidatedFact)
        );
        assert_eq!(ItemType::default(), ItemType::Note);
    }

    #[test]
    fn test_record_fields_clamping() {
        let fields = RecordFields::at(0)
            .with_importance(2.0)
            .with_emotion_intensity(-1.0);
        assert_eq!(fields.importance, 1.0);
        assert_eq!(fields.emotion_intensity, 0.0);
    }

    #[test]
    fn test_token_estimate() {
        let record = IndexedRecord::new(
            RecordId::new("r1"),
            MemoryModule::Notes,
            "x".repeat(400),
            RecordFields::at(0),
        );
        assert_eq!(record.token_estimate(), 100);
    }
}

// Allow non-const functions that use f32::clamp (not const-stable yet)
#![allow(clippy::missing_const_for_fn)]

//! Relationship graph types.
//!
//! This module provides the types stored in the relationship graph: named
//! concepts and the directed, confidence-scored triples between them.
//!
//! # Triple Kinds
//!
//! | Kind | Description | Examples |
//! |------|-------------|----------|
//! | `Structural` | Bookkeeping links between layers | `indexed_as` references |
//! | `Associative` | Learned associations between topics | "coffee relates_to mornings" |
//! | `Content` | Claims extracted from consolidated facts | "X supports Y" |
//!
//! # Multigraph Semantics
//!
//! Multiple triples may exist between the same concept pair, including with
//! the same predicate. Duplicates represent repeated or overlapping claims
//! over time and are never collapsed; edges are appended, never mutated.
//!
//! # Example
//!
//! ```rust
//! use engram::models::{TripleKind, TripleSpec};
//!
//! let spec = TripleSpec::new("coffee", "supports", "alertness")
//!     .with_confidence(0.8)
//!     .with_kind(TripleKind::Content)
//!     .with_source("conversation");
//! assert_eq!(spec.predicate, "supports");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a graph concept.
///
/// Concept identifiers are caller-chosen names ("coffee", "user:alice");
/// they are globally unique within a graph and created lazily on first
/// triple reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(String);

impl ConceptId {
    /// Creates a new concept ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the concept ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ConceptId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A named node in the relationship graph.
///
/// Concepts carry no payload beyond their identifier and first-seen time;
/// all semantics live on the edges between them. Concepts are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Globally unique identifier.
    pub id: ConceptId,
    /// Unix timestamp of the first triple referencing this concept.
    pub first_seen: u64,
}

/// Identifier for a single edge in the graph.
///
/// The key is `predicate + creation timestamp`, with the edge arena index
/// appended to disambiguate same-second duplicates. Purely a handle; the
/// multigraph property comes from the append-only arena, not from this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Builds an edge ID from its key components.
    #[must_use]
    pub fn from_parts(predicate: &str, created_at: u64, arena_index: usize) -> Self {
        Self(format!("{predicate}@{created_at}#{arena_index}"))
    }

    /// Returns the edge ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of relationship a triple expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripleKind {
    /// Cross-layer bookkeeping (e.g. record-to-vector references).
    Structural,
    /// Learned association between topics.
    Associative,
    /// Claim extracted from consolidated content.
    Content,
}

impl TripleKind {
    /// Returns all triple kind variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Structural, Self::Associative, Self::Content]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Associative => "associative",
            Self::Content => "content",
        }
    }

    /// Parses a triple kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "structural" | "reference" => Some(Self::Structural),
            "associative" | "association" => Some(Self::Associative),
            "content" | "claim" | "fact" => Some(Self::Content),
            _ => None,
        }
    }
}

impl fmt::Display for TripleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TripleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown triple kind: {s}"))
    }
}

/// Caller-supplied description of a triple to insert.
///
/// The graph store assigns the creation timestamp and edge ID; everything
/// else comes from this spec. Confidence and importance are clamped to
/// `[0.0, 1.0]` on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleSpec {
    /// Subject concept identifier.
    pub subject: ConceptId,
    /// Relationship predicate (free-form, e.g. `supports`, `prevents`).
    pub predicate: String,
    /// Object concept identifier.
    pub object: ConceptId,
    /// Confidence in the claim (0.0 to 1.0).
    pub confidence: f32,
    /// Importance of the claim (0.0 to 1.0).
    pub importance: f32,
    /// Kind of relationship.
    pub kind: TripleKind,
    /// Where the claim came from (module name, "conversation", ...).
    pub source: String,
    /// Free-text context around the claim.
    pub context: String,
}

impl TripleSpec {
    /// Creates a new triple spec with default confidence (1.0) and
    /// importance (0.5).
    #[must_use]
    pub fn new(
        subject: impl Into<ConceptId>,
        predicate: impl Into<String>,
        object: impl Into<ConceptId>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: 1.0,
            importance: 0.5,
            kind: TripleKind::Associative,
            source: String::new(),
            context: String::new(),
        }
    }

    /// Sets the confidence score.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Sets the importance score.
    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Sets the relationship kind.
    #[must_use]
    pub fn with_kind(mut self, kind: TripleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the free-text context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// A stored, immutable edge in the relationship graph.
///
/// Produced by the graph store on insert; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// Edge identifier assigned at insert time.
    pub edge_id: EdgeId,
    /// Subject concept identifier.
    pub subject: ConceptId,
    /// Relationship predicate.
    pub predicate: String,
    /// Object concept identifier.
    pub object: ConceptId,
    /// Confidence in the claim (0.0 to 1.0).
    pub confidence: f32,
    /// Importance of the claim (0.0 to 1.0).
    pub importance: f32,
    /// Kind of relationship.
    pub kind: TripleKind,
    /// Where the claim came from.
    pub source: String,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Free-text context around the claim.
    pub context: String,
}

/// A concept discovered by graph traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedConcept {
    /// The discovered concept.
    pub concept: ConceptId,
    /// Relationship label along the discovery edge. Edges traversed against
    /// their direction are labeled `inverse_<predicate>`.
    pub label: String,
    /// Confidence of the discovery edge.
    pub confidence: f32,
    /// Hop distance from the traversal origin (1 = immediate neighbor).
    pub distance: u32,
}

/// One side of a detected contradiction.
#[derive(Debug, Clone, PartialEq)]
pub struct ContradictionEdge {
    /// Edge identifier of the claim.
    pub edge_id: EdgeId,
    /// The claim's predicate.
    pub predicate: String,
    /// The claim's confidence.
    pub confidence: f32,
}

/// A pair of opposing claims between the same concept pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    /// Subject concept of both claims.
    pub subject: ConceptId,
    /// Object concept of both claims.
    pub object: ConceptId,
    /// The first opposing claim.
    pub first: ContradictionEdge,
    /// The second opposing claim.
    pub second: ContradictionEdge,
}

/// Everything known about one concept.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptSummary {
    /// The concept.
    pub concept: Concept,
    /// Triples where the concept is the subject.
    pub outgoing: Vec<Triple>,
    /// Triples where the concept is the object.
    pub incoming: Vec<Triple>,
}

impl ConceptSummary {
    /// Total number of relationships touching the concept.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.outgoing.len() + self.incoming.len()
    }
}

/// Fixed table of opposing predicate pairs used by contradiction detection.
pub const OPPOSING_PREDICATES: &[(&str, &str)] = &[
    ("supports", "contradicts"),
    ("enables", "prevents"),
    ("confirms", "refutes"),
];

/// Returns true if the two predicates form an opposing pair, in either order.
#[must_use]
pub fn predicates_oppose(a: &str, b: &str) -> bool {
    OPPOSING_PREDICATES
        .iter()
        .any(|(x, y)| (a == *x && b == *y) || (a == *y && b == *x))
}

//! Write-path request and receipt types for the orchestrator.

use crate::models::graph::ConceptId;
use crate::models::record::{ItemType, MemoryModule};
use std::collections::BTreeMap;
use std::fmt;

/// One of the three storage layers the orchestrator fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryLayer {
    /// Append-only record store (human-readable artifacts).
    Record,
    /// Vector index (semantic retrieval).
    Vector,
    /// Relationship graph.
    Graph,
}

impl MemoryLayer {
    /// Returns the layer name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Vector => "vector",
            Self::Graph => "graph",
        }
    }
}

impl fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relationship claim supplied alongside remembered content.
///
/// Claims only reach the graph when the carrying request passes the
/// quality gate (`item_type == ItemType::ConsolidatedFact`).
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipClaim {
    /// Subject concept.
    pub subject: ConceptId,
    /// Relationship predicate.
    pub predicate: String,
    /// Object concept.
    pub object: ConceptId,
    /// Confidence in the claim (0.0 to 1.0).
    pub confidence: f32,
}

impl RelationshipClaim {
    /// Creates a claim with full confidence.
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
        }
    }

    /// Sets the confidence score.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Request to persist a new piece of content across the memory layers.
#[derive(Debug, Clone)]
pub struct RememberRequest {
    /// The content to remember.
    pub content: String,
    /// Classification of the content. Defaults to `Note`, which never
    /// writes to the graph.
    pub item_type: ItemType,
    /// Target memory module.
    pub module: MemoryModule,
    /// Subject the content is about, when known.
    pub subject_id: Option<String>,
    /// Location tag, when known.
    pub location: Option<String>,
    /// Importance of the content (0.0 to 1.0).
    pub importance: f32,
    /// Recorded emotional intensity (0.0 to 1.0).
    pub emotion_intensity: f32,
    /// Categorization tags.
    pub tags: Vec<String>,
    /// Relationship claims; only written past the quality gate.
    pub relationships: Vec<RelationshipClaim>,
}

impl Default for RememberRequest {
    fn default() -> Self {
        Self {
            content: String::new(),
            item_type: ItemType::default(),
            module: MemoryModule::Notes,
            subject_id: None,
            location: None,
            importance: 0.5,
            emotion_intensity: 0.0,
            tags: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

impl RememberRequest {
    /// Creates a request for the given content with defaults.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Sets the item type.
    #[must_use]
    pub fn with_item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }

    /// Sets the target module.
    #[must_use]
    pub const fn with_module(mut self, module: MemoryModule) -> Self {
        self.module = module;
        self
    }

    /// Sets the importance score.
    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Adds a relationship claim.
    #[must_use]
    pub fn with_relationship(mut self, claim: RelationshipClaim) -> Self {
        self.relationships.push(claim);
        self
    }
}

/// Per-layer outcome of a `remember` call.
///
/// There is no cross-layer transaction: a layer that failed appears in
/// `failures` while the others keep their ids. The call as a whole is
/// considered successful if at least the record-store or vector-index
/// write succeeded.
#[derive(Debug, Clone, Default)]
pub struct RememberReceipt {
    /// Identifier assigned by each layer that succeeded.
    pub ids: BTreeMap<MemoryLayer, String>,
    /// Error description for each layer that failed.
    pub failures: BTreeMap<MemoryLayer, String>,
    /// Number of triples written past the quality gate (0 when gated out).
    pub triples_written: usize,
}

impl RememberReceipt {
    /// Returns the id assigned by a layer, if it succeeded.
    #[must_use]
    pub fn id(&self, layer: MemoryLayer) -> Option<&str> {
        self.ids.get(&layer).map(String::as_str)
    }

    /// Returns true if some layers failed while others succeeded.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.ids.is_empty()
    }
}

/// A merged search hit tagged with its source layer.
#[derive(Debug, Clone)]
pub struct LayeredHit {
    /// The layer that produced the hit.
    pub layer: MemoryLayer,
    /// Layer-local identifier (record id or concept id).
    pub id: String,
    /// Hit content or relationship description.
    pub content: String,
    /// Relevance score used for merging (similarity or edge confidence).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_is_gated_out() {
        let request = RememberRequest::new("hello");
        assert!(!request.item_type.is_consolidated());
    }

    #[test]
    fn test_receipt_partial() {
        let mut receipt = RememberReceipt::default();
        assert!(!receipt.is_partial());

        receipt.ids.insert(MemoryLayer::Record, "r1".to_string());
        receipt
            .failures
            .insert(MemoryLayer::Vector, "boom".to_string());
        assert!(receipt.is_partial());
        assert_eq!(receipt.id(MemoryLayer::Record), Some("r1"));
        assert_eq!(receipt.id(MemoryLayer::Vector), None);
    }

    #[test]
    fn test_claim_confidence_clamped() {
        let claim = RelationshipClaim::new("a", "supports", "b").with_confidence(7.0);
        assert!((claim.confidence - 1.0).abs() < f32::EPSILON);
    }
}

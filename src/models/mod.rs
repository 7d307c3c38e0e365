//! Data models for engram.
//!
//! This module contains all the core data structures used throughout the system.

mod context;
pub mod graph;
mod record;
mod remember;
mod score;

pub use context::{AssembledContext, ContextBlock, ReconstructedContext, ScoredCandidate};
pub use graph::{
    Concept, ConceptId, ConceptSummary, Contradiction, ContradictionEdge, EdgeId,
    OPPOSING_PREDICATES, RelatedConcept, Triple, TripleKind, TripleSpec, predicates_oppose,
};
pub use record::{IndexedRecord, ItemType, MemoryModule, RecordFields, RecordId};
pub use remember::{
    LayeredHit, MemoryLayer, RelationshipClaim, RememberReceipt, RememberRequest,
};
pub use score::{RelevanceScore, ScoreWeights, temporal_decay};

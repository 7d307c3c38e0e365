//! Assembled-context and reconstruction result types.

use crate::models::graph::RelatedConcept;
use crate::models::record::{IndexedRecord, MemoryModule};
use crate::models::score::RelevanceScore;

/// One candidate record with its ranking result.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// The candidate record.
    pub record: IndexedRecord,
    /// Sub-scores computed for this query.
    pub score: RelevanceScore,
    /// Weighted aggregate of the sub-scores.
    pub aggregate: f32,
}

impl ScoredCandidate {
    /// Approximate token count of the candidate's content.
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.record.token_estimate()
    }
}

/// The accepted candidates for one memory module.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    /// The module this block belongs to.
    pub module: MemoryModule,
    /// Accepted candidates, ordered by descending aggregate score.
    pub candidates: Vec<ScoredCandidate>,
}

impl ContextBlock {
    /// Sum of the candidates' token estimates.
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.candidates.iter().map(ScoredCandidate::token_estimate).sum()
    }

    /// Returns true if the block holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A token-bounded, relevance-ranked context window.
///
/// Blocks appear in module priority order. Modules with no surviving
/// candidates have no block at all (never an empty placeholder).
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// The query the context was assembled for.
    pub query: String,
    /// Populated module blocks in priority order.
    pub blocks: Vec<ContextBlock>,
}

impl AssembledContext {
    /// Sum of all blocks' token estimates.
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.blocks.iter().map(ContextBlock::token_estimate).sum()
    }

    /// Returns true if no module produced a block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the block for a module, if populated.
    #[must_use]
    pub fn block(&self, module: MemoryModule) -> Option<&ContextBlock> {
        self.blocks.iter().find(|b| b.module == module)
    }
}

/// Result of a cross-layer context reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructedContext {
    /// Synthesized context text.
    pub context: String,
    /// Confidence estimate (0.0 to 1.0).
    pub confidence: f32,
    /// Number of semantic hits that contributed.
    pub semantic_hits: usize,
    /// Graph relations that contributed.
    pub related_concepts: Vec<RelatedConcept>,
    /// True when the vector layer failed or timed out and the result is
    /// graph-only.
    pub degraded: bool,
}

impl ReconstructedContext {
    /// Returns true if neither layer contributed anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.semantic_hits == 0 && self.related_concepts.is_empty()
    }
}

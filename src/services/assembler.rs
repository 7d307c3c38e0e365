//! Relevance-scored context assembler.
//!
//! Ranks candidate records from every enabled module by a weighted
//! five-factor score and assembles a context window within per-module and
//! global token budgets.
//!
//! # Budgets
//!
//! Token counts are estimated as `content length / 4`. Each module's slice
//! is filled greedily, highest score first, until its fixed budget would be
//! exceeded; whole records only, never mid-record truncation. The global
//! budget revisits modules in fixed priority order (identity first,
//! associative links last); a module that cannot fit even one candidate is
//! dropped entirely. Repeated calls with identical inputs and state yield
//! identical output.

// Allow unused_self for methods kept for API consistency.
#![allow(clippy::unused_self)]

use crate::config::{EngineConfig, IndexSettings};
use crate::embedding::Embedder;
use crate::models::{
    AssembledContext, ContextBlock, IndexedRecord, MemoryModule, RelevanceScore, ScoreWeights,
    ScoredCandidate,
};
use crate::storage::traits::{VectorFilter, VectorIndex};
use crate::{Result, current_timestamp};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::instrument;

/// Base number of candidates fetched per module.
const BASE_CANDIDATES: usize = 5;

/// Additional candidates fetched per focus level.
const CANDIDATES_PER_FOCUS: usize = 2;

/// Service assembling token-bounded context windows.
///
/// Holds a snapshot of the index policy taken at construction; hosts that
/// toggle modules at runtime rebuild the assembler.
pub struct ContextAssembler {
    vector: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    settings: IndexSettings,
    weights: ScoreWeights,
    max_tokens_per_module: usize,
    max_context_tokens: usize,
}

impl ContextAssembler {
    /// Creates an assembler from engine config and an index policy snapshot.
    ///
    /// A weight table that does not sum to 1.0 is replaced with the default
    /// weights (with a logged warning) rather than failing construction.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        settings: IndexSettings,
        vector: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let weights = match config.score_weights.validate() {
            Ok(()) => config.score_weights,
            Err(e) => {
                tracing::warn!(error = %e, "invalid relevance weights, using defaults");
                ScoreWeights::default()
            }
        };

        let max_tokens_per_module = settings.global.max_tokens_per_module;
        Self {
            vector,
            embedder,
            settings,
            weights,
            max_tokens_per_module,
            max_context_tokens: config.max_context_tokens,
        }
    }

    /// Assembles a context window for a query.
    ///
    /// Fetches `5 + 2 × focus_level` candidates per enabled module using
    /// that module's retrieval strategy, scores them, fills each module's
    /// slice within its token budget, then applies the global budget.
    /// Modules with no surviving candidates produce no block.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage layer fails.
    #[instrument(skip(self), fields(query_len = query.len(), focus_level))]
    pub fn assemble_context(
        &self,
        query: &str,
        subject_id: Option<&str>,
        location: Option<&str>,
        focus_level: u8,
    ) -> Result<AssembledContext> {
        let limit = BASE_CANDIDATES + CANDIDATES_PER_FOCUS * usize::from(focus_level);
        let now = current_timestamp();

        let query_embedding = match self.embedder.embed(query) {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, falling back to unranked listings");
                None
            }
        };

        let mut blocks = Vec::new();
        for module in MemoryModule::all() {
            if !self.settings.is_enabled(*module) {
                continue;
            }

            let candidates =
                self.fetch_candidates(*module, query, subject_id, query_embedding.as_deref(), limit)?;

            let mut scored: Vec<ScoredCandidate> = candidates
                .into_iter()
                .map(|(record, semantic)| {
                    let score = RelevanceScore::compute(&record, semantic, location, now);
                    let aggregate = score.aggregate(&self.weights);
                    ScoredCandidate {
                        record,
                        score,
                        aggregate,
                    }
                })
                .collect();
            sort_by_score(&mut scored);

            let accepted = take_within_budget(scored, self.max_tokens_per_module);
            if !accepted.is_empty() {
                blocks.push(ContextBlock {
                    module: *module,
                    candidates: accepted,
                });
            }
        }

        let context = AssembledContext {
            query: query.to_string(),
            blocks,
        };
        Ok(self.apply_global_budget(context, self.max_context_tokens))
    }

    /// Module-specific candidate retrieval.
    ///
    /// Content modules run a semantic query; `Identity` lists by importance
    /// and `ActiveFocus` by recency, with a semantic sub-score of zero
    /// (their relevance comes from the scoring overrides). The `People`
    /// module folds the subject identifier into its query when present.
    fn fetch_candidates(
        &self,
        module: MemoryModule,
        query: &str,
        subject_id: Option<&str>,
        query_embedding: Option<&[f32]>,
        limit: usize,
    ) -> Result<Vec<(IndexedRecord, f32)>> {
        let table = self
            .settings
            .module(module)
            .map_or_else(|| module.default_collection(), |c| c.table_name.clone());

        match module {
            MemoryModule::Identity => {
                let mut records = self.vector.list(&table, usize::MAX)?;
                records.sort_by(|a, b| {
                    b.fields
                        .importance
                        .partial_cmp(&a.fields.importance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
                });
                Ok(records.into_iter().take(limit).map(|r| (r, 0.0)).collect())
            }
            MemoryModule::ActiveFocus => {
                let mut records = self.vector.list(&table, usize::MAX)?;
                records.sort_by(|a, b| {
                    b.fields
                        .created_at
                        .cmp(&a.fields.created_at)
                        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
                });
                Ok(records.into_iter().take(limit).map(|r| (r, 0.0)).collect())
            }
            MemoryModule::People if subject_id.is_some() => {
                let subject = subject_id.unwrap_or_default();
                let combined = format!("{subject} {query}");
                let embedding = match self.embedder.embed(&combined) {
                    Ok(e) => e,
                    Err(_) => return self.fallback_listing(&table, limit),
                };
                self.semantic_candidates(&table, &embedding, limit)
            }
            _ => query_embedding.map_or_else(
                || self.fallback_listing(&table, limit),
                |embedding| self.semantic_candidates(&table, embedding, limit),
            ),
        }
    }

    fn semantic_candidates(
        &self,
        table: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(IndexedRecord, f32)>> {
        let hits = self
            .vector
            .query(table, embedding, &VectorFilter::new(), limit)?;
        Ok(hits.into_iter().map(|h| (h.record, h.score)).collect())
    }

    fn fallback_listing(&self, table: &str, limit: usize) -> Result<Vec<(IndexedRecord, f32)>> {
        Ok(self
            .vector
            .list(table, limit)?
            .into_iter()
            .map(|r| (r, 0.0))
            .collect())
    }

    /// Re-trims a context to a global token budget.
    ///
    /// Blocks are revisited in fixed module priority order; each module's
    /// slice is re-trimmed highest-score-first to fit the remaining budget.
    /// Modules that cannot fit a single candidate are dropped entirely,
    /// never partially corrupted.
    #[must_use]
    pub fn apply_global_budget(
        &self,
        context: AssembledContext,
        max_tokens: usize,
    ) -> AssembledContext {
        if context.token_estimate() <= max_tokens {
            return context;
        }

        let mut blocks: Vec<ContextBlock> = context.blocks;
        blocks.sort_by_key(|b| b.module.priority());

        let mut remaining = max_tokens;
        let mut kept_blocks = Vec::new();
        for block in blocks {
            let kept = take_within_budget(block.candidates, remaining);
            if kept.is_empty() {
                tracing::debug!(module = %block.module, "module dropped by global budget");
                continue;
            }
            remaining -= kept.iter().map(ScoredCandidate::token_estimate).sum::<usize>();
            kept_blocks.push(ContextBlock {
                module: block.module,
                candidates: kept,
            });
        }

        AssembledContext {
            query: context.query,
            blocks: kept_blocks,
        }
    }

    /// Renders a context deterministically, one block per populated module.
    #[must_use]
    pub fn synthesize(&self, context: &AssembledContext) -> String {
        let mut parts = Vec::new();

        for block in &context.blocks {
            let mut lines = vec![format!("## {}", block.module.display_heading())];
            for candidate in &block.candidates {
                lines.push(render_line(block.module, &candidate.record));
            }
            parts.push(lines.join("\n"));
        }

        parts.join("\n\n")
    }
}

/// Renders one record per its module's display convention.
fn render_line(module: MemoryModule, record: &IndexedRecord) -> String {
    match module {
        MemoryModule::Identity => record.content.clone(),
        MemoryModule::Transcripts => format!("> {}", record.content.replace('\n', "\n> ")),
        MemoryModule::Episodic => {
            let date = Utc
                .timestamp_opt(i64::try_from(record.fields.created_at).unwrap_or(0), 0)
                .single()
                .map_or_else(String::new, |d| d.format("%Y-%m-%d").to_string());
            format!("- [{date}] {}", record.content)
        }
        _ => format!("- {}", record.content),
    }
}

/// Greedy budget fill: accepts candidates in order until the next one would
/// exceed the budget. Whole records only.
fn take_within_budget(candidates: Vec<ScoredCandidate>, budget: usize) -> Vec<ScoredCandidate> {
    let mut accepted = Vec::new();
    let mut tokens = 0;
    for candidate in candidates {
        let estimate = candidate.token_estimate();
        if tokens + estimate > budget {
            break;
        }
        tokens += estimate;
        accepted.push(candidate);
    }
    accepted
}

/// Deterministic score ordering: aggregate descending, record id ascending.
fn sort_by_score(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.aggregate
            .partial_cmp(&a.aggregate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.as_str().cmp(b.record.id.as_str()))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::{RecordFields, RecordId};
    use crate::storage::traits::VectorRecord;
    use crate::storage::InMemoryVectorIndex;

    fn candidate(id: &str, content: &str, aggregate: f32) -> ScoredCandidate {
        ScoredCandidate {
            record: IndexedRecord::new(
                RecordId::new(id),
                MemoryModule::Notes,
                content,
                RecordFields::at(0),
            ),
            score: RelevanceScore::default(),
            aggregate,
        }
    }

    fn assembler(vector: Arc<InMemoryVectorIndex>) -> ContextAssembler {
        let config = EngineConfig::default();
        ContextAssembler::new(
            &config,
            IndexSettings::default(),
            vector,
            Arc::new(HashEmbedder::new()),
        )
    }

    fn seed_note(vector: &InMemoryVectorIndex, embedder: &HashEmbedder, id: &str, content: &str) {
        let record = IndexedRecord::new(
            RecordId::new(id),
            MemoryModule::Notes,
            content,
            RecordFields::at(crate::current_timestamp()),
        );
        let embedding = embedder.embed(content).unwrap();
        vector
            .upsert("memory_notes", &VectorRecord::new(record, embedding))
            .unwrap();
    }

    #[test]
    fn test_take_within_budget_stops_at_overflow() {
        let candidates = vec![
            candidate("a", &"x".repeat(40), 0.9), // 10 tokens
            candidate("b", &"x".repeat(400), 0.8), // 100 tokens, overflows
            candidate("c", &"x".repeat(40), 0.7),
        ];
        let kept = take_within_budget(candidates, 30);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.id.as_str(), "a");
    }

    #[test]
    fn test_assemble_context_finds_relevant_notes() {
        let vector = Arc::new(InMemoryVectorIndex::new());
        let embedder = HashEmbedder::new();
        seed_note(&vector, &embedder, "n1", "espresso brewing ratios and pressure");
        seed_note(&vector, &embedder, "n2", "tax filing deadline reminders");

        let assembler = assembler(vector);
        let context = assembler
            .assemble_context("espresso brewing", None, None, 1)
            .unwrap();

        let block = context.block(MemoryModule::Notes).unwrap();
        assert!(!block.is_empty());
        assert_eq!(block.candidates[0].record.id.as_str(), "n1");
    }

    #[test]
    fn test_empty_module_produces_no_block() {
        let vector = Arc::new(InMemoryVectorIndex::new());
        let assembler = assembler(vector);
        let context = assembler.assemble_context("anything", None, None, 0).unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn test_global_budget_priority_order() {
        let vector = Arc::new(InMemoryVectorIndex::new());
        let assembler = assembler(vector);

        // Two blocks of ~50 tokens each; budget fits only the first by
        // priority (identity outranks notes).
        let identity_block = ContextBlock {
            module: MemoryModule::Identity,
            candidates: vec![ScoredCandidate {
                record: IndexedRecord::new(
                    RecordId::new("i1"),
                    MemoryModule::Identity,
                    "x".repeat(200),
                    RecordFields::at(0),
                ),
                score: RelevanceScore::default(),
                aggregate: 0.1,
            }],
        };
        let notes_block = ContextBlock {
            module: MemoryModule::Notes,
            candidates: vec![candidate("n1", &"y".repeat(200), 0.9)],
        };
        let context = AssembledContext {
            query: "q".to_string(),
            blocks: vec![notes_block, identity_block],
        };

        let trimmed = assembler.apply_global_budget(context, 60);
        assert_eq!(trimmed.blocks.len(), 1);
        assert_eq!(trimmed.blocks[0].module, MemoryModule::Identity);
    }

    #[test]
    fn test_global_budget_respected() {
        let vector = Arc::new(InMemoryVectorIndex::new());
        let assembler = assembler(vector);

        let context = AssembledContext {
            query: "q".to_string(),
            blocks: vec![ContextBlock {
                module: MemoryModule::Notes,
                candidates: vec![
                    candidate("a", &"x".repeat(100), 0.9),
                    candidate("b", &"x".repeat(100), 0.8),
                    candidate("c", &"x".repeat(100), 0.7),
                ],
            }],
        };

        let trimmed = assembler.apply_global_budget(context, 50);
        assert!(trimmed.token_estimate() <= 50);
        assert_eq!(trimmed.blocks[0].candidates.len(), 2);
    }

    #[test]
    fn test_synthesize_deterministic_rendering() {
        let vector = Arc::new(InMemoryVectorIndex::new());
        let assembler = assembler(vector);

        let context = AssembledContext {
            query: "q".to_string(),
            blocks: vec![
                ContextBlock {
                    module: MemoryModule::Identity,
                    candidates: vec![ScoredCandidate {
                        record: IndexedRecord::new(
                            RecordId::new("i1"),
                            MemoryModule::Identity,
                            "I prefer directness.",
                            RecordFields::at(0),
                        ),
                        score: RelevanceScore::default(),
                        aggregate: 0.5,
                    }],
                },
                ContextBlock {
                    module: MemoryModule::Notes,
                    candidates: vec![candidate("n1", "Espresso at 9 bars", 0.4)],
                },
            ],
        };

        let rendered = assembler.synthesize(&context);
        assert!(rendered.contains("## Core Identity"));
        assert!(rendered.contains("I prefer directness."));
        assert!(rendered.contains("## Notes"));
        assert!(rendered.contains("- Espresso at 9 bars"));
        assert_eq!(rendered, assembler.synthesize(&context));
    }

    #[test]
    fn test_synthesize_empty_context() {
        let vector = Arc::new(InMemoryVectorIndex::new());
        let assembler = assembler(vector);
        assert_eq!(assembler.synthesize(&AssembledContext::default()), "");
    }
}

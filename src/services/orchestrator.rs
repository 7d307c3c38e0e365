//! Cross-layer memory orchestrator.
//!
//! Single entry point fanning writes and reads out across the record
//! store, the vector index, and the relationship graph.
//!
//! # Architecture
//!
//! ```text
//! remember(content)
//!     │
//!     ├──▶ RecordStore.append()          always
//!     ├──▶ VectorIndex.upsert()          always (module policy permitting)
//!     └──▶ RelationshipGraph.add_triple  ONLY item_type == consolidated_fact
//!              └──▶ (record_id, "indexed_as", vector_id) reference
//!
//! reconstruct(query)
//!     ├──▶ VectorIndex.query (timeout-bounded, degrades to graph-only)
//!     └──▶ RelationshipGraph.find_related(top-3 query concepts)
//!              │
//!              ▼
//!          merged context string + confidence estimate
//! ```
//!
//! # Quality Gate
//!
//! Relationship claims reach the graph only when the request's item type
//! is `consolidated_fact`; raw notes and transcripts never pollute the
//! graph, even when relationships are supplied. No internal code path
//! fabricates the consolidated type — it is an explicit caller decision.
//!
//! # Failure Semantics
//!
//! There is no cross-layer transaction. Each layer's failure during
//! `remember` is caught and recorded in the receipt; the call succeeds if
//! at least the record-store or vector-index write succeeded.

use crate::config::{EngineConfig, IndexSettings, OperationTimeouts};
use crate::embedding::Embedder;
use crate::models::{
    ItemType, LayeredHit, MemoryLayer, MemoryModule, RecordFields, RecordId, ReconstructedContext,
    RelatedConcept, RememberReceipt, RememberRequest, TripleKind, TripleSpec,
};
use crate::storage::RelationshipGraph;
use crate::storage::traits::{RecordArtifact, RecordStore, VectorFilter, VectorHit, VectorIndex, VectorRecord};
use crate::{Error, Result, current_timestamp};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Minimum edge confidence followed during reconstruction lookups.
const RELATION_MIN_CONFIDENCE: f32 = 0.3;

/// Importance assigned to structural cross-layer reference triples.
const REFERENCE_IMPORTANCE: f32 = 0.1;

/// Confidence bonus applied when relationship context was found.
const RELATIONSHIP_BONUS: f32 = 0.2;

/// Stop words filtered out of queries before concept extraction.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "about", "are", "but", "did", "do", "does", "for", "how", "i", "in",
        "is", "it", "know", "me", "my", "of", "on", "or", "remember", "tell", "that", "the",
        "this", "to", "was", "were", "what", "when", "where", "which", "who", "why", "with",
        "you", "your",
    ]
    .into_iter()
    .collect()
});

/// The cross-layer orchestrator.
pub struct MemoryOrchestrator {
    record_store: Arc<dyn RecordStore>,
    vector: Arc<dyn VectorIndex>,
    graph: Arc<RelationshipGraph>,
    embedder: Arc<dyn Embedder>,
    settings: IndexSettings,
    timeouts: OperationTimeouts,
}

impl MemoryOrchestrator {
    /// Creates an orchestrator, loading the index policy for the configured
    /// memory root.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        record_store: Arc<dyn RecordStore>,
        vector: Arc<dyn VectorIndex>,
        graph: Arc<RelationshipGraph>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let settings = IndexSettings::load(&config.index_settings_path());
        Self::with_settings(config, settings, record_store, vector, graph, embedder)
    }

    /// Creates an orchestrator with an explicit index policy.
    #[must_use]
    pub fn with_settings(
        config: &EngineConfig,
        settings: IndexSettings,
        record_store: Arc<dyn RecordStore>,
        vector: Arc<dyn VectorIndex>,
        graph: Arc<RelationshipGraph>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            record_store,
            vector,
            graph,
            embedder,
            settings,
            timeouts: config.timeouts,
        }
    }

    /// Persists new content across the memory layers.
    ///
    /// Always writes to the record store and (module policy permitting) the
    /// vector index. Relationship claims are written to the graph only when
    /// the request passes the quality gate; a structural
    /// `(record, "indexed_as", vector)` reference triple links the layers
    /// on the gated path.
    ///
    /// Partial success is reported in the receipt rather than rolled back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty content, or `OperationFailed` when
    /// both the record-store and vector-index writes fail.
    #[instrument(skip(self, request), fields(module = %request.module, item_type = %request.item_type))]
    pub fn remember(&self, request: &RememberRequest) -> Result<RememberReceipt> {
        let start = Instant::now();
        let result = self.remember_inner(request);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "memory_remember_total",
            "module" => request.module.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("memory_remember_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        result
    }

    fn remember_inner(&self, request: &RememberRequest) -> Result<RememberReceipt> {
        if request.content.trim().is_empty() {
            return Err(Error::InvalidInput("Content cannot be empty".to_string()));
        }

        let now = current_timestamp();
        let mut receipt = RememberReceipt::default();

        // Record store: always attempted.
        let artifact_id = format!("{}_{}", request.module.as_str(), uuid::Uuid::new_v4());
        let artifact = RecordArtifact::new(&artifact_id, request.module, &request.content)
            .with_metadata(serde_json::json!({
                "item_type": request.item_type.as_str(),
                "importance": request.importance,
                "emotion_intensity": request.emotion_intensity,
                "subject": request.subject_id,
                "location": request.location,
                "tags": request.tags,
                "created_at": now,
            }));

        match self.record_store.append(&artifact) {
            Ok(path) => {
                receipt.ids.insert(MemoryLayer::Record, path);
            }
            Err(e) => {
                tracing::warn!(error = %e, "record-store write failed");
                receipt.failures.insert(MemoryLayer::Record, e.to_string());
            }
        }

        // Vector index: always attempted while the module's policy allows
        // automatic indexing.
        if self.auto_indexing_enabled(request.module) {
            match self.upsert_vector(request, now) {
                Ok(id) => {
                    receipt.ids.insert(MemoryLayer::Vector, id);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "vector-index write failed");
                    receipt.failures.insert(MemoryLayer::Vector, e.to_string());
                }
            }
        } else {
            tracing::debug!(module = %request.module, "auto-indexing disabled, vector write skipped");
        }

        // Quality gate: only consolidated facts reach the graph.
        if request.item_type.is_consolidated() {
            self.write_graph_layer(request, &mut receipt);
        } else if !request.relationships.is_empty() {
            tracing::debug!(
                item_type = %request.item_type,
                claims = request.relationships.len(),
                "relationship claims dropped by quality gate"
            );
        }

        if receipt.id(MemoryLayer::Record).is_none() && receipt.id(MemoryLayer::Vector).is_none() {
            return Err(Error::OperationFailed {
                operation: "remember".to_string(),
                cause: "all primary layers failed".to_string(),
            });
        }

        Ok(receipt)
    }

    /// Embeds and upserts the remembered content. The record identifier is
    /// deterministic from the content hash, so replays upsert in place.
    fn upsert_vector(&self, request: &RememberRequest, now: u64) -> Result<String> {
        let table = self.table_name(request.module);
        let id = RecordId::deterministic(request.module, &request.content);

        let embedding = self.embedder.embed(&request.content)?;
        let mut fields = RecordFields::at(now)
            .with_importance(request.importance)
            .with_emotion_intensity(request.emotion_intensity);
        fields.tags.clone_from(&request.tags);
        fields.location.clone_from(&request.location);

        let record = crate::models::IndexedRecord::new(
            id.clone(),
            request.module,
            request.content.clone(),
            fields,
        );
        self.vector
            .upsert(&table, &VectorRecord::new(record, embedding))?;
        Ok(id.as_str().to_string())
    }

    /// Writes gated relationship claims plus the cross-layer reference.
    fn write_graph_layer(&self, request: &RememberRequest, receipt: &mut RememberReceipt) {
        let context: String = request.content.chars().take(200).collect();
        let mut first_edge = None;

        for claim in &request.relationships {
            let spec = TripleSpec::new(
                claim.subject.clone(),
                claim.predicate.clone(),
                claim.object.clone(),
            )
            .with_confidence(claim.confidence)
            .with_importance(request.importance)
            .with_kind(TripleKind::Content)
            .with_source(ItemType::ConsolidatedFact.as_str())
            .with_context(context.clone());

            match self.graph.add_triple(&spec) {
                Ok(edge_id) => {
                    receipt.triples_written += 1;
                    first_edge.get_or_insert(edge_id);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "graph write failed");
                    receipt.failures.insert(MemoryLayer::Graph, e.to_string());
                }
            }
        }

        // Structural reference linking the record-store artifact to its
        // vector-index record; created only for consolidated writes.
        if let (Some(record_id), Some(vector_id)) = (
            receipt.id(MemoryLayer::Record).map(String::from),
            receipt.id(MemoryLayer::Vector).map(String::from),
        ) {
            let reference = TripleSpec::new(record_id, "indexed_as", vector_id)
                .with_importance(REFERENCE_IMPORTANCE)
                .with_kind(TripleKind::Structural)
                .with_source("cross_layer");
            match self.graph.add_triple(&reference) {
                Ok(edge_id) => {
                    receipt.triples_written += 1;
                    first_edge.get_or_insert(edge_id);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cross-layer reference write failed");
                    receipt.failures.insert(MemoryLayer::Graph, e.to_string());
                }
            }
        }

        if let Some(edge_id) = first_edge {
            receipt
                .ids
                .insert(MemoryLayer::Graph, edge_id.as_str().to_string());
        }
    }

    /// Reconstructs context for a query from the vector and graph layers.
    ///
    /// The semantic search is bounded by the configured vector timeout; on
    /// timeout or error the result degrades to graph-only context instead
    /// of failing. The graph lookup is seeded by the stop-word-filtered
    /// top-3 query terms.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph layer fails.
    #[instrument(skip(self), fields(query_len = query.len()))]
    pub fn reconstruct(
        &self,
        query: &str,
        subject_id: Option<&str>,
        context_depth: u8,
        relationship_depth: u32,
    ) -> Result<ReconstructedContext> {
        let limit = 5 + 2 * usize::from(context_depth);
        let semantic = self.semantic_search_with_timeout(query, limit);
        let degraded = semantic.is_none();
        let semantic_hits = semantic.unwrap_or_default();

        let mut related = Vec::new();
        for concept in extract_query_concepts(query) {
            related.extend(self.graph.find_related(
                &concept,
                relationship_depth,
                RELATION_MIN_CONFIDENCE,
            )?);
        }
        if let Some(subject) = subject_id {
            related.extend(
                self.graph
                    .find_related(subject, relationship_depth, RELATION_MIN_CONFIDENCE)?,
            );
        }
        sort_related(&mut related);

        let context = synthesize_reconstruction(&semantic_hits, &related);
        let confidence = reconstruction_confidence(semantic_hits.len(), !related.is_empty());

        Ok(ReconstructedContext {
            context,
            confidence,
            semantic_hits: semantic_hits.len(),
            related_concepts: related,
            degraded,
        })
    }

    /// Merges vector-index and graph hits into one ranked result list.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph layer fails.
    #[instrument(skip(self, filter), fields(query_len = query.len(), max_results))]
    pub fn unified_search(
        &self,
        query: &str,
        filter: &VectorFilter,
        include_relationships: bool,
        max_results: usize,
    ) -> Result<Vec<LayeredHit>> {
        let mut hits: Vec<LayeredHit> = Vec::new();

        match self.semantic_search(query, filter, max_results) {
            Ok(vector_hits) => {
                hits.extend(vector_hits.into_iter().map(|h| LayeredHit {
                    layer: MemoryLayer::Vector,
                    id: h.record.id.as_str().to_string(),
                    content: h.record.content,
                    score: h.score,
                }));
            }
            Err(e) => {
                tracing::warn!(error = %e, "vector layer failed during search, continuing graph-only");
            }
        }

        if include_relationships {
            for concept in extract_query_concepts(query) {
                for relation in self.graph.find_related(&concept, 2, RELATION_MIN_CONFIDENCE)? {
                    hits.push(LayeredHit {
                        layer: MemoryLayer::Graph,
                        id: relation.concept.as_str().to_string(),
                        content: format!(
                            "{} {} {}",
                            concept,
                            relation.label,
                            relation.concept.as_str()
                        ),
                        score: relation.confidence,
                    });
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(max_results);
        Ok(hits)
    }

    /// Delegates contradiction detection to the graph store.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph layer fails.
    pub fn detect_contradictions(
        &self,
        min_confidence: f32,
    ) -> Result<Vec<crate::models::Contradiction>> {
        self.graph.detect_contradictions(min_confidence)
    }

    /// Searches every enabled module's collection and merges by score.
    fn semantic_search(
        &self,
        query: &str,
        filter: &VectorFilter,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let embedding = self.embedder.embed(query)?;

        let mut hits = Vec::new();
        for module in MemoryModule::all() {
            if !self.settings.is_enabled(*module) {
                continue;
            }
            hits.extend(
                self.vector
                    .query(&self.table_name(*module), &embedding, filter, limit)?,
            );
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.as_str().cmp(b.record.id.as_str()))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Runs the semantic search on a scoped thread bounded by the vector
    /// timeout. Returns `None` on timeout or error; the caller degrades to
    /// graph-only context.
    fn semantic_search_with_timeout(&self, query: &str, limit: usize) -> Option<Vec<VectorHit>> {
        let timeout = Duration::from_millis(self.timeouts.vector_query_ms);

        std::thread::scope(|s| {
            let handle = s.spawn(|| self.semantic_search(query, &VectorFilter::new(), limit));

            let start = Instant::now();
            loop {
                if handle.is_finished() {
                    return match handle.join() {
                        Ok(Ok(hits)) => Some(hits),
                        Ok(Err(e)) => {
                            tracing::warn!(error = %e, "vector layer failed, degrading to graph-only");
                            None
                        }
                        Err(_) => None,
                    };
                }
                if start.elapsed() >= timeout {
                    tracing::warn!(
                        timeout_ms = self.timeouts.vector_query_ms,
                        "vector query timed out, degrading to graph-only"
                    );
                    return None;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        })
    }

    fn table_name(&self, module: MemoryModule) -> String {
        self.settings
            .module(module)
            .map_or_else(|| module.default_collection(), |c| c.table_name.clone())
    }

    fn auto_indexing_enabled(&self, module: MemoryModule) -> bool {
        self.settings.global.auto_index_on_create
            && self.settings.is_enabled(module)
            && self.settings.module(module).is_none_or(|c| c.auto_update)
    }
}

/// Extracts up to three concepts from a query: stop-word filtered,
/// deduplicated, longest terms first (ties broken lexicographically) so
/// reconstruction is deterministic.
fn extract_query_concepts(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(t))
        .filter(|t| seen.insert((*t).to_string()))
        .map(String::from)
        .collect();

    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    terms.truncate(3);
    terms
}

/// Confidence estimate: `min(0.9, 0.3 + 0.1 × hits)`, plus a flat bonus
/// when relationship context was found, clamped to 1.0.
#[allow(clippy::cast_precision_loss)]
fn reconstruction_confidence(semantic_hits: usize, has_relationships: bool) -> f32 {
    let base = (0.1_f32).mul_add(semantic_hits as f32, 0.3).min(0.9);
    let bonus = if has_relationships {
        RELATIONSHIP_BONUS
    } else {
        0.0
    };
    (base + bonus).clamp(0.0, 1.0)
}

/// Deterministic ordering for merged relationship results.
fn sort_related(related: &mut Vec<RelatedConcept>) {
    related.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.distance.cmp(&b.distance))
            .then_with(|| a.concept.as_str().cmp(b.concept.as_str()))
    });
    related.dedup_by(|a, b| a.concept == b.concept && a.label == b.label);
}

/// Renders the merged reconstruction, one block per contributing layer.
fn synthesize_reconstruction(hits: &[VectorHit], related: &[RelatedConcept]) -> String {
    let mut parts = Vec::new();

    if !hits.is_empty() {
        let mut lines = vec!["## Relevant Memories".to_string()];
        for hit in hits {
            lines.push(format!("- {} _(score {:.2})_", hit.record.content, hit.score));
        }
        parts.push(lines.join("\n"));
    }

    if !related.is_empty() {
        let mut lines = vec!["## Related Concepts".to_string()];
        for relation in related {
            lines.push(format!(
                "- {} ({}, confidence {:.2})",
                relation.concept.as_str(),
                relation.label,
                relation.confidence
            ));
        }
        parts.push(lines.join("\n"));
    }

    parts.join("\n\n")
}

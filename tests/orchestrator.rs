//! Cross-layer orchestrator integration tests.
//!
//! Exercises the remember/reconstruct/search round trip, the quality gate
//! guarding the graph, partial-failure receipts, and vector-layer
//! degradation.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use engram::config::EngineConfig;
use engram::embedding::HashEmbedder;
use engram::models::{
    IndexedRecord, ItemType, MemoryLayer, MemoryModule, RecordId, RelationshipClaim,
    RememberRequest,
};
use engram::services::MemoryOrchestrator;
use engram::storage::traits::{VectorFilter, VectorHit, VectorIndex, VectorRecord};
use engram::storage::{InMemoryVectorIndex, MarkdownRecordStore, RelationshipGraph};
use engram::{Error, IndexSettings, Result, TripleSpec};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    vector: Arc<InMemoryVectorIndex>,
    graph: Arc<RelationshipGraph>,
    orchestrator: MemoryOrchestrator,
}

fn harness() -> Harness {
    harness_with_vector(Arc::new(InMemoryVectorIndex::new()))
}

fn harness_with_vector(vector: Arc<InMemoryVectorIndex>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new()
        .with_memory_root(dir.path())
        .with_data_dir(dir.path().join(".engram"));

    let graph = Arc::new(RelationshipGraph::in_memory());
    let orchestrator = MemoryOrchestrator::with_settings(
        &config,
        IndexSettings::default(),
        Arc::new(MarkdownRecordStore::new(dir.path().join("records"))),
        vector.clone(),
        graph.clone(),
        Arc::new(HashEmbedder::new()),
    );

    Harness {
        _dir: dir,
        vector,
        graph,
        orchestrator,
    }
}

fn consolidated_request(content: &str) -> RememberRequest {
    RememberRequest::new(content)
        .with_item_type(ItemType::ConsolidatedFact)
        .with_module(MemoryModule::Semantic)
        .with_relationship(
            RelationshipClaim::new("espresso", "supports", "alertness").with_confidence(0.9),
        )
}

#[test]
fn remember_writes_record_and_vector_layers() {
    let h = harness();
    let receipt = h
        .orchestrator
        .remember(&RememberRequest::new("Grind finer for slow shots"))
        .unwrap();

    assert!(receipt.id(MemoryLayer::Record).is_some());
    assert!(receipt.id(MemoryLayer::Vector).is_some());
    assert!(receipt.failures.is_empty());
    assert_eq!(h.vector.count("memory_notes").unwrap(), 1);
}

#[test]
fn quality_gate_blocks_unconsolidated_relationships() {
    let h = harness();

    // A raw note carrying relationship claims must not touch the graph.
    let request = RememberRequest::new("espresso might help focus")
        .with_relationship(RelationshipClaim::new("espresso", "supports", "focus"));
    let receipt = h.orchestrator.remember(&request).unwrap();

    assert_eq!(receipt.triples_written, 0);
    assert!(receipt.id(MemoryLayer::Graph).is_none());
    assert_eq!(h.graph.stats().unwrap().edge_count, 0);
}

#[test]
fn consolidated_fact_passes_gate_with_cross_layer_reference() {
    let h = harness();
    let receipt = h
        .orchestrator
        .remember(&consolidated_request("Espresso reliably improves alertness"))
        .unwrap();

    // One claim plus the structural reference triple.
    assert_eq!(receipt.triples_written, 2);
    assert!(receipt.id(MemoryLayer::Graph).is_some());

    let claims = h.graph.query_by_predicate("supports", 0.5).unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].subject.as_str(), "espresso");

    // The reference links the record-store id to the vector-index id.
    let references = h.graph.query_by_predicate("indexed_as", 0.0).unwrap();
    assert_eq!(references.len(), 1);
    assert_eq!(
        references[0].subject.as_str(),
        receipt.id(MemoryLayer::Record).unwrap()
    );
    assert_eq!(
        references[0].object.as_str(),
        receipt.id(MemoryLayer::Vector).unwrap()
    );
}

#[test]
fn remember_empty_content_rejected() {
    let h = harness();
    let result = h.orchestrator.remember(&RememberRequest::new("   "));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

/// Vector index that fails every write.
struct BrokenVectorIndex;

impl VectorIndex for BrokenVectorIndex {
    fn upsert(&self, _collection: &str, _record: &VectorRecord) -> Result<()> {
        Err(Error::OperationFailed {
            operation: "upsert".to_string(),
            cause: "vector backend down".to_string(),
        })
    }

    fn contains(&self, _collection: &str, _id: &RecordId) -> Result<bool> {
        Ok(false)
    }

    fn query(
        &self,
        _collection: &str,
        _embedding: &[f32],
        _filter: &VectorFilter,
        _limit: usize,
    ) -> Result<Vec<VectorHit>> {
        Err(Error::OperationFailed {
            operation: "query".to_string(),
            cause: "vector backend down".to_string(),
        })
    }

    fn list(&self, _collection: &str, _limit: usize) -> Result<Vec<IndexedRecord>> {
        Ok(Vec::new())
    }

    fn drop_collection(&self, _collection: &str) -> Result<bool> {
        Ok(false)
    }

    fn count(&self, _collection: &str) -> Result<usize> {
        Ok(0)
    }
}

fn broken_vector_harness() -> (TempDir, Arc<RelationshipGraph>, MemoryOrchestrator) {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new()
        .with_memory_root(dir.path())
        .with_data_dir(dir.path().join(".engram"));

    let graph = Arc::new(RelationshipGraph::in_memory());
    let orchestrator = MemoryOrchestrator::with_settings(
        &config,
        IndexSettings::default(),
        Arc::new(MarkdownRecordStore::new(dir.path().join("records"))),
        Arc::new(BrokenVectorIndex),
        graph.clone(),
        Arc::new(HashEmbedder::new()),
    );
    (dir, graph, orchestrator)
}

#[test]
fn partial_failure_reported_not_rolled_back() {
    let (_dir, graph, orchestrator) = broken_vector_harness();

    let receipt = orchestrator
        .remember(&consolidated_request("Espresso reliably improves alertness"))
        .unwrap();

    // Record-store id present, vector key absent, failure recorded.
    assert!(receipt.id(MemoryLayer::Record).is_some());
    assert!(receipt.id(MemoryLayer::Vector).is_none());
    assert!(receipt.failures.contains_key(&MemoryLayer::Vector));
    assert!(receipt.is_partial());

    // The gated graph write still happened (the relationship claim; the
    // cross-layer reference needs the vector id and is skipped).
    assert_eq!(receipt.triples_written, 1);
    assert_eq!(graph.stats().unwrap().edge_count, 1);
}

#[test]
fn reconstruct_degrades_to_graph_only_when_vector_fails() {
    let (_dir, graph, orchestrator) = broken_vector_harness();

    graph
        .add_triple(&TripleSpec::new("espresso", "supports", "alertness").with_confidence(0.9))
        .unwrap();

    let reconstructed = orchestrator
        .reconstruct("what do you know about espresso", None, 1, 2)
        .unwrap();

    assert!(reconstructed.degraded);
    assert_eq!(reconstructed.semantic_hits, 0);
    assert!(!reconstructed.related_concepts.is_empty());
    assert!(reconstructed.context.contains("Related Concepts"));
    assert!(reconstructed.context.contains("alertness"));
    // Graph-only: base 0.3 plus the relationship bonus.
    assert!((reconstructed.confidence - 0.5).abs() < 1e-5);
}

#[test]
fn reconstruct_merges_both_layers() {
    let h = harness();

    h.orchestrator
        .remember(&RememberRequest::new("espresso extraction works best at 9 bars"))
        .unwrap();
    h.graph
        .add_triple(&TripleSpec::new("espresso", "supports", "alertness").with_confidence(0.9))
        .unwrap();

    let reconstructed = h
        .orchestrator
        .reconstruct("espresso extraction", None, 1, 2)
        .unwrap();

    assert!(!reconstructed.degraded);
    assert!(reconstructed.semantic_hits >= 1);
    assert!(reconstructed.context.contains("Relevant Memories"));
    assert!(reconstructed.context.contains("Related Concepts"));
    assert!(reconstructed.confidence > 0.5);
}

#[test]
fn unified_search_tags_hits_by_layer() {
    let h = harness();

    h.orchestrator
        .remember(&RememberRequest::new("espresso extraction pressure profile"))
        .unwrap();
    h.graph
        .add_triple(&TripleSpec::new("espresso", "enables", "focus").with_confidence(0.8))
        .unwrap();

    let hits = h
        .orchestrator
        .unified_search("espresso extraction", &VectorFilter::new(), true, 10)
        .unwrap();

    assert!(hits.iter().any(|hit| hit.layer == MemoryLayer::Vector));
    assert!(hits.iter().any(|hit| hit.layer == MemoryLayer::Graph));

    // Sorted by score descending.
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Truncation honors max_results.
    let limited = h
        .orchestrator
        .unified_search("espresso extraction", &VectorFilter::new(), true, 1)
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn unified_search_without_relationships_is_vector_only() {
    let h = harness();
    h.graph
        .add_triple(&TripleSpec::new("espresso", "enables", "focus").with_confidence(0.8))
        .unwrap();

    let hits = h
        .orchestrator
        .unified_search("espresso", &VectorFilter::new(), false, 10)
        .unwrap();
    assert!(hits.iter().all(|hit| hit.layer == MemoryLayer::Vector));
}

#[test]
fn detect_contradictions_delegates_to_graph() {
    let h = harness();
    h.graph
        .add_triple(&TripleSpec::new("x", "supports", "y").with_confidence(0.9))
        .unwrap();
    h.graph
        .add_triple(&TripleSpec::new("x", "contradicts", "y").with_confidence(0.85))
        .unwrap();

    let found = h.orchestrator.detect_contradictions(0.7).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn remember_replay_upserts_vector_in_place() {
    let h = harness();
    let request = RememberRequest::new("identical content either time");

    let first = h.orchestrator.remember(&request).unwrap();
    let second = h.orchestrator.remember(&request).unwrap();

    // Record artifacts are append-only and distinct...
    assert_ne!(
        first.id(MemoryLayer::Record),
        second.id(MemoryLayer::Record)
    );
    // ...but the deterministic vector id dedupes the searchable record.
    assert_eq!(
        first.id(MemoryLayer::Vector),
        second.id(MemoryLayer::Vector)
    );
    assert_eq!(h.vector.count("memory_notes").unwrap(), 1);
}

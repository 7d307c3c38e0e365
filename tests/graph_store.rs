//! Relationship graph integration tests.
//!
//! Exercises multigraph append-only semantics, confidence-filtered
//! traversal, contradiction detection, and snapshot recovery.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use engram::models::TripleSpec;
use engram::storage::RelationshipGraph;
use proptest::prelude::*;
use tempfile::TempDir;
use test_case::test_case;

fn spec(s: &str, p: &str, o: &str, confidence: f32) -> TripleSpec {
    TripleSpec::new(s, p, o).with_confidence(confidence)
}

#[test]
fn multigraph_append_only_edge_count_strictly_increases() {
    let graph = RelationshipGraph::in_memory();

    let mut last_count = 0;
    for confidence in [0.9, 0.8, 0.7] {
        graph
            .add_triple(&spec("engine", "supports", "retrieval", confidence))
            .expect("add_triple");
        let count = graph.stats().expect("stats").edge_count;
        assert!(count > last_count, "edge count must strictly increase");
        last_count = count;
    }

    // Same subject/object/predicate yields distinct edges, not overwrites.
    let triples = graph.query_by_predicate("supports", 0.0).expect("query");
    assert_eq!(triples.len(), 3);
    let ids: std::collections::HashSet<_> =
        triples.iter().map(|t| t.edge_id.as_str().to_string()).collect();
    assert_eq!(ids.len(), 3);
}

#[test]
fn traversal_returns_labels_and_distances() {
    let graph = RelationshipGraph::in_memory();
    graph.add_triple(&spec("a", "supports", "b", 0.9)).unwrap();
    graph.add_triple(&spec("c", "enables", "b", 0.8)).unwrap();

    // From b, both neighbors are one hop; the edge into b reads inverted.
    let related = graph.find_related("b", 1, 0.0).unwrap();
    assert_eq!(related.len(), 2);
    let labels: Vec<&str> = related.iter().map(|r| r.label.as_str()).collect();
    assert!(labels.contains(&"inverse_supports"));
    assert!(labels.contains(&"inverse_enables"));
    assert!(related.iter().all(|r| r.distance == 1));
}

#[test]
fn contradiction_scenario_exact_pair() {
    let graph = RelationshipGraph::in_memory();
    graph.add_triple(&spec("x", "supports", "y", 0.9)).unwrap();
    graph.add_triple(&spec("x", "contradicts", "y", 0.85)).unwrap();
    // Unrelated noise that must not be flagged.
    graph.add_triple(&spec("x", "relates_to", "y", 0.95)).unwrap();
    graph.add_triple(&spec("p", "supports", "q", 0.9)).unwrap();

    let found = graph.detect_contradictions(0.7).unwrap();
    assert_eq!(found.len(), 1);
    let contradiction = &found[0];
    assert_eq!(contradiction.subject.as_str(), "x");
    assert_eq!(contradiction.object.as_str(), "y");
    assert_ne!(contradiction.first.edge_id, contradiction.second.edge_id);

    let predicates = [
        contradiction.first.predicate.as_str(),
        contradiction.second.predicate.as_str(),
    ];
    assert!(predicates.contains(&"supports"));
    assert!(predicates.contains(&"contradicts"));
}

#[test_case("supports", "contradicts")]
#[test_case("enables", "prevents")]
#[test_case("confirms", "refutes")]
fn every_opposing_pair_is_detected(positive: &str, negative: &str) {
    let graph = RelationshipGraph::in_memory();
    graph.add_triple(&spec("x", positive, "y", 0.9)).unwrap();
    graph.add_triple(&spec("x", negative, "y", 0.85)).unwrap();

    assert_eq!(graph.detect_contradictions(0.7).unwrap().len(), 1);
}

#[test]
fn checkpoint_persists_across_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.bin");

    {
        let graph = RelationshipGraph::load(&path, 2);
        graph.add_triple(&spec("a", "supports", "b", 0.9)).unwrap();
        graph.add_triple(&spec("b", "enables", "c", 0.8)).unwrap();
        // Two writes hit the checkpoint interval; the snapshot is on disk.
    }

    let reloaded = RelationshipGraph::load(&path, 2);
    let stats = reloaded.stats().unwrap();
    assert_eq!(stats.concept_count, 3);
    assert_eq!(stats.edge_count, 2);

    let related = reloaded.find_related("a", 2, 0.5).unwrap();
    assert_eq!(related.len(), 2);
}

#[test]
fn explicit_save_flushes_pending_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.bin");

    let graph = RelationshipGraph::load(&path, 100);
    graph.add_triple(&spec("a", "supports", "b", 0.9)).unwrap();
    // Below the checkpoint interval; nothing on disk yet.
    assert!(RelationshipGraph::load(&path, 100).stats().unwrap().edge_count == 0);

    graph.save().unwrap();
    assert_eq!(RelationshipGraph::load(&path, 100).stats().unwrap().edge_count, 1);
}

#[test]
fn corrupt_snapshot_falls_back_to_empty_graph() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.bin");
    std::fs::write(&path, b"\xff\xfe garbage that is not a snapshot").unwrap();

    // Startup never crashes on corruption.
    let graph = RelationshipGraph::load(&path, 10);
    assert_eq!(graph.stats().unwrap().edge_count, 0);

    // The recovered graph is fully usable.
    graph.add_triple(&spec("a", "supports", "b", 0.9)).unwrap();
    assert_eq!(graph.stats().unwrap().edge_count, 1);
}

#[test]
fn snapshot_metadata_sidecar_tracks_totals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.bin");

    let graph = RelationshipGraph::load(&path, 1);
    graph.add_triple(&spec("a", "supports", "b", 0.9)).unwrap();
    graph
        .add_triple(&TripleSpec::new("r1", "indexed_as", "v1").with_kind(engram::TripleKind::Structural))
        .unwrap();

    let meta = graph.snapshot_meta().expect("sidecar present after checkpoint");
    assert_eq!(meta.total_triples, 2);
    assert!(meta.relationship_kinds.contains("associative"));
    assert!(meta.relationship_kinds.contains("structural"));
}

proptest! {
    /// No result returned by `find_related` carries confidence below the
    /// requested threshold, whatever the threshold.
    #[test]
    fn traversal_respects_confidence_filter(
        confidences in proptest::collection::vec(0.0f32..=1.0, 1..20),
        min_confidence in 0.0f32..=1.0,
    ) {
        let graph = RelationshipGraph::in_memory();
        for (i, confidence) in confidences.iter().enumerate() {
            graph
                .add_triple(&spec("hub", "relates_to", &format!("spoke{i}"), *confidence))
                .unwrap();
        }

        let related = graph.find_related("hub", 3, min_confidence).unwrap();
        for result in &related {
            prop_assert!(result.confidence >= min_confidence);
        }
    }

    /// Traversal ordering is (confidence desc, distance asc) regardless of
    /// insertion order.
    #[test]
    fn traversal_ordering_invariant(
        confidences in proptest::collection::vec(0.0f32..=1.0, 2..15),
    ) {
        let graph = RelationshipGraph::in_memory();
        for (i, confidence) in confidences.iter().enumerate() {
            graph
                .add_triple(&spec("hub", "relates_to", &format!("spoke{i}"), *confidence))
                .unwrap();
        }

        let related = graph.find_related("hub", 1, 0.0).unwrap();
        for pair in related.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}

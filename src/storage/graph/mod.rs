//! Relationship graph store.
//!
//! Persists and queries typed, confidence-scored relationships between
//! named concepts. The graph is a multigraph: multiple edges may exist
//! between the same concept pair, including with the same predicate, and
//! edges are appended, never mutated or reordered.
//!
//! # Representation
//!
//! Concepts are interned into a node arena and referenced by index; edges
//! live in a parallel append-only arena with per-node adjacency lists.
//! This avoids pointer cycles and makes snapshots trivial to serialize.
//!
//! # Durability
//!
//! The in-memory structure is flushed to a binary snapshot every
//! `checkpoint_interval` writes (plus an explicit [`RelationshipGraph::save`]).
//! A crash loses at most the last checkpoint interval of writes; this is an
//! accepted trade-off, not a bug. Checkpoint failures are logged and never
//! roll back in-memory state. A corrupt snapshot on load falls back to an
//! empty graph with a warning; startup never fails.
//!
//! # Example
//!
//! ```rust
//! use engram::storage::RelationshipGraph;
//! use engram::models::TripleSpec;
//!
//! let graph = RelationshipGraph::in_memory();
//! graph.add_triple(&TripleSpec::new("coffee", "supports", "alertness").with_confidence(0.9))?;
//!
//! let related = graph.find_related("coffee", 2, 0.5)?;
//! assert_eq!(related.len(), 1);
//! assert_eq!(related[0].concept.as_str(), "alertness");
//! # Ok::<(), engram::Error>(())
//! ```

// Allow cognitive_complexity for graph traversal algorithms.
#![allow(clippy::cognitive_complexity)]

mod snapshot;

use crate::models::{
    Concept, ConceptId, ConceptSummary, Contradiction, ContradictionEdge, EdgeId, RelatedConcept,
    Triple, TripleKind, TripleSpec, predicates_oppose,
};
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub use snapshot::SnapshotMeta;

/// An interned concept node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ConceptNode {
    pub(crate) id: String,
    pub(crate) first_seen: u64,
}

/// A stored edge, referencing nodes by arena index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EdgeRecord {
    pub(crate) subject: usize,
    pub(crate) predicate: String,
    pub(crate) object: usize,
    pub(crate) confidence: f32,
    pub(crate) importance: f32,
    pub(crate) kind: TripleKind,
    pub(crate) source: String,
    pub(crate) created_at: u64,
    pub(crate) context: String,
}

/// Mutable graph state behind the store's lock.
#[derive(Debug, Default)]
struct GraphInner {
    nodes: Vec<ConceptNode>,
    edges: Vec<EdgeRecord>,
    node_index: HashMap<String, usize>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    writes_since_checkpoint: u64,
}

impl GraphInner {
    /// Rebuilds the lookup index and adjacency lists from the arenas.
    fn from_arenas(nodes: Vec<ConceptNode>, edges: Vec<EdgeRecord>) -> Self {
        let node_index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (i, edge) in edges.iter().enumerate() {
            // An edge referencing a missing node means the snapshot is
            // internally inconsistent; drop the edge rather than crash.
            if edge.subject >= nodes.len() || edge.object >= nodes.len() {
                tracing::warn!(edge = i, "dropping edge with dangling node reference");
                continue;
            }
            outgoing[edge.subject].push(i);
            incoming[edge.object].push(i);
        }
        Self {
            nodes,
            edges,
            node_index,
            outgoing,
            incoming,
            writes_since_checkpoint: 0,
        }
    }

    /// Interns a concept, creating the node on first reference.
    fn intern(&mut self, id: &ConceptId, now: u64) -> usize {
        if let Some(&idx) = self.node_index.get(id.as_str()) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(ConceptNode {
            id: id.as_str().to_string(),
            first_seen: now,
        });
        self.node_index.insert(id.as_str().to_string(), idx);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        idx
    }

    /// Materializes the public triple for an edge index.
    fn triple(&self, edge_idx: usize) -> Triple {
        let edge = &self.edges[edge_idx];
        Triple {
            edge_id: EdgeId::from_parts(&edge.predicate, edge.created_at, edge_idx),
            subject: ConceptId::new(self.nodes[edge.subject].id.clone()),
            predicate: edge.predicate.clone(),
            object: ConceptId::new(self.nodes[edge.object].id.clone()),
            confidence: edge.confidence,
            importance: edge.importance,
            kind: edge.kind,
            source: edge.source.clone(),
            created_at: edge.created_at,
            context: edge.context.clone(),
        }
    }
}

/// Statistics about the relationship graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    /// Total number of concepts.
    pub concept_count: usize,
    /// Total number of edges.
    pub edge_count: usize,
    /// Edge counts by relationship kind.
    pub edges_by_kind: HashMap<TripleKind, usize>,
    /// Writes accumulated since the last checkpoint.
    pub writes_since_checkpoint: u64,
}

/// The relationship graph store.
///
/// Thread-safe: traversals take a read lock and may run concurrently;
/// [`add_triple`](Self::add_triple) takes the write lock.
pub struct RelationshipGraph {
    inner: RwLock<GraphInner>,
    snapshot_path: Option<PathBuf>,
    checkpoint_interval: u64,
}

impl RelationshipGraph {
    /// Creates an empty graph with no persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            snapshot_path: None,
            checkpoint_interval: u64::MAX,
        }
    }

    /// Opens a graph backed by a snapshot file.
    ///
    /// A missing snapshot starts empty; a corrupt snapshot falls back to an
    /// empty graph with a logged warning. This never fails.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>, checkpoint_interval: u64) -> Self {
        let path = path.into();
        let inner = snapshot::read(&path).map_or_else(GraphInner::default, |snap| {
            GraphInner::from_arenas(snap.nodes, snap.edges)
        });

        Self {
            inner: RwLock::new(inner),
            snapshot_path: Some(path),
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    /// Appends a new edge, creating missing concept nodes.
    ///
    /// Duplicate predicates between the same pair are a feature (repeated
    /// or overlapping claims over time), never an error. Every
    /// `checkpoint_interval` writes the graph is flushed to its snapshot;
    /// flush failures are logged and do not fail the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn add_triple(&self, spec: &TripleSpec) -> Result<EdgeId> {
        let now = current_timestamp();
        let mut inner = self.inner.write().map_err(|_| lock_error("add_triple"))?;

        let subject = inner.intern(&spec.subject, now);
        let object = inner.intern(&spec.object, now);

        let edge_idx = inner.edges.len();
        inner.edges.push(EdgeRecord {
            subject,
            predicate: spec.predicate.clone(),
            object,
            confidence: spec.confidence.clamp(0.0, 1.0),
            importance: spec.importance.clamp(0.0, 1.0),
            kind: spec.kind,
            source: spec.source.clone(),
            created_at: now,
            context: spec.context.clone(),
        });
        inner.outgoing[subject].push(edge_idx);
        inner.incoming[object].push(edge_idx);

        inner.writes_since_checkpoint += 1;
        if inner.writes_since_checkpoint >= self.checkpoint_interval {
            if let Some(ref path) = self.snapshot_path {
                // Fire-and-forget: a failed save is reported but never rolls
                // back in-memory state.
                if let Err(e) = snapshot::write(path, &inner.nodes, &inner.edges) {
                    tracing::warn!(path = %path.display(), error = %e, "graph checkpoint failed");
                }
            }
            inner.writes_since_checkpoint = 0;
        }

        let edge = &inner.edges[edge_idx];
        Ok(EdgeId::from_parts(&edge.predicate, edge.created_at, edge_idx))
    }

    /// Breadth-first traversal outward from a concept.
    ///
    /// Follows edges in both directions, pruning any edge below
    /// `min_confidence` and stopping at `max_depth` hops. Edges traversed
    /// against their direction carry an `inverse_<predicate>` label.
    /// Results are ordered by (confidence descending, distance ascending).
    ///
    /// Traversal from a nonexistent concept returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn find_related(
        &self,
        concept: &str,
        max_depth: u32,
        min_confidence: f32,
    ) -> Result<Vec<RelatedConcept>> {
        let inner = self.inner.read().map_err(|_| lock_error("find_related"))?;

        let Some(&start) = inner.node_index.get(concept) else {
            return Ok(Vec::new());
        };

        let mut visited: HashSet<usize> = HashSet::from([start]);
        let mut queue: VecDeque<(usize, u32)> = VecDeque::from([(start, 0)]);
        let mut results = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }

            for &edge_idx in &inner.outgoing[node] {
                let edge = &inner.edges[edge_idx];
                if edge.confidence < min_confidence {
                    continue;
                }
                if visited.insert(edge.object) {
                    results.push(RelatedConcept {
                        concept: ConceptId::new(inner.nodes[edge.object].id.clone()),
                        label: edge.predicate.clone(),
                        confidence: edge.confidence,
                        distance: depth + 1,
                    });
                    queue.push_back((edge.object, depth + 1));
                }
            }

            for &edge_idx in &inner.incoming[node] {
                let edge = &inner.edges[edge_idx];
                if edge.confidence < min_confidence {
                    continue;
                }
                if visited.insert(edge.subject) {
                    results.push(RelatedConcept {
                        concept: ConceptId::new(inner.nodes[edge.subject].id.clone()),
                        label: format!("inverse_{}", edge.predicate),
                        confidence: edge.confidence,
                        distance: depth + 1,
                    });
                    queue.push_back((edge.subject, depth + 1));
                }
            }
        }

        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.distance.cmp(&b.distance))
        });

        Ok(results)
    }

    /// Scans every concept pair for opposing claims.
    ///
    /// Flags a contradiction when two edges between the same pair carry
    /// opposing predicates (per the fixed table) and both exceed
    /// `min_confidence`. Quadratic in edges per pair; intended for
    /// offline/batch use, not the request path.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn detect_contradictions(&self, min_confidence: f32) -> Result<Vec<Contradiction>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| lock_error("detect_contradictions"))?;

        // Group edge indices by (subject, object) pair.
        let mut by_pair: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (i, edge) in inner.edges.iter().enumerate() {
            by_pair.entry((edge.subject, edge.object)).or_default().push(i);
        }

        let mut contradictions = Vec::new();
        let mut pairs: Vec<_> = by_pair.into_iter().collect();
        pairs.sort_by_key(|(key, _)| *key);

        for ((subject, object), edge_indices) in pairs {
            for (pos, &i) in edge_indices.iter().enumerate() {
                for &j in &edge_indices[pos + 1..] {
                    let a = &inner.edges[i];
                    let b = &inner.edges[j];
                    if a.confidence < min_confidence || b.confidence < min_confidence {
                        continue;
                    }
                    if predicates_oppose(&a.predicate, &b.predicate) {
                        contradictions.push(Contradiction {
                            subject: ConceptId::new(inner.nodes[subject].id.clone()),
                            object: ConceptId::new(inner.nodes[object].id.clone()),
                            first: ContradictionEdge {
                                edge_id: EdgeId::from_parts(&a.predicate, a.created_at, i),
                                predicate: a.predicate.clone(),
                                confidence: a.confidence,
                            },
                            second: ContradictionEdge {
                                edge_id: EdgeId::from_parts(&b.predicate, b.created_at, j),
                                predicate: b.predicate.clone(),
                                confidence: b.confidence,
                            },
                        });
                    }
                }
            }
        }

        Ok(contradictions)
    }

    /// Returns everything known about a concept, or `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn concept_summary(&self, concept: &str) -> Result<Option<ConceptSummary>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| lock_error("concept_summary"))?;

        let Some(&idx) = inner.node_index.get(concept) else {
            return Ok(None);
        };

        let node = &inner.nodes[idx];
        let outgoing = inner.outgoing[idx].iter().map(|&i| inner.triple(i)).collect();
        let incoming = inner.incoming[idx].iter().map(|&i| inner.triple(i)).collect();

        Ok(Some(ConceptSummary {
            concept: Concept {
                id: ConceptId::new(node.id.clone()),
                first_seen: node.first_seen,
            },
            outgoing,
            incoming,
        }))
    }

    /// Returns all triples with the given predicate at or above
    /// `min_confidence`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn query_by_predicate(&self, predicate: &str, min_confidence: f32) -> Result<Vec<Triple>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| lock_error("query_by_predicate"))?;

        Ok(inner
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.predicate == predicate && e.confidence >= min_confidence)
            .map(|(i, _)| inner.triple(i))
            .collect())
    }

    /// Returns statistics about the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn stats(&self) -> Result<GraphStats> {
        let inner = self.inner.read().map_err(|_| lock_error("stats"))?;

        let mut edges_by_kind: HashMap<TripleKind, usize> = HashMap::new();
        for edge in &inner.edges {
            *edges_by_kind.entry(edge.kind).or_insert(0) += 1;
        }

        Ok(GraphStats {
            concept_count: inner.nodes.len(),
            edge_count: inner.edges.len(),
            edges_by_kind,
            writes_since_checkpoint: inner.writes_since_checkpoint,
        })
    }

    /// Explicitly flushes the graph to its snapshot file.
    ///
    /// Unlike checkpoint flushes, failures here propagate to the caller.
    /// A no-op for in-memory graphs.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the filesystem write fails.
    pub fn save(&self) -> Result<()> {
        let Some(ref path) = self.snapshot_path else {
            return Ok(());
        };

        let mut inner = self.inner.write().map_err(|_| lock_error("save"))?;
        snapshot::write(path, &inner.nodes, &inner.edges)?;
        inner.writes_since_checkpoint = 0;
        Ok(())
    }

    /// Returns the snapshot metadata sidecar, when present.
    #[must_use]
    pub fn snapshot_meta(&self) -> Option<SnapshotMeta> {
        self.snapshot_path.as_deref().and_then(snapshot::read_meta)
    }

    /// Path of the backing snapshot, if persistent.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

fn lock_error(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "Lock poisoned".to_string(),
    }
}

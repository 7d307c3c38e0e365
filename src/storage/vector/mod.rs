//! Vector index implementations.
//!
//! The engine treats nearest-neighbor search as a consumed capability;
//! [`InMemoryVectorIndex`] is the in-process reference implementation
//! (exact cosine similarity over a hash map) used as the default backend
//! and in tests. Hosts with real ANN infrastructure implement
//! [`VectorIndex`](crate::storage::traits::VectorIndex) over it instead.

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]

use crate::models::{IndexedRecord, RecordId};
use crate::storage::traits::{VectorFilter, VectorHit, VectorIndex, VectorRecord};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector index with exact cosine similarity.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Upserts are keyed by record identifier within each collection, so
/// re-indexing the same item replaces rather than duplicates.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, HashMap<RecordId, VectorRecord>>>,
}

impl InMemoryVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cosine similarity floored at zero; dimension mismatches score zero.
    fn similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }

    fn lock_error(operation: &str) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        }
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn upsert(&self, collection: &str, record: &VectorRecord) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Self::lock_error("upsert"))?;

        collections
            .entry(collection.to_string())
            .or_default()
            .insert(record.record.id.clone(), record.clone());
        Ok(())
    }

    fn contains(&self, collection: &str, id: &RecordId) -> Result<bool> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::lock_error("contains"))?;

        Ok(collections
            .get(collection)
            .is_some_and(|c| c.contains_key(id)))
    }

    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        filter: &VectorFilter,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::lock_error("query"))?;

        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let min_score = filter.min_score.unwrap_or(0.0);
        let mut hits: Vec<VectorHit> = records
            .values()
            .filter(|r| filter.matches(&r.record))
            .map(|r| VectorHit {
                record: r.record.clone(),
                score: Self::similarity(embedding, &r.embedding),
            })
            .filter(|h| h.score >= min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.as_str().cmp(b.record.id.as_str()))
        });

        Ok(hits.into_iter().take(limit).collect())
    }

    fn list(&self, collection: &str, limit: usize) -> Result<Vec<IndexedRecord>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::lock_error("list"))?;

        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        // Deterministic ordering: callers re-sort by their own strategy.
        let mut listed: Vec<IndexedRecord> = records.values().map(|r| r.record.clone()).collect();
        listed.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

        Ok(listed.into_iter().take(limit).collect())
    }

    fn drop_collection(&self, collection: &str) -> Result<bool> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Self::lock_error("drop_collection"))?;

        Ok(collections.remove(collection).is_some())
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::lock_error("count"))?;

        Ok(collections.get(collection).map_or(0, HashMap::len))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::models::{MemoryModule, RecordFields};

    fn record(id: &str, content: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord::new(
            IndexedRecord::new(
                RecordId::new(id),
                MemoryModule::Notes,
                content,
                RecordFields::at(0),
            ),
            embedding,
        )
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let index = InMemoryVectorIndex::new();
        index.upsert("c", &record("r1", "first", vec![1.0, 0.0])).unwrap();
        index.upsert("c", &record("r1", "second", vec![0.0, 1.0])).unwrap();

        assert_eq!(index.count("c").unwrap(), 1);
        let listed = index.list("c", 10).unwrap();
        assert_eq!(listed[0].content, "second");
    }

    #[test]
    fn test_contains_point_lookup() {
        let index = InMemoryVectorIndex::new();
        index.upsert("c", &record("r1", "x", vec![1.0])).unwrap();

        assert!(index.contains("c", &RecordId::new("r1")).unwrap());
        assert!(!index.contains("c", &RecordId::new("r2")).unwrap());
        assert!(!index.contains("missing", &RecordId::new("r1")).unwrap());
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let index = InMemoryVectorIndex::new();
        index.upsert("c", &record("close", "x", vec![1.0, 0.0])).unwrap();
        index.upsert("c", &record("far", "y", vec![0.0, 1.0])).unwrap();
        index.upsert("c", &record("mid", "z", vec![1.0, 1.0])).unwrap();

        let hits = index
            .query("c", &[1.0, 0.0], &VectorFilter::new(), 10)
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["close", "mid", "far"]);
    }

    #[test]
    fn test_query_missing_collection_is_empty() {
        let index = InMemoryVectorIndex::new();
        assert!(
            index
                .query("missing", &[1.0], &VectorFilter::new(), 10)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_query_min_score_filter() {
        let index = InMemoryVectorIndex::new();
        index.upsert("c", &record("r1", "x", vec![1.0, 0.0])).unwrap();
        index.upsert("c", &record("r2", "y", vec![0.0, 1.0])).unwrap();

        let filter = VectorFilter::new().with_min_score(0.5);
        let hits = index.query("c", &[1.0, 0.0], &filter, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id.as_str(), "r1");
    }

    #[test]
    fn test_drop_collection_best_effort() {
        let index = InMemoryVectorIndex::new();
        index.upsert("c", &record("r1", "x", vec![1.0])).unwrap();

        assert!(index.drop_collection("c").unwrap());
        assert!(!index.drop_collection("c").unwrap());
        assert_eq!(index.count("c").unwrap(), 0);
    }
}

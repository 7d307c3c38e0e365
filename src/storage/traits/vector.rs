//! Vector index trait.
//!
//! Provides the abstraction layer for the vector similarity search
//! capability the engine consumes. ANN algorithm internals are out of
//! scope; the engine depends only on this contract.
//!
//! # Contract Summary
//!
//! | Operation | Notes |
//! |-----------|-------|
//! | `upsert` | Idempotent by record identifier within a collection |
//! | `contains` | Point lookup; the indexer's idempotency check |
//! | `query` | Similarity search, descending score |
//! | `list` | Unranked listing for recency/importance strategies |
//! | `drop_collection` | Best-effort; missing collection returns `false` |
//!
//! # Usage Example
//!
//! ```rust
//! use engram::storage::{InMemoryVectorIndex, VectorIndex, VectorRecord, VectorFilter};
//! use engram::models::{IndexedRecord, MemoryModule, RecordFields, RecordId};
//!
//! let index = InMemoryVectorIndex::new();
//! let record = IndexedRecord::new(
//!     RecordId::new("notes_abc"),
//!     MemoryModule::Notes,
//!     "Espresso beats drip coffee",
//!     RecordFields::at(0),
//! );
//! index.upsert("memory_notes", &VectorRecord::new(record, vec![1.0, 0.0]))?;
//! let hits = index.query("memory_notes", &[1.0, 0.0], &VectorFilter::new(), 5)?;
//! assert_eq!(hits.len(), 1);
//! # Ok::<(), engram::Error>(())
//! ```

use crate::Result;
use crate::models::{IndexedRecord, RecordId};

/// A record plus its embedding, as stored in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// The indexed record payload (content and scalar fields).
    pub record: IndexedRecord,
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// Creates a vector record.
    #[must_use]
    pub const fn new(record: IndexedRecord, embedding: Vec<f32>) -> Self {
        Self { record, embedding }
    }
}

/// One similarity-search result.
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// The matched record.
    pub record: IndexedRecord,
    /// Similarity score (0.0 to 1.0), higher is closer.
    pub score: f32,
}

/// Filter criteria for vector queries.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    /// Minimum similarity score (0.0 to 1.0).
    pub min_score: Option<f32>,
    /// Require all of these tags on matched records.
    pub tags: Vec<String>,
}

impl VectorFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_score: None,
            tags: Vec::new(),
        }
    }

    /// Sets the minimum score threshold.
    #[must_use]
    pub const fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = Some(score);
        self
    }

    /// Adds a required tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns true if a record passes the scalar portion of the filter.
    #[must_use]
    pub fn matches(&self, record: &IndexedRecord) -> bool {
        self.tags.iter().all(|t| record.fields.tags.contains(t))
    }
}

/// Trait for vector index backends.
///
/// Implementations must be thread-safe (`Send + Sync`); methods take
/// `&self` so backends can be shared via `Arc<dyn VectorIndex>`, using
/// interior mutability for mutable state.
///
/// Upserts are keyed by record identifier: writing the same identifier
/// twice replaces the stored record rather than duplicating it. This is
/// what makes concurrent indexer/orchestrator interleavings safe.
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces a record in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert operation fails.
    fn upsert(&self, collection: &str, record: &VectorRecord) -> Result<()>;

    /// Point lookup: does the collection already hold this identifier?
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn contains(&self, collection: &str, id: &RecordId) -> Result<bool>;

    /// Searches a collection for records similar to the query embedding.
    ///
    /// Returns hits ordered by descending similarity, truncated to `limit`.
    /// Querying a missing collection returns an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the search operation fails.
    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        filter: &VectorFilter,
        limit: usize,
    ) -> Result<Vec<VectorHit>>;

    /// Lists up to `limit` records of a collection without ranking.
    ///
    /// Used by retrieval strategies that order by recency or importance
    /// instead of similarity. A missing collection yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    fn list(&self, collection: &str, limit: usize) -> Result<Vec<IndexedRecord>>;

    /// Drops an entire collection.
    ///
    /// Returns `true` if the collection existed. Missing collections are
    /// not an error (rebuilds are best-effort).
    ///
    /// # Errors
    ///
    /// Returns an error if the drop operation fails.
    fn drop_collection(&self, collection: &str) -> Result<bool>;

    /// Returns the number of records in a collection (0 when missing).
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self, collection: &str) -> Result<usize>;
}

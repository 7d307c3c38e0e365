//! # Engram
//!
//! A cross-layer memory retrieval engine for conversational agents.
//!
//! Engram persists everything an agent learns across three storage layers
//! (record store, vector index, relationship graph), keeps them mutually
//! consistent, and reconstructs bounded, relevance-ranked context on demand.
//!
//! ## Architecture
//!
//! - **Relationship graph**: typed, confidence-scored triples between named
//!   concepts, with multigraph append-only semantics and BFS traversal
//! - **Incremental indexer**: synchronizes heterogeneous on-disk memory
//!   sources into the vector index exactly once per unique item
//! - **Context assembler**: five-factor relevance scoring and token-budgeted
//!   context windows across prioritized memory modules
//! - **Orchestrator**: single `remember`/`reconstruct`/`search` entry point
//!   fanning out across all three layers with a quality gate guarding the
//!   graph
//!
//! ## Example
//!
//! ```rust,ignore
//! use engram::{EngineConfig, MemoryOrchestrator, RememberRequest, ItemType};
//!
//! let orchestrator = MemoryOrchestrator::new(&config, record_store, vector, graph, embedder);
//! let receipt = orchestrator.remember(RememberRequest {
//!     content: "The user prefers concise answers".to_string(),
//!     item_type: ItemType::ConsolidatedFact,
//!     ..Default::default()
//! })?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod indexer;
pub mod models;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{EngineConfig, GlobalIndexSettings, IndexSettings, ModuleIndexConfig};
pub use embedding::Embedder;
pub use models::{
    AssembledContext, Contradiction, IndexedRecord, ItemType, MemoryLayer, MemoryModule, RecordId,
    ReconstructedContext, RelatedConcept, RelationshipClaim, RelevanceScore, RememberReceipt,
    RememberRequest, ScoreWeights, Triple, TripleKind, TripleSpec,
};
pub use services::{ContextAssembler, MemoryOrchestrator};
pub use storage::{
    InMemoryVectorIndex, MarkdownRecordStore, RecordStore, RelationshipGraph, VectorIndex,
};

/// Error type for engram operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty content, malformed markers, out-of-range parameters |
/// | `OperationFailed` | I/O errors, poisoned locks, serialization failures |
/// | `Timeout` | A bounded external call (vector query, embedding) overran its budget |
///
/// Not-found conditions are *not* errors in this crate: a missing concept,
/// module, or record yields an explicit empty result (`Ok(None)`, empty
/// `Vec`) so callers degrade instead of failing.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Required content is empty in a `remember` call
    /// - A relevance weight table does not sum to 1.0
    /// - An embedding has the wrong dimensionality for the index
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - A storage lock is poisoned
    /// - Snapshot or settings serialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A bounded external call exceeded its time budget.
    ///
    /// Raised when a vector query or embedding call overruns the
    /// caller-supplied timeout. Callers on the retrieval path treat this
    /// as a degrade signal (graph-only context), not a hard failure.
    #[error("operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Elapsed time in milliseconds when the call was abandoned.
        elapsed_ms: u64,
    },
}

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized to avoid duplicate implementations across the codebase.
/// Uses `SystemTime::now()` with fallback to 0 if the system clock is
/// before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use engram::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::Timeout {
            operation: "vector_query".to_string(),
            elapsed_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "operation 'vector_query' timed out after 250ms"
        );
    }

    #[test]
    fn test_current_timestamp_monotonic_enough() {
        let a = current_timestamp();
        let b = current_timestamp();
        assert!(b >= a);
    }
}

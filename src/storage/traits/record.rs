//! Record store trait.
//!
//! The record store is the append-only persistence layer for
//! human-readable artifacts. The engine depends only on "accepts content,
//! returns a stable path/id"; rendering templates and directory
//! bootstrapping belong to the surrounding runtime.

use crate::Result;
use crate::models::MemoryModule;

/// A human-readable artifact to persist.
#[derive(Debug, Clone)]
pub struct RecordArtifact {
    /// Artifact identifier (becomes part of the stable path).
    pub id: String,
    /// Memory module the artifact belongs to.
    pub module: MemoryModule,
    /// Markdown body.
    pub content: String,
    /// Front-matter metadata.
    pub metadata: serde_json::Value,
}

impl RecordArtifact {
    /// Creates an artifact with empty metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, module: MemoryModule, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module,
            content: content.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Sets the front-matter metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Trait for append-only record stores.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes are
/// append-only: an artifact, once written, is never updated in place.
pub trait RecordStore: Send + Sync {
    /// Persists an artifact and returns its stable path/id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&self, artifact: &RecordArtifact) -> Result<String>;
}

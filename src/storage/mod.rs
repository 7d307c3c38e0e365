//! Storage layer abstraction.
//!
//! This module provides the three storage layers the engine orchestrates:
//! - **Record store**: authoritative, append-only human-readable artifacts
//! - **Vector**: embedding similarity search (consumed capability)
//! - **Graph**: typed relationships between named concepts
//!
//! The record store and vector layers are trait-abstracted with in-process
//! default implementations; the relationship graph is owned by this crate.

pub mod graph;
pub mod record;
pub mod traits;
pub mod vector;

pub use graph::{GraphStats, RelationshipGraph, SnapshotMeta};
pub use record::MarkdownRecordStore;
pub use traits::{RecordArtifact, RecordStore, VectorFilter, VectorHit, VectorIndex, VectorRecord};
pub use vector::InMemoryVectorIndex;

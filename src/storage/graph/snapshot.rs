//! Snapshot persistence for the relationship graph.
//!
//! The snapshot is a bincode-encoded dump of the node and edge arenas;
//! a JSON metadata sidecar (`<snapshot>.meta.json`) records creation and
//! update times, the triple count, and the distinct relationship kinds.
//! Sidecar write failures are logged and never propagated; the sidecar is
//! informational.

use super::{ConceptNode, EdgeRecord};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Serialized graph arenas.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GraphSnapshot {
    pub(crate) nodes: Vec<ConceptNode>,
    pub(crate) edges: Vec<EdgeRecord>,
}

/// JSON metadata sidecar written next to the binary snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// When the snapshot file was first created.
    pub created_at: DateTime<Utc>,
    /// When the snapshot was last updated.
    pub last_updated: DateTime<Utc>,
    /// Total number of triples in the snapshot.
    pub total_triples: usize,
    /// Distinct relationship kinds present.
    pub relationship_kinds: BTreeSet<String>,
}

/// Path of the metadata sidecar for a snapshot path.
fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(
        || std::ffi::OsString::from("graph.bin"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".meta.json");
    path.with_file_name(name)
}

/// Reads a snapshot, returning `None` (with a warning) on a missing or
/// corrupt file. Callers fall back to an empty graph.
pub(crate) fn read(path: &Path) -> Option<GraphSnapshot> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to read graph snapshot, starting empty");
            }
            return None;
        }
    };

    match bincode::deserialize(&bytes) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt graph snapshot, starting empty");
            None
        }
    }
}

/// Writes the snapshot and refreshes the metadata sidecar.
pub(crate) fn write(path: &Path, nodes: &[ConceptNode], edges: &[EdgeRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "write_graph_snapshot".to_string(),
            cause: e.to_string(),
        })?;
    }

    let snapshot = GraphSnapshot {
        nodes: nodes.to_vec(),
        edges: edges.to_vec(),
    };
    let bytes = bincode::serialize(&snapshot).map_err(|e| Error::OperationFailed {
        operation: "write_graph_snapshot".to_string(),
        cause: e.to_string(),
    })?;
    std::fs::write(path, bytes).map_err(|e| Error::OperationFailed {
        operation: "write_graph_snapshot".to_string(),
        cause: e.to_string(),
    })?;

    write_meta(path, edges);
    Ok(())
}

/// Refreshes the sidecar, preserving the original creation time.
fn write_meta(path: &Path, edges: &[EdgeRecord]) {
    let now = Utc::now();
    let created_at = read_meta(path).map_or(now, |m| m.created_at);

    let meta = SnapshotMeta {
        created_at,
        last_updated: now,
        total_triples: edges.len(),
        relationship_kinds: edges.iter().map(|e| e.kind.as_str().to_string()).collect(),
    };

    let target = meta_path(path);
    let result = serde_json::to_string_pretty(&meta)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&target, json).map_err(|e| e.to_string()));
    if let Err(e) = result {
        tracing::warn!(path = %target.display(), error = %e, "failed to write snapshot metadata");
    }
}

/// Reads the metadata sidecar, if present and well-formed.
pub(crate) fn read_meta(path: &Path) -> Option<SnapshotMeta> {
    let contents = std::fs::read_to_string(meta_path(path)).ok()?;
    serde_json::from_str(&contents).ok()
}

//! Record store implementations.
//!
//! [`MarkdownRecordStore`] persists human-readable artifacts as markdown
//! files with YAML front matter, one file per artifact, under
//! `<root>/<module>/`. Writes are append-only: an existing file is never
//! rewritten; colliding ids get a uniquifying suffix.
//!
//! Front matter format:
//! ```text
//! ---
//! item_type: consolidated_fact
//! importance: 0.8
//! tags: [coffee]
//! ---
//! The actual artifact content here.
//! ```

use crate::storage::traits::{RecordArtifact, RecordStore};
use crate::{Error, Result};
use std::path::PathBuf;

/// Filesystem record store writing front-matter markdown files.
#[derive(Debug, Clone)]
pub struct MarkdownRecordStore {
    root: PathBuf,
}

impl MarkdownRecordStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serializes metadata and body into a front-matter document.
    fn render(artifact: &RecordArtifact) -> Result<String> {
        let yaml =
            serde_yaml_ng::to_string(&artifact.metadata).map_err(|e| Error::OperationFailed {
                operation: "render_front_matter".to_string(),
                cause: e.to_string(),
            })?;
        Ok(format!("---\n{}---\n{}\n", yaml, artifact.content))
    }
}

impl RecordStore for MarkdownRecordStore {
    fn append(&self, artifact: &RecordArtifact) -> Result<String> {
        if artifact.content.trim().is_empty() {
            return Err(Error::InvalidInput("Content cannot be empty".to_string()));
        }

        let dir = self.root.join(artifact.module.as_str());
        std::fs::create_dir_all(&dir).map_err(|e| Error::OperationFailed {
            operation: "append_record".to_string(),
            cause: e.to_string(),
        })?;

        // Append-only: never overwrite an existing artifact.
        let mut path = dir.join(format!("{}.md", artifact.id));
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!("{}-{attempt}.md", artifact.id));
            attempt += 1;
        }

        let document = Self::render(artifact)?;
        std::fs::write(&path, document).map_err(|e| Error::OperationFailed {
            operation: "append_record".to_string(),
            cause: e.to_string(),
        })?;

        let stable = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();
        Ok(stable)
    }
}

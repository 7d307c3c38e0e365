//! Incremental memory indexer.
//!
//! Scans heterogeneous on-disk memory sources, converts them to searchable
//! records, and pushes each unique item to the vector index exactly once.
//! Indexing is decoupled from the orchestrator's write path so content
//! authored outside it (externally edited source files) becomes eventually
//! consistent with the searchable index.
//!
//! # Idempotency
//!
//! Every discovered item gets a deterministic identifier from
//! `(module, source path or content hash)`. Before embedding, the indexer
//! performs a point lookup against the vector index and skips items that
//! are already present unless a forced reindex is requested. The point
//! lookup trades one cheap check per candidate for avoiding duplicate
//! embeddings, which are the dominant cost. Because the eventual write is
//! an upsert by identifier, the indexer is safe to run concurrently with
//! live `remember` traffic: at worst it performs one redundant lookup,
//! never a duplicate write.
//!
//! # Module State Machine
//!
//! `Disabled → Enabled(never indexed) → Enabled(partially indexed) →
//! Enabled(fully indexed)`; transitions are driven by config toggles and
//! indexing runs. Normal operation never deletes indexed records; only
//! [`MemoryIndexer::rebuild_index`] drops a module's collection.

mod extractors;

pub use extractors::{ExtractedItem, ModuleExtractor};

use crate::config::{EngineConfig, IndexSettings};
use crate::embedding::Embedder;
use crate::models::{IndexedRecord, MemoryModule, RecordId};
use crate::storage::traits::{VectorIndex, VectorRecord};
use crate::{Error, Result, current_timestamp};
use extractors::{BulletExtractor, NoteExtractor, SectionExtractor, TranscriptExtractor};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::instrument;

/// Outcome of indexing one module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Items newly pushed to the vector index.
    pub indexed: usize,
    /// Items skipped by the idempotency check.
    pub skipped: usize,
}

/// Service that synchronizes memory sources into the vector index.
pub struct MemoryIndexer {
    memory_root: PathBuf,
    settings_path: PathBuf,
    settings: RwLock<IndexSettings>,
    registry: HashMap<MemoryModule, Box<dyn ModuleExtractor>>,
    vector: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryIndexer {
    /// Creates an indexer, loading persisted settings for the memory root.
    ///
    /// The extractor registry is resolved once here; dispatch is by module
    /// enum, never by string.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        vector: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let settings_path = config.index_settings_path();
        let settings = IndexSettings::load(&settings_path);

        Self {
            memory_root: config.memory_root.clone(),
            settings_path,
            settings: RwLock::new(settings),
            registry: Self::build_registry(),
            vector,
            embedder,
        }
    }

    /// Builds the module-to-extractor registry.
    fn build_registry() -> HashMap<MemoryModule, Box<dyn ModuleExtractor>> {
        let mut registry: HashMap<MemoryModule, Box<dyn ModuleExtractor>> = HashMap::new();
        registry.insert(MemoryModule::Notes, Box::new(NoteExtractor));
        registry.insert(MemoryModule::Transcripts, Box::new(TranscriptExtractor));
        registry.insert(MemoryModule::Identity, Box::new(SectionExtractor));
        registry.insert(MemoryModule::ActiveFocus, Box::new(SectionExtractor));
        registry.insert(MemoryModule::Episodic, Box::new(SectionExtractor));
        registry.insert(MemoryModule::Semantic, Box::new(SectionExtractor));
        registry.insert(MemoryModule::Documents, Box::new(SectionExtractor));
        registry.insert(MemoryModule::People, Box::new(BulletExtractor));
        registry.insert(MemoryModule::Links, Box::new(BulletExtractor));
        registry
    }

    /// Returns a copy of the current index settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn settings(&self) -> Result<IndexSettings> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|_| lock_error("settings"))
    }

    /// Enables or disables indexing for a module.
    ///
    /// Disabling halts manual and automatic indexing but never deletes
    /// already-indexed records.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn set_module_enabled(&self, module: MemoryModule, enabled: bool) -> Result<()> {
        let mut settings = self
            .settings
            .write()
            .map_err(|_| lock_error("set_module_enabled"))?;
        settings.set_enabled(module, enabled);
        self.persist_settings(&settings);
        Ok(())
    }

    /// Indexes one module's sources.
    ///
    /// Returns the number of items newly indexed. A disabled module
    /// returns 0 without error. Per-item extraction or embedding failures
    /// are logged and skipped; they never abort the module.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector layer fails or a lock is poisoned.
    #[instrument(skip(self), fields(module = %module))]
    pub fn index_module(&self, module: MemoryModule, force_reindex: bool) -> Result<usize> {
        let start = Instant::now();
        let result = self.index_module_inner(module, force_reindex);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "memory_index_runs_total",
            "module" => module.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("memory_index_duration_ms", "module" => module.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        result.map(|outcome| outcome.indexed)
    }

    fn index_module_inner(&self, module: MemoryModule, force_reindex: bool) -> Result<IndexOutcome> {
        let (enabled, table_name) = {
            let settings = self
                .settings
                .read()
                .map_err(|_| lock_error("index_module"))?;
            let enabled = settings.is_enabled(module);
            let table = settings
                .module(module)
                .map_or_else(|| module.default_collection(), |c| c.table_name.clone());
            (enabled, table)
        };

        if !enabled {
            tracing::debug!(module = %module, "module disabled, skipping index run");
            return Ok(IndexOutcome::default());
        }

        let Some(extractor) = self.registry.get(&module) else {
            tracing::debug!(module = %module, "no extractor registered");
            return Ok(IndexOutcome::default());
        };

        let module_dir = self.memory_root.join(module.as_str());
        let items = extractor.extract(&module_dir)?;

        let mut outcome = IndexOutcome::default();
        for item in items {
            let id = RecordId::deterministic(module, &item.seed);

            // Idempotency: a point lookup, not a full re-embed.
            if !force_reindex && self.vector.contains(&table_name, &id)? {
                outcome.skipped += 1;
                continue;
            }

            let embedding = match self.embedder.embed(&item.content) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(module = %module, seed = %item.seed, error = %e, "embedding failed, item skipped");
                    continue;
                }
            };

            let record = IndexedRecord::new(id, module, item.content, item.fields);
            self.vector
                .upsert(&table_name, &VectorRecord::new(record, embedding))?;
            outcome.indexed += 1;
        }

        metrics::counter!("memory_index_items_total", "module" => module.as_str())
            .increment(outcome.indexed as u64);

        {
            let mut settings = self
                .settings
                .write()
                .map_err(|_| lock_error("index_module"))?;
            settings.record_run(module, outcome.indexed as u64, current_timestamp());
            self.persist_settings(&settings);
        }

        tracing::debug!(
            module = %module,
            indexed = outcome.indexed,
            skipped = outcome.skipped,
            "index run complete"
        );
        Ok(outcome)
    }

    /// Indexes all enabled modules.
    ///
    /// A failure in one module is caught, logged, and recorded as 0 for
    /// that module; it does not abort the others.
    #[instrument(skip(self))]
    pub fn index_all_enabled(&self, force_reindex: bool) -> BTreeMap<MemoryModule, usize> {
        let mut counts = BTreeMap::new();

        for module in MemoryModule::all() {
            let enabled = self
                .settings
                .read()
                .map(|s| s.is_enabled(*module))
                .unwrap_or(false);
            if !enabled {
                continue;
            }

            match self.index_module(*module, force_reindex) {
                Ok(count) => {
                    counts.insert(*module, count);
                }
                Err(e) => {
                    tracing::warn!(module = %module, error = %e, "module indexing failed");
                    counts.insert(*module, 0);
                }
            }
        }

        counts
    }

    /// Drops a module's collection and performs a forced full reindex.
    ///
    /// The drop is best-effort; a missing collection is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the forced reindex fails.
    #[instrument(skip(self), fields(module = %module))]
    pub fn rebuild_index(&self, module: MemoryModule) -> Result<usize> {
        let table_name = {
            let settings = self
                .settings
                .read()
                .map_err(|_| lock_error("rebuild_index"))?;
            settings
                .module(module)
                .map_or_else(|| module.default_collection(), |c| c.table_name.clone())
        };

        match self.vector.drop_collection(&table_name) {
            Ok(existed) => {
                tracing::debug!(module = %module, existed, "dropped collection for rebuild");
            }
            Err(e) => {
                tracing::warn!(module = %module, error = %e, "collection drop failed, rebuilding anyway");
            }
        }

        self.index_module(module, true)
    }

    /// Saves settings after a mutation; failures are logged, never fatal.
    fn persist_settings(&self, settings: &IndexSettings) {
        if let Err(e) = settings.save(&self.settings_path) {
            tracing::warn!(path = %self.settings_path.display(), error = %e, "failed to persist index settings");
        }
    }
}

fn lock_error(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "Lock poisoned".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::storage::InMemoryVectorIndex;

    fn indexer_with_root(root: &std::path::Path) -> MemoryIndexer {
        let config = EngineConfig::new()
            .with_memory_root(root)
            .with_data_dir(root.join(".engram"));
        MemoryIndexer::new(&config, Arc::new(InMemoryVectorIndex::new()), Arc::new(HashEmbedder::new()))
    }

    fn write_note(root: &std::path::Path, name: &str, content: &str) {
        let dir = root.join("notes");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_index_module_counts_new_items() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "a.md", "First note");
        write_note(dir.path(), "b.md", "Second note");

        let indexer = indexer_with_root(dir.path());
        assert_eq!(indexer.index_module(MemoryModule::Notes, false).unwrap(), 2);
    }

    #[test]
    fn test_second_run_indexes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "a.md", "First note");

        let indexer = indexer_with_root(dir.path());
        assert_eq!(indexer.index_module(MemoryModule::Notes, false).unwrap(), 1);
        assert_eq!(indexer.index_module(MemoryModule::Notes, false).unwrap(), 0);
    }

    #[test]
    fn test_disabled_module_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "a.md", "Some note");

        let indexer = indexer_with_root(dir.path());
        indexer.set_module_enabled(MemoryModule::Notes, false).unwrap();
        assert_eq!(indexer.index_module(MemoryModule::Notes, false).unwrap(), 0);
    }

    #[test]
    fn test_settings_updated_after_run() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "a.md", "Some note");

        let indexer = indexer_with_root(dir.path());
        indexer.index_module(MemoryModule::Notes, false).unwrap();

        let settings = indexer.settings().unwrap();
        let config = settings.module(MemoryModule::Notes).unwrap();
        assert_eq!(config.index_count, 1);
        assert!(config.last_indexed.is_some());
    }
}

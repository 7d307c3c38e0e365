//! Configuration management.
//!
//! Two configuration layers exist:
//!
//! - [`EngineConfig`]: runtime wiring (paths, checkpoint interval, budgets,
//!   timeouts), constructed by the host and passed by reference into each
//!   component's constructor. Never read from global state.
//! - [`IndexSettings`]: the persisted per-module indexing policy, one JSON
//!   document per memory root, with an explicit [`IndexSettings::save`] /
//!   [`IndexSettings::load`] pair. Corrupt or missing documents load as
//!   defaults with a logged warning.

use crate::models::{MemoryModule, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Timeouts for bounded external calls.
#[derive(Debug, Clone, Copy)]
pub struct OperationTimeouts {
    /// Budget for one vector-index query, in milliseconds.
    pub vector_query_ms: u64,
    /// Budget for one embedding call, in milliseconds.
    pub embed_ms: u64,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            vector_query_ms: 2_000,
            embed_ms: 5_000,
        }
    }
}

/// Main configuration for the memory engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory containing the on-disk memory sources, one
    /// subdirectory per module.
    pub memory_root: PathBuf,
    /// Directory for engine-owned state (graph snapshot, index settings,
    /// record artifacts).
    pub data_dir: PathBuf,
    /// Number of graph writes between persistence checkpoints.
    pub graph_checkpoint_interval: u64,
    /// Global token budget for assembled context windows.
    pub max_context_tokens: usize,
    /// Relevance aggregation weights.
    pub score_weights: ScoreWeights,
    /// Timeouts for external calls.
    pub timeouts: OperationTimeouts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_root: PathBuf::from("."),
            data_dir: default_data_dir(),
            graph_checkpoint_interval: 10,
            max_context_tokens: 2_000,
            score_weights: ScoreWeights::default(),
            timeouts: OperationTimeouts::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memory root.
    #[must_use]
    pub fn with_memory_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_root = path.into();
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the graph checkpoint interval.
    #[must_use]
    pub const fn with_checkpoint_interval(mut self, writes: u64) -> Self {
        self.graph_checkpoint_interval = writes;
        self
    }

    /// Sets the global context token budget.
    #[must_use]
    pub const fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    /// Path of the persisted index settings document for this memory root.
    #[must_use]
    pub fn index_settings_path(&self) -> PathBuf {
        self.data_dir.join("index_settings.json")
    }

    /// Path of the graph snapshot file.
    #[must_use]
    pub fn graph_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("graph.bin")
    }
}

/// Resolves the platform data directory, falling back to `.engram`.
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "engram")
        .map_or_else(|| PathBuf::from(".engram"), |d| d.data_dir().to_path_buf())
}

/// Per-module indexing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIndexConfig {
    /// Whether the module participates in indexing at all. Disabling halts
    /// manual and automatic indexing but never deletes indexed records.
    pub enabled: bool,
    /// Target vector-index collection name.
    pub table_name: String,
    /// Unix timestamp of the last completed indexing run.
    pub last_indexed: Option<u64>,
    /// Cumulative count of items indexed for this module.
    pub index_count: u64,
    /// Whether writes through the orchestrator index this module's records
    /// immediately.
    pub auto_update: bool,
}

impl ModuleIndexConfig {
    /// Default policy for a module: enabled, auto-updating, never indexed.
    #[must_use]
    pub fn for_module(module: MemoryModule) -> Self {
        Self {
            enabled: true,
            table_name: module.default_collection(),
            last_indexed: None,
            index_count: 0,
            auto_update: true,
        }
    }
}

/// Global indexing settings shared across modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalIndexSettings {
    /// Index new records at `remember` time.
    pub auto_index_on_create: bool,
    /// Re-index records when their source is updated.
    pub auto_index_on_update: bool,
    /// Per-module token budget for context assembly.
    pub max_tokens_per_module: usize,
    /// Whether assembled context is injected into prompts dynamically.
    pub dynamic_injection_enabled: bool,
}

impl Default for GlobalIndexSettings {
    fn default() -> Self {
        Self {
            auto_index_on_create: true,
            auto_index_on_update: true,
            max_tokens_per_module: 400,
            dynamic_injection_enabled: true,
        }
    }
}

/// Persisted indexing policy for one memory root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Per-module policies, keyed by module.
    pub modules: BTreeMap<MemoryModule, ModuleIndexConfig>,
    /// Global settings.
    pub global: GlobalIndexSettings,
}

impl Default for IndexSettings {
    fn default() -> Self {
        let modules = MemoryModule::all()
            .iter()
            .map(|m| (*m, ModuleIndexConfig::for_module(*m)))
            .collect();
        Self {
            modules,
            global: GlobalIndexSettings::default(),
        }
    }
}

impl IndexSettings {
    /// Creates settings with defaults for every module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the policy for a module, if configured.
    #[must_use]
    pub fn module(&self, module: MemoryModule) -> Option<&ModuleIndexConfig> {
        self.modules.get(&module)
    }

    /// Returns true if the module is enabled for indexing.
    #[must_use]
    pub fn is_enabled(&self, module: MemoryModule) -> bool {
        self.modules.get(&module).is_some_and(|c| c.enabled)
    }

    /// Enables or disables a module, creating its default policy if absent.
    pub fn set_enabled(&mut self, module: MemoryModule, enabled: bool) {
        self.modules
            .entry(module)
            .or_insert_with(|| ModuleIndexConfig::for_module(module))
            .enabled = enabled;
    }

    /// Records a completed indexing run for a module.
    pub fn record_run(&mut self, module: MemoryModule, items: u64, at: u64) {
        let config = self
            .modules
            .entry(module)
            .or_insert_with(|| ModuleIndexConfig::for_module(module));
        config.last_indexed = Some(at);
        config.index_count = config.index_count.saturating_add(items);
    }

    /// Loads settings from a JSON document.
    ///
    /// Missing or corrupt documents yield defaults with a logged warning;
    /// this never fails startup.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read index settings, using defaults");
                }
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt index settings, using defaults");
                Self::default()
            }
        }
    }

    /// Saves settings as a JSON document, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the filesystem write fails.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::Error::OperationFailed {
                operation: "save_index_settings".to_string(),
                cause: e.to_string(),
            })?;
        }

        let contents =
            serde_json::to_string_pretty(self).map_err(|e| crate::Error::OperationFailed {
                operation: "save_index_settings".to_string(),
                cause: e.to_string(),
            })?;

        std::fs::write(path, contents).map_err(|e| crate::Error::OperationFailed {
            operation: "save_index_settings".to_string(),
            cause: e.to_string(),
        })
    }
}

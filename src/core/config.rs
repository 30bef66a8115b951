//! Engine configuration.
//!
//! Games configure the manager at startup. The defaults suit most uses;
//! the only knobs are the ones that bound cascades and pick snapshot
//! behaviour.

use serde::{Deserialize, Serialize};

use super::error::BuffError;

/// Configuration for a [`BuffManager`](crate::manager::BuffManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of passes over the deferred command queue after a
    /// top-level operation. Hooks that keep queueing commands past this
    /// bound have the remainder dropped with a warning.
    pub max_deferred_passes: usize,

    /// Whether [`BuffManager::snapshot`](crate::manager::BuffManager::snapshot)
    /// includes hook module state.
    pub snapshot_modules: bool,
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deferred pass bound.
    #[must_use]
    pub fn with_max_deferred_passes(mut self, passes: usize) -> Self {
        self.max_deferred_passes = passes;
        self
    }

    /// Set whether snapshots include module state.
    #[must_use]
    pub fn with_snapshot_modules(mut self, include: bool) -> Self {
        self.snapshot_modules = include;
        self
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BuffError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_deferred_passes: 16,
            snapshot_modules: true,
        }
    }
}

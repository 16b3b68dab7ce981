//! Engine configuration.

use crate::board::OperatingMode;
use crate::core::Result;
use crate::reputation::Ruleset;
use crate::state::{resolve_state_path, DEFAULT_COMPACTION_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the consensus engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base ruleset; requests may override individual values
    pub default_ruleset: Ruleset,
    /// Mode used when a guard request names none
    pub default_mode: OperatingMode,
    /// Superseded log entries tolerated before compaction
    pub compaction_threshold: usize,
    /// State log location
    pub state_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ruleset: Ruleset::default(),
            default_mode: OperatingMode::Persona,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            state_path: None,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.default_ruleset.validate()?;
        Ok(config)
    }

    /// Set the base ruleset.
    pub fn with_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.default_ruleset = ruleset;
        self
    }

    /// Set the default operating mode.
    pub fn with_default_mode(mut self, mode: OperatingMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Set the state log path.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Effective state path, falling back to the environment and default.
    pub fn resolved_state_path(&self) -> PathBuf {
        resolve_state_path(self.state_path.clone())
    }
}

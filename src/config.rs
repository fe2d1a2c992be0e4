//! Editor configuration
//!
//! A JSON file with one section per concern. Every section and field is
//! optional; anything missing takes its default.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::{CsvFormat, LoopSettings, PeakSettings};
use crate::error::Result;
use crate::export::ExportLimits;
use crate::merge::{ConflictDecision, MergeEngine};
use crate::state::DEFAULT_MAX_UNDO_LEVELS;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub history: HistorySection,
    pub loops: LoopSettings,
    pub peaks: PeakSettings,
    pub csv: CsvFormat,
    pub merge: MergeSection,
    pub export: ExportLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub max_undo_levels: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSection {
    /// Fail on collisions nobody decided instead of ignoring them
    pub strict: bool,
    /// Answer given to every name collision; unset leaves them unresolved
    pub on_conflict: Option<ConflictDecision>,
}

impl MergeSection {
    pub fn engine(&self) -> MergeEngine {
        MergeEngine::new().strict(self.strict)
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

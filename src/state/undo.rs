//! Undo/Redo System
//!
//! Every document command is journaled as a list of primitive
//! [`Change`]s. Undoing applies their inverses in reverse order, redoing
//! replays them, so history costs the size of the edit and not the size of
//! the bank.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bank::{Bank, Change};
use crate::error::{BankError, Result};

/// Default maximum number of undo levels to keep.
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 50;

/// File name for the undo stack persistence.
const UNDO_STACK_FILE: &str = "undo_stack.json";

/// File name for the redo stack persistence.
const REDO_STACK_FILE: &str = "redo_stack.json";

/// Kinds of document commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// New sample, instrument, preset or zone.
    Create,

    /// Entity or zone removal.
    Delete,

    Rename,

    /// Generator, modulator or metadata edit.
    Edit,

    /// Entities copied in from another bank or duplicated.
    Merge,

    /// Unused-entity sweep.
    Cleanup,

    /// Analysis results written back to samples or zones.
    Analysis,

    /// Audio file import.
    Import,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "Create"),
            ActionType::Delete => write!(f, "Delete"),
            ActionType::Rename => write!(f, "Rename"),
            ActionType::Edit => write!(f, "Edit"),
            ActionType::Merge => write!(f, "Merge"),
            ActionType::Cleanup => write!(f, "Cleanup"),
            ActionType::Analysis => write!(f, "Analysis"),
            ActionType::Import => write!(f, "Import"),
        }
    }
}

/// A single undoable command with the changes it made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoAction {
    /// Unique identifier for this action.
    pub id: String,

    pub action_type: ActionType,

    /// Human-readable description of the action.
    pub description: String,

    /// When the action was performed.
    pub timestamp: DateTime<Utc>,

    /// Primitive changes in the order they were applied.
    pub changes: Vec<Change>,
}

impl UndoAction {
    /// Create a new undo action with a generated UUID.
    pub fn new(
        action_type: ActionType,
        description: impl Into<String>,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_type,
            description: description.into(),
            timestamp: Utc::now(),
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Manages undo/redo for one bank document.
///
/// The undo stack is capped at `max_undo_levels`; the oldest actions are
/// dropped first and their ids remembered in `discarded_action_ids`, which
/// keeps at most `max_undo_levels` of the most recent ones.
#[derive(Debug, Clone)]
pub struct UndoManager {
    undo_stack: Vec<UndoAction>,
    redo_stack: Vec<UndoAction>,
    max_undo_levels: usize,
    discarded_action_ids: Vec<String>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_LEVELS)
    }
}

impl UndoManager {
    /// Create a new undo manager with the specified maximum undo levels.
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_levels: max_levels,
            discarded_action_ids: Vec::new(),
        }
    }

    /// Load undo history saved next to a document.
    ///
    /// Missing files mean empty stacks. The history is only meaningful for
    /// the bank state it was saved with.
    pub fn load(history_dir: &Path, max_levels: usize) -> Result<Self> {
        let mut manager = Self::new(max_levels);
        manager.undo_stack = read_stack(&history_dir.join(UNDO_STACK_FILE))?;
        manager.redo_stack = read_stack(&history_dir.join(REDO_STACK_FILE))?;
        manager.trim_history();
        Ok(manager)
    }

    /// Save both stacks as JSON files in `history_dir`.
    pub fn save(&self, history_dir: &Path) -> Result<()> {
        fs::create_dir_all(history_dir)?;
        fs::write(
            history_dir.join(UNDO_STACK_FILE),
            serde_json::to_string_pretty(&self.undo_stack)?,
        )?;
        fs::write(
            history_dir.join(REDO_STACK_FILE),
            serde_json::to_string_pretty(&self.redo_stack)?,
        )?;
        Ok(())
    }

    /// Push a new action onto the undo stack.
    ///
    /// This clears the redo stack and trims the undo stack to
    /// `max_undo_levels`. Actions without changes are dropped.
    pub fn push(&mut self, action: UndoAction) {
        if action.is_empty() {
            return;
        }
        debug!(
            "Recorded {} '{}' ({} changes)",
            action.action_type,
            action.description,
            action.changes.len()
        );
        self.redo_stack.clear();
        self.undo_stack.push(action);
        self.trim_history();
    }

    /// Revert the most recent action on `bank`.
    pub fn undo(&mut self, bank: &mut Bank) -> Result<UndoAction> {
        let action = self.undo_stack.pop().ok_or(BankError::NothingToUndo)?;
        bank.revert(&action.changes);
        self.redo_stack.push(action.clone());
        Ok(action)
    }

    /// Re-apply the most recently undone action on `bank`.
    pub fn redo(&mut self, bank: &mut Bank) -> Result<UndoAction> {
        let action = self.redo_stack.pop().ok_or(BankError::NothingToRedo)?;
        bank.replay(&action.changes);
        self.undo_stack.push(action.clone());
        Ok(action)
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop the oldest actions beyond `max_undo_levels`.
    pub fn trim_history(&mut self) {
        if self.undo_stack.len() > self.max_undo_levels {
            let excess = self.undo_stack.len() - self.max_undo_levels;
            let ids: Vec<String> = self.undo_stack.drain(..excess).map(|a| a.id).collect();
            self.forget(ids);
        }
    }

    fn forget(&mut self, ids: impl IntoIterator<Item = String>) {
        self.discarded_action_ids.extend(ids);
        let len = self.discarded_action_ids.len();
        if len > self.max_undo_levels {
            self.discarded_action_ids.drain(..len - self.max_undo_levels);
        }
    }

    pub fn max_undo_levels(&self) -> usize {
        self.max_undo_levels
    }

    /// Set the maximum number of undo levels, trimming if needed.
    pub fn set_max_undo_levels(&mut self, max_levels: usize) {
        self.max_undo_levels = max_levels;
        self.trim_history();
    }

    pub fn discarded_action_ids(&self) -> &[String] {
        &self.discarded_action_ids
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn peek_undo(&self) -> Option<&UndoAction> {
        self.undo_stack.last()
    }

    pub fn peek_redo(&self) -> Option<&UndoAction> {
        self.redo_stack.last()
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        let ids: Vec<String> = self
            .undo_stack
            .drain(..)
            .chain(self.redo_stack.drain(..))
            .map(|a| a.id)
            .collect();
        self.forget(ids);
    }

    /// Undo stack for display, most recent first.
    pub fn undo_stack_summary(&self) -> Vec<(String, ActionType, String)> {
        summarize(&self.undo_stack)
    }

    /// Redo stack for display, most recently undone first.
    pub fn redo_stack_summary(&self) -> Vec<(String, ActionType, String)> {
        summarize(&self.redo_stack)
    }
}

fn summarize(stack: &[UndoAction]) -> Vec<(String, ActionType, String)> {
    stack
        .iter()
        .rev()
        .map(|a| (a.id.clone(), a.action_type, a.description.clone()))
        .collect()
}

fn read_stack(path: &Path) -> Result<Vec<UndoAction>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

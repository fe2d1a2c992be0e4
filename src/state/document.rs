//! Bank documents
//!
//! A [`BankDocument`] is an open bank plus its undo history. All edits go
//! through [`BankDocument::execute`]: the closure runs against the bank
//! with the journal enabled, an error reverts whatever it already changed,
//! and a success becomes one undo level.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::bank::{Bank, EntityRef};
use crate::error::{BankError, Result};
use crate::merge::{ConflictPolicy, MergeEngine, MergeReport};

use super::undo::{ActionType, UndoAction, UndoManager, DEFAULT_MAX_UNDO_LEVELS};

/// Suffix of the directory holding a document's saved undo history
const HISTORY_SUFFIX: &str = "history";

/// Document shared between an editor and background workers
pub type SharedDocument = Arc<RwLock<BankDocument>>;

/// An open bank with undo/redo
#[derive(Debug)]
pub struct BankDocument {
    bank: Bank,
    undo: UndoManager,
    path: Option<PathBuf>,
    modified: bool,
}

impl BankDocument {
    pub fn new(bank: Bank) -> Self {
        Self::with_undo_levels(bank, DEFAULT_MAX_UNDO_LEVELS)
    }

    pub fn with_undo_levels(bank: Bank, max_undo_levels: usize) -> Self {
        Self {
            bank,
            undo: UndoManager::new(max_undo_levels),
            path: None,
            modified: false,
        }
    }

    /// Open a JSON bank file together with its saved undo history
    ///
    /// A malformed file yields `FileFormat` and no document.
    pub fn open(path: &Path, max_undo_levels: usize) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let bank = Bank::from_json(&content)?;
        let history_dir = Self::history_dir_for(path);
        let undo = if history_dir.exists() {
            UndoManager::load(&history_dir, max_undo_levels)?
        } else {
            UndoManager::new(max_undo_levels)
        };
        info!(
            "Opened '{}': {} samples, {} instruments, {} presets",
            bank.info().name,
            bank.sample_count(),
            bank.instrument_count(),
            bank.preset_count()
        );
        Ok(Self {
            bank,
            undo,
            path: Some(path.to_path_buf()),
            modified: false,
        })
    }

    /// Write the bank and its undo history back to where it was opened
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or_else(|| {
            BankError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "document has never been saved; use save_as",
            ))
        })?;
        self.save_as(&path)
    }

    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        fs::write(path, self.bank.to_json()?)?;
        self.undo.save(&Self::history_dir_for(path))?;
        debug!("Saved '{}' to {}", self.bank.info().name, path.display());
        self.path = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    /// `<file>.history` next to the bank file
    pub fn history_dir_for(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(HISTORY_SUFFIX);
        PathBuf::from(name)
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn history(&self) -> &UndoManager {
        &self.undo
    }

    pub fn history_mut(&mut self) -> &mut UndoManager {
        &mut self.undo
    }

    /// Run one undoable command
    ///
    /// On error every change the command already made is reverted and the
    /// history is left as it was.
    pub fn execute<T>(
        &mut self,
        action_type: ActionType,
        description: impl Into<String>,
        command: impl FnOnce(&mut Bank) -> Result<T>,
    ) -> Result<T> {
        self.bank.begin_journal();
        let result = command(&mut self.bank);
        let changes = self.bank.end_journal();
        match result {
            Ok(value) => {
                if !changes.is_empty() {
                    self.modified = true;
                    self.undo
                        .push(UndoAction::new(action_type, description, changes));
                }
                Ok(value)
            }
            Err(e) => {
                debug!("Rolling back {} change(s) after: {}", changes.len(), e);
                self.bank.revert(&changes);
                Err(e)
            }
        }
    }

    pub fn undo(&mut self) -> Result<UndoAction> {
        let action = self.undo.undo(&mut self.bank)?;
        info!("Undid {}: {}", action.action_type, action.description);
        self.modified = true;
        Ok(action)
    }

    pub fn redo(&mut self) -> Result<UndoAction> {
        let action = self.undo.redo(&mut self.bank)?;
        info!("Redid {}: {}", action.action_type, action.description);
        self.modified = true;
        Ok(action)
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }
}

/// Import `selection` from one shared document into another
///
/// Both documents are write-locked for the whole merge, always in the same
/// address order so that two opposite merges cannot deadlock. Merging a
/// document into itself duplicates the selection.
pub fn merge_documents(
    source: &SharedDocument,
    dest: &SharedDocument,
    selection: &[EntityRef],
    policy: &mut dyn ConflictPolicy,
    engine: &MergeEngine,
) -> Result<MergeReport> {
    if Arc::ptr_eq(source, dest) {
        let mut doc = dest.write();
        let description = format!("Duplicate {} element(s)", selection.len());
        return doc.execute(ActionType::Merge, description, |bank| {
            engine.duplicate_within(bank, selection)
        });
    }

    let (source_doc, mut dest_doc) = if Arc::as_ptr(source) < Arc::as_ptr(dest) {
        let s = source.write();
        let d = dest.write();
        (s, d)
    } else {
        let d = dest.write();
        let s = source.write();
        (s, d)
    };
    let description = format!(
        "Import {} element(s) from '{}'",
        selection.len(),
        source_doc.bank().info().name
    );
    dest_doc.execute(ActionType::Merge, description, |bank| {
        engine.import(source_doc.bank(), bank, selection, policy)
    })
}

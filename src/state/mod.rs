//! Document State Module
//!
//! Open bank documents, undo/redo history, editing commands and background
//! analysis workers.

pub mod commands;
pub mod document;
pub mod undo;
pub mod worker;

pub use document::{merge_documents, BankDocument, SharedDocument};
pub use undo::{ActionType, UndoAction, UndoManager, DEFAULT_MAX_UNDO_LEVELS};
pub use worker::{AnalysisWorker, WorkerEvent};

//! Bankcraft - editing core for SoundFont-style instrument banks
//!
//! A bank holds samples, instruments built from zones of those samples and
//! presets built from zones of those instruments.
//!
//! # Architecture
//!
//! - `bank`: entity arenas and the mutation primitives, each one journaled
//! - `integrity`: back-references, delete guards and the unused sweep
//! - `resolver`: effective generator values and modulation legality
//! - `merge`: copies entities with their dependencies between banks
//! - `analysis`: stateless sample routines (loops, pitch, filtering, curves)
//! - `state`: documents with undo/redo and background workers
//! - `export`, `wav`, `config`, `cli`: the outer surfaces

pub mod analysis;
pub mod bank;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod integrity;
pub mod merge;
pub mod resolver;
pub mod state;
pub mod wav;

pub use bank::{Bank, EntityKind, EntityRef, InstrumentId, PresetId, SampleId, ZoneId};
pub use cancel::CancelToken;
pub use config::EditorConfig;
pub use error::{BankError, Result};
pub use state::{BankDocument, SharedDocument};

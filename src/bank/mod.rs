//! In-memory bank model
//!
//! Samples, instruments, presets and zones live in per-kind arenas owned by
//! [`Bank`]. Zones point at their target by id; back-references are kept by
//! the integrity index.

mod arena;
mod generator;
mod ids;
mod info;
mod instrument;
mod journal;
mod modulator;
mod sample;
mod store;
mod zone;

pub use arena::Arena;
pub use generator::{GenAmount, Generator, RangeAmount, MIDI_MAX};
pub use ids::{
    ArenaId, EntityKind, EntityRef, InstrumentId, PresetId, SampleId, ZoneId, ZoneOwner,
    ZoneSlot, ZoneTarget,
};
pub use info::BankInfo;
pub use instrument::{Instrument, Preset, PresetHeader};
pub use journal::Change;
pub use modulator::{Controller, Curve, ModDestination, ModSource, Modulator, Transform};
pub use sample::{Sample, SampleType};
pub use store::{Bank, MAX_BANK_NUMBER, MAX_PROGRAM_NUMBER};
pub use zone::Zone;

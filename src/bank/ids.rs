//! Typed identifiers for bank entities
//!
//! Every entity lives in an arena and is addressed by a stable index.
//! Indices are never handed out twice within one bank, so a stale id can
//! only ever miss, never alias a newer entity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversion between a typed id and its arena slot
pub trait ArenaId: Copy + Eq + Ord + std::hash::Hash + fmt::Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl ArenaId for $name {
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} #{}", $label, self.0)
            }
        }
    };
}

arena_id!(
    /// Identifier of a sample
    SampleId,
    "sample"
);
arena_id!(
    /// Identifier of an instrument
    InstrumentId,
    "instrument"
);
arena_id!(
    /// Identifier of a preset
    PresetId,
    "preset"
);
arena_id!(
    /// Identifier of a zone (instrument or preset division)
    ZoneId,
    "zone"
);

/// The three top-level entity collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sample,
    Instrument,
    Preset,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Sample => write!(f, "sample"),
            EntityKind::Instrument => write!(f, "instrument"),
            EntityKind::Preset => write!(f, "preset"),
        }
    }
}

/// Reference to any top-level entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    Sample(SampleId),
    Instrument(InstrumentId),
    Preset(PresetId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Sample(_) => EntityKind::Sample,
            EntityRef::Instrument(_) => EntityKind::Instrument,
            EntityRef::Preset(_) => EntityKind::Preset,
        }
    }

    pub fn as_sample(&self) -> Option<SampleId> {
        match *self {
            EntityRef::Sample(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_instrument(&self) -> Option<InstrumentId> {
        match *self {
            EntityRef::Instrument(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_preset(&self) -> Option<PresetId> {
        match *self {
            EntityRef::Preset(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Sample(id) => id.fmt(f),
            EntityRef::Instrument(id) => id.fmt(f),
            EntityRef::Preset(id) => id.fmt(f),
        }
    }
}

impl From<SampleId> for EntityRef {
    fn from(id: SampleId) -> Self {
        EntityRef::Sample(id)
    }
}

impl From<InstrumentId> for EntityRef {
    fn from(id: InstrumentId) -> Self {
        EntityRef::Instrument(id)
    }
}

impl From<PresetId> for EntityRef {
    fn from(id: PresetId) -> Self {
        EntityRef::Preset(id)
    }
}

/// Entity that owns a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneOwner {
    Instrument(InstrumentId),
    Preset(PresetId),
}

impl ZoneOwner {
    pub fn entity(&self) -> EntityRef {
        match *self {
            ZoneOwner::Instrument(id) => EntityRef::Instrument(id),
            ZoneOwner::Preset(id) => EntityRef::Preset(id),
        }
    }

    pub fn is_preset(&self) -> bool {
        matches!(self, ZoneOwner::Preset(_))
    }

    /// Owner for an entity reference, if that entity can own zones
    pub fn from_entity(entity: EntityRef) -> Option<Self> {
        match entity {
            EntityRef::Instrument(id) => Some(ZoneOwner::Instrument(id)),
            EntityRef::Preset(id) => Some(ZoneOwner::Preset(id)),
            EntityRef::Sample(_) => None,
        }
    }
}

impl fmt::Display for ZoneOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity().fmt(f)
    }
}

/// Entity referenced by a (non-global) zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTarget {
    Sample(SampleId),
    Instrument(InstrumentId),
}

impl ZoneTarget {
    pub fn entity(&self) -> EntityRef {
        match *self {
            ZoneTarget::Sample(id) => EntityRef::Sample(id),
            ZoneTarget::Instrument(id) => EntityRef::Instrument(id),
        }
    }

    /// Whether this target may be referenced from a zone of `owner`
    pub fn fits(&self, owner: ZoneOwner) -> bool {
        matches!(
            (owner, self),
            (ZoneOwner::Instrument(_), ZoneTarget::Sample(_))
                | (ZoneOwner::Preset(_), ZoneTarget::Instrument(_))
        )
    }
}

/// Position of a zone inside its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSlot {
    Global,
    Index(usize),
}

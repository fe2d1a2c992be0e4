//! Instruments and presets: named, ordered zone lists

use serde::{Deserialize, Serialize};

use super::ids::ZoneId;

/// A playable sound built from sample zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    #[serde(default)]
    pub(crate) global_zone: Option<ZoneId>,
    #[serde(default)]
    pub(crate) zones: Vec<ZoneId>,
}

impl Instrument {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global_zone: None,
            zones: Vec::new(),
        }
    }

    pub fn global_zone(&self) -> Option<ZoneId> {
        self.global_zone
    }

    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }
}

/// Name and MIDI address of a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetHeader {
    pub name: String,
    pub bank: u16,
    pub program: u16,
}

/// A playable patch built from instrument zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub bank: u16,
    pub program: u16,
    #[serde(default)]
    pub(crate) global_zone: Option<ZoneId>,
    #[serde(default)]
    pub(crate) zones: Vec<ZoneId>,
}

impl Preset {
    pub(crate) fn new(header: PresetHeader) -> Self {
        Self {
            name: header.name,
            bank: header.bank,
            program: header.program,
            global_zone: None,
            zones: Vec::new(),
        }
    }

    pub fn header(&self) -> PresetHeader {
        PresetHeader {
            name: self.name.clone(),
            bank: self.bank,
            program: self.program,
        }
    }

    pub fn global_zone(&self) -> Option<ZoneId> {
        self.global_zone
    }

    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }
}

//! Zones (divisions) of instruments and presets

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::generator::{GenAmount, Generator, RangeAmount};
use super::ids::{ZoneOwner, ZoneTarget};
use super::modulator::Modulator;

/// A key/velocity region with its own parameters
///
/// A zone without a target is the global zone of its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub owner: ZoneOwner,
    pub target: Option<ZoneTarget>,
    #[serde(default)]
    pub(crate) generators: BTreeMap<Generator, GenAmount>,
    #[serde(default)]
    pub(crate) modulators: Vec<Modulator>,
}

impl Zone {
    pub(crate) fn new(owner: ZoneOwner, target: Option<ZoneTarget>) -> Self {
        Self {
            owner,
            target,
            generators: BTreeMap::new(),
            modulators: Vec::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.target.is_none()
    }

    /// Locally set amount, if any
    pub fn generator(&self, generator: Generator) -> Option<GenAmount> {
        self.generators.get(&generator).copied()
    }

    pub fn generators(&self) -> impl Iterator<Item = (Generator, GenAmount)> + '_ {
        self.generators.iter().map(|(g, a)| (*g, *a))
    }

    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    pub fn modulators(&self) -> &[Modulator] {
        &self.modulators
    }

    /// Local key range, or the full keyboard
    pub fn key_range(&self) -> RangeAmount {
        self.local_range(Generator::KeyRange)
    }

    /// Local velocity range, or all velocities
    pub fn vel_range(&self) -> RangeAmount {
        self.local_range(Generator::VelRange)
    }

    fn local_range(&self, generator: Generator) -> RangeAmount {
        self.generator(generator)
            .and_then(|amount| amount.range())
            .unwrap_or(RangeAmount::FULL)
    }

    /// Same parameters and modulators, ignoring owner and target
    pub fn same_body(&self, other: &Zone) -> bool {
        self.generators == other.generators && self.modulators == other.modulators
    }
}

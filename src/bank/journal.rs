//! Reversible primitive changes
//!
//! Every structural edit of a [`Bank`](super::Bank) is expressed as one of
//! these changes. Applying a change and then its inverse restores the bank
//! exactly, ids included, which is what undo/redo and failed-command
//! rollback rely on.

use serde::{Deserialize, Serialize};

use super::ids::{InstrumentId, PresetId, SampleId, ZoneId, ZoneOwner, ZoneSlot};
use super::info::BankInfo;
use super::instrument::{Instrument, Preset, PresetHeader};
use super::sample::Sample;
use super::store::Bank;
use super::zone::Zone;

/// One primitive edit with enough data to undo it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    SampleInserted {
        id: SampleId,
        sample: Sample,
    },
    SampleRemoved {
        id: SampleId,
        sample: Sample,
    },
    SampleUpdated {
        id: SampleId,
        before: Sample,
        after: Sample,
    },
    InstrumentInserted {
        id: InstrumentId,
        name: String,
    },
    InstrumentRemoved {
        id: InstrumentId,
        name: String,
    },
    InstrumentRenamed {
        id: InstrumentId,
        before: String,
        after: String,
    },
    PresetInserted {
        id: PresetId,
        header: PresetHeader,
    },
    PresetRemoved {
        id: PresetId,
        header: PresetHeader,
    },
    PresetUpdated {
        id: PresetId,
        before: PresetHeader,
        after: PresetHeader,
    },
    ZoneInserted {
        id: ZoneId,
        zone: Zone,
        slot: ZoneSlot,
    },
    ZoneRemoved {
        id: ZoneId,
        zone: Zone,
        slot: ZoneSlot,
    },
    ZoneMoved {
        owner: ZoneOwner,
        from: usize,
        to: usize,
    },
    ZoneUpdated {
        id: ZoneId,
        before: Zone,
        after: Zone,
    },
    InfoUpdated {
        before: Box<BankInfo>,
        after: Box<BankInfo>,
    },
}

impl Change {
    /// The change that undoes this one
    pub fn inverse(&self) -> Change {
        match self.clone() {
            Change::SampleInserted { id, sample } => Change::SampleRemoved { id, sample },
            Change::SampleRemoved { id, sample } => Change::SampleInserted { id, sample },
            Change::SampleUpdated { id, before, after } => Change::SampleUpdated {
                id,
                before: after,
                after: before,
            },
            Change::InstrumentInserted { id, name } => Change::InstrumentRemoved { id, name },
            Change::InstrumentRemoved { id, name } => Change::InstrumentInserted { id, name },
            Change::InstrumentRenamed { id, before, after } => Change::InstrumentRenamed {
                id,
                before: after,
                after: before,
            },
            Change::PresetInserted { id, header } => Change::PresetRemoved { id, header },
            Change::PresetRemoved { id, header } => Change::PresetInserted { id, header },
            Change::PresetUpdated { id, before, after } => Change::PresetUpdated {
                id,
                before: after,
                after: before,
            },
            Change::ZoneInserted { id, zone, slot } => Change::ZoneRemoved { id, zone, slot },
            Change::ZoneRemoved { id, zone, slot } => Change::ZoneInserted { id, zone, slot },
            Change::ZoneMoved { owner, from, to } => Change::ZoneMoved {
                owner,
                from: to,
                to: from,
            },
            Change::ZoneUpdated { id, before, after } => Change::ZoneUpdated {
                id,
                before: after,
                after: before,
            },
            Change::InfoUpdated { before, after } => Change::InfoUpdated {
                before: after,
                after: before,
            },
        }
    }
}

impl Bank {
    /// Apply a change without validation or journaling
    ///
    /// Entity removals are only ever journaled after the entity's zones were
    /// removed, so inserting an entity always starts from an empty zone list.
    pub(crate) fn apply_raw(&mut self, change: &Change) {
        match change {
            Change::SampleInserted { id, sample } => self.samples.restore(*id, sample.clone()),
            Change::SampleRemoved { id, .. } => {
                self.samples.remove(*id);
            }
            Change::SampleUpdated { id, after, .. } => {
                if let Some(sample) = self.samples.get_mut(*id) {
                    *sample = after.clone();
                }
            }
            Change::InstrumentInserted { id, name } => {
                self.instruments.restore(*id, Instrument::new(name.clone()))
            }
            Change::InstrumentRemoved { id, .. } => {
                self.instruments.remove(*id);
            }
            Change::InstrumentRenamed { id, after, .. } => {
                if let Some(instrument) = self.instruments.get_mut(*id) {
                    instrument.name = after.clone();
                }
            }
            Change::PresetInserted { id, header } => {
                self.presets.restore(*id, Preset::new(header.clone()))
            }
            Change::PresetRemoved { id, .. } => {
                self.presets.remove(*id);
            }
            Change::PresetUpdated { id, after, .. } => {
                if let Some(preset) = self.presets.get_mut(*id) {
                    preset.name = after.name.clone();
                    preset.bank = after.bank;
                    preset.program = after.program;
                }
            }
            Change::ZoneInserted { id, zone, slot } => {
                if let Some((global, zones)) = self.owner_lists_mut(zone.owner) {
                    match slot {
                        ZoneSlot::Global => *global = Some(*id),
                        ZoneSlot::Index(position) => {
                            zones.insert((*position).min(zones.len()), *id)
                        }
                    }
                }
                if let Some(target) = zone.target {
                    self.index.link(*id, target);
                }
                self.zones.restore(*id, zone.clone());
            }
            Change::ZoneRemoved { id, zone, slot } => {
                if let Some((global, zones)) = self.owner_lists_mut(zone.owner) {
                    match slot {
                        ZoneSlot::Global => {
                            if *global == Some(*id) {
                                *global = None;
                            }
                        }
                        ZoneSlot::Index(_) => zones.retain(|z| z != id),
                    }
                }
                if let Some(target) = zone.target {
                    self.index.unlink(*id, target);
                }
                self.zones.remove(*id);
            }
            Change::ZoneMoved { owner, from, to } => {
                if let Some((_, zones)) = self.owner_lists_mut(*owner) {
                    if *from < zones.len() {
                        let zone = zones.remove(*from);
                        zones.insert((*to).min(zones.len()), zone);
                    }
                }
            }
            Change::ZoneUpdated { id, before, after } => {
                if before.target != after.target {
                    if let Some(target) = before.target {
                        self.index.unlink(*id, target);
                    }
                    if let Some(target) = after.target {
                        self.index.link(*id, target);
                    }
                }
                if let Some(zone) = self.zones.get_mut(*id) {
                    *zone = after.clone();
                }
            }
            Change::InfoUpdated { after, .. } => self.info = (**after).clone(),
        }
    }

    /// Undo a sequence of applied changes, most recent first
    pub(crate) fn revert(&mut self, changes: &[Change]) {
        for change in changes.iter().rev() {
            self.apply_raw(&change.inverse());
        }
    }

    /// Re-apply a sequence of changes in order
    pub(crate) fn replay(&mut self, changes: &[Change]) {
        for change in changes {
            self.apply_raw(change);
        }
    }

    fn owner_lists_mut(
        &mut self,
        owner: ZoneOwner,
    ) -> Option<(&mut Option<ZoneId>, &mut Vec<ZoneId>)> {
        match owner {
            ZoneOwner::Instrument(id) => self
                .instruments
                .get_mut(id)
                .map(|i| (&mut i.global_zone, &mut i.zones)),
            ZoneOwner::Preset(id) => self
                .presets
                .get_mut(id)
                .map(|p| (&mut p.global_zone, &mut p.zones)),
        }
    }
}

//! Integrity engine
//!
//! Tracks which zones reference each sample and instrument. The index is
//! updated by the bank on every zone insertion, removal and retarget, so
//! delete guards and the unused sweep never have to scan all zones.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};
use serde::Serialize;

use crate::bank::{Bank, EntityRef, InstrumentId, SampleId, ZoneId, ZoneOwner, ZoneTarget};
use crate::error::{BankError, Result};
use crate::resolver::ZoneResolver;

/// Back-reference sets, keyed by referenced entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityIndex {
    sample_users: HashMap<SampleId, BTreeSet<ZoneId>>,
    instrument_users: HashMap<InstrumentId, BTreeSet<ZoneId>>,
}

impl IntegrityIndex {
    /// Build the index from scratch
    pub fn rebuild(zones: impl IntoIterator<Item = (ZoneId, Option<ZoneTarget>)>) -> Self {
        let mut index = Self::default();
        for (zone, target) in zones {
            if let Some(target) = target {
                index.link(zone, target);
            }
        }
        index
    }

    pub fn link(&mut self, zone: ZoneId, target: ZoneTarget) {
        match target {
            ZoneTarget::Sample(id) => {
                self.sample_users.entry(id).or_default().insert(zone);
            }
            ZoneTarget::Instrument(id) => {
                self.instrument_users.entry(id).or_default().insert(zone);
            }
        }
    }

    pub fn unlink(&mut self, zone: ZoneId, target: ZoneTarget) {
        match target {
            ZoneTarget::Sample(id) => {
                if let Some(users) = self.sample_users.get_mut(&id) {
                    users.remove(&zone);
                    if users.is_empty() {
                        self.sample_users.remove(&id);
                    }
                }
            }
            ZoneTarget::Instrument(id) => {
                if let Some(users) = self.instrument_users.get_mut(&id) {
                    users.remove(&zone);
                    if users.is_empty() {
                        self.instrument_users.remove(&id);
                    }
                }
            }
        }
    }

    /// Zones referencing `entity`; presets are never referenced
    pub fn users(&self, entity: EntityRef) -> Vec<ZoneId> {
        let set = match entity {
            EntityRef::Sample(id) => self.sample_users.get(&id),
            EntityRef::Instrument(id) => self.instrument_users.get(&id),
            EntityRef::Preset(_) => None,
        };
        set.map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn user_count(&self, entity: EntityRef) -> usize {
        match entity {
            EntityRef::Sample(id) => self.sample_users.get(&id).map_or(0, BTreeSet::len),
            EntityRef::Instrument(id) => self.instrument_users.get(&id).map_or(0, BTreeSet::len),
            EntityRef::Preset(_) => 0,
        }
    }
}

/// Count class for phrasing "no / 1 / N unused elements"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Plurality {
    None,
    One,
    Many(usize),
}

impl Plurality {
    pub fn of(count: usize) -> Self {
        match count {
            0 => Plurality::None,
            1 => Plurality::One,
            n => Plurality::Many(n),
        }
    }
}

/// Entities deleted by an unused sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnusedReport {
    pub samples: Vec<SampleId>,
    pub instruments: Vec<InstrumentId>,
}

impl UnusedReport {
    pub fn sample_count(&self) -> Plurality {
        Plurality::of(self.samples.len())
    }

    pub fn instrument_count(&self) -> Plurality {
        Plurality::of(self.instruments.len())
    }

    pub fn total(&self) -> usize {
        self.samples.len() + self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl Bank {
    /// Whether `entity` exists and no zone references it
    pub fn can_delete(&self, entity: EntityRef) -> bool {
        self.contains(entity) && self.index.user_count(entity) == 0
    }

    /// Zones currently referencing `entity`
    pub fn users(&self, entity: EntityRef) -> Vec<ZoneId> {
        self.index.users(entity)
    }

    /// Instruments or presets whose zones reference `entity`
    pub fn dependents(&self, entity: EntityRef) -> Vec<EntityRef> {
        let owners: BTreeSet<ZoneOwner> = self
            .index
            .users(entity)
            .into_iter()
            .filter_map(|zone| self.zones.get(zone).map(|z| z.owner))
            .collect();
        owners.into_iter().map(|owner| owner.entity()).collect()
    }

    /// Delete every instrument and sample no zone references
    ///
    /// Instruments are swept first; each deleted instrument re-queues the
    /// samples it used, so samples orphaned by the sweep go in the same call.
    pub fn remove_unused(&mut self) -> Result<UnusedReport> {
        let mut report = UnusedReport::default();
        let mut instruments: Vec<InstrumentId> = self
            .instruments
            .ids()
            .filter(|id| self.index.user_count((*id).into()) == 0)
            .collect();
        let mut samples: Vec<SampleId> = self
            .samples
            .ids()
            .filter(|id| self.index.user_count((*id).into()) == 0)
            .collect();

        while let Some(id) = instruments.pop() {
            let used: BTreeSet<SampleId> = self
                .instrument(id)?
                .zones()
                .iter()
                .filter_map(|zone| match self.zones.get(*zone)?.target {
                    Some(ZoneTarget::Sample(sample)) => Some(sample),
                    _ => None,
                })
                .collect();
            self.delete_instrument(id)?;
            report.instruments.push(id);
            samples.extend(
                used.into_iter()
                    .filter(|s| self.index.user_count((*s).into()) == 0),
            );
        }

        samples.sort();
        samples.dedup();
        for id in samples {
            if self.samples.contains(id) {
                self.delete_sample(id)?;
                report.samples.push(id);
            }
        }
        report.instruments.sort();

        info!(
            "Removed {} unused instrument(s) and {} unused sample(s)",
            report.instruments.len(),
            report.samples.len()
        );
        Ok(report)
    }

    /// Same result as [`Bank::remove_unused`], recomputing usage by scanning
    /// every zone on each pass
    pub fn remove_unused_full_scan(&mut self) -> Result<UnusedReport> {
        let mut report = UnusedReport::default();
        loop {
            let mut used_samples = BTreeSet::new();
            let mut used_instruments = BTreeSet::new();
            for (_, zone) in self.zones.iter() {
                match zone.target {
                    Some(ZoneTarget::Sample(id)) => {
                        used_samples.insert(id);
                    }
                    Some(ZoneTarget::Instrument(id)) => {
                        used_instruments.insert(id);
                    }
                    None => {}
                }
            }
            let instruments: Vec<InstrumentId> = self
                .instruments
                .ids()
                .filter(|id| !used_instruments.contains(id))
                .collect();
            let samples: Vec<SampleId> = self
                .samples
                .ids()
                .filter(|id| !used_samples.contains(id))
                .collect();
            if instruments.is_empty() && samples.is_empty() {
                break;
            }
            debug!(
                "Full scan pass: {} instrument(s), {} sample(s)",
                instruments.len(),
                samples.len()
            );
            for id in instruments {
                self.delete_instrument(id)?;
                report.instruments.push(id);
            }
            for id in samples {
                self.delete_sample(id)?;
                report.samples.push(id);
            }
        }
        report.instruments.sort();
        report.samples.sort();
        Ok(report)
    }

    /// Recompute the back-reference sets from the zones
    pub(crate) fn rebuild_index(&mut self) {
        self.index = IntegrityIndex::rebuild(self.zones.iter().map(|(id, z)| (id, z.target)));
    }

    /// Whether the incremental index matches a full rebuild
    pub fn index_is_consistent(&self) -> bool {
        self.index == IntegrityIndex::rebuild(self.zones.iter().map(|(id, z)| (id, z.target)))
    }

    /// Structural check of a bank that did not go through the mutation API
    pub fn check_consistency(&self) -> Result<()> {
        let corrupt = |reason: String| Err(BankError::FileFormat { reason });

        for (id, zone) in self.zones.iter() {
            let Some(owner_zones) = self.owner_lists(zone.owner) else {
                return corrupt(format!("{} belongs to missing {}", id, zone.owner));
            };
            let (global, zones) = owner_zones;
            let listed = zones.iter().filter(|z| **z == id).count();
            let placed = match zone.target {
                None => global == Some(id) && listed == 0,
                Some(_) => global != Some(id) && listed == 1,
            };
            if !placed {
                return corrupt(format!("{} is not placed exactly once in {}", id, zone.owner));
            }
            if let Some(target) = zone.target {
                if !target.fits(zone.owner) {
                    return corrupt(format!("{} of {} targets {}", id, zone.owner, target.entity()));
                }
                if !self.contains(target.entity()) {
                    return corrupt(format!("{} references missing {}", id, target.entity()));
                }
            }
        }

        let owners = self
            .instruments
            .ids()
            .map(ZoneOwner::Instrument)
            .chain(self.presets.ids().map(ZoneOwner::Preset));
        for owner in owners {
            if let Some((global, zones)) = self.owner_lists(owner) {
                for zone in global.iter().chain(zones.iter()) {
                    match self.zones.get(*zone) {
                        Some(z) if z.owner == owner => {}
                        _ => return corrupt(format!("{} lists foreign or missing {}", owner, zone)),
                    }
                }
            }
        }

        for (id, sample) in self.samples.iter() {
            if let Some(partner) = sample.link {
                if !self.samples.contains(partner) || partner == id {
                    return corrupt(format!("{} is linked to missing {}", id, partner));
                }
            }
        }

        // Generators and modulators must be legal at the zone's level.
        let resolver = ZoneResolver::new(self);
        for id in self.zones.ids() {
            if let Err(e) = resolver.validate_zone(id) {
                return corrupt(format!("{}: {}", id, e));
            }
        }
        Ok(())
    }

    fn owner_lists(&self, owner: ZoneOwner) -> Option<(Option<ZoneId>, &[ZoneId])> {
        match owner {
            ZoneOwner::Instrument(id) => self
                .instruments
                .get(id)
                .map(|i| (i.global_zone(), i.zones())),
            ZoneOwner::Preset(id) => self.presets.get(id).map(|p| (p.global_zone(), p.zones())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{
        Controller, EntityKind, GenAmount, Generator, ModDestination, ModSource, Modulator, Sample,
    };
    use pretty_assertions::assert_eq;

    /// "Kick" used by "Drums", "Snare" used by "Kit" which a preset uses,
    /// plus an orphan sample
    fn drum_bank() -> Bank {
        let mut bank = Bank::new("drums");
        let kick = bank.create_sample(Sample::new("Kick", vec![0.1; 32], 44100)).unwrap();
        let snare = bank.create_sample(Sample::new("Snare", vec![0.2; 32], 44100)).unwrap();
        bank.create_sample(Sample::new("Orphan", vec![0.3; 32], 44100)).unwrap();

        let drums = bank.create_instrument("Drums").unwrap();
        bank.add_zone(ZoneOwner::Instrument(drums), ZoneTarget::Sample(kick)).unwrap();
        let kit = bank.create_instrument("Kit").unwrap();
        bank.add_zone(ZoneOwner::Instrument(kit), ZoneTarget::Sample(snare)).unwrap();

        let preset = bank.create_preset("Standard", 128, 0).unwrap();
        bank.add_zone(ZoneOwner::Preset(preset), ZoneTarget::Instrument(kit)).unwrap();
        bank.add_zone(ZoneOwner::Preset(preset), ZoneTarget::Instrument(drums)).unwrap();
        bank
    }

    fn id_of(bank: &Bank, kind: EntityKind, name: &str) -> EntityRef {
        bank.find_by_name(kind, name).unwrap()
    }

    #[test]
    fn test_users_and_dependents() {
        let bank = drum_bank();
        let kick = id_of(&bank, EntityKind::Sample, "Kick");
        let drums = id_of(&bank, EntityKind::Instrument, "Drums");

        assert_eq!(bank.users(kick).len(), 1);
        assert_eq!(bank.dependents(kick), vec![drums]);
        assert!(!bank.can_delete(kick));
        assert!(bank.can_delete(id_of(&bank, EntityKind::Sample, "Orphan")));
    }

    #[test]
    fn test_removing_instrument_orphans_sample_in_same_sweep() {
        let mut bank = drum_bank();
        let preset = bank.presets().next().map(|(id, _)| id).unwrap();
        let drums = id_of(&bank, EntityKind::Instrument, "Drums");
        let preset_zone = bank.users(drums)[0];
        bank.remove_zone(preset_zone).unwrap();
        assert_eq!(bank.zones(ZoneOwner::Preset(preset)).unwrap().len(), 1);

        let report = bank.remove_unused().unwrap();
        assert_eq!(report.instrument_count(), Plurality::One);
        assert_eq!(report.sample_count(), Plurality::Many(2));
        assert!(bank.find_by_name(EntityKind::Instrument, "Drums").is_none());
        assert!(bank.find_by_name(EntityKind::Sample, "Kick").is_none());
        assert!(bank.find_by_name(EntityKind::Sample, "Snare").is_some());
        assert!(bank.index_is_consistent());
    }

    #[test]
    fn test_remove_unused_is_idempotent() {
        let mut bank = drum_bank();
        let first = bank.remove_unused().unwrap();
        assert_eq!(first.total(), 1);

        let second = bank.remove_unused().unwrap();
        assert!(second.is_empty());
        assert_eq!(second.sample_count(), Plurality::None);
    }

    #[test]
    fn test_full_scan_matches_worklist() {
        let mut a = drum_bank();
        let preset = a.presets().next().map(|(id, _)| id).unwrap();
        a.delete_preset(preset).unwrap();
        let mut b = a.clone();

        let fast = a.remove_unused().unwrap();
        let slow = b.remove_unused_full_scan().unwrap();
        assert_eq!(fast, slow);
        assert_eq!(a.sample_count(), 0);
        assert_eq!(a.instrument_count(), 0);
    }

    #[test]
    fn test_consistency_check_passes_on_api_built_bank() {
        let bank = drum_bank();
        assert!(bank.check_consistency().is_ok());
        assert!(bank.index_is_consistent());
    }

    fn reload(bank: &Bank) -> Result<Bank> {
        Bank::from_json(&bank.to_json().unwrap())
    }

    #[test]
    fn test_load_rejects_offset_generator_on_preset_zone() {
        let mut bank = drum_bank();
        let preset = bank.presets().next().map(|(id, _)| id).unwrap();
        let zone = bank.zones(ZoneOwner::Preset(preset)).unwrap()[0];
        bank.zones
            .get_mut(zone)
            .unwrap()
            .generators
            .insert(Generator::StartAddrsOffset, GenAmount::Value(5));

        let err = reload(&bank).unwrap_err();
        assert_eq!(err.error_code(), "FILE_FORMAT_ERROR");
        assert!(err.to_string().contains("startAddrsOffset"));
    }

    #[test]
    fn test_load_rejects_offset_modulation_on_preset_zone() {
        let mut bank = drum_bank();
        let preset = bank.presets().next().map(|(id, _)| id).unwrap();
        let zone = bank.zones(ZoneOwner::Preset(preset)).unwrap()[0];
        bank.zones.get_mut(zone).unwrap().modulators.push(Modulator::to_generator(
            ModSource::new(Controller::Midi(1)),
            Generator::StartloopAddrsOffset,
            10,
        ));

        let err = reload(&bank).unwrap_err();
        assert_eq!(err.error_code(), "FILE_FORMAT_ERROR");
    }

    #[test]
    fn test_load_rejects_modulator_linked_to_itself() {
        let mut bank = drum_bank();
        let kick = id_of(&bank, EntityKind::Sample, "Kick");
        let zone = bank.users(kick)[0];
        bank.zones.get_mut(zone).unwrap().modulators.push(Modulator::new(
            ModSource::new(Controller::Midi(7)),
            ModDestination::Link(0),
            100,
        ));

        let err = reload(&bank).unwrap_err();
        assert_eq!(err.error_code(), "FILE_FORMAT_ERROR");
    }

    #[test]
    fn test_load_rejects_zone_targeting_missing_sample() {
        let mut bank = drum_bank();
        let kick = id_of(&bank, EntityKind::Sample, "Kick").as_sample().unwrap();
        bank.samples.remove(kick);

        let err = reload(&bank).unwrap_err();
        assert_eq!(err.error_code(), "FILE_FORMAT_ERROR");
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_load_accepts_untampered_bank() {
        let bank = drum_bank();
        let loaded = reload(&bank).unwrap();
        assert_eq!(loaded.zones.len(), bank.zones.len());
        assert!(loaded.index_is_consistent());
    }

    #[test]
    fn test_index_prunes_empty_sets() {
        let mut index = IntegrityIndex::default();
        index.link(ZoneId(0), ZoneTarget::Sample(SampleId(1)));
        index.unlink(ZoneId(0), ZoneTarget::Sample(SampleId(1)));
        assert_eq!(index, IntegrityIndex::default());
    }
}

//! Entity store
//!
//! [`Bank`] owns the sample, instrument, preset and zone arenas. Its public
//! methods are the only way to mutate them; each one validates first and
//! then records primitive [`Change`]s, so a rejected call leaves the bank
//! untouched and an accepted one can be undone.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::arena::Arena;
use super::generator::{GenAmount, Generator};
use super::ids::{
    EntityKind, EntityRef, InstrumentId, PresetId, SampleId, ZoneId, ZoneOwner, ZoneSlot,
    ZoneTarget,
};
use super::info::BankInfo;
use super::instrument::{Instrument, Preset, PresetHeader};
use super::journal::Change;
use super::modulator::{ModDestination, Modulator};
use super::sample::{Sample, SampleType};
use super::zone::Zone;
use crate::error::{BankError, Result, ValidationError};
use crate::integrity::IntegrityIndex;
use crate::resolver::{validate_generator, ZoneResolver};

/// Highest bank number (128 is the percussion bank)
pub const MAX_BANK_NUMBER: u16 = 128;

/// Highest program number
pub const MAX_PROGRAM_NUMBER: u16 = 127;

/// An instrument bank: samples, instruments, presets and their zones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BankData")]
pub struct Bank {
    pub(crate) info: BankInfo,
    pub(crate) samples: Arena<SampleId, Sample>,
    pub(crate) instruments: Arena<InstrumentId, Instrument>,
    pub(crate) presets: Arena<PresetId, Preset>,
    pub(crate) zones: Arena<ZoneId, Zone>,
    #[serde(skip)]
    pub(crate) index: IntegrityIndex,
    #[serde(skip)]
    journal: Option<Vec<Change>>,
}

/// Serialized form; back-references are rebuilt on load
#[derive(Deserialize)]
struct BankData {
    info: BankInfo,
    #[serde(default)]
    samples: Arena<SampleId, Sample>,
    #[serde(default)]
    instruments: Arena<InstrumentId, Instrument>,
    #[serde(default)]
    presets: Arena<PresetId, Preset>,
    #[serde(default)]
    zones: Arena<ZoneId, Zone>,
}

impl TryFrom<BankData> for Bank {
    type Error = String;

    fn try_from(data: BankData) -> std::result::Result<Self, Self::Error> {
        let mut bank = Bank {
            info: data.info,
            samples: data.samples,
            instruments: data.instruments,
            presets: data.presets,
            zones: data.zones,
            index: IntegrityIndex::default(),
            journal: None,
        };
        bank.check_consistency().map_err(|e| e.to_string())?;
        bank.rebuild_index();
        Ok(bank)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    Ok(())
}

fn check_preset_number(bank: u16, program: u16) -> Result<()> {
    if bank > MAX_BANK_NUMBER || program > MAX_PROGRAM_NUMBER {
        return Err(ValidationError::PresetNumber { bank, program }.into());
    }
    Ok(())
}

impl Bank {
    /// Create an empty bank
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: BankInfo::new(name),
            ..Default::default()
        }
    }

    /// Parse a bank document, rejecting inconsistent content
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BankError::FileFormat {
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // === Journal ===

    pub(crate) fn begin_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    pub(crate) fn end_journal(&mut self) -> Vec<Change> {
        self.journal.take().unwrap_or_default()
    }

    /// Copy of the bank contents without an open journal
    pub(crate) fn detached(&self) -> Bank {
        Bank {
            info: self.info.clone(),
            samples: self.samples.clone(),
            instruments: self.instruments.clone(),
            presets: self.presets.clone(),
            zones: self.zones.clone(),
            index: self.index.clone(),
            journal: None,
        }
    }

    fn record(&mut self, change: Change) {
        self.apply_raw(&change);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(change);
        }
    }

    // === Lookup ===

    pub fn info(&self) -> &BankInfo {
        &self.info
    }

    pub fn sample(&self, id: SampleId) -> Result<&Sample> {
        self.samples.get(id).ok_or(BankError::NotFound { entity: id.into() })
    }

    pub fn instrument(&self, id: InstrumentId) -> Result<&Instrument> {
        self.instruments
            .get(id)
            .ok_or(BankError::NotFound { entity: id.into() })
    }

    pub fn preset(&self, id: PresetId) -> Result<&Preset> {
        self.presets.get(id).ok_or(BankError::NotFound { entity: id.into() })
    }

    pub fn zone(&self, id: ZoneId) -> Result<&Zone> {
        self.zones.get(id).ok_or(BankError::ZoneNotFound { zone: id })
    }

    pub fn samples(&self) -> impl Iterator<Item = (SampleId, &Sample)> + '_ {
        self.samples.iter()
    }

    pub fn instruments(&self) -> impl Iterator<Item = (InstrumentId, &Instrument)> + '_ {
        self.instruments.iter()
    }

    pub fn presets(&self) -> impl Iterator<Item = (PresetId, &Preset)> + '_ {
        self.presets.iter()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn preset_count(&self) -> usize {
        self.presets.len()
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Sample(id) => self.samples.contains(id),
            EntityRef::Instrument(id) => self.instruments.contains(id),
            EntityRef::Preset(id) => self.presets.contains(id),
        }
    }

    pub fn name_of(&self, entity: EntityRef) -> Result<&str> {
        match entity {
            EntityRef::Sample(id) => Ok(&self.sample(id)?.name),
            EntityRef::Instrument(id) => Ok(&self.instrument(id)?.name),
            EntityRef::Preset(id) => Ok(&self.preset(id)?.name),
        }
    }

    /// First entity of `kind` whose name is exactly `name`
    pub fn find_by_name(&self, kind: EntityKind, name: &str) -> Option<EntityRef> {
        match kind {
            EntityKind::Sample => self
                .samples
                .iter()
                .find(|(_, s)| s.name == name)
                .map(|(id, _)| id.into()),
            EntityKind::Instrument => self
                .instruments
                .iter()
                .find(|(_, i)| i.name == name)
                .map(|(id, _)| id.into()),
            EntityKind::Preset => self
                .presets
                .iter()
                .find(|(_, p)| p.name == name)
                .map(|(id, _)| id.into()),
        }
    }

    pub fn find_preset_by_number(&self, bank: u16, program: u16) -> Option<PresetId> {
        self.presets
            .iter()
            .find(|(_, p)| p.bank == bank && p.program == program)
            .map(|(id, _)| id)
    }

    /// Ordered non-global zones of an instrument or preset
    pub fn zones(&self, owner: ZoneOwner) -> Result<&[ZoneId]> {
        match owner {
            ZoneOwner::Instrument(id) => Ok(self.instrument(id)?.zones()),
            ZoneOwner::Preset(id) => Ok(self.preset(id)?.zones()),
        }
    }

    pub fn global_zone(&self, owner: ZoneOwner) -> Result<Option<ZoneId>> {
        match owner {
            ZoneOwner::Instrument(id) => Ok(self.instrument(id)?.global_zone()),
            ZoneOwner::Preset(id) => Ok(self.preset(id)?.global_zone()),
        }
    }

    /// Generators stored across every zone of the bank
    pub fn parameter_count(&self) -> usize {
        self.zones.iter().map(|(_, z)| z.generator_count()).sum()
    }

    // === Creation ===

    /// Add a sample; stereo links are established with [`Bank::link_stereo`]
    pub fn create_sample(&mut self, mut sample: Sample) -> Result<SampleId> {
        check_name(&sample.name)?;
        sample.link = None;
        let id = self.samples.next_id();
        debug!("Creating {} '{}'", id, sample.name);
        self.record(Change::SampleInserted { id, sample });
        Ok(id)
    }

    pub fn create_instrument(&mut self, name: impl Into<String>) -> Result<InstrumentId> {
        let name = name.into();
        check_name(&name)?;
        let id = self.instruments.next_id();
        debug!("Creating {} '{}'", id, name);
        self.record(Change::InstrumentInserted { id, name });
        Ok(id)
    }

    pub fn create_preset(
        &mut self,
        name: impl Into<String>,
        bank: u16,
        program: u16,
    ) -> Result<PresetId> {
        let name = name.into();
        check_name(&name)?;
        check_preset_number(bank, program)?;
        let id = self.presets.next_id();
        debug!("Creating {} '{}' ({}:{})", id, name, bank, program);
        self.record(Change::PresetInserted {
            id,
            header: PresetHeader {
                name,
                bank,
                program,
            },
        });
        Ok(id)
    }

    // === Entity edits ===

    pub fn set_info(&mut self, info: BankInfo) {
        if info == self.info {
            return;
        }
        let before = Box::new(self.info.clone());
        self.record(Change::InfoUpdated {
            before,
            after: Box::new(info),
        });
    }

    pub fn rename(&mut self, entity: EntityRef, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        check_name(&name)?;
        match entity {
            EntityRef::Sample(id) => self.update_sample(id, |s| s.name = name),
            EntityRef::Instrument(id) => {
                let before = self.instrument(id)?.name.clone();
                if before != name {
                    self.record(Change::InstrumentRenamed {
                        id,
                        before,
                        after: name,
                    });
                }
                Ok(())
            }
            EntityRef::Preset(id) => {
                let before = self.preset(id)?.header();
                let after = PresetHeader {
                    name,
                    ..before.clone()
                };
                self.update_preset_header(id, before, after);
                Ok(())
            }
        }
    }

    pub fn set_preset_number(&mut self, id: PresetId, bank: u16, program: u16) -> Result<()> {
        check_preset_number(bank, program)?;
        let before = self.preset(id)?.header();
        let after = PresetHeader {
            bank,
            program,
            ..before.clone()
        };
        self.update_preset_header(id, before, after);
        Ok(())
    }

    fn update_preset_header(&mut self, id: PresetId, before: PresetHeader, after: PresetHeader) {
        if before != after {
            self.record(Change::PresetUpdated { id, before, after });
        }
    }

    /// Edit sample metadata or audio in place
    ///
    /// The stereo link is managed by [`Bank::link_stereo`] and is kept as is.
    pub fn update_sample(&mut self, id: SampleId, edit: impl FnOnce(&mut Sample)) -> Result<()> {
        let before = self.sample(id)?.clone();
        let mut after = before.clone();
        edit(&mut after);
        after.link = before.link;
        check_name(&after.name)?;
        if after != before {
            self.record(Change::SampleUpdated { id, before, after });
        }
        Ok(())
    }

    /// Pair two samples as the left and right halves of a stereo sample
    pub fn link_stereo(&mut self, left: SampleId, right: SampleId) -> Result<()> {
        if left == right {
            return Err(ValidationError::StereoLink {
                reason: format!("{} cannot be its own partner", left),
            }
            .into());
        }
        self.sample(left)?;
        self.sample(right)?;
        self.unlink_stereo(left)?;
        self.unlink_stereo(right)?;
        self.set_link(left, Some(right), SampleType::Left)?;
        self.set_link(right, Some(left), SampleType::Right)
    }

    /// Turn a stereo half (and its partner) back into mono samples
    pub fn unlink_stereo(&mut self, id: SampleId) -> Result<()> {
        let partner = self.sample(id)?.link;
        if let Some(partner) = partner {
            if self.sample(partner).map(|p| p.link == Some(id)).unwrap_or(false) {
                self.set_link(partner, None, SampleType::Mono)?;
            }
            self.set_link(id, None, SampleType::Mono)?;
        }
        Ok(())
    }

    pub(crate) fn set_link(
        &mut self,
        id: SampleId,
        link: Option<SampleId>,
        sample_type: SampleType,
    ) -> Result<()> {
        let before = self.sample(id)?.clone();
        let mut after = before.clone();
        after.link = link;
        after.sample_type = sample_type;
        if after != before {
            self.record(Change::SampleUpdated { id, before, after });
        }
        Ok(())
    }

    // === Deletion ===

    /// Delete an entity once no zone references it
    pub fn delete_entity(&mut self, entity: EntityRef) -> Result<()> {
        match entity {
            EntityRef::Sample(id) => self.delete_sample(id),
            EntityRef::Instrument(id) => self.delete_instrument(id),
            EntityRef::Preset(id) => self.delete_preset(id),
        }
    }

    pub fn delete_sample(&mut self, id: SampleId) -> Result<()> {
        self.sample(id)?;
        self.ensure_unreferenced(id.into())?;
        self.unlink_stereo(id)?;
        let sample = self.sample(id)?.clone();
        debug!("Deleting {} '{}'", id, sample.name);
        self.record(Change::SampleRemoved { id, sample });
        Ok(())
    }

    pub fn delete_instrument(&mut self, id: InstrumentId) -> Result<()> {
        self.instrument(id)?;
        self.ensure_unreferenced(id.into())?;
        self.remove_owner_zones(ZoneOwner::Instrument(id))?;
        let name = self.instrument(id)?.name.clone();
        debug!("Deleting {} '{}'", id, name);
        self.record(Change::InstrumentRemoved { id, name });
        Ok(())
    }

    pub fn delete_preset(&mut self, id: PresetId) -> Result<()> {
        self.preset(id)?;
        self.remove_owner_zones(ZoneOwner::Preset(id))?;
        let header = self.preset(id)?.header();
        debug!("Deleting {} '{}'", id, header.name);
        self.record(Change::PresetRemoved { id, header });
        Ok(())
    }

    fn ensure_unreferenced(&self, entity: EntityRef) -> Result<()> {
        let users = self.index.user_count(entity);
        if users > 0 {
            return Err(BankError::ReferentialIntegrity { entity, users });
        }
        Ok(())
    }

    /// Remove every zone of an owner, global zone last
    pub(crate) fn remove_owner_zones(&mut self, owner: ZoneOwner) -> Result<()> {
        let zones = self.zones(owner)?.to_vec();
        for zone in zones.into_iter().rev() {
            self.remove_zone(zone)?;
        }
        if let Some(global) = self.global_zone(owner)? {
            self.remove_zone(global)?;
        }
        Ok(())
    }

    // === Zones ===

    /// Append a zone referencing `target` to `owner`
    pub fn add_zone(&mut self, owner: ZoneOwner, target: ZoneTarget) -> Result<ZoneId> {
        if !target.fits(owner) {
            return Err(ValidationError::TargetMismatch {
                owner,
                target: target.entity(),
            }
            .into());
        }
        if !self.contains(target.entity()) {
            return Err(BankError::NotFound {
                entity: target.entity(),
            });
        }
        let position = self.zones(owner)?.len();
        let id = self.zones.next_id();
        self.record(Change::ZoneInserted {
            id,
            zone: Zone::new(owner, Some(target)),
            slot: ZoneSlot::Index(position),
        });
        Ok(id)
    }

    /// Create the global zone of `owner`
    pub fn add_global_zone(&mut self, owner: ZoneOwner) -> Result<ZoneId> {
        if self.global_zone(owner)?.is_some() {
            return Err(BankError::GlobalZoneConflict { owner });
        }
        let id = self.zones.next_id();
        self.record(Change::ZoneInserted {
            id,
            zone: Zone::new(owner, None),
            slot: ZoneSlot::Global,
        });
        Ok(id)
    }

    /// Existing global zone of `owner`, created on demand
    pub fn ensure_global_zone(&mut self, owner: ZoneOwner) -> Result<ZoneId> {
        match self.global_zone(owner)? {
            Some(id) => Ok(id),
            None => self.add_global_zone(owner),
        }
    }

    pub fn remove_zone(&mut self, id: ZoneId) -> Result<Zone> {
        let zone = self.zone(id)?.clone();
        let slot = if self.global_zone(zone.owner)? == Some(id) {
            ZoneSlot::Global
        } else {
            let position = self
                .zones(zone.owner)?
                .iter()
                .position(|z| *z == id)
                .ok_or(BankError::ZoneNotFound { zone: id })?;
            ZoneSlot::Index(position)
        };
        self.record(Change::ZoneRemoved {
            id,
            zone: zone.clone(),
            slot,
        });
        Ok(zone)
    }

    pub fn reorder_zone(&mut self, owner: ZoneOwner, from: usize, to: usize) -> Result<()> {
        let len = self.zones(owner)?.len();
        for index in [from, to] {
            if index >= len {
                return Err(ValidationError::ZonePosition { index, len }.into());
            }
        }
        if from != to {
            self.record(Change::ZoneMoved { owner, from, to });
        }
        Ok(())
    }

    fn update_zone(&mut self, id: ZoneId, edit: impl FnOnce(&mut Zone)) -> Result<()> {
        let before = self.zone(id)?.clone();
        let mut after = before.clone();
        edit(&mut after);
        if after != before {
            self.record(Change::ZoneUpdated { id, before, after });
        }
        Ok(())
    }

    pub fn set_generator(
        &mut self,
        zone: ZoneId,
        generator: Generator,
        amount: impl Into<GenAmount>,
    ) -> Result<()> {
        let amount = amount.into();
        let owner = self.zone(zone)?.owner;
        validate_generator(owner, generator, amount)?;
        self.update_zone(zone, |z| {
            z.generators.insert(generator, amount);
        })
    }

    /// Remove a local value; the zone falls back to its global zone
    pub fn clear_generator(
        &mut self,
        zone: ZoneId,
        generator: Generator,
    ) -> Result<Option<GenAmount>> {
        let previous = self.zone(zone)?.generator(generator);
        if previous.is_some() {
            self.update_zone(zone, |z| {
                z.generators.remove(&generator);
            })?;
        }
        Ok(previous)
    }

    /// Attach a modulator, replacing the amount of an identical one
    ///
    /// Returns the index of the modulator inside the zone.
    pub fn attach_modulator(&mut self, zone: ZoneId, modulator: Modulator) -> Result<usize> {
        ZoneResolver::new(self).validate_modulator(zone, &modulator)?;
        let existing = self
            .zone(zone)?
            .modulators
            .iter()
            .position(|m| m.is_identical(&modulator));
        match existing {
            Some(index) => {
                self.update_zone(zone, |z| z.modulators[index].amount = modulator.amount)?;
                Ok(index)
            }
            None => {
                let index = self.zone(zone)?.modulators.len();
                self.update_zone(zone, |z| z.modulators.push(modulator))?;
                Ok(index)
            }
        }
    }

    /// Remove a modulator along with the modulators chained into it
    pub fn remove_modulator(&mut self, zone: ZoneId, index: usize) -> Result<Modulator> {
        let modulators = self.zone(zone)?.modulators.clone();
        let removed = modulators
            .get(index)
            .cloned()
            .ok_or(ValidationError::ModulatorIndex {
                index,
                len: modulators.len(),
            })?;

        let mut doomed = vec![index];
        loop {
            let before = doomed.len();
            for (i, m) in modulators.iter().enumerate() {
                if let ModDestination::Link(target) = m.destination {
                    if doomed.contains(&target) && !doomed.contains(&i) {
                        doomed.push(i);
                    }
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        let kept: Vec<Modulator> = modulators
            .iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, m)| {
                let mut m = m.clone();
                if let ModDestination::Link(target) = m.destination {
                    let shift = doomed.iter().filter(|d| **d < target).count();
                    m.destination = ModDestination::Link(target - shift);
                }
                m
            })
            .collect();
        self.update_zone(zone, |z| z.modulators = kept)?;
        Ok(removed)
    }

    /// Overwrite generators and modulators of a zone with a body copied
    /// from a zone of the same level
    pub(crate) fn set_zone_body(
        &mut self,
        zone: ZoneId,
        generators: BTreeMap<Generator, GenAmount>,
        modulators: Vec<Modulator>,
    ) -> Result<()> {
        self.update_zone(zone, |z| {
            z.generators = generators;
            z.modulators = modulators;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::RangeAmount;
    use pretty_assertions::assert_eq;

    fn bank_with_instrument() -> (Bank, SampleId, InstrumentId, ZoneId) {
        let mut bank = Bank::new("test");
        let sample = bank
            .create_sample(Sample::new("Kick", vec![0.0; 64], 44100))
            .unwrap();
        let instrument = bank.create_instrument("Drums").unwrap();
        let zone = bank
            .add_zone(ZoneOwner::Instrument(instrument), ZoneTarget::Sample(sample))
            .unwrap();
        (bank, sample, instrument, zone)
    }

    #[test]
    fn test_create_and_lookup() {
        let (bank, sample, instrument, zone) = bank_with_instrument();
        assert_eq!(bank.sample(sample).unwrap().name, "Kick");
        assert_eq!(bank.zones(ZoneOwner::Instrument(instrument)).unwrap(), &[zone]);
        assert_eq!(
            bank.find_by_name(EntityKind::Instrument, "Drums"),
            Some(EntityRef::Instrument(instrument))
        );
        assert!(bank.find_by_name(EntityKind::Sample, "Snare").is_none());
    }

    #[test]
    fn test_detached_copy_drops_open_journal() {
        let (mut bank, _, instrument, _) = bank_with_instrument();
        bank.begin_journal();
        bank.rename(instrument.into(), "Kit").unwrap();

        let copy = bank.detached();
        assert!(copy.journal.is_none());
        assert_eq!(copy.instrument(instrument).unwrap().name, "Kit");
        assert_eq!(bank.end_journal().len(), 1);
    }

    #[test]
    fn test_delete_sample_blocked_while_referenced() {
        let (mut bank, sample, _, zone) = bank_with_instrument();

        let err = bank.delete_sample(sample).unwrap_err();
        assert!(matches!(
            err,
            BankError::ReferentialIntegrity { users: 1, .. }
        ));
        assert!(bank.contains(sample.into()));

        bank.remove_zone(zone).unwrap();
        bank.delete_sample(sample).unwrap();
        assert!(!bank.contains(sample.into()));
    }

    #[test]
    fn test_target_must_fit_owner() {
        let (mut bank, sample, _, _) = bank_with_instrument();
        let preset = bank.create_preset("Kit", 0, 0).unwrap();
        let err = bank
            .add_zone(ZoneOwner::Preset(preset), ZoneTarget::Sample(sample))
            .unwrap_err();
        assert!(matches!(
            err,
            BankError::Validation(ValidationError::TargetMismatch { .. })
        ));
    }

    #[test]
    fn test_single_global_zone() {
        let (mut bank, _, instrument, _) = bank_with_instrument();
        let owner = ZoneOwner::Instrument(instrument);
        let global = bank.add_global_zone(owner).unwrap();
        assert!(matches!(
            bank.add_global_zone(owner),
            Err(BankError::GlobalZoneConflict { .. })
        ));
        assert_eq!(bank.ensure_global_zone(owner).unwrap(), global);
    }

    #[test]
    fn test_reorder_zone() {
        let (mut bank, sample, instrument, first) = bank_with_instrument();
        let owner = ZoneOwner::Instrument(instrument);
        let second = bank.add_zone(owner, ZoneTarget::Sample(sample)).unwrap();

        bank.reorder_zone(owner, 1, 0).unwrap();
        assert_eq!(bank.zones(owner).unwrap(), &[second, first]);
        assert!(bank.reorder_zone(owner, 0, 2).is_err());
    }

    #[test]
    fn test_offset_generator_rejected_on_preset() {
        let (mut bank, _, instrument, zone) = bank_with_instrument();
        bank.set_generator(zone, Generator::StartAddrsOffset, 100_i16).unwrap();

        let preset = bank.create_preset("Kit", 0, 0).unwrap();
        let preset_zone = bank
            .add_zone(ZoneOwner::Preset(preset), ZoneTarget::Instrument(instrument))
            .unwrap();
        let err = bank
            .set_generator(preset_zone, Generator::StartAddrsOffset, 100_i16)
            .unwrap_err();
        assert!(matches!(
            err,
            BankError::Validation(ValidationError::IllegalGenerator { .. })
        ));
    }

    #[test]
    fn test_generator_amount_validation() {
        let (mut bank, _, _, zone) = bank_with_instrument();
        assert!(bank.set_generator(zone, Generator::Pan, 900_i16).is_err());
        assert!(bank.set_generator(zone, Generator::KeyRange, 10_i16).is_err());
        assert!(bank
            .set_generator(zone, Generator::KeyRange, RangeAmount::new(60, 40))
            .is_err());
        bank.set_generator(zone, Generator::KeyRange, RangeAmount::new(40, 60))
            .unwrap();
        assert_eq!(bank.zone(zone).unwrap().key_range(), RangeAmount::new(40, 60));
    }

    #[test]
    fn test_rejected_edit_leaves_bank_unchanged() {
        let (mut bank, _, _, zone) = bank_with_instrument();
        let before = bank.to_json().unwrap();
        assert!(bank.set_generator(zone, Generator::SampleId, 1_i16).is_err());
        assert!(bank.rename(EntityRef::Sample(SampleId(0)), "  ").is_err());
        assert_eq!(bank.to_json().unwrap(), before);
    }

    #[test]
    fn test_stereo_link_cleared_on_delete() {
        let mut bank = Bank::new("test");
        let left = bank.create_sample(Sample::new("Pad L", vec![0.0; 8], 44100)).unwrap();
        let right = bank.create_sample(Sample::new("Pad R", vec![0.0; 8], 44100)).unwrap();
        bank.link_stereo(left, right).unwrap();
        assert_eq!(bank.sample(left).unwrap().link, Some(right));
        assert_eq!(bank.sample(right).unwrap().sample_type, SampleType::Right);

        bank.delete_sample(left).unwrap();
        let right = bank.sample(right).unwrap();
        assert_eq!(right.link, None);
        assert_eq!(right.sample_type, SampleType::Mono);
    }

    #[test]
    fn test_remove_modulator_drops_chained_links() {
        use crate::bank::{Controller, ModSource};

        let (mut bank, _, _, zone) = bank_with_instrument();
        let base = Modulator::to_generator(
            ModSource::new(Controller::Midi(1)),
            Generator::InitialFilterFc,
            -2400,
        );
        let chained = Modulator::new(
            ModSource::new(Controller::Midi(2)),
            ModDestination::Link(0),
            100,
        );
        let other = Modulator::to_generator(
            ModSource::new(Controller::NoteOnVelocity),
            Generator::InitialAttenuation,
            960,
        );
        bank.attach_modulator(zone, base.clone()).unwrap();
        bank.attach_modulator(zone, chained).unwrap();
        bank.attach_modulator(zone, other.clone()).unwrap();

        let removed = bank.remove_modulator(zone, 0).unwrap();
        assert_eq!(removed, base);
        assert_eq!(bank.zone(zone).unwrap().modulators(), &[other]);
    }

    #[test]
    fn test_json_round_trip_rebuilds_references() {
        let (bank, sample, _, _) = bank_with_instrument();
        let loaded = Bank::from_json(&bank.to_json().unwrap()).unwrap();
        assert_eq!(loaded.index.user_count(sample.into()), 1);
    }

    #[test]
    fn test_corrupt_json_is_a_file_format_error() {
        let (bank, _, _, _) = bank_with_instrument();
        let mut value: serde_json::Value = serde_json::from_str(&bank.to_json().unwrap()).unwrap();
        value["samples"]["slots"] = serde_json::json!([]);
        let err = Bank::from_json(&value.to_string()).unwrap_err();
        assert_eq!(err.error_code(), "FILE_FORMAT_ERROR");
    }
}

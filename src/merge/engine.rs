//! Duplication and merge runs
//!
//! A run copies a selection and its dependency closure from a source bank
//! into a destination bank, leaves first: samples, then instruments, then
//! presets. Collisions are decided top-down before anything is copied, so
//! the dependencies of an ignored entity stay in the source. Every copied
//! zone target is rewritten through the remap table, so an ignored
//! collision makes dependents point at the entity that was already in the
//! destination.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};
use serde::Serialize;

use super::policy::{ConflictDecision, ConflictPolicy, FixedPolicy, NameConflict, Resolution};
use crate::bank::{
    Bank, EntityKind, EntityRef, InstrumentId, PresetId, SampleId, SampleType, ZoneId, ZoneOwner,
    ZoneTarget, MAX_BANK_NUMBER, MAX_PROGRAM_NUMBER,
};
use crate::cancel::CancelToken;
use crate::error::{BankError, ResourceKind, Result, ValidationError};

/// Longest name a bank entity can carry
pub const MAX_NAME_LEN: usize = 20;

/// Source id to destination id, per entity kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemapTable {
    pub samples: BTreeMap<SampleId, SampleId>,
    pub instruments: BTreeMap<InstrumentId, InstrumentId>,
    pub presets: BTreeMap<PresetId, PresetId>,
}

impl RemapTable {
    pub fn get(&self, source: EntityRef) -> Option<EntityRef> {
        match source {
            EntityRef::Sample(id) => self.samples.get(&id).map(|d| (*d).into()),
            EntityRef::Instrument(id) => self.instruments.get(&id).map(|d| (*d).into()),
            EntityRef::Preset(id) => self.presets.get(&id).map(|d| (*d).into()),
        }
    }

    pub fn target(&self, source: ZoneTarget) -> Option<ZoneTarget> {
        match source {
            ZoneTarget::Sample(id) => self.samples.get(&id).map(|d| ZoneTarget::Sample(*d)),
            ZoneTarget::Instrument(id) => {
                self.instruments.get(&id).map(|d| ZoneTarget::Instrument(*d))
            }
        }
    }

    fn insert(&mut self, source: EntityRef, dest: EntityRef) {
        match (source, dest) {
            (EntityRef::Sample(s), EntityRef::Sample(d)) => {
                self.samples.insert(s, d);
            }
            (EntityRef::Instrument(s), EntityRef::Instrument(d)) => {
                self.instruments.insert(s, d);
            }
            (EntityRef::Preset(s), EntityRef::Preset(d)) => {
                self.presets.insert(s, d);
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len() + self.instruments.len() + self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-fatal events of a merge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MergeWarning {
    /// The destination already had a global zone ("parameters already
    /// set"); the source global zone was not copied
    GlobalZoneConflict { owner: ZoneOwner },
    /// The copied preset's bank/program was taken
    PresetRenumbered {
        preset: PresetId,
        from: (u16, u16),
        to: (u16, u16),
    },
}

/// A collision the policy declined to answer; resolved as Ignore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedConflict {
    pub kind: EntityKind,
    pub name: String,
}

/// Outcome of a merge run, with destination ids
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub created: Vec<EntityRef>,
    pub replaced: Vec<EntityRef>,
    pub ignored: Vec<EntityRef>,
    pub unresolved: Vec<UnresolvedConflict>,
    pub warnings: Vec<MergeWarning>,
    /// The run stopped early; entities processed before that stay committed
    pub cancelled: bool,
    pub remap: RemapTable,
}

impl MergeReport {
    pub fn processed(&self) -> usize {
        self.created.len() + self.replaced.len() + self.ignored.len()
    }
}

/// Selection plus everything it depends on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    pub samples: BTreeSet<SampleId>,
    pub instruments: BTreeSet<InstrumentId>,
    pub presets: BTreeSet<PresetId>,
}

impl Closure {
    pub fn len(&self) -> usize {
        self.samples.len() + self.instruments.len() + self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn missing(dependency: impl ToString, required_by: impl ToString) -> BankError {
    BankError::DependencyMissing {
        dependency: dependency.to_string(),
        required_by: required_by.to_string(),
    }
}

/// Global zone first, then the ordered zones
fn owner_zone_ids(bank: &Bank, owner: ZoneOwner) -> Result<Vec<ZoneId>> {
    let mut ids: Vec<ZoneId> = bank.global_zone(owner)?.into_iter().collect();
    ids.extend_from_slice(bank.zones(owner)?);
    Ok(ids)
}

/// Transitive dependencies of `selection` in `source`
///
/// Fails with `DependencyMissing` when the source graph points at an entity
/// that does not exist; nothing has been copied at that point.
pub fn collect_closure(source: &Bank, selection: &[EntityRef]) -> Result<Closure> {
    let mut closure = selected(source, selection)?;

    for preset in &closure.presets {
        let owner = ZoneOwner::Preset(*preset);
        for zone in owner_zone_ids(source, owner)? {
            let zone = source.zone(zone).map_err(|_| missing(zone, owner))?;
            if let Some(ZoneTarget::Instrument(id)) = zone.target {
                if !source.contains(id.into()) {
                    return Err(missing(id, owner));
                }
                closure.instruments.insert(id);
            }
        }
    }

    for instrument in &closure.instruments {
        let owner = ZoneOwner::Instrument(*instrument);
        for zone in owner_zone_ids(source, owner)? {
            let zone = source.zone(zone).map_err(|_| missing(zone, owner))?;
            if let Some(ZoneTarget::Sample(id)) = zone.target {
                if !source.contains(id.into()) {
                    return Err(missing(id, owner));
                }
                closure.samples.insert(id);
            }
        }
    }

    let mut partners = Vec::new();
    for sample in &closure.samples {
        if let Some(partner) = source.sample(*sample)?.link {
            if !source.contains(partner.into()) {
                return Err(missing(partner, sample));
            }
            partners.push(partner);
        }
    }
    closure.samples.extend(partners);
    Ok(closure)
}

/// The selection itself, sorted by kind
fn selected(source: &Bank, selection: &[EntityRef]) -> Result<Closure> {
    let mut closure = Closure::default();
    for entity in selection {
        if !source.contains(*entity) {
            return Err(missing(entity, "selection"));
        }
        match *entity {
            EntityRef::Sample(id) => {
                closure.samples.insert(id);
            }
            EntityRef::Instrument(id) => {
                closure.instruments.insert(id);
            }
            EntityRef::Preset(id) => {
                closure.presets.insert(id);
            }
        }
    }
    Ok(closure)
}

/// `name` with the first free "-n" suffix, kept within [`MAX_NAME_LEN`]
pub fn disambiguate_name(bank: &Bank, kind: EntityKind, name: &str) -> String {
    let mut n = 1usize;
    loop {
        let suffix = format!("-{}", n);
        let keep = MAX_NAME_LEN.saturating_sub(suffix.chars().count());
        let base: String = name.chars().take(keep).collect();
        let candidate = format!("{}{}", base.trim_end(), suffix);
        if bank.find_by_name(kind, &candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// First free bank/program at or after the requested one
pub fn free_preset_number(bank: &Bank, number: u16, program: u16) -> Result<(u16, u16)> {
    let programs = MAX_PROGRAM_NUMBER as usize + 1;
    let slots = (MAX_BANK_NUMBER as usize + 1) * programs;
    let start = number as usize * programs + program as usize;
    for step in 0..slots {
        let slot = (start + step) % slots;
        let (b, p) = ((slot / programs) as u16, (slot % programs) as u16);
        if bank.find_preset_by_number(b, p).is_none() {
            return Ok((b, p));
        }
    }
    Err(BankError::ResourceLimitExceeded {
        resource: ResourceKind::PresetNumbers,
        limit: slots,
        actual: bank.preset_count() + 1,
    })
}

/// Configured merge run factory
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    strict: bool,
    cancel: CancelToken,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `NameCollisionUnresolved` instead of ignoring collisions
    /// the policy does not answer
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Copy `selection` and its dependencies from `source` into `dest`
    pub fn import(
        &self,
        source: &Bank,
        dest: &mut Bank,
        selection: &[EntityRef],
        policy: &mut dyn ConflictPolicy,
    ) -> Result<MergeReport> {
        let closure = collect_closure(source, selection)?;
        info!(
            "Importing {} sample(s), {} instrument(s), {} preset(s) into '{}'",
            closure.samples.len(),
            closure.instruments.len(),
            closure.presets.len(),
            dest.info().name
        );
        let roots = selected(source, selection)?;
        let mut run = MergeRun::new(self, source, dest, policy);
        run.copy_closure(&closure, &roots)?;
        Ok(run.finish())
    }

    /// Append the zones of `from` (in `source`) to the existing `into`
    ///
    /// Zone targets are imported first with the same policy. A source
    /// global zone is dropped with a warning when `into` already has one.
    pub fn merge_into(
        &self,
        source: &Bank,
        from: ZoneOwner,
        dest: &mut Bank,
        into: ZoneOwner,
        policy: &mut dyn ConflictPolicy,
    ) -> Result<MergeReport> {
        if from.is_preset() != into.is_preset() {
            return Err(ValidationError::KindMismatch {
                expected: into.entity().kind(),
                entity: from.entity(),
            }
            .into());
        }
        if !source.contains(from.entity()) {
            return Err(missing(from, "selection"));
        }
        dest.global_zone(into)?;

        let mut targets = Vec::new();
        for zone in source.zones(from)? {
            let zone = source.zone(*zone).map_err(|_| missing(zone, from))?;
            if let Some(target) = zone.target {
                targets.push(target.entity());
            }
        }
        targets.sort();
        targets.dedup();
        let closure = collect_closure(source, &targets)?;
        let roots = selected(source, &targets)?;

        let mut run = MergeRun::new(self, source, dest, policy);
        run.copy_closure(&closure, &roots)?;
        if !run.report.cancelled {
            run.copy_body(from, into)?;
        }
        Ok(run.finish())
    }

    /// Copy entities inside one bank under disambiguated names
    ///
    /// Dependencies outside the selection are shared with the originals.
    pub fn duplicate_within(
        &self,
        bank: &mut Bank,
        selection: &[EntityRef],
    ) -> Result<MergeReport> {
        let source = bank.detached();
        let closure = selected(&source, selection)?;

        let mut policy = FixedPolicy(ConflictDecision::DuplicateAll);
        let mut run = MergeRun::new(self, &source, bank, &mut policy);
        for id in source.samples.ids() {
            run.report.remap.samples.insert(id, id);
        }
        for id in source.instruments.ids() {
            run.report.remap.instruments.insert(id, id);
        }
        run.copy_closure(&closure, &closure)?;
        let mut report = run.finish();
        report
            .remap
            .samples
            .retain(|s, d| *s != *d || closure.samples.contains(s));
        report
            .remap
            .instruments
            .retain(|s, d| *s != *d || closure.instruments.contains(s));
        Ok(report)
    }
}

/// State of one run: sticky decisions, remap table and report
struct MergeRun<'a> {
    source: &'a Bank,
    dest: &'a mut Bank,
    policy: &'a mut dyn ConflictPolicy,
    strict: bool,
    cancel: CancelToken,
    sticky: HashMap<EntityKind, Resolution>,
    /// Collision outcome per planned source entity; `None` when nothing
    /// collides
    decided: HashMap<EntityRef, Option<(Resolution, EntityRef)>>,
    /// Destination samples that received source content in this run
    written: HashSet<SampleId>,
    report: MergeReport,
}

impl<'a> MergeRun<'a> {
    fn new(
        engine: &MergeEngine,
        source: &'a Bank,
        dest: &'a mut Bank,
        policy: &'a mut dyn ConflictPolicy,
    ) -> Self {
        Self {
            source,
            dest,
            policy,
            strict: engine.strict,
            cancel: engine.cancel.clone(),
            sticky: HashMap::new(),
            decided: HashMap::new(),
            written: HashSet::new(),
            report: MergeReport::default(),
        }
    }

    fn finish(self) -> MergeReport {
        info!(
            "Merge finished: {} created, {} replaced, {} ignored{}",
            self.report.created.len(),
            self.report.replaced.len(),
            self.report.ignored.len(),
            if self.report.cancelled { " (cancelled)" } else { "" }
        );
        self.report
    }

    fn check_cancelled(&mut self) -> bool {
        if !self.report.cancelled && self.cancel.is_cancelled() {
            warn!("Merge cancelled after {} entities", self.report.processed());
            self.report.cancelled = true;
        }
        self.report.cancelled
    }

    fn copy_closure(&mut self, closure: &Closure, roots: &Closure) -> Result<()> {
        let closure = self.plan(closure, roots)?;
        for id in &closure.samples {
            if self.check_cancelled() {
                break;
            }
            self.copy_sample(*id)?;
        }
        self.relink_stereo_pairs()?;

        for id in &closure.instruments {
            if self.check_cancelled() {
                return Ok(());
            }
            self.copy_instrument(*id)?;
        }
        for id in &closure.presets {
            if self.check_cancelled() {
                return Ok(());
            }
            self.copy_preset(*id)?;
        }
        Ok(())
    }

    /// Decide every collision top-down and keep only what is needed
    ///
    /// An entity is needed when it was selected or when a needed entity
    /// that is not ignored uses it. Ignored entities stay in the plan so
    /// references to them are remapped onto the existing destination entity.
    fn plan(&mut self, closure: &Closure, roots: &Closure) -> Result<Closure> {
        let source = self.source;
        let mut plan = Closure::default();

        for id in &closure.presets {
            self.decide(EntityKind::Preset, &source.preset(*id)?.name, (*id).into())?;
            plan.presets.insert(*id);
        }

        let mut wanted = roots.instruments.clone();
        for id in &plan.presets {
            if !self.is_ignored((*id).into()) {
                for zone in owner_zone_ids(source, ZoneOwner::Preset(*id))? {
                    if let Some(ZoneTarget::Instrument(target)) = source.zone(zone)?.target {
                        wanted.insert(target);
                    }
                }
            }
        }
        for id in closure.instruments.intersection(&wanted) {
            self.decide(EntityKind::Instrument, &source.instrument(*id)?.name, (*id).into())?;
            plan.instruments.insert(*id);
        }

        let mut wanted = roots.samples.clone();
        for id in &plan.instruments {
            if !self.is_ignored((*id).into()) {
                for zone in owner_zone_ids(source, ZoneOwner::Instrument(*id))? {
                    if let Some(ZoneTarget::Sample(target)) = source.zone(zone)?.target {
                        wanted.insert(target);
                    }
                }
            }
        }
        for id in closure.samples.intersection(&wanted) {
            self.decide(EntityKind::Sample, &source.sample(*id)?.name, (*id).into())?;
            plan.samples.insert(*id);
        }
        // Stereo partners of copied halves
        let partners: Vec<SampleId> = plan
            .samples
            .iter()
            .filter(|id| !self.is_ignored((**id).into()))
            .filter_map(|id| source.sample(*id).ok().and_then(|s| s.link))
            .filter(|p| closure.samples.contains(p) && !plan.samples.contains(p))
            .collect();
        for id in partners {
            self.decide(EntityKind::Sample, &source.sample(id)?.name, id.into())?;
            plan.samples.insert(id);
        }

        let skipped = closure.len() - plan.len();
        if skipped > 0 {
            debug!("{} dependencies of ignored entities are left out", skipped);
        }
        Ok(plan)
    }

    fn decide(&mut self, kind: EntityKind, name: &str, source: EntityRef) -> Result<()> {
        let resolved = self.resolve(kind, name, source)?;
        self.decided.insert(source, resolved);
        Ok(())
    }

    fn decision(&self, source: EntityRef) -> Option<(Resolution, EntityRef)> {
        self.decided.get(&source).copied().flatten()
    }

    fn is_ignored(&self, source: EntityRef) -> bool {
        matches!(self.decision(source), Some((Resolution::Ignore, _)))
    }

    /// Resolution for `name`, or `None` when nothing collides
    fn resolve(
        &mut self,
        kind: EntityKind,
        name: &str,
        source: EntityRef,
    ) -> Result<Option<(Resolution, EntityRef)>> {
        let Some(existing) = self.dest.find_by_name(kind, name) else {
            return Ok(None);
        };
        if let Some(resolution) = self.sticky.get(&kind) {
            return Ok(Some((*resolution, existing)));
        }

        let conflict = NameConflict {
            kind,
            name,
            source,
            existing,
        };
        match self.policy.decide(&conflict) {
            Some(decision) => {
                if decision.is_sticky() {
                    debug!("{:?} now applies to every {} collision", decision, kind);
                    self.sticky.insert(kind, decision.resolution());
                }
                Ok(Some((decision.resolution(), existing)))
            }
            None if self.strict => Err(BankError::NameCollisionUnresolved {
                kind,
                name: name.to_string(),
            }),
            None => {
                warn!("No decision for {} '{}', keeping the existing one", kind, name);
                self.report.unresolved.push(UnresolvedConflict {
                    kind,
                    name: name.to_string(),
                });
                Ok(Some((Resolution::Ignore, existing)))
            }
        }
    }

    /// Name for a copy planned without a collision; a name taken since by
    /// an entity copied earlier in this run gets a suffix
    fn fresh_name(&self, kind: EntityKind, name: &str) -> String {
        if self.dest.find_by_name(kind, name).is_none() {
            return name.to_string();
        }
        let fresh = disambiguate_name(self.dest, kind, name);
        debug!("{} '{}' is copied as '{}'", kind, name, fresh);
        fresh
    }

    fn record(&mut self, source: EntityRef, dest: EntityRef, resolution: Option<Resolution>) {
        self.report.remap.insert(source, dest);
        match resolution {
            None | Some(Resolution::Duplicate) => self.report.created.push(dest),
            Some(Resolution::Replace) => self.report.replaced.push(dest),
            Some(Resolution::Ignore) => self.report.ignored.push(dest),
        }
    }

    fn copy_sample(&mut self, id: SampleId) -> Result<()> {
        let source = self.source;
        let sample = source.sample(id)?;
        let resolved = self.decision(id.into());
        let dest_id = match resolved {
            None => {
                let mut copy = sample.clone();
                copy.name = self.fresh_name(EntityKind::Sample, &sample.name);
                self.dest.create_sample(copy)?
            }
            Some((Resolution::Duplicate, _)) => {
                let mut copy = sample.clone();
                copy.name = disambiguate_name(self.dest, EntityKind::Sample, &sample.name);
                self.dest.create_sample(copy)?
            }
            Some((Resolution::Replace, existing)) => {
                let existing = existing
                    .as_sample()
                    .ok_or(ValidationError::KindMismatch {
                        expected: EntityKind::Sample,
                        entity: existing,
                    })?;
                self.dest.update_sample(existing, |s| {
                    let sample_type = s.sample_type;
                    *s = sample.clone();
                    s.sample_type = sample_type;
                })?;
                existing
            }
            Some((Resolution::Ignore, existing)) => {
                self.record(id.into(), existing, Some(Resolution::Ignore));
                return Ok(());
            }
        };
        self.written.insert(dest_id);
        self.record(id.into(), dest_id.into(), resolved.map(|(r, _)| r));
        Ok(())
    }

    /// Re-pair copied stereo halves whose partner was copied too
    fn relink_stereo_pairs(&mut self) -> Result<()> {
        let source = self.source;
        let mut pairs = Vec::new();
        for (src, dst) in &self.report.remap.samples {
            let sample = source.sample(*src)?;
            let Some(partner) = sample.link else {
                continue;
            };
            let Some(dst_partner) = self.report.remap.samples.get(&partner) else {
                continue;
            };
            if *src < partner && self.written.contains(dst) && self.written.contains(dst_partner) {
                if sample.sample_type == SampleType::Right {
                    pairs.push((*dst_partner, *dst));
                } else {
                    pairs.push((*dst, *dst_partner));
                }
            }
        }
        for (left, right) in pairs {
            self.dest.link_stereo(left, right)?;
        }
        Ok(())
    }

    fn copy_instrument(&mut self, id: InstrumentId) -> Result<()> {
        let source = self.source;
        let name = &source.instrument(id)?.name;
        let resolved = self.decision(id.into());
        let dest_id = match resolved {
            None => {
                let fresh = self.fresh_name(EntityKind::Instrument, name);
                self.dest.create_instrument(fresh)?
            }
            Some((Resolution::Duplicate, _)) => {
                let copy = disambiguate_name(self.dest, EntityKind::Instrument, name);
                self.dest.create_instrument(copy)?
            }
            Some((Resolution::Replace, existing)) => {
                let existing = existing
                    .as_instrument()
                    .ok_or(ValidationError::KindMismatch {
                        expected: EntityKind::Instrument,
                        entity: existing,
                    })?;
                self.dest.remove_owner_zones(ZoneOwner::Instrument(existing))?;
                existing
            }
            Some((Resolution::Ignore, existing)) => {
                self.record(id.into(), existing, Some(Resolution::Ignore));
                return Ok(());
            }
        };
        self.copy_body(ZoneOwner::Instrument(id), ZoneOwner::Instrument(dest_id))?;
        self.record(id.into(), dest_id.into(), resolved.map(|(r, _)| r));
        Ok(())
    }

    fn copy_preset(&mut self, id: PresetId) -> Result<()> {
        let source = self.source;
        let preset = source.preset(id)?;
        let resolved = self.decision(id.into());
        let dest_id = match resolved {
            None | Some((Resolution::Duplicate, _)) => {
                let name = match resolved {
                    None => self.fresh_name(EntityKind::Preset, &preset.name),
                    Some(_) => disambiguate_name(self.dest, EntityKind::Preset, &preset.name),
                };
                let number = free_preset_number(self.dest, preset.bank, preset.program)?;
                let new = self.dest.create_preset(name, number.0, number.1)?;
                if number != (preset.bank, preset.program) {
                    debug!(
                        "{} moved from {}:{} to {}:{}",
                        new, preset.bank, preset.program, number.0, number.1
                    );
                    self.report.warnings.push(MergeWarning::PresetRenumbered {
                        preset: new,
                        from: (preset.bank, preset.program),
                        to: number,
                    });
                }
                new
            }
            Some((Resolution::Replace, existing)) => {
                let existing = existing
                    .as_preset()
                    .ok_or(ValidationError::KindMismatch {
                        expected: EntityKind::Preset,
                        entity: existing,
                    })?;
                self.dest.remove_owner_zones(ZoneOwner::Preset(existing))?;
                existing
            }
            Some((Resolution::Ignore, existing)) => {
                self.record(id.into(), existing, Some(Resolution::Ignore));
                return Ok(());
            }
        };
        self.copy_body(ZoneOwner::Preset(id), ZoneOwner::Preset(dest_id))?;
        self.record(id.into(), dest_id.into(), resolved.map(|(r, _)| r));
        Ok(())
    }

    /// Copy the zones of `from` onto `into`, rewriting targets
    fn copy_body(&mut self, from: ZoneOwner, into: ZoneOwner) -> Result<()> {
        let source = self.source;
        if let Some(global) = source.global_zone(from)? {
            let zone = source.zone(global)?;
            match self.dest.global_zone(into)? {
                None => {
                    let copy = self.dest.add_global_zone(into)?;
                    self.dest
                        .set_zone_body(copy, zone.generators.clone(), zone.modulators.clone())?;
                }
                Some(_) => {
                    warn!("{} already has a global zone, skipping the copied one", into);
                    self.report
                        .warnings
                        .push(MergeWarning::GlobalZoneConflict { owner: into });
                }
            }
        }

        for zone_id in source.zones(from)? {
            let zone = source.zone(*zone_id)?;
            let Some(target) = zone.target else {
                continue;
            };
            let mapped = self
                .report
                .remap
                .target(target)
                .ok_or_else(|| missing(target.entity(), from))?;
            let copy = self.dest.add_zone(into, mapped)?;
            self.dest
                .set_zone_body(copy, zone.generators.clone(), zone.modulators.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Controller, GenAmount, Generator, ModSource, Modulator, RangeAmount, Sample};
    use pretty_assertions::assert_eq;

    fn sample(name: &str, level: f32) -> Sample {
        Sample::new(name, vec![level; 32], 44100).with_loop(4, 28)
    }

    /// Preset "Grand" -> instrument "Piano" -> samples "Piano A", "Piano B"
    fn piano_bank() -> Bank {
        let mut bank = Bank::new("source");
        let a = bank.create_sample(sample("Piano A", 0.1)).unwrap();
        let b = bank.create_sample(sample("Piano B", 0.2)).unwrap();
        let piano = bank.create_instrument("Piano").unwrap();
        let owner = ZoneOwner::Instrument(piano);
        let global = bank.add_global_zone(owner).unwrap();
        bank.set_generator(global, Generator::ReleaseVolEnv, 1200_i16).unwrap();
        let za = bank.add_zone(owner, ZoneTarget::Sample(a)).unwrap();
        bank.set_generator(za, Generator::KeyRange, RangeAmount::new(0, 63)).unwrap();
        let zb = bank.add_zone(owner, ZoneTarget::Sample(b)).unwrap();
        bank.set_generator(zb, Generator::KeyRange, RangeAmount::new(64, 127)).unwrap();
        bank.attach_modulator(
            zb,
            Modulator::to_generator(
                ModSource::new(Controller::Midi(1)),
                Generator::VibLfoToPitch,
                30,
            ),
        )
        .unwrap();

        let grand = bank.create_preset("Grand", 0, 0).unwrap();
        bank.add_zone(ZoneOwner::Preset(grand), ZoneTarget::Instrument(piano))
            .unwrap();
        bank
    }

    fn grand(bank: &Bank) -> EntityRef {
        bank.find_by_name(EntityKind::Preset, "Grand").unwrap()
    }

    fn no_prompts() -> impl FnMut(&NameConflict<'_>) -> Option<ConflictDecision> {
        |conflict| panic!("unexpected collision on '{}'", conflict.name)
    }

    #[test]
    fn test_preset_import_copies_closure() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source)], &mut no_prompts())
            .unwrap();

        assert_eq!(report.created.len(), 4);
        assert_eq!(dest.sample_count(), 2);
        assert_eq!(dest.instrument_count(), 1);
        assert_eq!(dest.preset_count(), 1);
        assert!(dest.check_consistency().is_ok());
        assert!(dest.index_is_consistent());

        let src_piano = source.find_by_name(EntityKind::Instrument, "Piano").unwrap();
        let dst_piano = report.remap.get(src_piano).unwrap();
        let src_owner = ZoneOwner::from_entity(src_piano).unwrap();
        let dst_owner = ZoneOwner::from_entity(dst_piano).unwrap();
        for (s, d) in source
            .zones(src_owner)
            .unwrap()
            .iter()
            .zip(dest.zones(dst_owner).unwrap())
        {
            let (s, d) = (source.zone(*s).unwrap(), dest.zone(*d).unwrap());
            assert!(s.same_body(d));
            assert_eq!(report.remap.target(s.target.unwrap()), d.target);
        }
        for (src, dst) in &report.remap.samples {
            assert!(source.sample(*src).unwrap().content_eq(dest.sample(*dst).unwrap()));
        }
    }

    #[test]
    fn test_ignore_redirects_references_to_existing_entity() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        let existing = dest.create_sample(sample("Piano A", 0.9)).unwrap();

        let mut policy = FixedPolicy(ConflictDecision::Ignore);
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source)], &mut policy)
            .unwrap();

        assert_eq!(report.ignored, vec![EntityRef::Sample(existing)]);
        assert_eq!(dest.sample(existing).unwrap().data[0], 0.9);
        assert_eq!(dest.sample_count(), 2);
        assert_eq!(dest.users(existing.into()).len(), 1);
    }

    #[test]
    fn test_replace_all_is_sticky() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        let a = dest.create_sample(sample("Piano A", 0.9)).unwrap();
        let b = dest.create_sample(sample("Piano B", 0.9)).unwrap();

        let mut prompts = 0;
        let mut policy = |_: &NameConflict<'_>| {
            prompts += 1;
            Some(ConflictDecision::ReplaceAll)
        };
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source)], &mut policy)
            .unwrap();

        assert_eq!(prompts, 1);
        assert_eq!(report.replaced, vec![EntityRef::Sample(a), EntityRef::Sample(b)]);
        assert_eq!(dest.sample(a).unwrap().data[0], 0.1);
        assert_eq!(dest.sample(b).unwrap().data[0], 0.2);
    }

    #[test]
    fn test_duplicate_disambiguates_names() {
        let source = piano_bank();
        let mut dest = source.clone();
        let mut policy = FixedPolicy(ConflictDecision::DuplicateAll);
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source)], &mut policy)
            .unwrap();

        assert_eq!(report.created.len(), 4);
        assert!(dest.find_by_name(EntityKind::Sample, "Piano A-1").is_some());
        assert!(dest.find_by_name(EntityKind::Instrument, "Piano-1").is_some());
        let copy = dest
            .find_by_name(EntityKind::Preset, "Grand-1")
            .and_then(|p| p.as_preset())
            .unwrap();
        assert_eq!(dest.preset(copy).unwrap().program, 1);
        assert!(matches!(
            report.warnings[..],
            [MergeWarning::PresetRenumbered { to: (0, 1), .. }]
        ));
    }

    #[test]
    fn test_unanswered_collision_defaults_to_ignore() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        dest.create_instrument("Piano").unwrap();

        let mut silent = |_: &NameConflict<'_>| -> Option<ConflictDecision> { None };
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source)], &mut silent)
            .unwrap();
        assert_eq!(
            report.unresolved,
            vec![UnresolvedConflict {
                kind: EntityKind::Instrument,
                name: "Piano".to_string()
            }]
        );

        let mut dest = Bank::new("dest");
        dest.create_instrument("Piano").unwrap();
        let err = MergeEngine::new()
            .strict(true)
            .import(&source, &mut dest, &[grand(&source)], &mut silent)
            .unwrap_err();
        assert!(matches!(err, BankError::NameCollisionUnresolved { .. }));
    }

    #[test]
    fn test_ignored_instrument_leaves_its_samples_behind() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        let existing = dest.create_instrument("Piano").unwrap();

        let mut policy = FixedPolicy(ConflictDecision::IgnoreAll);
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source)], &mut policy)
            .unwrap();

        assert_eq!(report.ignored, vec![EntityRef::Instrument(existing)]);
        assert_eq!(report.created.len(), 1);
        assert_eq!(dest.sample_count(), 0);
        let copy = report.created[0].as_preset().unwrap();
        let zone = dest.zones(ZoneOwner::Preset(copy)).unwrap()[0];
        assert_eq!(
            dest.zone(zone).unwrap().target,
            Some(ZoneTarget::Instrument(existing))
        );
        assert!(dest.index_is_consistent());
    }

    #[test]
    fn test_selected_sample_is_copied_under_ignored_instrument() {
        let source = piano_bank();
        let piano_a = source
            .find_by_name(EntityKind::Sample, "Piano A")
            .unwrap();
        let mut dest = Bank::new("dest");
        dest.create_instrument("Piano").unwrap();

        let mut policy = FixedPolicy(ConflictDecision::IgnoreAll);
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[grand(&source), piano_a], &mut policy)
            .unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(dest.sample_count(), 1);
        assert!(dest.find_by_name(EntityKind::Sample, "Piano A").is_some());
    }

    #[test]
    fn test_missing_dependency_aborts_before_copying() {
        let mut source = piano_bank();
        let kept = source.create_sample(sample("Lonely", 0.5)).unwrap();
        let mut dest = Bank::new("dest");
        let err = MergeEngine::new()
            .import(
                &source,
                &mut dest,
                &[kept.into(), EntityRef::Preset(PresetId(9))],
                &mut no_prompts(),
            )
            .unwrap_err();
        assert!(matches!(err, BankError::DependencyMissing { .. }));
        assert_eq!(dest.sample_count(), 0);
    }

    #[test]
    fn test_merge_into_reports_global_zone_conflict() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        let target = dest.create_instrument("Keys").unwrap();
        let into = ZoneOwner::Instrument(target);
        let global = dest.add_global_zone(into).unwrap();
        dest.set_generator(global, Generator::Pan, 100_i16).unwrap();

        let from = ZoneOwner::from_entity(
            source.find_by_name(EntityKind::Instrument, "Piano").unwrap(),
        )
        .unwrap();
        let report = MergeEngine::new()
            .merge_into(&source, from, &mut dest, into, &mut no_prompts())
            .unwrap();

        assert_eq!(
            report.warnings,
            vec![MergeWarning::GlobalZoneConflict { owner: into }]
        );
        assert_eq!(dest.zones(into).unwrap().len(), 2);
        assert_eq!(
            dest.zone(global).unwrap().generator(Generator::Pan),
            Some(GenAmount::Value(100))
        );
    }

    #[test]
    fn test_cancelled_run_keeps_committed_entities() {
        let source = piano_bank();
        let mut dest = Bank::new("dest");
        let token = CancelToken::new();
        token.cancel();
        let report = MergeEngine::new()
            .with_cancel(token)
            .import(&source, &mut dest, &[grand(&source)], &mut no_prompts())
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(dest.sample_count(), 0);
        assert_eq!(dest.preset_count(), 0);
    }

    #[test]
    fn test_duplicate_within_shares_dependencies() {
        let mut bank = piano_bank();
        let preset = grand(&bank);
        let report = MergeEngine::new().duplicate_within(&mut bank, &[preset]).unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(bank.preset_count(), 2);
        assert_eq!(bank.instrument_count(), 1);
        let piano = bank.find_by_name(EntityKind::Instrument, "Piano").unwrap();
        assert_eq!(bank.users(piano).len(), 2);
        assert!(report.remap.instruments.is_empty());
    }

    #[test]
    fn test_stereo_partner_follows_its_half() {
        let mut source = Bank::new("stereo");
        let left = source.create_sample(sample("Pad L", 0.1)).unwrap();
        let right = source.create_sample(sample("Pad R", 0.2)).unwrap();
        source.link_stereo(left, right).unwrap();

        let mut dest = Bank::new("dest");
        let report = MergeEngine::new()
            .import(&source, &mut dest, &[left.into()], &mut no_prompts())
            .unwrap();
        let dl = report.remap.samples[&left];
        let dr = report.remap.samples[&right];
        assert_eq!(dest.sample(dl).unwrap().link, Some(dr));
        assert_eq!(dest.sample(dl).unwrap().sample_type, SampleType::Left);
        assert_eq!(dest.sample(dr).unwrap().sample_type, SampleType::Right);
    }

    #[test]
    fn test_disambiguated_name_fits_name_field() {
        let mut bank = Bank::new("names");
        bank.create_instrument("A very long name here").unwrap();
        let name = disambiguate_name(&bank, EntityKind::Instrument, "A very long name here");
        assert_eq!(name, "A very long name h-1");
        assert_eq!(name.chars().count(), MAX_NAME_LEN);
    }
}

//! Modulator/zone resolver
//!
//! Effective parameters are a two-level lookup: the zone's own value, then
//! the value of its owner's global zone, then the generator default. Preset
//! zones hold offsets, so their default is zero.

use serde::Serialize;

use crate::bank::{
    Bank, GenAmount, Generator, ModDestination, Modulator, RangeAmount, ZoneId, ZoneOwner,
    ZoneTarget, MIDI_MAX,
};
use crate::error::{Result, ValidationError};

/// Check that `amount` may be stored for `generator` on a zone of `owner`
pub fn validate_generator(
    owner: ZoneOwner,
    generator: Generator,
    amount: GenAmount,
) -> Result<()> {
    if generator.is_reference() {
        return Err(ValidationError::ReservedGenerator { generator }.into());
    }
    if owner.is_preset() && generator.is_instrument_only() {
        return Err(ValidationError::IllegalGenerator { generator }.into());
    }
    match (generator.is_range(), amount) {
        (true, GenAmount::Range(range)) => {
            if !range.is_valid() {
                return Err(ValidationError::InvalidRange {
                    generator,
                    lo: range.lo,
                    hi: range.hi,
                }
                .into());
            }
        }
        (true, GenAmount::Value(_)) => {
            return Err(ValidationError::AmountKind {
                generator,
                expected: "range",
            }
            .into());
        }
        (false, GenAmount::Range(_)) => {
            return Err(ValidationError::AmountKind {
                generator,
                expected: "value",
            }
            .into());
        }
        (false, GenAmount::Value(value)) => {
            let (min, max) = generator.limits_for(owner.is_preset());
            if value < min || value > max {
                return Err(ValidationError::OutOfRange {
                    generator,
                    value: value as i32,
                    min,
                    max,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Where an effective value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueSource {
    Local,
    Global,
    Default,
}

/// Effective value of one generator on one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub amount: GenAmount,
    pub source: ValueSource,
}

/// Read-only view resolving zone parameters against a bank
pub struct ZoneResolver<'a> {
    bank: &'a Bank,
}

impl<'a> ZoneResolver<'a> {
    pub fn new(bank: &'a Bank) -> Self {
        Self { bank }
    }

    pub fn resolve(&self, zone: ZoneId, generator: Generator) -> Result<ResolvedValue> {
        let z = self.bank.zone(zone)?;
        if let Some(amount) = z.generator(generator) {
            return Ok(ResolvedValue {
                amount,
                source: ValueSource::Local,
            });
        }
        if !z.is_global() {
            if let Some(global) = self.bank.global_zone(z.owner)? {
                if let Some(amount) = self.bank.zone(global)?.generator(generator) {
                    return Ok(ResolvedValue {
                        amount,
                        source: ValueSource::Global,
                    });
                }
            }
        }
        Ok(ResolvedValue {
            amount: Self::default_for(z.owner, generator),
            source: ValueSource::Default,
        })
    }

    pub fn effective_value(&self, zone: ZoneId, generator: Generator) -> Result<GenAmount> {
        Ok(self.resolve(zone, generator)?.amount)
    }

    fn default_for(owner: ZoneOwner, generator: Generator) -> GenAmount {
        if owner.is_preset() && !generator.is_range() {
            GenAmount::Value(0)
        } else {
            generator.default_amount()
        }
    }

    /// Local modulators followed by the global ones they do not override
    ///
    /// Link destinations of inherited modulators are renumbered to their
    /// position in the returned list.
    pub fn effective_modulators(&self, zone: ZoneId) -> Result<Vec<Modulator>> {
        let z = self.bank.zone(zone)?;
        let mut result = z.modulators().to_vec();
        let global = match self.bank.global_zone(z.owner)? {
            Some(global) if global != zone => self.bank.zone(global)?.modulators(),
            _ => return Ok(result),
        };

        let mut positions = Vec::with_capacity(global.len());
        let mut inherited = Vec::new();
        for modulator in global {
            match z.modulators().iter().position(|m| m.is_identical(modulator)) {
                Some(local) => positions.push(local),
                None => {
                    positions.push(result.len() + inherited.len());
                    inherited.push(modulator.clone());
                }
            }
        }
        for modulator in &mut inherited {
            if let ModDestination::Link(target) = modulator.destination {
                if let Some(position) = positions.get(target) {
                    modulator.destination = ModDestination::Link(*position);
                }
            }
        }
        result.extend(inherited);
        Ok(result)
    }

    /// Check that `modulator` may be attached to `zone`
    pub fn validate_modulator(&self, zone: ZoneId, modulator: &Modulator) -> Result<()> {
        let z = self.bank.zone(zone)?;
        match modulator.destination {
            ModDestination::Generator(generator) => {
                if generator.is_reference() {
                    return Err(ValidationError::ReservedGenerator { generator }.into());
                }
                if z.owner.is_preset() && generator.is_instrument_only() {
                    return Err(ValidationError::IllegalModulation { generator }.into());
                }
            }
            ModDestination::Link(index) => {
                let replaces = z.modulators().iter().position(|m| m.is_identical(modulator));
                if index >= z.modulators().len() || replaces == Some(index) {
                    return Err(ValidationError::InvalidModulatorLink { index }.into());
                }
            }
        }
        Ok(())
    }

    /// Value heard when `preset_zone` layers over `instrument_zone`
    ///
    /// Preset values are added to instrument values and clamped; ranges are
    /// intersected, `None` meaning the zones never sound together.
    pub fn layered_value(
        &self,
        preset_zone: ZoneId,
        instrument_zone: ZoneId,
        generator: Generator,
    ) -> Result<Option<GenAmount>> {
        let preset = self.bank.zone(preset_zone)?;
        let instrument = self.bank.zone(instrument_zone)?;
        let layered = match (preset.target, instrument.owner) {
            (Some(ZoneTarget::Instrument(target)), ZoneOwner::Instrument(owner)) => target == owner,
            _ => false,
        };
        if !layered {
            return Err(ValidationError::TargetMismatch {
                owner: preset.owner,
                target: instrument.owner.entity(),
            }
            .into());
        }

        let base = self.effective_value(instrument_zone, generator)?;
        if generator.is_instrument_only() {
            return Ok(Some(base));
        }
        let offset = self.effective_value(preset_zone, generator)?;
        Ok(match (base, offset) {
            (GenAmount::Range(a), GenAmount::Range(b)) => a.intersect(&b).map(GenAmount::Range),
            (GenAmount::Value(a), GenAmount::Value(b)) => Some(GenAmount::Value(
                generator.clamp_value(a as f64 + b as f64, false),
            )),
            (base, _) => Some(base),
        })
    }

    /// Full check of a zone's contents
    pub fn validate_zone(&self, zone: ZoneId) -> Result<()> {
        let z = self.bank.zone(zone)?;
        if let Some(target) = z.target {
            if !target.fits(z.owner) {
                return Err(ValidationError::TargetMismatch {
                    owner: z.owner,
                    target: target.entity(),
                }
                .into());
            }
        }
        for (generator, amount) in z.generators() {
            validate_generator(z.owner, generator, amount)?;
        }
        for (position, modulator) in z.modulators().iter().enumerate() {
            match modulator.destination {
                ModDestination::Link(index)
                    if index >= z.modulators().len() || index == position =>
                {
                    return Err(ValidationError::InvalidModulatorLink { index }.into());
                }
                ModDestination::Generator(generator)
                    if z.owner.is_preset() && generator.is_instrument_only() =>
                {
                    return Err(ValidationError::IllegalModulation { generator }.into());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Key range of a zone after inheriting from its global zone
    pub fn key_range(&self, zone: ZoneId) -> Result<RangeAmount> {
        Ok(self
            .effective_value(zone, Generator::KeyRange)?
            .range()
            .unwrap_or(RangeAmount::FULL))
    }

    pub fn vel_range(&self, zone: ZoneId) -> Result<RangeAmount> {
        Ok(self
            .effective_value(zone, Generator::VelRange)?
            .range()
            .unwrap_or(RangeAmount::FULL))
    }

    /// Zones of `owner` sounding at `key` and `velocity`
    pub fn zones_at(&self, owner: ZoneOwner, key: u8, velocity: u8) -> Result<Vec<ZoneId>> {
        let key = key.min(MIDI_MAX);
        let velocity = velocity.min(MIDI_MAX);
        let mut hits = Vec::new();
        for zone in self.bank.zones(owner)? {
            if self.key_range(*zone)?.contains(key) && self.vel_range(*zone)?.contains(velocity) {
                hits.push(*zone);
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Controller, InstrumentId, ModSource, Sample};
    use crate::error::BankError;
    use pretty_assertions::assert_eq;

    struct Fixture {
        bank: Bank,
        instrument: InstrumentId,
        instrument_zone: ZoneId,
        preset_zone: ZoneId,
    }

    fn fixture() -> Fixture {
        let mut bank = Bank::new("resolver");
        let sample = bank
            .create_sample(Sample::new("Piano C4", vec![0.0; 16], 44100))
            .unwrap();
        let instrument = bank.create_instrument("Piano").unwrap();
        let instrument_zone = bank
            .add_zone(ZoneOwner::Instrument(instrument), ZoneTarget::Sample(sample))
            .unwrap();
        let preset = bank.create_preset("Grand", 0, 0).unwrap();
        let preset_zone = bank
            .add_zone(ZoneOwner::Preset(preset), ZoneTarget::Instrument(instrument))
            .unwrap();
        Fixture {
            bank,
            instrument,
            instrument_zone,
            preset_zone,
        }
    }

    fn start_offset_modulator() -> Modulator {
        Modulator::to_generator(
            ModSource::new(Controller::NoteOnVelocity),
            Generator::StartAddrsOffset,
            200,
        )
    }

    #[test]
    fn test_local_then_global_then_default() {
        let mut f = fixture();
        let owner = ZoneOwner::Instrument(f.instrument);
        let resolver = ZoneResolver::new(&f.bank);
        assert_eq!(
            resolver.resolve(f.instrument_zone, Generator::Pan).unwrap(),
            ResolvedValue {
                amount: GenAmount::Value(0),
                source: ValueSource::Default
            }
        );

        let global = f.bank.add_global_zone(owner).unwrap();
        f.bank.set_generator(global, Generator::Pan, -200_i16).unwrap();
        let resolver = ZoneResolver::new(&f.bank);
        let resolved = resolver.resolve(f.instrument_zone, Generator::Pan).unwrap();
        assert_eq!(resolved.amount, GenAmount::Value(-200));
        assert_eq!(resolved.source, ValueSource::Global);

        f.bank.set_generator(f.instrument_zone, Generator::Pan, 150_i16).unwrap();
        let resolver = ZoneResolver::new(&f.bank);
        assert_eq!(
            resolver.effective_value(f.instrument_zone, Generator::Pan).unwrap(),
            GenAmount::Value(150)
        );
    }

    #[test]
    fn test_preset_default_is_zero_offset() {
        let f = fixture();
        let resolver = ZoneResolver::new(&f.bank);
        assert_eq!(
            resolver
                .effective_value(f.preset_zone, Generator::InitialFilterFc)
                .unwrap(),
            GenAmount::Value(0)
        );
        assert_eq!(
            resolver
                .effective_value(f.instrument_zone, Generator::InitialFilterFc)
                .unwrap(),
            GenAmount::Value(13500)
        );
    }

    #[test]
    fn test_offset_modulation_illegal_on_preset_zone() {
        let mut f = fixture();
        let modulator = start_offset_modulator();

        let err = f
            .bank
            .attach_modulator(f.preset_zone, modulator.clone())
            .unwrap_err();
        assert!(matches!(
            err,
            BankError::Validation(ValidationError::IllegalModulation {
                generator: Generator::StartAddrsOffset
            })
        ));
        assert!(f.bank.zone(f.preset_zone).unwrap().modulators().is_empty());

        assert_eq!(f.bank.attach_modulator(f.instrument_zone, modulator).unwrap(), 0);
    }

    #[test]
    fn test_identical_modulator_replaces_amount() {
        let mut f = fixture();
        let modulator = start_offset_modulator();
        f.bank.attach_modulator(f.instrument_zone, modulator.clone()).unwrap();
        let mut louder = modulator;
        louder.amount = 800;
        assert_eq!(f.bank.attach_modulator(f.instrument_zone, louder).unwrap(), 0);

        let modulators = f.bank.zone(f.instrument_zone).unwrap().modulators();
        assert_eq!(modulators.len(), 1);
        assert_eq!(modulators[0].amount, 800);
    }

    #[test]
    fn test_effective_modulators_local_overrides_global() {
        let mut f = fixture();
        let owner = ZoneOwner::Instrument(f.instrument);
        let global = f.bank.add_global_zone(owner).unwrap();
        let vibrato = Modulator::to_generator(
            ModSource::new(Controller::Midi(1)),
            Generator::VibLfoToPitch,
            50,
        );
        f.bank.attach_modulator(global, start_offset_modulator()).unwrap();
        f.bank.attach_modulator(global, vibrato.clone()).unwrap();
        let mut local = start_offset_modulator();
        local.amount = -100;
        f.bank.attach_modulator(f.instrument_zone, local.clone()).unwrap();

        let effective = ZoneResolver::new(&f.bank)
            .effective_modulators(f.instrument_zone)
            .unwrap();
        assert_eq!(effective, vec![local, vibrato]);
    }

    #[test]
    fn test_layered_value_adds_and_intersects() {
        let mut f = fixture();
        f.bank
            .set_generator(f.instrument_zone, Generator::InitialAttenuation, 100_i16)
            .unwrap();
        f.bank
            .set_generator(f.preset_zone, Generator::InitialAttenuation, 60_i16)
            .unwrap();
        f.bank
            .set_generator(f.instrument_zone, Generator::KeyRange, RangeAmount::new(40, 80))
            .unwrap();
        f.bank
            .set_generator(f.preset_zone, Generator::KeyRange, RangeAmount::new(60, 100))
            .unwrap();

        let resolver = ZoneResolver::new(&f.bank);
        assert_eq!(
            resolver
                .layered_value(f.preset_zone, f.instrument_zone, Generator::InitialAttenuation)
                .unwrap(),
            Some(GenAmount::Value(160))
        );
        assert_eq!(
            resolver
                .layered_value(f.preset_zone, f.instrument_zone, Generator::KeyRange)
                .unwrap(),
            Some(GenAmount::Range(RangeAmount::new(60, 80)))
        );
        assert!(resolver
            .layered_value(f.instrument_zone, f.instrument_zone, Generator::Pan)
            .is_err());
    }

    #[test]
    fn test_zones_at_key() {
        let mut f = fixture();
        f.bank
            .set_generator(f.instrument_zone, Generator::KeyRange, RangeAmount::new(0, 59))
            .unwrap();
        let resolver = ZoneResolver::new(&f.bank);
        let owner = ZoneOwner::Instrument(f.instrument);
        assert_eq!(resolver.zones_at(owner, 30, 100).unwrap(), vec![f.instrument_zone]);
        assert!(resolver.zones_at(owner, 60, 100).unwrap().is_empty());
        assert!(resolver.validate_zone(f.instrument_zone).is_ok());
    }
}

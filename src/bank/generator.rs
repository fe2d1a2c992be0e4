//! Generator catalogue
//!
//! The SoundFont 2.04 generator list with defaults and legal ranges.
//! Amounts are signed 16-bit values except for the key and velocity
//! ranges, which carry a low/high byte pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest MIDI key or velocity value
pub const MIDI_MAX: u8 = 127;

/// A synthesis parameter that can be set on a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Generator {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeynumToModEnvHold = 31,
    KeynumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeynumToVolEnvHold = 39,
    KeynumToVolEnvDecay = 40,
    Instrument = 41,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    Keynum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
}

impl Generator {
    /// Every defined generator, in id order
    pub const ALL: [Generator; 52] = [
        Generator::StartAddrsOffset,
        Generator::EndAddrsOffset,
        Generator::StartloopAddrsOffset,
        Generator::EndloopAddrsOffset,
        Generator::StartAddrsCoarseOffset,
        Generator::ModLfoToPitch,
        Generator::VibLfoToPitch,
        Generator::ModEnvToPitch,
        Generator::InitialFilterFc,
        Generator::InitialFilterQ,
        Generator::ModLfoToFilterFc,
        Generator::ModEnvToFilterFc,
        Generator::EndAddrsCoarseOffset,
        Generator::ModLfoToVolume,
        Generator::ChorusEffectsSend,
        Generator::ReverbEffectsSend,
        Generator::Pan,
        Generator::DelayModLfo,
        Generator::FreqModLfo,
        Generator::DelayVibLfo,
        Generator::FreqVibLfo,
        Generator::DelayModEnv,
        Generator::AttackModEnv,
        Generator::HoldModEnv,
        Generator::DecayModEnv,
        Generator::SustainModEnv,
        Generator::ReleaseModEnv,
        Generator::KeynumToModEnvHold,
        Generator::KeynumToModEnvDecay,
        Generator::DelayVolEnv,
        Generator::AttackVolEnv,
        Generator::HoldVolEnv,
        Generator::DecayVolEnv,
        Generator::SustainVolEnv,
        Generator::ReleaseVolEnv,
        Generator::KeynumToVolEnvHold,
        Generator::KeynumToVolEnvDecay,
        Generator::Instrument,
        Generator::KeyRange,
        Generator::VelRange,
        Generator::StartloopAddrsCoarseOffset,
        Generator::Keynum,
        Generator::Velocity,
        Generator::InitialAttenuation,
        Generator::EndloopAddrsCoarseOffset,
        Generator::CoarseTune,
        Generator::FineTune,
        Generator::SampleId,
        Generator::SampleModes,
        Generator::ScaleTuning,
        Generator::ExclusiveClass,
        Generator::OverridingRootKey,
    ];

    /// Numeric generator id as stored in bank files
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.id() == id)
    }

    /// Sample start/end and loop start/end address offsets
    pub fn is_offset(self) -> bool {
        matches!(
            self,
            Generator::StartAddrsOffset
                | Generator::EndAddrsOffset
                | Generator::StartloopAddrsOffset
                | Generator::EndloopAddrsOffset
                | Generator::StartAddrsCoarseOffset
                | Generator::EndAddrsCoarseOffset
                | Generator::StartloopAddrsCoarseOffset
                | Generator::EndloopAddrsCoarseOffset
        )
    }

    /// Generators that only make sense next to a sample
    pub fn is_instrument_only(self) -> bool {
        self.is_offset()
            || matches!(
                self,
                Generator::Keynum
                    | Generator::Velocity
                    | Generator::SampleModes
                    | Generator::ExclusiveClass
                    | Generator::OverridingRootKey
            )
    }

    pub fn is_range(self) -> bool {
        matches!(self, Generator::KeyRange | Generator::VelRange)
    }

    /// Generators encoded by the zone target rather than the generator map
    pub fn is_reference(self) -> bool {
        matches!(self, Generator::Instrument | Generator::SampleId)
    }

    /// Value used when neither the zone nor its global zone sets the generator
    pub fn default_amount(self) -> GenAmount {
        match self {
            Generator::KeyRange | Generator::VelRange => GenAmount::Range(RangeAmount::FULL),
            Generator::InitialFilterFc => GenAmount::Value(13500),
            Generator::DelayModLfo
            | Generator::DelayVibLfo
            | Generator::DelayModEnv
            | Generator::AttackModEnv
            | Generator::HoldModEnv
            | Generator::DecayModEnv
            | Generator::ReleaseModEnv
            | Generator::DelayVolEnv
            | Generator::AttackVolEnv
            | Generator::HoldVolEnv
            | Generator::DecayVolEnv
            | Generator::ReleaseVolEnv => GenAmount::Value(-12000),
            Generator::Keynum | Generator::Velocity | Generator::OverridingRootKey => {
                GenAmount::Value(-1)
            }
            Generator::ScaleTuning => GenAmount::Value(100),
            _ => GenAmount::Value(0),
        }
    }

    /// Legal values at instrument level
    pub fn limits(self) -> (i16, i16) {
        match self {
            Generator::StartAddrsOffset
            | Generator::EndAddrsOffset
            | Generator::StartloopAddrsOffset
            | Generator::EndloopAddrsOffset
            | Generator::StartAddrsCoarseOffset
            | Generator::EndAddrsCoarseOffset
            | Generator::StartloopAddrsCoarseOffset
            | Generator::EndloopAddrsCoarseOffset => (i16::MIN, i16::MAX),
            Generator::ModLfoToPitch
            | Generator::VibLfoToPitch
            | Generator::ModEnvToPitch
            | Generator::ModLfoToFilterFc
            | Generator::ModEnvToFilterFc => (-12000, 12000),
            Generator::InitialFilterFc => (1500, 13500),
            Generator::InitialFilterQ => (0, 960),
            Generator::ModLfoToVolume => (-960, 960),
            Generator::ChorusEffectsSend | Generator::ReverbEffectsSend => (0, 1000),
            Generator::Pan => (-500, 500),
            Generator::DelayModLfo
            | Generator::DelayVibLfo
            | Generator::DelayModEnv
            | Generator::HoldModEnv
            | Generator::DelayVolEnv
            | Generator::HoldVolEnv => (-12000, 5000),
            Generator::FreqModLfo | Generator::FreqVibLfo => (-16000, 4500),
            Generator::AttackModEnv
            | Generator::DecayModEnv
            | Generator::ReleaseModEnv
            | Generator::AttackVolEnv
            | Generator::DecayVolEnv
            | Generator::ReleaseVolEnv => (-12000, 8000),
            Generator::SustainModEnv => (0, 1000),
            Generator::SustainVolEnv | Generator::InitialAttenuation => (0, 1440),
            Generator::KeynumToModEnvHold
            | Generator::KeynumToModEnvDecay
            | Generator::KeynumToVolEnvHold
            | Generator::KeynumToVolEnvDecay => (-1200, 1200),
            Generator::Keynum | Generator::Velocity | Generator::OverridingRootKey => (-1, 127),
            Generator::CoarseTune => (-120, 120),
            Generator::FineTune => (-99, 99),
            Generator::SampleModes => (0, 3),
            Generator::ScaleTuning => (0, 1200),
            Generator::ExclusiveClass => (0, 127),
            Generator::KeyRange | Generator::VelRange => (0, MIDI_MAX as i16),
            Generator::Instrument | Generator::SampleId => (0, i16::MAX),
        }
    }

    /// Legal values for a zone at the given level
    ///
    /// Preset values are offsets added to the instrument value, so they may
    /// span the full width of the instrument range in both directions.
    pub fn limits_for(self, preset_level: bool) -> (i16, i16) {
        let (min, max) = self.limits();
        if preset_level && !self.is_range() {
            let span = (max as i32 - min as i32).min(i16::MAX as i32) as i16;
            (-span, span)
        } else {
            (min, max)
        }
    }

    /// Clamp a computed value into the legal range and round it
    pub fn clamp_value(self, value: f64, preset_level: bool) -> i16 {
        let (min, max) = self.limits_for(preset_level);
        value.round().clamp(min as f64, max as f64) as i16
    }

    pub fn name(self) -> &'static str {
        match self {
            Generator::StartAddrsOffset => "startAddrsOffset",
            Generator::EndAddrsOffset => "endAddrsOffset",
            Generator::StartloopAddrsOffset => "startloopAddrsOffset",
            Generator::EndloopAddrsOffset => "endloopAddrsOffset",
            Generator::StartAddrsCoarseOffset => "startAddrsCoarseOffset",
            Generator::ModLfoToPitch => "modLfoToPitch",
            Generator::VibLfoToPitch => "vibLfoToPitch",
            Generator::ModEnvToPitch => "modEnvToPitch",
            Generator::InitialFilterFc => "initialFilterFc",
            Generator::InitialFilterQ => "initialFilterQ",
            Generator::ModLfoToFilterFc => "modLfoToFilterFc",
            Generator::ModEnvToFilterFc => "modEnvToFilterFc",
            Generator::EndAddrsCoarseOffset => "endAddrsCoarseOffset",
            Generator::ModLfoToVolume => "modLfoToVolume",
            Generator::ChorusEffectsSend => "chorusEffectsSend",
            Generator::ReverbEffectsSend => "reverbEffectsSend",
            Generator::Pan => "pan",
            Generator::DelayModLfo => "delayModLFO",
            Generator::FreqModLfo => "freqModLFO",
            Generator::DelayVibLfo => "delayVibLFO",
            Generator::FreqVibLfo => "freqVibLFO",
            Generator::DelayModEnv => "delayModEnv",
            Generator::AttackModEnv => "attackModEnv",
            Generator::HoldModEnv => "holdModEnv",
            Generator::DecayModEnv => "decayModEnv",
            Generator::SustainModEnv => "sustainModEnv",
            Generator::ReleaseModEnv => "releaseModEnv",
            Generator::KeynumToModEnvHold => "keynumToModEnvHold",
            Generator::KeynumToModEnvDecay => "keynumToModEnvDecay",
            Generator::DelayVolEnv => "delayVolEnv",
            Generator::AttackVolEnv => "attackVolEnv",
            Generator::HoldVolEnv => "holdVolEnv",
            Generator::DecayVolEnv => "decayVolEnv",
            Generator::SustainVolEnv => "sustainVolEnv",
            Generator::ReleaseVolEnv => "releaseVolEnv",
            Generator::KeynumToVolEnvHold => "keynumToVolEnvHold",
            Generator::KeynumToVolEnvDecay => "keynumToVolEnvDecay",
            Generator::Instrument => "instrument",
            Generator::KeyRange => "keyRange",
            Generator::VelRange => "velRange",
            Generator::StartloopAddrsCoarseOffset => "startloopAddrsCoarseOffset",
            Generator::Keynum => "keynum",
            Generator::Velocity => "velocity",
            Generator::InitialAttenuation => "initialAttenuation",
            Generator::EndloopAddrsCoarseOffset => "endloopAddrsCoarseOffset",
            Generator::CoarseTune => "coarseTune",
            Generator::FineTune => "fineTune",
            Generator::SampleId => "sampleID",
            Generator::SampleModes => "sampleModes",
            Generator::ScaleTuning => "scaleTuning",
            Generator::ExclusiveClass => "exclusiveClass",
            Generator::OverridingRootKey => "overridingRootKey",
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive low/high byte pair used by key and velocity ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeAmount {
    pub lo: u8,
    pub hi: u8,
}

impl RangeAmount {
    pub const FULL: RangeAmount = RangeAmount { lo: 0, hi: MIDI_MAX };

    pub fn new(lo: u8, hi: u8) -> Self {
        Self { lo, hi }
    }

    pub fn single(value: u8) -> Self {
        Self { lo: value, hi: value }
    }

    pub fn is_valid(&self) -> bool {
        self.lo <= self.hi && self.hi <= MIDI_MAX
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.lo..=self.hi).contains(&value)
    }

    pub fn intersect(&self, other: &RangeAmount) -> Option<RangeAmount> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo <= hi).then_some(RangeAmount { lo, hi })
    }

    /// Centre of the range, rounded down
    pub fn midpoint(&self) -> u8 {
        ((self.lo as u16 + self.hi as u16) / 2) as u8
    }
}

impl fmt::Display for RangeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// Amount stored for a generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenAmount {
    Value(i16),
    Range(RangeAmount),
}

impl GenAmount {
    pub fn value(&self) -> Option<i16> {
        match self {
            GenAmount::Value(v) => Some(*v),
            GenAmount::Range(_) => None,
        }
    }

    pub fn range(&self) -> Option<RangeAmount> {
        match self {
            GenAmount::Range(r) => Some(*r),
            GenAmount::Value(_) => None,
        }
    }
}

impl From<i16> for GenAmount {
    fn from(value: i16) -> Self {
        GenAmount::Value(value)
    }
}

impl From<RangeAmount> for GenAmount {
    fn from(range: RangeAmount) -> Self {
        GenAmount::Range(range)
    }
}

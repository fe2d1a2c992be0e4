//! Modulator routings
//!
//! A modulator routes a controller through a curve into a generator
//! (or into the amount of another modulator of the same zone).
//! Sources use the 16-bit SoundFont encoding so they can be handed
//! to a codec untouched.

use serde::{Deserialize, Serialize};

use super::generator::Generator;

/// Controller feeding a modulator source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    NoController,
    NoteOnVelocity,
    NoteOnKey,
    PolyPressure,
    ChannelPressure,
    PitchWheel,
    PitchWheelSensitivity,
    /// Output of another modulator
    Link,
    /// MIDI continuous controller number
    Midi(u8),
}

/// Shape applied to the controller value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    #[default]
    Linear,
    Concave,
    Convex,
    Switch,
}

/// A modulator input: controller, direction, polarity and curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModSource {
    pub controller: Controller,
    /// Maps max → min instead of min → max
    pub negative: bool,
    /// Maps to -1..1 instead of 0..1
    pub bipolar: bool,
    pub curve: Curve,
}

impl ModSource {
    pub const NONE: ModSource = ModSource {
        controller: Controller::NoController,
        negative: false,
        bipolar: false,
        curve: Curve::Linear,
    };

    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            ..Self::NONE
        }
    }

    pub fn negative(mut self) -> Self {
        self.negative = true;
        self
    }

    pub fn bipolar(mut self) -> Self {
        self.bipolar = true;
        self
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Encode as an `sfModulator` word
    pub fn to_raw(&self) -> u16 {
        let (cc, index) = match self.controller {
            Controller::NoController => (false, 0),
            Controller::NoteOnVelocity => (false, 2),
            Controller::NoteOnKey => (false, 3),
            Controller::PolyPressure => (false, 10),
            Controller::ChannelPressure => (false, 13),
            Controller::PitchWheel => (false, 14),
            Controller::PitchWheelSensitivity => (false, 16),
            Controller::Link => (false, 127),
            Controller::Midi(n) => (true, (n & 0x7F) as u16),
        };
        let curve = match self.curve {
            Curve::Linear => 0u16,
            Curve::Concave => 1,
            Curve::Convex => 2,
            Curve::Switch => 3,
        };
        index
            | (cc as u16) << 7
            | (self.negative as u16) << 8
            | (self.bipolar as u16) << 9
            | curve << 10
    }

    /// Decode an `sfModulator` word, rejecting undefined controllers and curves
    pub fn from_raw(raw: u16) -> Option<Self> {
        let index = (raw & 0x7F) as u8;
        let controller = if raw & 0x80 != 0 {
            Controller::Midi(index)
        } else {
            match index {
                0 => Controller::NoController,
                2 => Controller::NoteOnVelocity,
                3 => Controller::NoteOnKey,
                10 => Controller::PolyPressure,
                13 => Controller::ChannelPressure,
                14 => Controller::PitchWheel,
                16 => Controller::PitchWheelSensitivity,
                127 => Controller::Link,
                _ => return None,
            }
        };
        let curve = match raw >> 10 {
            0 => Curve::Linear,
            1 => Curve::Concave,
            2 => Curve::Convex,
            3 => Curve::Switch,
            _ => return None,
        };
        Some(Self {
            controller,
            negative: raw & 0x100 != 0,
            bipolar: raw & 0x200 != 0,
            curve,
        })
    }
}

impl Default for ModSource {
    fn default() -> Self {
        Self::NONE
    }
}

/// Where the modulator output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModDestination {
    Generator(Generator),
    /// Index of another modulator in the same zone
    Link(usize),
}

/// Output transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Linear,
    AbsoluteValue,
}

/// One modulator attached to a zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modulator {
    pub source: ModSource,
    pub destination: ModDestination,
    pub amount: i16,
    #[serde(default)]
    pub amount_source: ModSource,
    #[serde(default)]
    pub transform: Transform,
}

impl Modulator {
    pub fn new(source: ModSource, destination: ModDestination, amount: i16) -> Self {
        Self {
            source,
            destination,
            amount,
            amount_source: ModSource::NONE,
            transform: Transform::Linear,
        }
    }

    /// Shorthand for a modulator aimed at a generator
    pub fn to_generator(source: ModSource, generator: Generator, amount: i16) -> Self {
        Self::new(source, ModDestination::Generator(generator), amount)
    }

    pub fn with_amount_source(mut self, amount_source: ModSource) -> Self {
        self.amount_source = amount_source;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Two modulators are identical when only their amounts may differ
    pub fn is_identical(&self, other: &Modulator) -> bool {
        self.source == other.source
            && self.destination == other.destination
            && self.amount_source == other.amount_source
            && self.transform == other.transform
    }

    pub fn target_generator(&self) -> Option<Generator> {
        match self.destination {
            ModDestination::Generator(g) => Some(g),
            ModDestination::Link(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_encoding() {
        let source = ModSource::new(Controller::NoteOnVelocity)
            .negative()
            .with_curve(Curve::Concave);
        assert_eq!(source.to_raw(), 0x0502);
        assert_eq!(ModSource::from_raw(0x0502), Some(source));

        let cc = ModSource::new(Controller::Midi(7)).bipolar();
        assert_eq!(ModSource::from_raw(cc.to_raw()), Some(cc));
    }

    #[test]
    fn test_undefined_sources_are_rejected() {
        assert_eq!(ModSource::from_raw(5), None);
        assert_eq!(ModSource::from_raw(0x1000), None);
    }

    #[test]
    fn test_identity_ignores_amount() {
        let a = Modulator::to_generator(
            ModSource::new(Controller::Midi(1)),
            Generator::VibLfoToPitch,
            50,
        );
        let mut b = a.clone();
        b.amount = -20;
        assert!(a.is_identical(&b));

        let c = a.clone().with_transform(Transform::AbsoluteValue);
        assert!(!a.is_identical(&c));
    }
}

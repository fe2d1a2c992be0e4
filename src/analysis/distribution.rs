//! Global parameter distribution
//!
//! Spreads a parameter over a set of zones according to each zone's key or
//! velocity position, then combines the result with the current values.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::AnalysisResult;
use crate::bank::Generator;
use crate::error::AnalysisFailure;

/// Steepness of the exponential shapes
const EXP_CURVATURE: f64 = 4.0;

/// How values vary across positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DistributionShape {
    /// Same value everywhere
    Manual { value: f64 },
    Linear { ascending: bool },
    Exponential { ascending: bool },
    /// Uniform between min and max, reproducible from the seed
    Random { seed: u64 },
}

/// Which range of a zone gives its position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keying {
    #[default]
    Key,
    Velocity,
}

/// How a computed value meets the existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combine {
    Add,
    Multiply,
    #[default]
    Replace,
}

/// A full distribution request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub shape: DistributionShape,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub keying: Keying,
    #[serde(default)]
    pub combine: Combine,
}

impl Distribution {
    pub fn new(shape: DistributionShape, min: f64, max: f64) -> Self {
        Self {
            shape,
            min,
            max,
            keying: Keying::Key,
            combine: Combine::Replace,
        }
    }

    pub fn keyed_by(mut self, keying: Keying) -> Self {
        self.keying = keying;
        self
    }

    pub fn combined(mut self, combine: Combine) -> Self {
        self.combine = combine;
        self
    }

    fn validate(&self) -> AnalysisResult<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(AnalysisFailure::InvalidParameter {
                name: "range",
                reason: format!("expected finite min <= max, got {}..{}", self.min, self.max),
            });
        }
        Ok(())
    }

    /// Raw distributed value for each position
    pub fn values(&self, positions: &[u8]) -> AnalysisResult<Vec<f64>> {
        self.validate()?;
        let lowest = positions.iter().copied().min().unwrap_or(0) as f64;
        let highest = positions.iter().copied().max().unwrap_or(0) as f64;
        let span = highest - lowest;
        let t = |p: u8| if span > 0.0 { (p as f64 - lowest) / span } else { 0.0 };
        let width = self.max - self.min;

        Ok(match self.shape {
            DistributionShape::Manual { value } => vec![value; positions.len()],
            DistributionShape::Linear { ascending } => positions
                .iter()
                .map(|p| {
                    let t = if ascending { t(*p) } else { 1.0 - t(*p) };
                    self.min + width * t
                })
                .collect(),
            DistributionShape::Exponential { ascending } => positions
                .iter()
                .map(|p| {
                    let t = if ascending { t(*p) } else { 1.0 - t(*p) };
                    let curve = (EXP_CURVATURE * t).exp_m1() / EXP_CURVATURE.exp_m1();
                    self.min + width * curve
                })
                .collect(),
            DistributionShape::Random { seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                positions
                    .iter()
                    .map(|_| {
                        if width > 0.0 {
                            rng.random_range(self.min..=self.max)
                        } else {
                            self.min
                        }
                    })
                    .collect()
            }
        })
    }

    /// New stored amounts for `generator`, given `(position, current value)`
    /// per zone; results are clamped to the generator's legal range
    pub fn apply(
        &self,
        generator: Generator,
        preset_level: bool,
        entries: &[(u8, f64)],
    ) -> AnalysisResult<Vec<i16>> {
        let positions: Vec<u8> = entries.iter().map(|(p, _)| *p).collect();
        let values = self.values(&positions)?;
        Ok(entries
            .iter()
            .zip(values)
            .map(|((_, current), value)| {
                let combined = match self.combine {
                    Combine::Add => current + value,
                    Combine::Multiply => current * value,
                    Combine::Replace => value,
                };
                generator.clamp_value(combined, preset_level)
            })
            .collect())
    }
}

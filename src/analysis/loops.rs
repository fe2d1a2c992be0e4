//! Automatic loop-point detection
//!
//! Candidate loop boundaries are upward zero crossings. Each start/end pair
//! is scored by the normalized squared difference of the waveform around
//! both points; the pair with the smallest discontinuity wins.

use serde::{Deserialize, Serialize};

use super::AnalysisResult;
use crate::error::{AnalysisFailure, LoopFailureCause};

/// Search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Shortest accepted loop, in samples
    pub min_length: usize,
    /// Half width of the comparison window around each boundary
    pub window: usize,
    /// Crossings considered per boundary
    pub max_candidates: usize,
    /// Highest accepted discontinuity (0 = seamless, 1 = uncorrelated)
    pub max_cost: f64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            min_length: 512,
            window: 32,
            max_candidates: 128,
            max_cost: 0.1,
        }
    }
}

/// A detected loop, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopPoints {
    pub start: u32,
    pub end: u32,
    pub cost: f64,
}

impl LoopPoints {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

fn upward_crossings(data: &[f32], from: usize, to: usize) -> Vec<usize> {
    (from.max(1)..to.min(data.len()))
        .filter(|&i| data[i - 1] < 0.0 && data[i] >= 0.0)
        .collect()
}

/// Keep at most `limit` candidates, evenly spread
fn thin(candidates: Vec<usize>, limit: usize) -> Vec<usize> {
    if candidates.len() <= limit || limit == 0 {
        return candidates;
    }
    let step = candidates.len() as f64 / limit as f64;
    (0..limit)
        .map(|i| candidates[(i as f64 * step) as usize])
        .collect()
}

fn discontinuity(data: &[f32], start: usize, end: usize, window: usize) -> f64 {
    let mut diff = 0.0f64;
    let mut energy = 0.0f64;
    for offset in 0..=2 * window {
        let a = data[start + offset - window] as f64;
        let b = data[end + offset - window] as f64;
        diff += (a - b) * (a - b);
        energy += a * a + b * b;
    }
    if energy <= f64::EPSILON {
        1.0
    } else {
        diff / energy
    }
}

/// Find the loop with the smoothest boundary
///
/// Starts are searched in the first half of the sample and ends after
/// `start + min_length`. Ties prefer the longer loop.
pub fn find_loop(data: &[f32], settings: &LoopSettings) -> AnalysisResult<LoopPoints> {
    if data.is_empty() {
        return Err(AnalysisFailure::EmptyBuffer);
    }
    let window = settings.window;
    if data.len() < settings.min_length + 4 * window + 2 {
        return Err(AnalysisFailure::LoopNotFound {
            cause: LoopFailureCause::TooShort,
        });
    }

    let last = data.len() - window;
    let starts = thin(upward_crossings(data, window, data.len() / 2), settings.max_candidates);
    let ends = thin(
        upward_crossings(data, window + settings.min_length, last),
        settings.max_candidates,
    );

    let mut best: Option<LoopPoints> = None;
    for &start in &starts {
        for &end in ends.iter().filter(|&&end| end >= start + settings.min_length) {
            let cost = discontinuity(data, start, end, window);
            let better = match best {
                None => true,
                Some(b) => cost < b.cost || (cost == b.cost && end - start > b.len() as usize),
            };
            if better {
                best = Some(LoopPoints {
                    start: start as u32,
                    end: end as u32,
                    cost,
                });
            }
        }
    }

    match best {
        Some(points) if points.cost <= settings.max_cost => Ok(points),
        Some(_) => Err(AnalysisFailure::LoopNotFound {
            cause: LoopFailureCause::TooTurbulent,
        }),
        None if starts.is_empty() || ends.is_empty() => Err(AnalysisFailure::LoopNotFound {
            cause: LoopFailureCause::TooTurbulent,
        }),
        None => Err(AnalysisFailure::LoopNotFound {
            cause: LoopFailureCause::TooShort,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn sine(period: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| ((i as f64 + 0.25) * 2.0 * std::f64::consts::PI / period).sin() as f32)
            .collect()
    }

    #[test]
    fn test_periodic_signal_loops_on_whole_periods() {
        let data = sine(100.0, 10_000);
        let points = find_loop(&data, &LoopSettings::default()).unwrap();
        assert_eq!(points.len() % 100, 0);
        assert!(points.len() as usize >= 512);
        assert!(points.cost < 1e-6);
    }

    #[test]
    fn test_short_sample() {
        let data = sine(100.0, 300);
        assert_eq!(
            find_loop(&data, &LoopSettings::default()),
            Err(AnalysisFailure::LoopNotFound {
                cause: LoopFailureCause::TooShort
            })
        );
    }

    #[test]
    fn test_noise_is_turbulent() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let data: Vec<f32> = (0..20_000).map(|_| rng.random_range(-1.0..1.0)).collect();
        assert_eq!(
            find_loop(&data, &LoopSettings::default()),
            Err(AnalysisFailure::LoopNotFound {
                cause: LoopFailureCause::TooTurbulent
            })
        );
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(
            find_loop(&[], &LoopSettings::default()),
            Err(AnalysisFailure::EmptyBuffer)
        );
    }
}

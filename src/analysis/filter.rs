//! Hiss reduction: spectral low-pass over the whole buffer

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use super::{require_positive, AnalysisResult};
use crate::error::AnalysisFailure;

/// Low-pass parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub cutoff_hz: f64,
    /// Butterworth-like order of the roll-off; `None` removes everything
    /// above the cutoff (brick-wall)
    pub steepness: Option<f64>,
}

impl FilterSettings {
    pub fn brick_wall(cutoff_hz: f64) -> Self {
        Self {
            cutoff_hz,
            steepness: None,
        }
    }

    fn gain(&self, frequency: f64) -> f64 {
        match self.steepness {
            None => {
                if frequency <= self.cutoff_hz {
                    1.0
                } else {
                    0.0
                }
            }
            Some(order) => 1.0 / (1.0 + (frequency / self.cutoff_hz).powf(2.0 * order)),
        }
    }
}

/// Filter `data` in the frequency domain
///
/// The whole buffer is transformed at once so the result has no block
/// seams; the output has the same length as the input.
pub fn spectral_lowpass(
    data: &[f32],
    sample_rate: u32,
    settings: &FilterSettings,
) -> AnalysisResult<Vec<f32>> {
    if data.is_empty() {
        return Err(AnalysisFailure::EmptyBuffer);
    }
    require_positive("cutoff_hz", settings.cutoff_hz)?;
    if let Some(order) = settings.steepness {
        require_positive("steepness", order)?;
    }
    require_positive("sample_rate", sample_rate as f64)?;

    let n = data.len();
    let mut buffer: Vec<Complex<f64>> = data.iter().map(|&s| Complex::new(s as f64, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let bin_hz = sample_rate as f64 / n as f64;
    for (i, bin) in buffer.iter_mut().enumerate() {
        let frequency = i.min(n - i) as f64 * bin_hz;
        *bin *= settings.gain(frequency);
    }

    planner.plan_fft_inverse(n).process(&mut buffer);
    let scale = 1.0 / n as f64;
    Ok(buffer.iter().map(|c| (c.re * scale) as f32).collect())
}

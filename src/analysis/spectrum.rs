//! Frequency peaks and pitch estimation
//!
//! A Hann-windowed FFT of a representative window of the sample; local
//! maxima of the magnitude spectrum are refined by parabolic interpolation.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use super::{frequency_to_key, AnalysisResult};
use crate::bank::{Sample, MIDI_MAX};
use crate::error::AnalysisFailure;

/// Peak extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSettings {
    /// Largest FFT size; shorter windows are zero-padded up to a power of two
    pub fft_size: usize,
    /// Peaks reported, strongest first
    pub max_peaks: usize,
    /// Peaks weaker than this fraction of the strongest one are dropped
    pub threshold: f64,
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            fft_size: 8192,
            max_peaks: 10,
            threshold: 0.05,
        }
    }
}

/// One spectral peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub frequency: f64,
    /// Magnitude relative to the strongest peak
    pub magnitude: f64,
}

/// Root key and correction that make a sample play in tune
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PitchEstimate {
    pub root_key: u8,
    /// Correction in cents to apply on playback
    pub correction: i8,
}

impl PitchEstimate {
    pub fn from_frequency(frequency: f64) -> Self {
        let exact = frequency_to_key(frequency).clamp(0.0, MIDI_MAX as f64);
        let root_key = exact.round();
        let correction = ((root_key - exact) * 100.0).round().clamp(-50.0, 50.0);
        Self {
            root_key: root_key as u8,
            correction: correction as i8,
        }
    }
}

/// One line of the peak table of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakRow {
    /// 1-based, strongest first
    pub number: usize,
    /// Frequency relative to the fundamental
    pub factor: f64,
    pub frequency: f64,
    pub key: u8,
    /// Cents from the frequency to the nearest key
    pub correction: i8,
}

/// Loop region if the sample has one, else the middle of the sample
pub fn representative_window(sample: &Sample, size: usize) -> &[f32] {
    if let Some(region) = sample.loop_region() {
        if region.len() >= size.min(sample.len()) / 2 {
            return &region[..region.len().min(size)];
        }
    }
    let data = &sample.data[..];
    let size = size.min(data.len());
    let start = (data.len() - size) / 2;
    &data[start..start + size]
}

fn magnitude_spectrum(data: &[f32], fft_size: usize) -> Vec<f64> {
    let len = data.len().min(fft_size);
    let size = len.next_power_of_two();
    let mut buffer: Vec<Complex<f64>> = data
        .iter()
        .take(len)
        .enumerate()
        .map(|(i, &s)| {
            let window = 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / len as f64).cos());
            Complex::new(s as f64 * window, 0.0)
        })
        .collect();
    buffer.resize(size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    fft.process(&mut buffer);

    buffer.iter().take(size / 2).map(|c| c.norm()).collect()
}

/// Strongest spectral peaks of `data`, strongest first
pub fn find_peaks(
    data: &[f32],
    sample_rate: u32,
    settings: &PeakSettings,
) -> AnalysisResult<Vec<Peak>> {
    if data.is_empty() {
        return Err(AnalysisFailure::EmptyBuffer);
    }
    if sample_rate == 0 || settings.fft_size < 4 {
        return Err(AnalysisFailure::InvalidParameter {
            name: "fft_size",
            reason: "needs a sample rate and at least 4 bins".to_string(),
        });
    }
    let spectrum = magnitude_spectrum(data, settings.fft_size);
    let size = spectrum.len() * 2;
    let strongest = spectrum.iter().cloned().fold(0.0, f64::max);
    if strongest <= f64::EPSILON {
        return Err(AnalysisFailure::NoPeaks);
    }

    let bin_hz = sample_rate as f64 / size as f64;
    let mut peaks: Vec<Peak> = (2..spectrum.len().saturating_sub(1))
        .filter(|&i| {
            spectrum[i] > spectrum[i - 1]
                && spectrum[i] >= spectrum[i + 1]
                && spectrum[i] >= strongest * settings.threshold
        })
        .map(|i| {
            let (a, b, c) = (
                spectrum[i - 1].max(1e-12).ln(),
                spectrum[i].max(1e-12).ln(),
                spectrum[i + 1].max(1e-12).ln(),
            );
            let denominator = a - 2.0 * b + c;
            let shift = if denominator.abs() > 1e-12 {
                (0.5 * (a - c) / denominator).clamp(-0.5, 0.5)
            } else {
                0.0
            };
            Peak {
                frequency: (i as f64 + shift) * bin_hz,
                magnitude: spectrum[i] / strongest,
            }
        })
        .collect();
    if peaks.is_empty() {
        return Err(AnalysisFailure::NoPeaks);
    }

    peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    peaks.truncate(settings.max_peaks.max(1));
    Ok(peaks)
}

/// Fundamental frequency behind a set of peaks
///
/// The strongest peak wins unless a peak sits near one of its first
/// subharmonics, in which case the lowest such subharmonic is taken.
pub fn estimate_fundamental(peaks: &[Peak]) -> Option<f64> {
    let strongest = peaks.first()?.frequency;
    (2..=6)
        .rev()
        .map(|divisor| strongest / divisor as f64)
        .find_map(|candidate| {
            peaks
                .iter()
                .find(|p| (p.frequency / candidate - 1.0).abs() < 0.03)
                .map(|p| p.frequency)
        })
        .or(Some(strongest))
}

/// Peak table rows with factors relative to `fundamental`
pub fn peak_rows(peaks: &[Peak], fundamental: f64) -> Vec<PeakRow> {
    peaks
        .iter()
        .enumerate()
        .map(|(i, peak)| {
            let estimate = PitchEstimate::from_frequency(peak.frequency);
            PeakRow {
                number: i + 1,
                factor: peak.frequency / fundamental,
                frequency: peak.frequency,
                key: estimate.root_key,
                correction: estimate.correction,
            }
        })
        .collect()
}

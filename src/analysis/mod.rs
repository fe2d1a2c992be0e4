//! Sample analysis engine
//!
//! Stateless numeric routines over sample buffers. Every routine returns the
//! same output for the same input; the random distribution takes its seed
//! explicitly.

pub mod batch;
pub mod csv;
pub mod curves;
pub mod distribution;
pub mod filter;
pub mod loops;
pub mod spectrum;

pub use batch::{run_batch, BatchOutcome};
pub use csv::{write_peaks_csv, CsvFormat, PeakTable};
pub use curves::{celeste_curve, release_curve, seconds_to_timecents};
pub use distribution::{Combine, Distribution, DistributionShape, Keying};
pub use filter::{spectral_lowpass, FilterSettings};
pub use loops::{find_loop, LoopPoints, LoopSettings};
pub use spectrum::{
    estimate_fundamental, find_peaks, peak_rows, representative_window, Peak, PeakRow,
    PeakSettings, PitchEstimate,
};

use crate::error::AnalysisFailure;

/// Result type of analysis routines
pub type AnalysisResult<T> = std::result::Result<T, AnalysisFailure>;

/// Frequency of a (possibly fractional) MIDI key, A4 = 440 Hz
pub fn key_to_frequency(key: f64) -> f64 {
    440.0 * 2f64.powf((key - 69.0) / 12.0)
}

/// Fractional MIDI key of a frequency
pub fn frequency_to_key(frequency: f64) -> f64 {
    69.0 + 12.0 * (frequency / 440.0).log2()
}

/// Interval from `from` to `to` in cents
pub fn cents_between(from: f64, to: f64) -> f64 {
    1200.0 * (to / from).log2()
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> AnalysisResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisFailure::InvalidParameter {
            name,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

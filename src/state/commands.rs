//! Editing commands built on the analysis engine
//!
//! Analysis runs on clones of the selected samples (the audio buffers are
//! shared, not copied), then a single undoable command writes the results
//! back. The per-sample functions are public so a background worker can
//! run the same computation off the editing thread.

use std::io::Write;
use std::path::Path;

use log::info;

use crate::analysis::{
    celeste_curve, estimate_fundamental, find_loop, find_peaks, peak_rows, release_curve,
    representative_window, run_batch, seconds_to_timecents, spectral_lowpass, write_peaks_csv,
    AnalysisResult, BatchOutcome, CsvFormat, Distribution, FilterSettings, Keying, LoopPoints,
    LoopSettings, PeakSettings, PeakTable, PitchEstimate,
};
use crate::bank::{Bank, GenAmount, Generator, InstrumentId, Sample, SampleId, ZoneId, ZoneOwner};
use crate::cancel::CancelToken;
use crate::error::{AnalysisFailure, Result, ValidationError};
use crate::integrity::UnusedReport;
use crate::resolver::ZoneResolver;
use crate::wav;

use super::document::BankDocument;
use super::undo::ActionType;

/// Best loop of one sample
pub fn auto_loop(sample: &Sample, settings: &LoopSettings) -> AnalysisResult<LoopPoints> {
    find_loop(&sample.data, settings)
}

/// Root key and correction of one sample
pub fn estimate_pitch(sample: &Sample, settings: &PeakSettings) -> AnalysisResult<PitchEstimate> {
    let window = representative_window(sample, settings.fft_size);
    let peaks = find_peaks(window, sample.sample_rate, settings)?;
    let fundamental = estimate_fundamental(&peaks).ok_or(AnalysisFailure::NoPeaks)?;
    Ok(PitchEstimate::from_frequency(fundamental))
}

/// Peak table of one sample
pub fn peak_table(sample: &Sample, settings: &PeakSettings) -> AnalysisResult<PeakTable> {
    let window = representative_window(sample, settings.fft_size);
    let peaks = find_peaks(window, sample.sample_rate, settings)?;
    let fundamental = estimate_fundamental(&peaks).ok_or(AnalysisFailure::NoPeaks)?;
    Ok(PeakTable {
        sample: sample.name.clone(),
        rows: peak_rows(&peaks, fundamental),
    })
}

/// Low-passed audio of one sample
pub fn filtered(sample: &Sample, settings: &FilterSettings) -> AnalysisResult<Vec<f32>> {
    spectral_lowpass(&sample.data, sample.sample_rate, settings)
}

/// Zones of `owner` with the midpoint of their key or velocity range
fn zone_positions(bank: &Bank, owner: ZoneOwner, keying: Keying) -> Result<Vec<(ZoneId, u8)>> {
    let resolver = ZoneResolver::new(bank);
    bank.zones(owner)?
        .iter()
        .map(|zone| {
            let range = match keying {
                Keying::Key => resolver.key_range(*zone)?,
                Keying::Velocity => resolver.vel_range(*zone)?,
            };
            Ok((*zone, range.midpoint()))
        })
        .collect()
}

impl BankDocument {
    /// Clones of the given samples for off-thread analysis
    pub fn snapshot(&self, samples: &[SampleId]) -> Result<Vec<(SampleId, Sample)>> {
        samples
            .iter()
            .map(|id| Ok((*id, self.bank().sample(*id)?.clone())))
            .collect()
    }

    /// Delete every sample and instrument nothing refers to
    pub fn remove_unused(&mut self) -> Result<UnusedReport> {
        self.execute(ActionType::Cleanup, "Remove unused elements", |bank| {
            bank.remove_unused()
        })
    }

    /// Import a WAV file as one sample or a linked stereo pair
    pub fn import_wav(&mut self, path: &Path, name: &str) -> Result<Vec<SampleId>> {
        let description = format!("Import {}", path.display());
        self.execute(ActionType::Import, description, |bank| {
            wav::import_wav(bank, path, name)
        })
    }

    // === Loops ===

    pub fn apply_loop_points(&mut self, points: &[(SampleId, LoopPoints)]) -> Result<()> {
        let description = format!("Set loop of {} sample(s)", points.len());
        self.execute(ActionType::Analysis, description, |bank| {
            for (id, loop_points) in points {
                bank.update_sample(*id, |sample| {
                    sample.loop_start = loop_points.start;
                    sample.loop_end = loop_points.end;
                })?;
            }
            Ok(())
        })
    }

    /// Find and set loop points; samples without a usable loop are reported
    /// as failures and left unchanged
    pub fn apply_auto_loop(
        &mut self,
        samples: &[SampleId],
        settings: &LoopSettings,
    ) -> Result<BatchOutcome<LoopPoints>> {
        let snapshot = self.snapshot(samples)?;
        let outcome = run_batch(
            &snapshot,
            &CancelToken::new(),
            |sample| auto_loop(sample, settings),
            |_, _| {},
        );
        self.apply_loop_points(&outcome.succeeded)?;
        info!(
            "Auto-loop: {} looped, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    // === Pitch ===

    pub fn apply_pitch_estimates(&mut self, estimates: &[(SampleId, PitchEstimate)]) -> Result<()> {
        let description = format!("Set pitch of {} sample(s)", estimates.len());
        self.execute(ActionType::Analysis, description, |bank| {
            for (id, estimate) in estimates {
                bank.update_sample(*id, |sample| {
                    sample.root_key = estimate.root_key;
                    sample.pitch_correction = estimate.correction;
                })?;
            }
            Ok(())
        })
    }

    /// Estimate and set root key and pitch correction
    pub fn apply_pitch_estimate(
        &mut self,
        samples: &[SampleId],
        settings: &PeakSettings,
    ) -> Result<BatchOutcome<PitchEstimate>> {
        let snapshot = self.snapshot(samples)?;
        let outcome = run_batch(
            &snapshot,
            &CancelToken::new(),
            |sample| estimate_pitch(sample, settings),
            |_, _| {},
        );
        self.apply_pitch_estimates(&outcome.succeeded)?;
        Ok(outcome)
    }

    /// Write the peak table of each sample; samples without peaks are skipped
    pub fn export_peaks_csv<W: Write>(
        &self,
        samples: &[SampleId],
        settings: &PeakSettings,
        format: CsvFormat,
        writer: &mut W,
    ) -> Result<BatchOutcome<()>> {
        let snapshot = self.snapshot(samples)?;
        let outcome = run_batch(
            &snapshot,
            &CancelToken::new(),
            |sample| peak_table(sample, settings),
            |_, _| {},
        );
        let tables: Vec<PeakTable> = outcome.succeeded.iter().map(|(_, t)| t.clone()).collect();
        write_peaks_csv(writer, &tables, format)?;
        Ok(outcome.map(|_| ()))
    }

    // === Filtering ===

    pub fn apply_filtered_data(&mut self, results: &[(SampleId, Vec<f32>)]) -> Result<()> {
        let description = format!("Filter {} sample(s)", results.len());
        self.execute(ActionType::Analysis, description, |bank| {
            for (id, data) in results {
                bank.update_sample(*id, |sample| sample.replace_data(data.clone()))?;
            }
            Ok(())
        })
    }

    /// Low-pass the selected samples in place
    pub fn apply_filter(
        &mut self,
        samples: &[SampleId],
        settings: &FilterSettings,
    ) -> Result<BatchOutcome<()>> {
        let snapshot = self.snapshot(samples)?;
        let outcome = run_batch(
            &snapshot,
            &CancelToken::new(),
            |sample| filtered(sample, settings),
            |_, _| {},
        );
        self.apply_filtered_data(&outcome.succeeded)?;
        Ok(outcome.map(|_| ()))
    }

    // === Zone curves ===

    /// Detune every zone of an instrument so it beats at `beat_hz` against
    /// an untuned copy; the beat rate is divided by `division` per octave
    /// above `reference_key`
    ///
    /// Returns the number of zones changed.
    pub fn apply_celeste(
        &mut self,
        instrument: InstrumentId,
        beat_hz: f64,
        reference_key: u8,
        division: f64,
    ) -> Result<usize> {
        let owner = ZoneOwner::Instrument(instrument);
        let positions = zone_positions(self.bank(), owner, Keying::Key)?;
        let keys = positions.iter().map(|(_, key)| *key);
        let curve = celeste_curve(keys, beat_hz, reference_key, division)?;

        let description = format!("Celeste tuning ({} Hz)", beat_hz);
        self.execute(ActionType::Edit, description, |bank| {
            for ((zone, _), (_, cents)) in positions.iter().zip(&curve) {
                let value = Generator::FineTune.clamp_value(*cents, false);
                bank.set_generator(*zone, Generator::FineTune, value)?;
            }
            Ok(positions.len())
        })
    }

    /// Set release times following a per-octave curve through
    /// `reference_seconds` at `reference_key`
    pub fn apply_release_curve(
        &mut self,
        instrument: InstrumentId,
        reference_seconds: f64,
        reference_key: u8,
        division: f64,
    ) -> Result<usize> {
        let owner = ZoneOwner::Instrument(instrument);
        let positions = zone_positions(self.bank(), owner, Keying::Key)?;
        let curve = release_curve(
            positions.iter().map(|(_, key)| *key),
            reference_seconds,
            reference_key,
            division,
        )?;

        self.execute(ActionType::Edit, "Release curve", |bank| {
            for ((zone, _), (_, seconds)) in positions.iter().zip(&curve) {
                let timecents = seconds_to_timecents(*seconds);
                let value = Generator::ReleaseVolEnv.clamp_value(timecents, false);
                bank.set_generator(*zone, Generator::ReleaseVolEnv, value)?;
            }
            Ok(positions.len())
        })
    }

    /// Spread `generator` over the zones of `owner`
    ///
    /// The current value of each zone is its effective value (local, then
    /// global, then default), so Add and Multiply build on what the zone
    /// actually plays with.
    pub fn apply_distribution(
        &mut self,
        owner: ZoneOwner,
        generator: Generator,
        distribution: &Distribution,
    ) -> Result<usize> {
        if generator.is_range() {
            return Err(ValidationError::AmountKind {
                generator,
                expected: "value",
            }
            .into());
        }
        let bank = self.bank();
        let resolver = ZoneResolver::new(bank);
        let positions = zone_positions(bank, owner, distribution.keying)?;
        let mut entries = Vec::with_capacity(positions.len());
        for (zone, position) in &positions {
            let current = match resolver.effective_value(*zone, generator)? {
                GenAmount::Value(v) => v as f64,
                GenAmount::Range(_) => 0.0,
            };
            entries.push((*position, current));
        }
        let values = distribution.apply(generator, owner.is_preset(), &entries)?;

        let description = format!("Distribute {}", generator);
        self.execute(ActionType::Edit, description, |bank| {
            for ((zone, _), value) in positions.iter().zip(&values) {
                bank.set_generator(*zone, generator, *value)?;
            }
            Ok(positions.len())
        })
    }
}

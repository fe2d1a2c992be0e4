//! CLI Command Implementations
//!
//! Each command opens the document, runs through the document API and
//! saves the bank together with its undo history.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};

use crate::analysis::{BatchOutcome, CsvFormat, FilterSettings};
use crate::bank::{Bank, EntityKind, EntityRef, InstrumentId, SampleId, ZoneOwner, ZoneTarget};
use crate::config::EditorConfig;
use crate::export::{check_export, split_bank};
use crate::merge::{ConflictDecision, MergeReport, NameConflict};
use crate::state::{merge_documents, ActionType, BankDocument};

use super::ConflictArg;

fn open(path: &Path, config: &EditorConfig) -> Result<BankDocument> {
    BankDocument::open(path, config.history.max_undo_levels)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn save(doc: &mut BankDocument) -> Result<()> {
    doc.save().context("Failed to save document")
}

fn lookup(bank: &Bank, kind: EntityKind, name: &str) -> Result<EntityRef> {
    bank.find_by_name(kind, name)
        .ok_or_else(|| anyhow!("No {} named '{}'", kind, name))
}

fn lookup_instrument(bank: &Bank, name: &str) -> Result<InstrumentId> {
    lookup(bank, EntityKind::Instrument, name)?
        .as_instrument()
        .ok_or_else(|| anyhow!("'{}' is not an instrument", name))
}

/// Named samples, or every sample when `names` is empty
fn select_samples(bank: &Bank, names: &[String]) -> Result<Vec<SampleId>> {
    if names.is_empty() {
        return Ok(bank.samples().map(|(id, _)| id).collect());
    }
    names
        .iter()
        .map(|name| {
            lookup(bank, EntityKind::Sample, name)?
                .as_sample()
                .ok_or_else(|| anyhow!("'{}' is not a sample", name))
        })
        .collect()
}

fn print_failures<T>(bank: &Bank, outcome: &BatchOutcome<T>) {
    for (id, failure) in &outcome.failed {
        let name = bank.name_of(EntityRef::Sample(*id)).unwrap_or("?");
        warn!("{}: {}", name, failure);
    }
    if outcome.cancelled {
        warn!("Batch was cancelled before every sample was processed");
    }
}

fn print_merge_report(bank: &Bank, report: &MergeReport) {
    println!(
        "Created: {} | Replaced: {} | Ignored: {}",
        report.created.len(),
        report.replaced.len(),
        report.ignored.len()
    );
    for conflict in &report.unresolved {
        println!("Unresolved collision ignored: {} '{}'", conflict.kind, conflict.name);
    }
    for warning in &report.warnings {
        println!("Warning: {:?}", warning);
    }
    for entity in &report.created {
        if let Ok(name) = bank.name_of(*entity) {
            println!("  + {} '{}'", entity.kind(), name);
        }
    }
}

/// Create an empty document.
pub fn new_bank(path: &Path, name: &str) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let mut doc = BankDocument::new(Bank::new(name));
    doc.save_as(path)?;
    println!("Bank created: {}", path.display());
    Ok(())
}

/// Print bank contents.
pub fn show_info(path: &Path, config: &EditorConfig) -> Result<()> {
    let doc = open(path, config)?;
    let bank = doc.bank();
    let info = bank.info();
    println!("{} ({})", info.name, path.display());
    println!("Created: {}", info.creation_date.format("%Y-%m-%d %H:%M:%S"));
    if !info.author.is_empty() {
        println!("Author: {}", info.author);
    }
    println!("{:-<60}", "");

    println!("Samples ({}):", bank.sample_count());
    for (id, sample) in bank.samples() {
        println!(
            "  {:<20} {:>8} frames {:>6} Hz  key {:>3}{:+}  users {}",
            sample.name,
            sample.len(),
            sample.sample_rate,
            sample.root_key,
            sample.pitch_correction,
            bank.users(EntityRef::Sample(id)).len()
        );
    }
    println!("Instruments ({}):", bank.instrument_count());
    for (id, instrument) in bank.instruments() {
        println!(
            "  {:<20} {} zone(s)  users {}",
            instrument.name,
            instrument.zones().len(),
            bank.users(EntityRef::Instrument(id)).len()
        );
    }
    println!("Presets ({}):", bank.preset_count());
    for (_, preset) in bank.presets() {
        println!(
            "  {:03}:{:03} {:<20} {} zone(s)",
            preset.bank,
            preset.program,
            preset.name,
            preset.zones().len()
        );
    }
    Ok(())
}

/// Import a WAV file.
pub fn import_wav(
    path: &Path,
    wav: &Path,
    name: Option<&str>,
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let stem = wav
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sample")
        .to_string();
    let name = name.map(str::to_string).unwrap_or(stem);
    let ids = doc.import_wav(wav, &name)?;
    save(&mut doc)?;
    println!("Imported {} sample(s) from {}", ids.len(), wav.display());
    Ok(())
}

/// Create an instrument with one zone per sample.
pub fn create_instrument(
    path: &Path,
    name: &str,
    samples: &[String],
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let samples = if samples.is_empty() {
        Vec::new()
    } else {
        select_samples(doc.bank(), samples)?
    };
    doc.execute(ActionType::Create, format!("Create instrument '{}'", name), |bank| {
        let id = bank.create_instrument(name)?;
        for sample in &samples {
            bank.add_zone(ZoneOwner::Instrument(id), ZoneTarget::Sample(*sample))?;
        }
        Ok(id)
    })?;
    save(&mut doc)?;
    println!("Instrument '{}' created with {} zone(s)", name, samples.len());
    Ok(())
}

/// Create a preset with one zone per instrument.
pub fn create_preset(
    path: &Path,
    name: &str,
    number: (u16, u16),
    instruments: &[String],
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let instruments = instruments
        .iter()
        .map(|i| lookup_instrument(doc.bank(), i))
        .collect::<Result<Vec<_>>>()?;
    doc.execute(ActionType::Create, format!("Create preset '{}'", name), |bank| {
        let id = bank.create_preset(name, number.0, number.1)?;
        for instrument in &instruments {
            bank.add_zone(ZoneOwner::Preset(id), ZoneTarget::Instrument(*instrument))?;
        }
        Ok(id)
    })?;
    save(&mut doc)?;
    println!("Preset {:03}:{:03} '{}' created", number.0, number.1, name);
    Ok(())
}

/// Rename an element.
pub fn rename(
    path: &Path,
    element: &(EntityKind, String),
    new_name: &str,
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let entity = lookup(doc.bank(), element.0, &element.1)?;
    let description = format!("Rename {} '{}' to '{}'", element.0, element.1, new_name);
    doc.execute(ActionType::Rename, description, |bank| bank.rename(entity, new_name))?;
    save(&mut doc)?;
    println!("Renamed {} '{}' to '{}'", element.0, element.1, new_name);
    Ok(())
}

/// Delete an element.
pub fn delete(path: &Path, element: &(EntityKind, String), config: &EditorConfig) -> Result<()> {
    let mut doc = open(path, config)?;
    let entity = lookup(doc.bank(), element.0, &element.1)?;
    let description = format!("Delete {} '{}'", element.0, element.1);
    let result = doc.execute(ActionType::Delete, description, |bank| {
        bank.delete_entity(entity)
    });
    if let Err(e) = result {
        if let Some(suggestion) = e.recovery_suggestion() {
            println!("{}", suggestion);
        }
        return Err(e.into());
    }
    save(&mut doc)?;
    println!("Deleted {} '{}'", element.0, element.1);
    Ok(())
}

/// Remove unused samples and instruments.
pub fn remove_unused(path: &Path, config: &EditorConfig) -> Result<()> {
    let mut doc = open(path, config)?;
    let report = doc.remove_unused()?;
    save(&mut doc)?;
    println!(
        "Removed {} sample(s) and {} instrument(s)",
        report.samples.len(),
        report.instruments.len()
    );
    Ok(())
}

/// Merge elements of `source` into the document at `path`.
pub fn merge(
    path: &Path,
    source: &Path,
    selection: &[(EntityKind, String)],
    on_conflict: Option<ConflictArg>,
    config: &EditorConfig,
) -> Result<()> {
    let source_doc = open(source, config)?;
    let selected = selection
        .iter()
        .map(|(kind, name)| lookup(source_doc.bank(), *kind, name))
        .collect::<Result<Vec<_>>>()?;

    let decision: Option<ConflictDecision> =
        on_conflict.map(Into::into).or(config.merge.on_conflict);
    let mut policy = |_: &NameConflict<'_>| decision;

    let source_doc = source_doc.into_shared();
    let dest_doc = open(path, config)?.into_shared();
    let report = merge_documents(
        &source_doc,
        &dest_doc,
        &selected,
        &mut policy,
        &config.merge.engine(),
    )?;

    let mut dest = dest_doc.write();
    save(&mut dest)?;
    print_merge_report(dest.bank(), &report);
    Ok(())
}

/// Duplicate elements inside one document.
pub fn duplicate(
    path: &Path,
    selection: &[(EntityKind, String)],
    config: &EditorConfig,
) -> Result<()> {
    let doc = open(path, config)?;
    let selected = selection
        .iter()
        .map(|(kind, name)| lookup(doc.bank(), *kind, name))
        .collect::<Result<Vec<_>>>()?;
    let doc = doc.into_shared();
    let mut policy = |_: &NameConflict<'_>| Some(ConflictDecision::DuplicateAll);
    let report = merge_documents(&doc, &doc, &selected, &mut policy, &config.merge.engine())?;

    let mut doc = doc.write();
    save(&mut doc)?;
    print_merge_report(doc.bank(), &report);
    Ok(())
}

/// Find loop points.
pub fn auto_loop(path: &Path, samples: &[String], config: &EditorConfig) -> Result<()> {
    let mut doc = open(path, config)?;
    let ids = select_samples(doc.bank(), samples)?;
    let outcome = doc.apply_auto_loop(&ids, &config.loops)?;
    print_failures(doc.bank(), &outcome);
    save(&mut doc)?;
    println!("Looped {} of {} sample(s)", outcome.succeeded.len(), ids.len());
    Ok(())
}

/// Estimate root keys.
pub fn estimate_pitch(path: &Path, samples: &[String], config: &EditorConfig) -> Result<()> {
    let mut doc = open(path, config)?;
    let ids = select_samples(doc.bank(), samples)?;
    let outcome = doc.apply_pitch_estimate(&ids, &config.peaks)?;
    print_failures(doc.bank(), &outcome);
    for (id, estimate) in &outcome.succeeded {
        let name = doc.bank().name_of(EntityRef::Sample(*id)).unwrap_or("?");
        println!(
            "  {:<20} key {:>3} correction {:+}",
            name, estimate.root_key, estimate.correction
        );
    }
    save(&mut doc)?;
    Ok(())
}

/// Export peak tables as CSV.
pub fn peaks(
    path: &Path,
    output: &Path,
    samples: &[String],
    locale: Option<&str>,
    config: &EditorConfig,
) -> Result<()> {
    let doc = open(path, config)?;
    let ids = select_samples(doc.bank(), samples)?;
    let format = locale.map(CsvFormat::for_locale).unwrap_or(config.csv);
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let outcome = doc.export_peaks_csv(&ids, &config.peaks, format, &mut writer)?;
    print_failures(doc.bank(), &outcome);
    println!("Peaks of {} sample(s) written to {}", outcome.succeeded.len(), output.display());
    Ok(())
}

/// Low-pass samples.
pub fn filter(
    path: &Path,
    settings: &FilterSettings,
    samples: &[String],
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let ids = select_samples(doc.bank(), samples)?;
    let outcome = doc.apply_filter(&ids, settings)?;
    print_failures(doc.bank(), &outcome);
    save(&mut doc)?;
    println!("Filtered {} sample(s) at {} Hz", outcome.succeeded.len(), settings.cutoff_hz);
    Ok(())
}

/// Celeste tuning.
pub fn celeste(
    path: &Path,
    instrument: &str,
    beat_hz: f64,
    reference_key: u8,
    division: f64,
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let id = lookup_instrument(doc.bank(), instrument)?;
    let zones = doc.apply_celeste(id, beat_hz, reference_key, division)?;
    save(&mut doc)?;
    println!("Detuned {} zone(s) of '{}'", zones, instrument);
    Ok(())
}

/// Release curve.
pub fn release(
    path: &Path,
    instrument: &str,
    seconds: f64,
    reference_key: u8,
    division: f64,
    config: &EditorConfig,
) -> Result<()> {
    let mut doc = open(path, config)?;
    let id = lookup_instrument(doc.bank(), instrument)?;
    let zones = doc.apply_release_curve(id, seconds, reference_key, division)?;
    save(&mut doc)?;
    println!("Set release of {} zone(s) of '{}'", zones, instrument);
    Ok(())
}

/// Check export ceilings.
pub fn check(path: &Path, config: &EditorConfig) -> Result<()> {
    let doc = open(path, config)?;
    let warnings = check_export(doc.bank(), &config.export)?;
    for warning in &warnings {
        println!("Warning: {:?}", warning);
    }
    println!("{} is ready for export", path.display());
    Ok(())
}

/// Split into banks within the preset ceiling.
pub fn split(path: &Path, output_dir: &Path, config: &EditorConfig) -> Result<()> {
    let doc = open(path, config)?;
    fs::create_dir_all(output_dir)?;
    let parts = split_bank(doc.bank(), &config.export)?;
    for part in parts {
        let target = output_dir.join(format!("{}.json", part.info().name));
        let mut part_doc = BankDocument::new(part);
        part_doc.save_as(&target)?;
        println!("Wrote {}", target.display());
    }
    Ok(())
}

/// Undo the last action.
pub fn undo(path: &Path, config: &EditorConfig) -> Result<()> {
    info!("Undoing last action in: {}", path.display());
    let mut doc = open(path, config)?;
    let action = doc.undo()?;
    save(&mut doc)?;
    println!("Undone: {}", action.description);
    Ok(())
}

/// Redo the last undone action.
pub fn redo(path: &Path, config: &EditorConfig) -> Result<()> {
    info!("Redoing last undone action in: {}", path.display());
    let mut doc = open(path, config)?;
    let action = doc.redo()?;
    save(&mut doc)?;
    println!("Redone: {}", action.description);
    Ok(())
}

/// Show the undo history.
pub fn show_history(path: &Path, config: &EditorConfig) -> Result<()> {
    let doc = open(path, config)?;
    let history = doc.history();
    if !history.can_undo() && !history.can_redo() {
        println!("No actions in history.");
        return Ok(());
    }

    println!("Action History:");
    println!("{:-<60}", "");
    for (id, action_type, description) in history.redo_stack_summary().iter().rev() {
        println!("    {} [{}] {} (undone)", id, action_type, description);
    }
    for (i, (id, action_type, description)) in history.undo_stack_summary().iter().enumerate() {
        let marker = if i == 0 { ">>> " } else { "    " };
        println!("{}{} [{}] {}", marker, id, action_type, description);
    }
    println!("{:-<60}", "");
    println!(
        "Undo stack: {} | Redo stack: {}",
        history.undo_count(),
        history.redo_count()
    );
    Ok(())
}

//! CLI Tests
//!
//! Runs the command functions against documents in a temporary directory.

use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use bankcraft::bank::EntityKind;
use bankcraft::cli::{commands, ConflictArg};
use bankcraft::{BankDocument, EditorConfig};
use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;

fn write_tone(path: &Path) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..44100 {
        let s = (2.0 * PI * 440.0 * i as f32 / 44100.0).sin() * 0.5;
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// A document with sample "tone", instrument "Lead" and preset "Lead"
fn lead_document(dir: &Path, file: &str, config: &EditorConfig) -> PathBuf {
    let path = dir.join(file);
    let wav = dir.join("tone.wav");
    if !wav.exists() {
        write_tone(&wav);
    }
    commands::new_bank(&path, "Synths").unwrap();
    commands::import_wav(&path, &wav, None, config).unwrap();
    commands::create_instrument(&path, "Lead", &["tone".to_string()], config).unwrap();
    commands::create_preset(&path, "Lead", (0, 0), &["Lead".to_string()], config).unwrap();
    path
}

fn reopen(path: &Path) -> BankDocument {
    BankDocument::open(path, 50).unwrap()
}

#[test]
fn test_build_document_from_wav() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let path = lead_document(temp_dir.path(), "synths.json", &config);

    let doc = reopen(&path);
    assert_eq!(doc.bank().sample_count(), 1);
    assert_eq!(doc.bank().instrument_count(), 1);
    assert_eq!(doc.bank().preset_count(), 1);
    assert_eq!(doc.history().undo_count(), 3);
    assert!(commands::show_info(&path, &config).is_ok());
    assert!(commands::check(&path, &config).is_ok());
}

#[test]
fn test_new_refuses_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bank.json");
    commands::new_bank(&path, "First").unwrap();
    assert!(commands::new_bank(&path, "Second").is_err());
}

#[test]
fn test_delete_referenced_sample_fails_and_undo_rename() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let path = lead_document(temp_dir.path(), "synths.json", &config);

    let sample = (EntityKind::Sample, "tone".to_string());
    assert!(commands::delete(&path, &sample, &config).is_err());

    let instrument = (EntityKind::Instrument, "Lead".to_string());
    commands::rename(&path, &instrument, "Solo", &config).unwrap();
    assert!(reopen(&path)
        .bank()
        .find_by_name(EntityKind::Instrument, "Solo")
        .is_some());

    commands::undo(&path, &config).unwrap();
    let doc = reopen(&path);
    assert!(doc.bank().find_by_name(EntityKind::Instrument, "Lead").is_some());
    assert_eq!(doc.history().redo_count(), 1);

    commands::redo(&path, &config).unwrap();
    assert!(commands::show_history(&path, &config).is_ok());
}

#[test]
fn test_merge_with_duplicate_answer() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let dest = lead_document(temp_dir.path(), "dest.json", &config);
    let source = lead_document(temp_dir.path(), "source.json", &config);

    commands::merge(
        &dest,
        &source,
        &[(EntityKind::Preset, "Lead".to_string())],
        Some(ConflictArg::Duplicate),
        &config,
    )
    .unwrap();

    let doc = reopen(&dest);
    assert_eq!(doc.bank().preset_count(), 2);
    assert_eq!(doc.bank().sample_count(), 2);
    assert!(doc.bank().find_by_name(EntityKind::Preset, "Lead-1").is_some());
    assert!(doc.bank().find_preset_by_number(0, 1).is_some());
}

#[test]
fn test_merge_without_answer_keeps_destination() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let dest = lead_document(temp_dir.path(), "dest.json", &config);
    let source = lead_document(temp_dir.path(), "source.json", &config);

    commands::merge(
        &dest,
        &source,
        &[(EntityKind::Preset, "Lead".to_string())],
        None,
        &config,
    )
    .unwrap();

    let doc = reopen(&dest);
    assert_eq!(doc.bank().preset_count(), 1);
    assert_eq!(doc.bank().sample_count(), 1);
}

#[test]
fn test_duplicate_within_document() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let path = lead_document(temp_dir.path(), "synths.json", &config);

    commands::duplicate(&path, &[(EntityKind::Instrument, "Lead".to_string())], &config).unwrap();

    let doc = reopen(&path);
    assert_eq!(doc.bank().instrument_count(), 2);
    assert_eq!(doc.bank().sample_count(), 1);
}

#[test]
fn test_peaks_csv_and_pitch() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let path = lead_document(temp_dir.path(), "synths.json", &config);
    let csv = temp_dir.path().join("peaks.csv");

    commands::peaks(&path, &csv, &[], Some("fr_FR"), &config).unwrap();
    let content = fs::read_to_string(&csv).unwrap();
    assert!(content.lines().count() > 1);
    assert!(content.contains("tone;1;"));

    commands::estimate_pitch(&path, &["tone".to_string()], &config).unwrap();
    let doc = reopen(&path);
    let sample = doc.bank().find_by_name(EntityKind::Sample, "tone").unwrap();
    assert_eq!(doc.bank().sample(sample.as_sample().unwrap()).unwrap().root_key, 69);
}

#[test]
fn test_unknown_element_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config = EditorConfig::default();
    let path = lead_document(temp_dir.path(), "synths.json", &config);

    let err = commands::celeste(&path, "Missing", 1.0, 60, 1.0, &config).unwrap_err();
    assert_eq!(err.to_string(), "No instrument named 'Missing'");
}

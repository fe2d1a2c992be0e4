//! Integration Tests
//!
//! End-to-end editing sessions: documents, merges, history and export.

use bankcraft::bank::{Generator, RangeAmount, Sample, ZoneOwner, ZoneTarget};
use bankcraft::export::{check_export, split_bank, ExportLimits};
use bankcraft::merge::{ConflictDecision, FixedPolicy, MergeEngine, NameConflict};
use bankcraft::state::{merge_documents, ActionType};
use bankcraft::{Bank, BankDocument, BankError, EntityKind, EntityRef};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Preset "Grand" -> instrument "Piano" -> samples "Low", "High"
fn piano_document() -> BankDocument {
    let mut doc = BankDocument::new(Bank::new("Pianos"));
    doc.execute(ActionType::Create, "Build piano", |bank| {
        let low = Sample::new("Low", vec![0.25; 256], 44100).with_loop(16, 240);
        let low = bank.create_sample(low)?;
        let high = Sample::new("High", vec![0.5; 256], 44100).with_loop(16, 240);
        let high = bank.create_sample(high)?;
        let piano = bank.create_instrument("Piano")?;
        let owner = ZoneOwner::Instrument(piano);
        let z = bank.add_zone(owner, ZoneTarget::Sample(low))?;
        bank.set_generator(z, Generator::KeyRange, RangeAmount::new(0, 59))?;
        let z = bank.add_zone(owner, ZoneTarget::Sample(high))?;
        bank.set_generator(z, Generator::KeyRange, RangeAmount::new(60, 127))?;
        let grand = bank.create_preset("Grand", 0, 0)?;
        bank.add_zone(ZoneOwner::Preset(grand), ZoneTarget::Instrument(piano))?;
        Ok(())
    })
    .unwrap();
    doc
}

fn find(doc: &BankDocument, kind: EntityKind, name: &str) -> EntityRef {
    doc.bank()
        .find_by_name(kind, name)
        .unwrap_or_else(|| panic!("no {} named {}", kind, name))
}

// === Editing Session Tests ===

#[test]
fn test_referenced_sample_cannot_be_deleted() {
    let mut doc = piano_document();
    let low = find(&doc, EntityKind::Sample, "Low");

    let err = doc
        .execute(ActionType::Delete, "Delete Low", |bank| bank.delete_entity(low))
        .unwrap_err();
    assert!(matches!(err, BankError::ReferentialIntegrity { users: 1, .. }));
    assert!(err.recovery_suggestion().is_some());
    assert_eq!(doc.bank().sample_count(), 2);
    assert_eq!(doc.history().undo_count(), 1);
}

#[test]
fn test_delete_preset_then_sweep_unused() {
    let mut doc = piano_document();
    let grand = find(&doc, EntityKind::Preset, "Grand");
    doc.execute(ActionType::Delete, "Delete Grand", |bank| bank.delete_entity(grand))
        .unwrap();

    let report = doc.remove_unused().unwrap();
    assert_eq!(report.instruments.len(), 1);
    assert_eq!(report.samples.len(), 2);
    assert_eq!(doc.bank().sample_count(), 0);

    doc.undo().unwrap();
    assert_eq!(doc.bank().sample_count(), 2);
    assert_eq!(doc.bank().instrument_count(), 1);
    assert!(doc.bank().index_is_consistent());
}

// === Merge Tests ===

#[test]
fn test_merge_between_documents_with_collision() {
    let source = piano_document().into_shared();
    let mut dest = BankDocument::new(Bank::new("Studio"));
    dest.execute(ActionType::Create, "Existing sample", |bank| {
        bank.create_sample(Sample::new("Low", vec![0.9; 64], 22050))
    })
    .unwrap();
    let dest = dest.into_shared();

    let grand = find(&source.read(), EntityKind::Preset, "Grand");
    let mut asked = Vec::new();
    let mut policy = |conflict: &NameConflict<'_>| {
        asked.push(conflict.name.to_string());
        Some(ConflictDecision::Duplicate)
    };
    let report =
        merge_documents(&source, &dest, &[grand], &mut policy, &MergeEngine::new()).unwrap();

    assert_eq!(asked, vec!["Low".to_string()]);
    let dest = dest.read();
    assert_eq!(dest.bank().sample_count(), 3);
    assert!(dest.bank().find_by_name(EntityKind::Sample, "Low-1").is_some());
    assert_eq!(report.created.len(), 4);
    assert_eq!(dest.history().undo_count(), 2);
    assert!(dest.bank().index_is_consistent());
}

#[test]
fn test_unanswered_collision_is_ignored_and_reported() {
    let source = piano_document().into_shared();
    let dest = piano_document().into_shared();

    let grand = find(&source.read(), EntityKind::Preset, "Grand");
    let mut silent = |_: &NameConflict<'_>| None;
    let report =
        merge_documents(&source, &dest, &[grand], &mut silent, &MergeEngine::new()).unwrap();

    assert!(report.created.is_empty());
    assert_eq!(report.ignored.len(), 1);
    assert_eq!(report.unresolved.len(), 1);
    let dest = dest.read();
    assert_eq!(dest.bank().preset_count(), 1);
    assert_eq!(dest.bank().sample_count(), 2);
}

#[test]
fn test_strict_merge_rolls_back() {
    let source = piano_document().into_shared();
    let dest = piano_document().into_shared();

    let grand = find(&source.read(), EntityKind::Preset, "Grand");
    let mut silent = |_: &NameConflict<'_>| None;
    let err = merge_documents(
        &source,
        &dest,
        &[grand],
        &mut silent,
        &MergeEngine::new().strict(true),
    )
    .unwrap_err();

    assert_eq!(err.error_code(), "NAME_COLLISION_UNRESOLVED");
    let dest = dest.read();
    assert_eq!(dest.history().undo_count(), 1);
    assert_eq!(dest.bank().sample_count(), 2);
}

#[test]
fn test_undo_merge_restores_destination() {
    let source = piano_document().into_shared();
    let dest = BankDocument::new(Bank::new("Empty")).into_shared();
    let grand = find(&source.read(), EntityKind::Preset, "Grand");

    let mut policy = FixedPolicy(ConflictDecision::DuplicateAll);
    merge_documents(&source, &dest, &[grand], &mut policy, &MergeEngine::new()).unwrap();
    assert_eq!(dest.read().bank().preset_count(), 1);

    let mut dest = dest.write();
    let action = dest.undo().unwrap();
    assert_eq!(action.action_type, ActionType::Merge);
    assert_eq!(dest.bank().preset_count(), 0);
    assert_eq!(dest.bank().sample_count(), 0);

    dest.redo().unwrap();
    assert_eq!(dest.bank().preset_count(), 1);
    assert_eq!(dest.bank().sample_count(), 2);
}

// === Persistence Tests ===

#[test]
fn test_history_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("pianos.json");
    let mut doc = piano_document();
    let piano = find(&doc, EntityKind::Instrument, "Piano");
    doc.execute(ActionType::Rename, "Rename Piano", |bank| bank.rename(piano, "Upright"))
        .unwrap();
    doc.save_as(&path).unwrap();

    let mut reopened = BankDocument::open(&path, 50).unwrap();
    assert_eq!(reopened.history().undo_count(), 2);
    assert!(reopened.bank().find_by_name(EntityKind::Instrument, "Upright").is_some());

    reopened.undo().unwrap();
    assert!(reopened.bank().find_by_name(EntityKind::Instrument, "Piano").is_some());
    assert!(reopened.is_modified());
}

// === Export Tests ===

#[test]
fn test_oversized_bank_splits_into_exportable_parts() {
    let mut doc = piano_document();
    let piano = find(&doc, EntityKind::Instrument, "Piano").as_instrument().unwrap();
    doc.execute(ActionType::Create, "Many presets", |bank| {
        for program in 1..=130u16 {
            let name = format!("Var {}", program);
            let preset = bank.create_preset(name, program / 128, program % 128)?;
            bank.add_zone(ZoneOwner::Preset(preset), ZoneTarget::Instrument(piano))?;
        }
        Ok(())
    })
    .unwrap();

    assert!(check_export(doc.bank(), &ExportLimits::STANDARD).is_err());
    let parts = split_bank(doc.bank(), &ExportLimits::STANDARD).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts.iter().map(Bank::preset_count).sum::<usize>(), 131);
    for part in &parts {
        assert!(check_export(part, &ExportLimits::STANDARD).unwrap().is_empty());
        assert_eq!(part.sample_count(), 2);
    }
}

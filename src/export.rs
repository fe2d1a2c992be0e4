//! Export checks
//!
//! Ceilings a bank must respect before it is handed to the file codec, and
//! the splitting helpers used when a bank holds more presets than one file
//! can carry.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::bank::{Bank, EntityRef, PresetId};
use crate::error::{BankError, ResourceKind, Result, ValidationError};
use crate::merge::{ConflictDecision, FixedPolicy, MergeEngine, MAX_NAME_LEN};

/// Ceilings checked before export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportLimits {
    /// Presets per exported bank
    pub max_presets: usize,
    /// Banks per multi-bank export
    pub max_banks: usize,
    /// Generator records above which players may struggle; only warned about
    pub max_parameters: usize,
}

impl ExportLimits {
    pub const STANDARD: ExportLimits = ExportLimits {
        max_presets: 127,
        max_banks: 127,
        max_parameters: 65536,
    };
}

impl Default for ExportLimits {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Non-fatal findings of an export check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExportWarning {
    TooManyParameters { count: usize, limit: usize },
}

/// Check one bank against `limits`
///
/// Too many presets or a bank/program used twice is an error; too many
/// parameters only produces a warning.
pub fn check_export(bank: &Bank, limits: &ExportLimits) -> Result<Vec<ExportWarning>> {
    if bank.preset_count() > limits.max_presets {
        return Err(BankError::ResourceLimitExceeded {
            resource: ResourceKind::Presets,
            limit: limits.max_presets,
            actual: bank.preset_count(),
        });
    }

    let mut seen: BTreeMap<(u16, u16), PresetId> = BTreeMap::new();
    for (id, preset) in bank.presets() {
        if seen.insert((preset.bank, preset.program), id).is_some() {
            return Err(ValidationError::DuplicatePresetNumber {
                bank: preset.bank,
                program: preset.program,
            }
            .into());
        }
    }

    let mut warnings = Vec::new();
    let parameters = bank.parameter_count();
    if parameters > limits.max_parameters {
        warn!(
            "'{}' has {} parameters, more than the {} most players accept",
            bank.info().name,
            parameters,
            limits.max_parameters
        );
        warnings.push(ExportWarning::TooManyParameters {
            count: parameters,
            limit: limits.max_parameters,
        });
    }
    Ok(warnings)
}

/// Check a multi-bank export: the bank count, then every bank
pub fn check_multi_export(banks: &[Bank], limits: &ExportLimits) -> Result<Vec<ExportWarning>> {
    if banks.len() > limits.max_banks {
        return Err(BankError::ResourceLimitExceeded {
            resource: ResourceKind::Banks,
            limit: limits.max_banks,
            actual: banks.len(),
        });
    }
    let mut warnings = Vec::new();
    for bank in banks {
        warnings.extend(check_export(bank, limits)?);
    }
    Ok(warnings)
}

/// Presets in bank/program order, chunked into groups of at most
/// `per_file`
pub fn split_presets(bank: &Bank, per_file: usize) -> Vec<Vec<PresetId>> {
    let mut presets: Vec<(u16, u16, PresetId)> = bank
        .presets()
        .map(|(id, p)| (p.bank, p.program, id))
        .collect();
    presets.sort();
    presets
        .chunks(per_file.max(1))
        .map(|chunk| chunk.iter().map(|(_, _, id)| *id).collect())
        .collect()
}

/// A new bank holding `presets` and everything they use
///
/// The bank info is copied from `bank`; only `name` changes. Entities of one
/// kind sharing a name in `bank` collide with each other while copying, so
/// every one after the first gets a "-n" suffix in the extracted bank.
pub fn extract_presets(bank: &Bank, presets: &[PresetId], name: &str) -> Result<Bank> {
    let mut info = bank.info().clone();
    info.name = name.to_string();
    let mut extracted = Bank::new(name);
    extracted.set_info(info);

    let selection: Vec<EntityRef> = presets.iter().map(|p| EntityRef::Preset(*p)).collect();
    let mut policy = FixedPolicy(ConflictDecision::DuplicateAll);
    let report = MergeEngine::new().import(bank, &mut extracted, &selection, &mut policy)?;

    let remap = &report.remap;
    let pairs = remap
        .samples
        .iter()
        .map(|(s, d)| (EntityRef::from(*s), EntityRef::from(*d)))
        .chain(remap.instruments.iter().map(|(s, d)| ((*s).into(), (*d).into())))
        .chain(remap.presets.iter().map(|(s, d)| ((*s).into(), (*d).into())));
    let mut renamed = 0;
    for (source, dest) in pairs {
        if bank.name_of(source)? != extracted.name_of(dest)? {
            renamed += 1;
        }
    }
    if renamed > 0 {
        info!("Renamed {} entities in '{}' to keep names unique", renamed, name);
    }
    Ok(extracted)
}

/// Split `bank` into banks that each respect the preset ceiling
///
/// A bank already within the ceiling comes back as a single copy.
pub fn split_bank(bank: &Bank, limits: &ExportLimits) -> Result<Vec<Bank>> {
    let groups = split_presets(bank, limits.max_presets);
    if groups.len() <= 1 {
        return Ok(vec![bank.clone()]);
    }
    if groups.len() > limits.max_banks {
        return Err(BankError::ResourceLimitExceeded {
            resource: ResourceKind::Banks,
            limit: limits.max_banks,
            actual: groups.len(),
        });
    }
    info!(
        "Splitting '{}' into {} banks of at most {} presets",
        bank.info().name,
        groups.len(),
        limits.max_presets
    );
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let suffix = format!("-{}", i + 1);
            let stem: String = bank
                .info()
                .name
                .chars()
                .take(MAX_NAME_LEN.saturating_sub(suffix.len()))
                .collect();
            extract_presets(bank, group, &format!("{}{}", stem, suffix))
        })
        .collect()
}

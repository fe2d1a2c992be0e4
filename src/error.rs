//! Error handling for bankcraft
//!
//! Validation and integrity errors are raised at the mutation boundary and
//! leave the bank untouched. Merge errors come from the duplication engine.
//! Analysis failures are per sample and are collected by batch runs.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::bank::{EntityKind, EntityRef, Generator, ZoneId, ZoneOwner};

/// Result type alias for bankcraft operations
pub type Result<T> = std::result::Result<T, BankError>;

/// Main error type for bank operations
#[derive(Error, Debug)]
pub enum BankError {
    // Model Errors
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} is still referenced by {users} zone(s)")]
    ReferentialIntegrity { entity: EntityRef, users: usize },

    #[error("Entity not found: {entity}")]
    NotFound { entity: EntityRef },

    #[error("Zone not found: {zone}")]
    ZoneNotFound { zone: ZoneId },

    // Merge Errors
    #[error("Name collision on {kind} '{name}' was not resolved")]
    NameCollisionUnresolved { kind: EntityKind, name: String },

    #[error("{owner} already has a global zone")]
    GlobalZoneConflict { owner: ZoneOwner },

    #[error("Missing dependency {dependency} required by {required_by}")]
    DependencyMissing {
        dependency: String,
        required_by: String,
    },

    // Export Errors
    #[error("Resource limit exceeded: {actual} {resource} (maximum {limit})")]
    ResourceLimitExceeded {
        resource: ResourceKind,
        limit: usize,
        actual: usize,
    },

    // File Errors
    #[error("Invalid bank file: {reason}")]
    FileFormat { reason: String },

    // Analysis Errors
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisFailure),

    // Undo/Redo Errors
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Background worker failed: {reason}")]
    WorkerFailed { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Rule violations detected before a mutation is applied
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{generator} cannot be modulated on a preset zone")]
    IllegalModulation { generator: Generator },

    #[error("{generator} is only allowed on instrument zones")]
    IllegalGenerator { generator: Generator },

    #[error("{generator} is carried by the zone target and cannot be set directly")]
    ReservedGenerator { generator: Generator },

    #[error("{generator} expects a {expected} amount")]
    AmountKind {
        generator: Generator,
        expected: &'static str,
    },

    #[error("{generator} value {value} is outside {min}..={max}")]
    OutOfRange {
        generator: Generator,
        value: i32,
        min: i16,
        max: i16,
    },

    #[error("Invalid {generator} range {lo}-{hi}")]
    InvalidRange { generator: Generator, lo: u8, hi: u8 },

    #[error("{owner} cannot hold a zone targeting {target}")]
    TargetMismatch { owner: ZoneOwner, target: EntityRef },

    #[error("Modulator link {index} does not point at another modulator of the zone")]
    InvalidModulatorLink { index: usize },

    #[error("Modulator index {index} is out of bounds ({len} modulators)")]
    ModulatorIndex { index: usize, len: usize },

    #[error("Zone position {index} is out of bounds ({len} zones)")]
    ZonePosition { index: usize, len: usize },

    #[error("Expected {expected} but got {entity}")]
    KindMismatch {
        expected: EntityKind,
        entity: EntityRef,
    },

    #[error("Preset number {bank}:{program} is used more than once")]
    DuplicatePresetNumber { bank: u16, program: u16 },

    #[error("Preset number {bank}:{program} is outside the valid range")]
    PresetNumber { bank: u16, program: u16 },

    #[error("Invalid stereo link: {reason}")]
    StereoLink { reason: String },

    #[error("Names cannot be empty")]
    EmptyName,
}

/// Per-sample analysis failure
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum AnalysisFailure {
    #[error("No loop found: the sample is too {cause}")]
    LoopNotFound { cause: LoopFailureCause },

    #[error("Sample contains no audio")]
    EmptyBuffer,

    #[error("No spectral peak found")]
    NoPeaks,

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Cause class reported when auto-looping gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopFailureCause {
    TooShort,
    TooTurbulent,
}

impl fmt::Display for LoopFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopFailureCause::TooShort => write!(f, "short"),
            LoopFailureCause::TooTurbulent => write!(f, "turbulent"),
        }
    }
}

/// Export ceilings that can be exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Presets,
    Banks,
    Parameters,
    PresetNumbers,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Presets => write!(f, "presets"),
            ResourceKind::Banks => write!(f, "banks"),
            ResourceKind::Parameters => write!(f, "parameters"),
            ResourceKind::PresetNumbers => write!(f, "preset numbers"),
        }
    }
}

impl BankError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            BankError::Validation(_) => "VALIDATION_ERROR",
            BankError::ReferentialIntegrity { .. } => "REFERENTIAL_INTEGRITY",
            BankError::NotFound { .. } => "NOT_FOUND",
            BankError::ZoneNotFound { .. } => "ZONE_NOT_FOUND",
            BankError::NameCollisionUnresolved { .. } => "NAME_COLLISION_UNRESOLVED",
            BankError::GlobalZoneConflict { .. } => "GLOBAL_ZONE_CONFLICT",
            BankError::DependencyMissing { .. } => "DEPENDENCY_MISSING",
            BankError::ResourceLimitExceeded { .. } => "RESOURCE_LIMIT_EXCEEDED",
            BankError::FileFormat { .. } => "FILE_FORMAT_ERROR",
            BankError::Analysis(_) => "ANALYSIS_FAILURE",
            BankError::NothingToUndo => "NOTHING_TO_UNDO",
            BankError::NothingToRedo => "NOTHING_TO_REDO",
            BankError::WorkerFailed { .. } => "WORKER_FAILED",
            BankError::Io(_) => "IO_ERROR",
            BankError::Serialization(_) => "SERIALIZATION_ERROR",
            BankError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Check if the document is still usable after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BankError::WorkerFailed { .. } | BankError::DependencyMissing { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            BankError::ReferentialIntegrity { .. } => {
                Some("Remove the zones that use this element first, or run 'remove unused'.")
            }
            BankError::GlobalZoneConflict { .. } => {
                Some("Parameters are already set: edit the existing global zone instead.")
            }
            BankError::ResourceLimitExceeded { .. } => {
                Some("Split the presets over several files before exporting.")
            }
            BankError::DependencyMissing { .. } => {
                Some("The source bank is corrupt: reload it before merging.")
            }
            BankError::Analysis(AnalysisFailure::LoopNotFound { .. }) => {
                Some("Set the loop points manually or use a longer, steadier sample.")
            }
            BankError::NothingToUndo => Some("There are no actions to undo."),
            BankError::NothingToRedo => Some("There are no undone actions to redo."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::SampleId;

    #[test]
    fn test_error_codes() {
        let err = BankError::ReferentialIntegrity {
            entity: EntityRef::Sample(SampleId(3)),
            users: 2,
        };
        assert_eq!(err.error_code(), "REFERENTIAL_INTEGRITY");
        assert!(err.recovery_suggestion().is_some());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_loop_failure_message() {
        let err = BankError::from(AnalysisFailure::LoopNotFound {
            cause: LoopFailureCause::TooTurbulent,
        });
        assert_eq!(
            err.to_string(),
            "Analysis failed: No loop found: the sample is too turbulent"
        );
    }

    #[test]
    fn test_resource_limit_message() {
        let err = BankError::ResourceLimitExceeded {
            resource: ResourceKind::Presets,
            limit: 127,
            actual: 130,
        };
        assert!(err.to_string().contains("maximum 127"));
    }
}

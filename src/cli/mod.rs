//! CLI Module
//!
//! Command-line interface operating on JSON bank documents. Each invocation
//! opens the document, runs one command and saves it with its undo history.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::bank::EntityKind;
use crate::merge::ConflictDecision;

/// Bankcraft - SoundFont-style bank editor
#[derive(Parser, Debug)]
#[command(name = "bankcraft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Editor configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Answer to name collisions during merges
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictArg {
    Replace,
    Duplicate,
    Ignore,
}

impl From<ConflictArg> for ConflictDecision {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Replace => ConflictDecision::ReplaceAll,
            ConflictArg::Duplicate => ConflictDecision::DuplicateAll,
            ConflictArg::Ignore => ConflictDecision::IgnoreAll,
        }
    }
}

/// `kind:name`, e.g. `preset:Grand Piano`
pub fn parse_selector(value: &str) -> Result<(EntityKind, String), String> {
    let (kind, name) = value
        .split_once(':')
        .ok_or_else(|| format!("expected kind:name, got '{}'", value))?;
    let kind = match kind {
        "sample" | "smpl" => EntityKind::Sample,
        "instrument" | "inst" => EntityKind::Instrument,
        "preset" | "prst" => EntityKind::Preset,
        other => return Err(format!("unknown element kind '{}'", other)),
    };
    if name.is_empty() {
        return Err("element name is empty".to_string());
    }
    Ok((kind, name.to_string()))
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty bank document
    #[command(name = "new")]
    New {
        /// Path of the new document
        path: PathBuf,

        /// Bank name
        #[arg(short, long, default_value = "Untitled")]
        name: String,
    },

    /// Print bank contents
    #[command(name = "info")]
    Info {
        /// Path to the document
        path: PathBuf,
    },

    /// Import a WAV file as a sample (stereo files give a linked pair)
    #[command(name = "import-wav")]
    ImportWav {
        /// Path to the document
        path: PathBuf,

        /// WAV file to import
        wav: PathBuf,

        /// Sample name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Create an instrument with one zone per sample
    #[command(name = "create-instrument")]
    CreateInstrument {
        path: PathBuf,

        name: String,

        /// Samples to add as zones
        #[arg(short, long = "sample")]
        samples: Vec<String>,
    },

    /// Create a preset with one zone per instrument
    #[command(name = "create-preset")]
    CreatePreset {
        path: PathBuf,

        name: String,

        #[arg(long, default_value_t = 0)]
        bank: u16,

        #[arg(long, default_value_t = 0)]
        program: u16,

        /// Instruments to add as zones
        #[arg(short, long = "instrument")]
        instruments: Vec<String>,
    },

    /// Rename an element
    #[command(name = "rename")]
    Rename {
        path: PathBuf,

        /// Element as kind:name
        #[arg(value_parser = parse_selector)]
        element: (EntityKind, String),

        new_name: String,
    },

    /// Delete an element no zone refers to
    #[command(name = "delete")]
    Delete {
        path: PathBuf,

        /// Element as kind:name
        #[arg(value_parser = parse_selector)]
        element: (EntityKind, String),
    },

    /// Delete every sample and instrument nothing uses
    #[command(name = "remove-unused")]
    RemoveUnused { path: PathBuf },

    /// Copy elements and their dependencies from another document
    #[command(name = "merge")]
    Merge {
        /// Destination document
        path: PathBuf,

        /// Source document
        source: PathBuf,

        /// Elements to copy, as kind:name
        #[arg(short, long = "select", value_parser = parse_selector, required = true)]
        selection: Vec<(EntityKind, String)>,

        /// Answer to every name collision
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictArg>,
    },

    /// Duplicate elements inside a document
    #[command(name = "duplicate")]
    Duplicate {
        path: PathBuf,

        /// Elements to duplicate, as kind:name
        #[arg(value_parser = parse_selector, required = true)]
        selection: Vec<(EntityKind, String)>,
    },

    /// Find and set loop points
    #[command(name = "auto-loop")]
    AutoLoop {
        path: PathBuf,

        /// Samples to loop (all samples when omitted)
        #[arg(short, long = "sample")]
        samples: Vec<String>,
    },

    /// Estimate and set root key and pitch correction
    #[command(name = "estimate-pitch")]
    EstimatePitch {
        path: PathBuf,

        #[arg(short, long = "sample")]
        samples: Vec<String>,
    },

    /// Write the frequency peaks of samples as CSV
    #[command(name = "peaks")]
    Peaks {
        path: PathBuf,

        /// CSV output file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long = "sample")]
        samples: Vec<String>,

        /// Locale deciding the separators (e.g. "fr_FR")
        #[arg(long)]
        locale: Option<String>,
    },

    /// Low-pass samples to remove hiss
    #[command(name = "filter")]
    Filter {
        path: PathBuf,

        /// Cutoff frequency in Hz
        #[arg(long)]
        cutoff: f64,

        /// Roll-off order; brick-wall when omitted
        #[arg(long)]
        steepness: Option<f64>,

        #[arg(short, long = "sample")]
        samples: Vec<String>,
    },

    /// Detune the zones of an instrument for a celeste effect
    #[command(name = "celeste")]
    Celeste {
        path: PathBuf,

        instrument: String,

        /// Beat rate at the reference key, in Hz
        #[arg(long, default_value_t = 1.0)]
        beat: f64,

        #[arg(long, default_value_t = 60)]
        reference_key: u8,

        /// Division of the beat rate per octave
        #[arg(long, default_value_t = 1.0)]
        division: f64,
    },

    /// Set release times following a per-octave curve
    #[command(name = "release")]
    Release {
        path: PathBuf,

        instrument: String,

        /// Release time at the reference key, in seconds
        #[arg(long)]
        seconds: f64,

        #[arg(long, default_value_t = 60)]
        reference_key: u8,

        #[arg(long, default_value_t = 2.0)]
        division: f64,
    },

    /// Check the export ceilings
    #[command(name = "check")]
    Check { path: PathBuf },

    /// Split a bank into documents within the preset ceiling
    #[command(name = "split")]
    Split {
        path: PathBuf,

        /// Directory receiving the parts
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Undo the last action
    #[command(name = "undo")]
    Undo { path: PathBuf },

    /// Redo the last undone action
    #[command(name = "redo")]
    Redo { path: PathBuf },

    /// Show the undo history
    #[command(name = "history")]
    History { path: PathBuf },
}

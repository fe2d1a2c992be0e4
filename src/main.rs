//! Bankcraft CLI
//!
//! Command-line interface for editing JSON bank documents.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use bankcraft::analysis::FilterSettings;
use bankcraft::cli::{commands, Cli, Commands};
use bankcraft::EditorConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = EditorConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Configuration: {:?}", config);

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Bankcraft v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &EditorConfig) -> Result<()> {
    info!("Bankcraft v{}", env!("CARGO_PKG_VERSION"));
    match cmd {
        Commands::New { path, name } => commands::new_bank(&path, &name),
        Commands::Info { path } => commands::show_info(&path, config),
        Commands::ImportWav { path, wav, name } => {
            commands::import_wav(&path, &wav, name.as_deref(), config)
        }
        Commands::CreateInstrument {
            path,
            name,
            samples,
        } => commands::create_instrument(&path, &name, &samples, config),
        Commands::CreatePreset {
            path,
            name,
            bank,
            program,
            instruments,
        } => commands::create_preset(&path, &name, (bank, program), &instruments, config),
        Commands::Rename {
            path,
            element,
            new_name,
        } => commands::rename(&path, &element, &new_name, config),
        Commands::Delete { path, element } => commands::delete(&path, &element, config),
        Commands::RemoveUnused { path } => commands::remove_unused(&path, config),
        Commands::Merge {
            path,
            source,
            selection,
            on_conflict,
        } => commands::merge(&path, &source, &selection, on_conflict, config),
        Commands::Duplicate { path, selection } => commands::duplicate(&path, &selection, config),
        Commands::AutoLoop { path, samples } => commands::auto_loop(&path, &samples, config),
        Commands::EstimatePitch { path, samples } => {
            commands::estimate_pitch(&path, &samples, config)
        }
        Commands::Peaks {
            path,
            output,
            samples,
            locale,
        } => commands::peaks(&path, &output, &samples, locale.as_deref(), config),
        Commands::Filter {
            path,
            cutoff,
            steepness,
            samples,
        } => {
            let settings = FilterSettings {
                cutoff_hz: cutoff,
                steepness,
            };
            commands::filter(&path, &settings, &samples, config)
        }
        Commands::Celeste {
            path,
            instrument,
            beat,
            reference_key,
            division,
        } => commands::celeste(&path, &instrument, beat, reference_key, division, config),
        Commands::Release {
            path,
            instrument,
            seconds,
            reference_key,
            division,
        } => commands::release(&path, &instrument, seconds, reference_key, division, config),
        Commands::Check { path } => commands::check(&path, config),
        Commands::Split { path, output_dir } => commands::split(&path, &output_dir, config),
        Commands::Undo { path } => commands::undo(&path, config),
        Commands::Redo { path } => commands::redo(&path, config),
        Commands::History { path } => commands::show_history(&path, config),
    }
}

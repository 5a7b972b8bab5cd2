mod commands;
mod logging;
mod progress;

use std::process::ExitCode;

use alto_ids_core::config::{self, AppConfig};
use alto_ids_core::{BackfillEngine, Outcome};
use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, TargetArgs};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    match args.command {
        Some(Commands::Run(target)) => {
            let config = load_config(&target)?;
            if !run_backfill(config) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Commands::Check(target)) => {
            let config = load_config(&target)?;
            if let Err(err) = run_check(config) {
                error!("Error: {:#}", err);
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Commands::PrintConfig(target)) => {
            let config = load_config(&target)?;
            let rendered =
                toml::to_string_pretty(&config).context("Error rendering configuration")?;
            println!("{}", rendered);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(target: &TargetArgs) -> anyhow::Result<AppConfig> {
    let mut config = config::load_configuration_from(target.config.as_deref())
        .context("Error loading configuration")?;
    if let Some(dir) = &target.ocr_dir {
        config.ocr_dir = Some(dir.to_string_lossy().into_owned());
    }
    if let Some(folder) = &target.alto_folder {
        config.alto_folder = folder.clone();
    }
    Ok(config)
}

/// Runs the host step and prints its outcome. Returns false on failure.
fn run_backfill(config: AppConfig) -> bool {
    let engine = BackfillEngine::new(config);
    let reporter = CliReporter::new();

    match engine.run(&reporter) {
        Outcome::Success(report) => {
            println!();
            if !report.gap_found {
                info!(
                    "{} files checked, {}",
                    format!("{}", report.files_scanned).green(),
                    "all IDs present".green(),
                );
                return true;
            }
            info!(
                "Check: {}, Backup: {}, Write: {}",
                format!("{:.2}s", report.detect_duration.as_secs_f64()).green(),
                format!("{:.2}s", report.backup_duration.as_secs_f64()).green(),
                format!("{:.2}s", report.write_duration.as_secs_f64()).green(),
            );
            info!(
                "{} files rewritten: {} block, {} line, {} word IDs added",
                format!("{}", report.files_rewritten).cyan(),
                format!("{}", report.ids_assigned.blocks).cyan(),
                format!("{}", report.ids_assigned.lines).cyan(),
                format!("{}", report.ids_assigned.words).cyan(),
            );
            if let Some(backup) = &report.backup_path {
                info!("Backup stored at {}", backup.display());
            }
            true
        }
        Outcome::Failure { message } => {
            eprintln!("{} {}", "ERROR".red().bold(), message);
            false
        }
    }
}

fn run_check(config: AppConfig) -> anyhow::Result<()> {
    let engine = BackfillEngine::new(config);
    let reporter = CliReporter::new();
    let summary = engine.check(&reporter)?;

    for (path, counts) in &summary.files_with_gaps {
        println!(
            "{}: {} blocks, {} lines, {} words without ID",
            path.display(),
            format!("{}", counts.blocks).red(),
            format!("{}", counts.lines).red(),
            format!("{}", counts.words).red(),
        );
    }
    let total = summary.total();
    info!(
        "{} of {} files have missing IDs ({} in total)",
        format!("{}", summary.files_with_gaps.len()).red(),
        summary.files_scanned,
        format!("{}", total.total()).red(),
    );
    Ok(())
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "alto-ids")]
#[command(about = "Generate missing IDs for ALTO text blocks, lines and words", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Back up the OCR directory and add missing IDs to every ALTO file
    Run(TargetArgs),
    /// List ALTO files with missing IDs without changing anything
    Check(TargetArgs),
    /// Print configuration values
    PrintConfig(TargetArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// OCR directory (overrides `ocr_dir` from the configuration)
    #[arg(long)]
    pub ocr_dir: Option<PathBuf>,
    /// Name of the ALTO folder inside the OCR directory
    #[arg(long)]
    pub alto_folder: Option<String>,
    /// Configuration file to use instead of ./Config.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

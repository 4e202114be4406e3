//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command modules.

mod inspect;
mod judge;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rechtbank::config::Settings;

#[derive(Parser)]
#[command(name = "rechtbank")]
#[command(about = "Furniture court: normalize photos and obtain verdicts")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ./rechtbank.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected format, size and dimensions of an image
    Detect {
        /// Image file to inspect
        file: PathBuf,
    },

    /// Run the normalizer on an image and report what it did
    Normalize {
        /// Image file to normalize
        file: PathBuf,
        /// Write the normalized bytes here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Judge a photo with the configured vision model
    Judge {
        /// Photo to judge
        file: PathBuf,
        /// Print the raw model payload instead of the verdict response
        #[arg(long)]
        raw: bool,
        /// Whole-judgement budget in seconds (overrides config)
        #[arg(long)]
        deadline: Option<u64>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect { file } => inspect::cmd_detect(&file),
        Commands::Normalize { file, output } => {
            settings.validate(false)?;
            inspect::cmd_normalize(&settings, &file, output.as_deref())
        }
        Commands::Judge {
            file,
            raw,
            deadline,
        } => {
            settings.validate(true)?;
            judge::cmd_judge(&settings, &file, raw, deadline).await
        }
    }
}

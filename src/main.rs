//! eswb-extract - ESWB firmware container extractor
//!
//! Main entry point for the command-line tool.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eswb_core::Config;
use eswb_loader::{ExtractOptions, Extractor};

/// Extract every sub-image of an ESWB firmware container next to the input file
#[derive(Parser, Debug)]
#[command(name = "eswb-extract")]
#[command(version)]
struct Cli {
    /// Path to the container file
    input: PathBuf,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        tracing::error!(error = %e, "extraction failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    // Initialize logging
    eswb_core::logging::init(config.logging.log_level);

    tracing::debug!(config = ?config.extract, "starting eswb-extract");

    let extractor = Extractor::new(ExtractOptions::from(&config.extract));
    let report = extractor
        .extract_file(&cli.input)
        .with_context(|| format!("failed to extract {}", cli.input.display()))?;

    tracing::info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        overwritten = report.overwritten.len(),
        "extraction finished"
    );

    Ok(())
}

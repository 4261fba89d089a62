// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod scan;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir text scanner CLI
#[derive(Parser, Debug)]
#[command(name = "text-scan")]
#[command(version = "1.0.0")]
#[command(about = "Find and read text regions in an image", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect text regions and OCR them, printing a JSON report
    Scan(scan::ScanArgs),

    /// Report which models and engines can be loaded
    Models(scan::ModelsArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan(args) => scan::scan_image(args).await,
        Commands::Models(args) => scan::list_models(args).await,
    }
}

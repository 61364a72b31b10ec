//! relnotes CLI: release-notes grouping and feature investigation.
//!
//! Fetches changelog documents for a release, groups their items into
//! features through an external agent CLI in resumable batches, and drives
//! per-issue investigations.

mod commands;
mod progress;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

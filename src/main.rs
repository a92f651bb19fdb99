//! # artsync CLI
//!
//! Binary entry point. Parses the command line with `clap` and dispatches to
//! the subcommand; all reconciliation logic lives in the `artsync` library.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}

//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// artsync - Declarative provisioning of artifact repositories and permissions
#[derive(Parser, Debug)]
#[command(name = "artsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and update repositories and permission targets from repo files
    Provision(commands::provision::ProvisionArgs),

    /// Generate repo files from the repositories on the platform
    Generate(commands::generate::GenerateArgs),

    /// Check repo files offline without contacting the platform
    Check(commands::check::CheckArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        if let Err(e) = init_logging(&self.log_level) {
            eprintln!("Failed to initialize logging: {}", e);
        }

        match self.command {
            Commands::Provision(args) => commands::provision::execute(args, &self.color),
            Commands::Generate(args) => commands::generate::execute(args, &self.color),
            Commands::Check(args) => commands::check::execute(args, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Logs go to stderr so generated documents on stdout stay clean.
fn init_logging(level: &str) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .parse_filters(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .try_init()
}

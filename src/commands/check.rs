//! # Check Command Implementation
//!
//! Runs the offline stages (Load, Dedup, Validate) over repo files and
//! prints what would be dropped. Permission names are only checked against
//! each other, since the platform is not contacted. Fails when no valid repo
//! remains.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use artsync::output::{Marker, OutputConfig};
use artsync::phases::{load, orchestrator};
use artsync::report::RunReport;
use artsync::suggestions;

/// Check repo files without contacting the platform
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Repo files, or directories searched for *.json, *.yaml and *.yml
    #[arg(value_name = "PATH", env = "ARTSYNC_REPOFILES", value_delimiter = ',', required = true)]
    pub paths: Vec<PathBuf>,

    /// Treat empty repo files as a repo named after the file
    #[arg(long)]
    pub provision_empty: bool,

    /// List every valid repo
    #[arg(short, long)]
    pub verbose: bool,
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    for path in &args.paths {
        if !path.exists() {
            return Err(suggestions::repo_file_not_found(path));
        }
    }
    let documents = load::collect_documents(&args.paths)?;
    if documents.is_empty() {
        return Err(suggestions::no_repo_files(&args.paths));
    }
    println!(
        "{} Checking {} repo file(s)",
        out.marker(Marker::Scan),
        documents.len()
    );

    let mut report = RunReport::new();
    let valid = orchestrator::load_and_validate(&documents, args.provision_empty, &[], &mut report)?;

    if args.verbose {
        for repo in &valid {
            println!("   {} ({})", repo.name, repo.provenance);
        }
    }

    println!();
    for (label, value) in report.counters().into_iter().take(3) {
        println!("{}: {}", label, value);
    }
    println!("Valid repos: {}", valid.len());

    if valid.is_empty() {
        return Err(suggestions::no_valid_repos(report.warnings.len()));
    }
    if report.warnings.is_empty() {
        println!("\n{} All repo files are valid", out.marker(Marker::Ok));
    } else {
        println!(
            "\n{} {} warning(s), see log output above",
            out.marker(Marker::Warn),
            report.warnings.len()
        );
    }
    Ok(())
}

//! # Generate Command Implementation
//!
//! Reads every repository and permission target from the platform and writes
//! them out as repo files: one combined document, or one document per repo
//! with `--split`. The output can be fed straight back into `provision`.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use artsync::codec::Format;
use artsync::output::{Marker, OutputConfig};
use artsync::phases::generate::{self, GenerateOptions};
use artsync::phases::orchestrator;
use artsync::suggestions;

use super::ConnectionArgs;

/// Output document format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => Format::Yaml,
            OutputFormat::Json => Format::Json,
        }
    }
}

/// Generate repo files from the platform
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output file, or output folder with --split
    #[arg(value_name = "PATH")]
    pub output: PathBuf,

    /// Use every permission target referencing a repo as its permission source
    #[arg(long, conflicts_with = "renamed")]
    pub all_permissions: bool,

    /// Combine identical repos into one entry with `names`
    #[arg(long, conflicts_with = "split")]
    pub combine: bool,

    /// Write one file per repo into the output folder
    #[arg(long)]
    pub split: bool,

    /// Only repos with a same-named permission target bound to just that repo
    #[arg(long)]
    pub matching: bool,

    /// Only repos whose permission targets have default include/exclude patterns
    #[arg(long)]
    pub clean: bool,

    /// Also accept a single differently-named permission target per repo
    #[arg(long)]
    pub renamed: bool,

    /// Overwrite an existing output file
    #[arg(long)]
    pub overwrite: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

/// Execute the `generate` command.
pub fn execute(args: GenerateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    if !args.split && args.output.exists() && !args.overwrite {
        return Err(suggestions::output_exists(&args.output));
    }
    if args.split && args.output.is_file() {
        anyhow::bail!(
            "Output path is a file, --split needs a folder: {}",
            args.output.display()
        );
    }

    let options = GenerateOptions {
        use_all: args.all_permissions,
        matching: args.matching,
        clean: args.clean,
        renamed: args.renamed,
        combine: args.combine && !args.split,
    };
    let format = Format::from(args.format);

    let platform = args.connection.connect()?;
    let (records, report) = orchestrator::execute_generate(&platform, options)?;

    if args.split {
        generate::write_split(&records, &args.output, format)?;
    } else {
        let text = generate::render_combined(&records, format)?;
        std::fs::write(&args.output, text)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    }

    println!(
        "{} Generated {} repo entries into {}",
        out.marker(Marker::Ok),
        records.len(),
        args.output.display()
    );
    if !report.warnings.is_empty() {
        println!(
            "{} {} repo(s) skipped, see log output above",
            out.marker(Marker::Warn),
            report.warnings.len()
        );
    }
    Ok(())
}

//! # Provision Command Implementation
//!
//! Loads the given repo files, reconciles them against the platform and
//! prints the end-of-run report. Per-repo problems are warnings; the
//! command only fails when the platform state cannot be fetched, the
//! configuration is unusable, or no repo file could be found.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use artsync::defaults;
use artsync::directory::LdapDirectory;
use artsync::ldap_config;
use artsync::output::{Marker, OutputConfig};
use artsync::phases::load;
use artsync::phases::orchestrator::{self, Directory, ProvisionSettings};
use artsync::phases::provision::ProvisionOptions;
use artsync::phases::resolve::ResolveOptions;
use artsync::suggestions;

use super::ConnectionArgs;

/// Create and update repositories and permission targets
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Repo files, or directories searched for *.json, *.yaml and *.yml
    #[arg(
        value_name = "PATH",
        env = "ARTSYNC_REPOFILES",
        value_delimiter = ',',
        required = true
    )]
    pub paths: Vec<PathBuf>,

    /// Log the planned changes without applying them
    #[arg(short = 'n', long, env = "ARTSYNC_DRYRUN")]
    pub dry_run: bool,

    /// Allow updating permission targets with non-default include/exclude patterns
    #[arg(long, env = "ARTSYNC_ALLOW_PATTERNS")]
    pub allow_patterns: bool,

    /// Show added and removed actions per principal
    #[arg(long, env = "ARTSYNC_SHOW_DIFF")]
    pub show_diff: bool,

    /// Provision a repo named after the file for empty repo files
    #[arg(long)]
    pub provision_empty: bool,

    /// Create users that do not exist yet
    #[arg(long, env = "ARTSYNC_CREATE_USERS")]
    pub create_users: bool,

    /// Import groups that do not exist yet from LDAP
    #[arg(long, env = "ARTSYNC_IMPORT_LDAP_GROUPS")]
    pub import_groups: bool,

    /// LDAP configuration file, read when users are created or groups imported
    #[arg(long, value_name = "FILE", default_value = defaults::LDAP_CONFIG_FILE)]
    pub ldap_config: PathBuf,
}

/// Execute the `provision` command.
pub fn execute(args: ProvisionArgs, color_flag: &str) -> Result<()> {
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

    if args.dry_run {
        println!(
            "{} DRY RUN MODE - No changes will be made",
            out.marker(Marker::DryRun)
        );
    }

    let settings = ProvisionSettings {
        provision_empty: args.provision_empty,
        resolve: ResolveOptions {
            import_groups: args.import_groups,
            create_users: args.create_users,
            dry_run: args.dry_run,
        },
        provision: ProvisionOptions {
            dry_run: args.dry_run,
            allow_patterns: args.allow_patterns,
            show_diff: args.show_diff,
        },
    };

    let ldap = if settings.resolve.enabled() {
        Some(ldap_config::load(&args.ldap_config, |key| std::env::var(key).ok())?)
    } else {
        None
    };
    let service = LdapDirectory;
    let directory = ldap.as_ref().map(|config| Directory {
        service: &service,
        config,
    });

    let platform = args.connection.connect()?;
    let report = orchestrator::execute_provision(&documents, settings, &platform, &platform, directory)?;

    println!();
    print!("{}", out.render_report(&report));
    println!(
        "{} {} change(s){}",
        out.marker(Marker::Ok),
        report.change_count(),
        if args.dry_run { " planned" } else { " applied" }
    );
    if !report.warnings.is_empty() {
        println!(
            "{} {} warning(s), see log output above",
            out.marker(Marker::Warn),
            report.warnings.len()
        );
    }
    Ok(())
}

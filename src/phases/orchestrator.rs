//! Orchestrator for complete runs
//!
//! Chains the stages into the three entry points the CLI uses: an offline
//! check, a provisioning run and a generation run.

use std::path::PathBuf;

use super::provision::{ProvisionOptions, Provisioner};
use super::resolve::{DirectoryAccess, ResolveOptions, Resolver};
use super::{dedup, generate, load, resolve, validate};
use crate::directory::DirectoryService;
use crate::error::{Error, Result};
use crate::ldap_config::LdapConfig;
use crate::model::{DeclaredRepo, Identities, RemotePermission};
use crate::platform::{PlatformReader, PlatformWriter, RemoteState};
use crate::report::RunReport;

/// Everything a provisioning run needs besides the documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionSettings {
    pub provision_empty: bool,
    pub resolve: ResolveOptions,
    pub provision: ProvisionOptions,
}

/// Directory collaborators, required when users are created or groups
/// imported.
#[derive(Clone, Copy)]
pub struct Directory<'a> {
    pub service: &'a dyn DirectoryService,
    pub config: &'a LdapConfig,
}

/// Runs Load, Dedup and Validate.
///
/// `permissions` are the live targets checked for taken permission names;
/// pass an empty slice for an offline check.
pub fn load_and_validate(
    paths: &[PathBuf],
    provision_empty: bool,
    permissions: &[RemotePermission],
    report: &mut RunReport,
) -> Result<Vec<DeclaredRepo>> {
    let loaded = load::execute(paths, provision_empty, report);
    log::info!("Loaded repos: {}", loaded.len());
    let unique = dedup::execute(loaded, report);
    let valid = validate::execute(unique, permissions, report)?;
    log::info!("Valid repos: {}", valid.len());
    Ok(valid)
}

/// Runs every provisioning stage against the platform.
///
/// Fails only when the live state cannot be fetched or the settings
/// contradict each other; every per-repo problem lands in the report.
pub fn execute_provision(
    paths: &[PathBuf],
    settings: ProvisionSettings,
    reader: &dyn PlatformReader,
    writer: &dyn PlatformWriter,
    directory: Option<Directory<'_>>,
) -> Result<RunReport> {
    if settings.resolve.import_groups && directory.is_none() {
        return Err(Error::precondition(
            "group import requires an LDAP configuration",
        ));
    }

    let mut report = RunReport::new();
    let state = RemoteState::fetch(reader, settings.resolve.enabled())?;
    let valid = load_and_validate(paths, settings.provision_empty, &state.permissions, &mut report)?;

    let mut identities = Identities::new(state.users.iter().cloned(), state.groups.iter().cloned());
    let mut resolver = Resolver::new(writer, settings.resolve);
    if let Some(directory) = directory {
        resolver = resolver.with_directory(DirectoryAccess {
            service: directory.service,
            config: directory.config,
            servers: &state.directory_servers,
            group_settings: &state.group_import_settings,
        });
    }
    let resolved = resolve::execute(valid, &mut identities, &mut resolver, &mut report);

    Provisioner::new(writer, settings.provision).execute(&resolved, &state, &identities, &mut report);
    Ok(report)
}

/// Fetches the live state and turns it into declared records.
pub fn execute_generate(
    reader: &dyn PlatformReader,
    options: generate::GenerateOptions,
) -> Result<(Vec<DeclaredRepo>, RunReport)> {
    let mut report = RunReport::new();
    let state = RemoteState::fetch(reader, false)?;
    let records = generate::execute(&state, options, &mut report);
    Ok((records, report))
}

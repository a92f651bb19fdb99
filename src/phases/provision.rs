//! Stage 5: Provision
//!
//! Diffs each surviving declared repo against the remote snapshot and
//! applies the difference, strictly in input order:
//!
//! 1. **Repository**: defaults are filled in, then the repo is created,
//!    updated (description or layout changed) or left alone. A changed
//!    access class or package type cannot be applied and is reported.
//! 2. **Permission target**: the desired user and group action maps are
//!    built from the six permission lists, unknown actions already on the
//!    live target are carried over, and the target is created or updated
//!    when the maps differ. A live target with restricted scope patterns is
//!    only touched when pattern overrides are allowed.
//!
//! In a dry run every write is skipped but logged and counted exactly as it
//! would be in a live run.

use std::collections::BTreeMap;

use crate::defaults;
use crate::error::Result;
use crate::model::{Action, ActionMap, DeclaredRepo, Identities, RemotePermission, RemoteRepo};
use crate::platform::{Actions, ArtifactResource, PermissionRequest, PlatformWriter, RemoteState, RepoRequest};
use crate::report::{PlannedAction, RunReport};

/// Flags controlling how changes are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub dry_run: bool,
    /// Permit updating targets with non-default include/exclude patterns.
    pub allow_patterns: bool,
    /// Also log the added and removed action tokens per principal.
    pub show_diff: bool,
}

/// What happened to a repository's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoOutcome {
    Created,
    Updated,
    NoChange,
    /// Access class or package type differs from the live repo.
    Immutable,
    /// The write failed.
    Failed,
}

/// What happened to a repository's permission target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Created,
    Updated,
    NoChange,
    /// Live scope patterns are restricted and overrides are not allowed.
    Refused,
    Failed,
}

/// Applies declared repos to the platform.
pub struct Provisioner<'a> {
    writer: &'a dyn PlatformWriter,
    options: ProvisionOptions,
}

impl<'a> Provisioner<'a> {
    pub fn new(writer: &'a dyn PlatformWriter, options: ProvisionOptions) -> Self {
        Self { writer, options }
    }

    /// Provisions every record in order.
    pub fn execute(
        &self,
        records: &[DeclaredRepo],
        state: &RemoteState,
        identities: &Identities,
        report: &mut RunReport,
    ) {
        log::info!("Repos to provision: {}", records.len());
        for record in records {
            let repo = self.provision_repo(record, state.repo(&record.name), report);
            if repo == RepoOutcome::Failed {
                continue;
            }
            let existing = state.permission(record.effective_permission_name());
            self.provision_permission(record, existing, identities, report);
        }
    }

    /// Creates or updates one repository.
    pub fn provision_repo(
        &self,
        record: &DeclaredRepo,
        existing: Option<&RemoteRepo>,
        report: &mut RunReport,
    ) -> RepoOutcome {
        let request = repo_request(record);

        let Some(existing) = existing else {
            log::info!("'{}': Repo does not exist, creating...", record.name);
            log::info!("'{}': {}", record.name, describe(&request));
            return match self.write(|w| w.create_repository(&request)) {
                Ok(()) => {
                    self.log_done(&record.name, "Created repo");
                    report.record(PlannedAction::CreateRepo(record.name.clone()));
                    RepoOutcome::Created
                }
                Err(e) => self.repo_failed(record, e, report),
            };
        };

        let mut immutable = false;
        if !defaults::same_attribute(&existing.access_class, &request.rclass) {
            report.warn(format!(
                "'{}': Ignoring repo, cannot update rclass/type: diff: '{}' -> '{}'",
                record.name, existing.access_class, request.rclass
            ));
            immutable = true;
        }
        if !defaults::same_attribute(&existing.package_type, &request.package_type) {
            report.warn(format!(
                "'{}': Ignoring repo, cannot update package type: diff: '{}' -> '{}'",
                record.name, existing.package_type, request.package_type
            ));
            immutable = true;
        }
        if immutable {
            report.immutable_mismatches += 1;
            report.invalid_repos += 1;
            return RepoOutcome::Immutable;
        }

        let description_changed = existing.description != request.description;
        let layout_changed = !defaults::same_attribute(&existing.layout_ref, &request.layout_ref);
        if !description_changed && !layout_changed {
            report.no_diff_repos += 1;
            return RepoOutcome::NoChange;
        }

        log::info!("'{}': Repo already exists, updating...", record.name);
        if description_changed {
            log::info!(
                "'{}': Description diff: '{}' -> '{}'",
                record.name,
                existing.description,
                request.description
            );
        }
        if layout_changed {
            log::info!(
                "'{}': Layout diff: '{}' -> '{}'",
                record.name,
                existing.layout_ref,
                request.layout_ref
            );
        }
        match self.write(|w| w.update_repository(&request)) {
            Ok(()) => {
                self.log_done(&record.name, "Updated repo");
                report.record(PlannedAction::UpdateRepo(record.name.clone()));
                RepoOutcome::Updated
            }
            Err(e) => self.repo_failed(record, e, report),
        }
    }

    /// Creates or updates the permission target of one repository.
    pub fn provision_permission(
        &self,
        record: &DeclaredRepo,
        existing: Option<&RemotePermission>,
        identities: &Identities,
        report: &mut RunReport,
    ) -> PermissionOutcome {
        let name = record.effective_permission_name().to_string();
        let mut desired = desired_actions(record, identities, report);

        let Some(existing) = existing else {
            log::info!("'{}': Permission target does not exist, creating...", record.name);
            self.log_diff(&record.name, "Users", &ActionMap::new(), &desired.users);
            self.log_diff(&record.name, "Groups", &ActionMap::new(), &desired.groups);

            let request = permission_request(&name, &record.name, desired, defaults::scope());
            return match self.write(|w| w.create_permission(&request)) {
                Ok(()) => {
                    self.log_done(&record.name, "Created permission target");
                    report.record(PlannedAction::CreatePermission(name));
                    PermissionOutcome::Created
                }
                Err(e) => self.permission_failed(record, e, report),
            };
        };

        keep_unknown_actions(&record.name, "user", &mut desired.users, &existing.users);
        keep_unknown_actions(&record.name, "group", &mut desired.groups, &existing.groups);

        if desired.users == existing.users && desired.groups == existing.groups {
            report.no_diff_permissions += 1;
            return PermissionOutcome::NoChange;
        }

        if !self.options.allow_patterns {
            if let Some((repo, scope)) = existing.targets.iter().find(|(_, s)| !s.is_default()) {
                report.warn(format!(
                    "'{}': Warning: Ignoring repo's permission target: non-default include/exclude patterns: permission target: '{}', repo: '{}', include: {:?}, exclude: {:?}",
                    record.name, existing.name, repo, scope.include, scope.exclude
                ));
                report.invalid_permissions += 1;
                return PermissionOutcome::Refused;
            }
        }

        log::info!("'{}': Permission target already exists, updating...", record.name);
        if desired.users != existing.users {
            self.log_diff(&record.name, "Users", &existing.users, &desired.users);
        }
        if desired.groups != existing.groups {
            self.log_diff(&record.name, "Groups", &existing.groups, &desired.groups);
        }

        let scope = existing
            .targets
            .get(&record.name)
            .cloned()
            .unwrap_or_else(defaults::scope);
        let request = permission_request(&name, &record.name, desired, scope);
        match self.write(|w| w.update_permission(&request)) {
            Ok(()) => {
                self.log_done(&record.name, "Updated permission target");
                report.record(PlannedAction::UpdatePermission(name));
                PermissionOutcome::Updated
            }
            Err(e) => self.permission_failed(record, e, report),
        }
    }

    /// Runs `op` unless this is a dry run.
    fn write<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&dyn PlatformWriter) -> Result<()>,
    {
        if self.options.dry_run {
            return Ok(());
        }
        op(self.writer)
    }

    fn log_done(&self, repo: &str, what: &str) {
        if self.options.dry_run {
            log::info!("'{}': Dry run: {} skipped.", repo, what.to_lowercase());
        } else {
            log::info!("'{}': {} successfully.", repo, what);
        }
    }

    fn repo_failed(
        &self,
        record: &DeclaredRepo,
        error: crate::error::Error,
        report: &mut RunReport,
    ) -> RepoOutcome {
        report.warn(format!("'{}': Warning: Ignoring repo: {}", record.name, error));
        report.invalid_repos += 1;
        RepoOutcome::Failed
    }

    fn permission_failed(
        &self,
        record: &DeclaredRepo,
        error: crate::error::Error,
        report: &mut RunReport,
    ) -> PermissionOutcome {
        report.warn(format!(
            "'{}': Warning: Ignoring repo's permission target: {}",
            record.name, error
        ));
        report.invalid_permissions += 1;
        PermissionOutcome::Failed
    }

    fn log_diff(&self, repo: &str, kind: &str, old: &ActionMap, new: &ActionMap) {
        for line in diff_lines(repo, kind, old, new) {
            log::info!("{}", line);
        }
        if self.options.show_diff {
            for line in token_diff_lines(old, new) {
                log::info!("'{}': {}", repo, line);
            }
        }
    }
}

/// Builds the repository payload with defaults filled in.
pub fn repo_request(record: &DeclaredRepo) -> RepoRequest {
    RepoRequest {
        key: record.name.clone(),
        description: record.description.clone(),
        rclass: defaults::or_default(&record.access_class, defaults::ACCESS_CLASS).to_string(),
        package_type: defaults::or_default(&record.package_type, defaults::PACKAGE_TYPE)
            .to_string(),
        layout_ref: defaults::or_default(&record.layout, defaults::LAYOUT).to_string(),
    }
}

fn describe(request: &RepoRequest) -> String {
    let mut fields = Vec::new();
    if !request.description.is_empty() {
        fields.push(format!("Description: '{}'", request.description));
    }
    fields.push(format!("Rclass: '{}'", request.rclass));
    fields.push(format!("PackageType: '{}'", request.package_type));
    fields.push(format!("Layout: '{}'", request.layout_ref));
    fields.join(", ")
}

fn permission_request(
    name: &str,
    repo: &str,
    actions: Actions,
    scope: crate::model::Scope,
) -> PermissionRequest {
    let mut targets = BTreeMap::new();
    targets.insert(repo.to_string(), scope);
    PermissionRequest {
        name: name.to_string(),
        artifact: ArtifactResource { actions, targets },
    }
}

/// Builds the desired user and group maps from the six permission lists.
///
/// A principal known as a user goes to the user map; anything else is
/// treated as a group. Repeating a principal within one list is reported
/// and ignored.
pub fn desired_actions(
    record: &DeclaredRepo,
    identities: &Identities,
    report: &mut RunReport,
) -> Actions {
    let mut actions = Actions::default();
    for (action, principals) in record.permission_lists() {
        for principal in principals {
            let (map, kind) = if identities.is_user(principal) {
                (&mut actions.users, "user")
            } else {
                (&mut actions.groups, "group")
            };
            let held = map.entry(principal.clone()).or_default();
            if !held.insert(action.clone()) {
                report.warn(format!(
                    "'{}': Ignoring duplicate permission '{}' for {} '{}'",
                    record.name, action, kind, principal
                ));
                report.duplicate_permissions += 1;
            }
        }
    }
    actions
}

/// Copies actions outside the managed six from `existing` into `desired`.
pub fn keep_unknown_actions(repo: &str, kind: &str, desired: &mut ActionMap, existing: &ActionMap) {
    for (principal, held) in existing {
        for action in held.iter().filter(|a| !a.is_known()) {
            log::info!(
                "'{}': Keeping unknown permission '{}' for {} '{}'",
                repo,
                action,
                kind,
                principal
            );
            desired
                .entry(principal.clone())
                .or_default()
                .insert(action.clone());
        }
    }
}

fn join(actions: &crate::model::ActionSet) -> String {
    actions
        .iter()
        .map(Action::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per principal whose actions differ between `old` and `new`.
pub fn diff_lines(repo: &str, kind: &str, old: &ActionMap, new: &ActionMap) -> Vec<String> {
    let mut names: Vec<&String> = old.keys().chain(new.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| match (old.get(name), new.get(name)) {
            (Some(before), Some(after)) if before != after => Some(format!(
                "'{}': {} diff: '{}': {} -> {}",
                repo,
                kind,
                name,
                join(before),
                join(after)
            )),
            (Some(before), None) => Some(format!(
                "'{}': {} diff: '{}': {} -> removed",
                repo,
                kind,
                name,
                join(before)
            )),
            (None, Some(after)) => Some(format!(
                "'{}': {} diff: '{}': notexist -> {}",
                repo,
                kind,
                name,
                join(after)
            )),
            _ => None,
        })
        .collect()
}

/// `+`/`-` lines for each added and removed action token.
pub fn token_diff_lines(old: &ActionMap, new: &ActionMap) -> Vec<String> {
    let empty = crate::model::ActionSet::new();
    let mut names: Vec<&String> = old.keys().chain(new.keys()).collect();
    names.sort();
    names.dedup();

    let mut lines = Vec::new();
    for name in names {
        let before = old.get(name).unwrap_or(&empty);
        let after = new.get(name).unwrap_or(&empty);
        for action in before.difference(after) {
            lines.push(format!("- {} {}", name, action));
        }
        for action in after.difference(before) {
            lines.push(format!("+ {} {}", name, action));
        }
    }
    lines
}

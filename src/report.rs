//! # Run Report
//!
//! Every counter, warning and planned action of one run lives in a
//! `RunReport` value that each stage receives by `&mut` and that the caller
//! renders at the end. There is no process-wide state, so two runs in the
//! same process (or two tests) never see each other's numbers.

use std::fmt;

/// A write the engine performed, or would have performed in a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    CreateRepo(String),
    UpdateRepo(String),
    CreatePermission(String),
    UpdatePermission(String),
    CreateUser(String),
    ImportGroup(String),
}

impl PlannedAction {
    /// Name of the repo, permission target, user or group acted upon.
    pub fn subject(&self) -> &str {
        match self {
            PlannedAction::CreateRepo(name)
            | PlannedAction::UpdateRepo(name)
            | PlannedAction::CreatePermission(name)
            | PlannedAction::UpdatePermission(name)
            | PlannedAction::CreateUser(name)
            | PlannedAction::ImportGroup(name) => name,
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::CreateRepo(name) => write!(f, "create repo '{}'", name),
            PlannedAction::UpdateRepo(name) => write!(f, "update repo '{}'", name),
            PlannedAction::CreatePermission(name) => {
                write!(f, "create permission target '{}'", name)
            }
            PlannedAction::UpdatePermission(name) => {
                write!(f, "update permission target '{}'", name)
            }
            PlannedAction::CreateUser(name) => write!(f, "create user '{}'", name),
            PlannedAction::ImportGroup(name) => write!(f, "import group '{}'", name),
        }
    }
}

/// Counters and diagnostics of a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub invalid_documents: usize,
    pub duplicate_repos: usize,
    /// Bad names, permission-name conflicts, immutable mismatches and failed
    /// repository writes.
    pub invalid_repos: usize,
    /// Repos dropped because a principal could not be resolved.
    pub unresolved_repos: usize,
    /// Repos skipped because their access class or package type differs.
    pub immutable_mismatches: usize,
    pub no_diff_repos: usize,
    pub invalid_permissions: usize,
    pub no_diff_permissions: usize,
    pub duplicate_permissions: usize,
    pub created_repos: usize,
    pub updated_repos: usize,
    pub created_permissions: usize,
    pub updated_permissions: usize,
    pub created_users: usize,
    pub imported_groups: usize,
    pub warnings: Vec<String>,
    pub actions: Vec<PlannedAction>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a warning and keeps it for the end-of-run summary.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Records a write and bumps the matching counter.
    pub fn record(&mut self, action: PlannedAction) {
        match &action {
            PlannedAction::CreateRepo(_) => self.created_repos += 1,
            PlannedAction::UpdateRepo(_) => self.updated_repos += 1,
            PlannedAction::CreatePermission(_) => self.created_permissions += 1,
            PlannedAction::UpdatePermission(_) => self.updated_permissions += 1,
            PlannedAction::CreateUser(_) => self.created_users += 1,
            PlannedAction::ImportGroup(_) => self.imported_groups += 1,
        }
        self.actions.push(action);
    }

    /// Total number of writes recorded.
    pub fn change_count(&self) -> usize {
        self.actions.len()
    }

    /// Label/value pairs in display order.
    pub fn counters(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Ignored invalid repo files", self.invalid_documents),
            ("Ignored duplicated repos", self.duplicate_repos),
            ("Ignored invalid repos", self.invalid_repos),
            ("Ignored repos with unresolved principals", self.unresolved_repos),
            ("Ignored repos with immutable changes", self.immutable_mismatches),
            ("Ignored no diff repos", self.no_diff_repos),
            ("Ignored invalid permission targets", self.invalid_permissions),
            ("Ignored no diff permission targets", self.no_diff_permissions),
            ("Ignored duplicate permissions", self.duplicate_permissions),
            ("Created repos", self.created_repos),
            ("Updated repos", self.updated_repos),
            ("Created permission targets", self.created_permissions),
            ("Updated permission targets", self.updated_permissions),
            ("Created users", self.created_users),
            ("Imported groups", self.imported_groups),
        ]
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.counters() {
            writeln!(f, "{}: {}", label, value)?;
        }
        Ok(())
    }
}

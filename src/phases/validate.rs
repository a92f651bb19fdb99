//! Stage 3: Validate
//!
//! Two passes over the deduplicated records:
//!
//! 1. **Names**: a name must be non-empty, must not start or end with a
//!    space, and may only contain `A-Z a-z 0-9`, space, `_` and `-`.
//! 2. **Permission conflicts**: records whose effective permission names
//!    collide are all dropped, as is any record whose permission name is
//!    already taken on the platform by a target bound to some other repo.
//!
//! Dropping every member of a collision, rather than keeping the first,
//! makes the outcome independent of declaration order.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{DeclaredRepo, RemotePermission};
use crate::report::RunReport;

/// Allowed repository names.
pub const NAME_PATTERN: &str = "^[A-Za-z0-9 _-]+$";

/// Compiled name rule.
pub struct NameRule {
    pattern: Regex,
}

impl NameRule {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(NAME_PATTERN).map_err(Error::Regex)?;
        Ok(Self { pattern })
    }

    pub fn is_valid(&self, name: &str) -> bool {
        !name.starts_with(' ') && !name.ends_with(' ') && self.pattern.is_match(name)
    }
}

/// Runs both passes.
pub fn execute(
    records: Vec<DeclaredRepo>,
    permissions: &[RemotePermission],
    report: &mut RunReport,
) -> Result<Vec<DeclaredRepo>> {
    let records = validate_names(records, report)?;
    let records = drop_shared_permissions(records, report);
    Ok(drop_taken_permissions(records, permissions, report))
}

/// First pass: removes records with bad names.
pub fn validate_names(records: Vec<DeclaredRepo>, report: &mut RunReport) -> Result<Vec<DeclaredRepo>> {
    let rule = NameRule::new()?;
    let mut valid = Vec::with_capacity(records.len());
    for record in records {
        if record.name.is_empty() {
            report.warn(format!(
                "'{}': Warning: Ignoring repo: missing name for repo ({})",
                record.name, record.provenance
            ));
            report.invalid_repos += 1;
        } else if !rule.is_valid(&record.name) {
            report.warn(format!(
                "'{}': Warning: Ignoring repo: invalid name for repo ({})",
                record.name, record.provenance
            ));
            report.invalid_repos += 1;
        } else {
            valid.push(record);
        }
    }
    Ok(valid)
}

/// Removes every record of a group sharing one effective permission name.
pub fn drop_shared_permissions(records: Vec<DeclaredRepo>, report: &mut RunReport) -> Vec<DeclaredRepo> {
    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for record in &records {
        groups
            .entry(record.effective_permission_name())
            .or_default()
            .push(record.name.as_str());
    }

    let mut warnings = Vec::new();
    let mut shared = Vec::new();
    for record in &records {
        let permission = record.effective_permission_name();
        let members = &groups[permission];
        if members.len() > 1 {
            let others: Vec<&str> = members
                .iter()
                .copied()
                .filter(|name| *name != record.name)
                .collect();
            warnings.push(format!(
                "Warning: Ignoring repo '{}', due to shared permission with repo '{}', permission name: '{}' (new permission)",
                record.name,
                others.join("', '"),
                permission
            ));
            shared.push(permission.to_string());
        }
    }

    for warning in warnings {
        report.warn(warning);
    }

    let (dropped, kept): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|record| shared.iter().any(|p| p == record.effective_permission_name()));
    report.invalid_repos += dropped.len();
    kept
}

/// Removes records whose permission name belongs to an existing target
/// bound to a different repository.
pub fn drop_taken_permissions(
    records: Vec<DeclaredRepo>,
    permissions: &[RemotePermission],
    report: &mut RunReport,
) -> Vec<DeclaredRepo> {
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let permission = record.effective_permission_name();
        let foreign = permissions
            .iter()
            .filter(|p| p.name == permission)
            .flat_map(|p| p.targets.keys())
            .find(|target| **target != record.name);

        match foreign {
            Some(target) => {
                report.warn(format!(
                    "Warning: Ignoring repo '{}', due to shared permission with repo '{}', permission name: '{}' (existing permission)",
                    record.name, target, permission
                ));
                report.invalid_repos += 1;
            }
            None => kept.push(record),
        }
    }
    kept
}

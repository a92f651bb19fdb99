//! Generate: live platform state back into declared documents.
//!
//! The inverse of provisioning. Each live repository becomes a declared
//! record with platform defaults elided, and its permission lists are
//! filled from the permission targets chosen as its source. The output
//! loads back into the same effective configuration.
//!
//! ## Filters
//!
//! - `matching`: only repos whose same-named target binds exactly that repo.
//! - `renamed`: like `matching`, but a repo without a same-named target may
//!   take its single exclusively-bound target, recorded as `permissionName`.
//! - `clean`: only repos whose source targets have the default scope.
//!
//! ## Combining
//!
//! With `combine`, records identical in everything but their name are folded
//! into one record carrying `names`.

use std::fs;
use std::path::Path;

use crate::codec::{self, Format};
use crate::defaults;
use crate::error::Result;
use crate::model::{Action, ActionMap, DeclaredRepo, RemotePermission, RemoteRepo};
use crate::platform::RemoteState;
use crate::report::RunReport;

/// Flags controlling which repos are generated and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Use every target that references the repo as permission source.
    pub use_all: bool,
    pub matching: bool,
    pub clean: bool,
    pub renamed: bool,
    pub combine: bool,
}

/// Builds declared records from the live snapshot, sorted by name with
/// combined records first.
pub fn execute(state: &RemoteState, options: GenerateOptions, report: &mut RunReport) -> Vec<DeclaredRepo> {
    let mut generated: Vec<DeclaredRepo> = Vec::new();

    for repo in &state.repos {
        if options.matching && !binds_matching(&repo.key, &state.permissions, report) {
            continue;
        }

        let mut permission_name = String::new();
        if options.renamed {
            match renamed_permission(&repo.key, &state.permissions, report) {
                Some(name) => permission_name = name,
                None => continue,
            }
        }

        if options.clean && !is_clean(&repo.key, &permission_name, &state.permissions, options, report) {
            continue;
        }

        let mut record = declared_from(repo);
        record.permission_name = permission_name;
        for permission in sources(repo, &record.permission_name, &state.permissions, options) {
            add_permissions(&mut record, &permission.users);
            add_permissions(&mut record, &permission.groups);
        }
        sort_lists(&mut record);

        if options.combine {
            if let Some(existing) = generated.iter_mut().find(|g| same_except_name(g, &record)) {
                if !existing.name.is_empty() {
                    let first = std::mem::take(&mut existing.name);
                    existing.names.push(first);
                }
                existing.names.push(record.name.clone());
                existing.names.sort();
                log::info!(
                    "'{}': Identical repo already generated ({}), compacting duplicate.",
                    repo.key,
                    existing.names[0]
                );
                continue;
            }
        }

        generated.push(record);
    }

    generated.sort_by(|a, b| match (a.name.is_empty(), b.name.is_empty()) {
        (true, true) => a.names.first().cmp(&b.names.first()),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (false, false) => a.name.cmp(&b.name),
    });
    log::info!("Generated repos: {}", generated.len());
    generated
}

/// Copies repo attributes, eliding platform defaults.
fn declared_from(repo: &RemoteRepo) -> DeclaredRepo {
    let elide = |value: &str, default: &str| {
        if defaults::same_attribute(value, default) {
            String::new()
        } else {
            value.to_string()
        }
    };
    DeclaredRepo {
        name: repo.key.clone(),
        description: repo.description.clone(),
        access_class: elide(&repo.access_class, defaults::ACCESS_CLASS),
        package_type: elide(&repo.package_type, defaults::PACKAGE_TYPE),
        layout: elide(&repo.layout_ref, defaults::LAYOUT),
        ..DeclaredRepo::default()
    }
}

/// The targets whose principals are copied into the repo's lists.
fn sources<'p>(
    repo: &RemoteRepo,
    permission_name: &str,
    permissions: &'p [RemotePermission],
    options: GenerateOptions,
) -> Vec<&'p RemotePermission> {
    if options.renamed {
        let name = defaults::or_default(permission_name, &repo.key);
        permissions.iter().filter(|p| p.name == name).collect()
    } else if options.use_all {
        permissions.iter().filter(|p| p.binds(&repo.key)).collect()
    } else {
        permissions.iter().filter(|p| p.name == repo.key).collect()
    }
}

fn add_permissions(record: &mut DeclaredRepo, principals: &ActionMap) {
    for (principal, held) in principals {
        for action in Action::KNOWN.iter().filter(|a| held.contains(*a)) {
            if let Some(list) = record.permission_list_mut(action) {
                if !list.contains(principal) {
                    list.push(principal.clone());
                }
            }
        }
    }
}

fn sort_lists(record: &mut DeclaredRepo) {
    for action in &Action::KNOWN {
        if let Some(list) = record.permission_list_mut(action) {
            list.sort();
        }
    }
}

fn same_except_name(a: &DeclaredRepo, b: &DeclaredRepo) -> bool {
    a.description == b.description
        && a.access_class == b.access_class
        && a.package_type == b.package_type
        && a.layout == b.layout
        && a.permission_name == b.permission_name
        && a.read == b.read
        && a.annotate == b.annotate
        && a.write == b.write
        && a.delete == b.delete
        && a.manage == b.manage
        && a.scan == b.scan
}

/// Checks that the same-named target exists and binds exactly this repo.
fn binds_matching(repo: &str, permissions: &[RemotePermission], report: &mut RunReport) -> bool {
    let Some(permission) = permissions.iter().find(|p| p.name == repo) else {
        return false;
    };
    if let Some(reason) = matching_problem(repo, permission) {
        report.warn(format!(
            "Ignoring repo: '{}'. The permission target named the same as the repo, {}.",
            repo, reason
        ));
        return false;
    }
    true
}

fn matching_problem(repo: &str, permission: &RemotePermission) -> Option<&'static str> {
    if permission.targets.is_empty() {
        Some("isn't connected to any repo")
    } else if permission.targets.len() > 1 {
        Some("is used by multiple repos")
    } else if !permission.binds(repo) {
        Some("isn't connected to the matching repo")
    } else {
        None
    }
}

/// Returns the permission name to record for `repo` in renamed mode:
/// empty when the same-named target matches, else the single target bound
/// exclusively to the repo. `None` filters the repo out.
fn renamed_permission(
    repo: &str,
    permissions: &[RemotePermission],
    report: &mut RunReport,
) -> Option<String> {
    if permissions.iter().any(|p| p.name == repo) {
        return binds_matching(repo, permissions, report).then(String::new);
    }

    let exclusive: Vec<&str> = permissions
        .iter()
        .filter(|p| p.binds_only(repo))
        .map(|p| p.name.as_str())
        .collect();
    match exclusive.as_slice() {
        [] => {
            report.warn(format!(
                "Ignoring repo: '{}'. No non-shared connected permission target.",
                repo
            ));
            None
        }
        [name] => Some(name.to_string()),
        names => {
            report.warn(format!(
                "Ignoring repo: '{}'. Too many permission targets ({}) connected to the repo: {:?}.",
                repo,
                names.len(),
                names
            ));
            None
        }
    }
}

/// Checks that every source target has the default scope for `repo`.
fn is_clean(
    repo: &str,
    permission_name: &str,
    permissions: &[RemotePermission],
    options: GenerateOptions,
    report: &mut RunReport,
) -> bool {
    let name = defaults::or_default(permission_name, repo);
    let sources = permissions.iter().filter(|p| {
        if options.renamed {
            p.name == name
        } else if options.use_all {
            p.binds(repo)
        } else {
            p.name == repo
        }
    });
    for permission in sources {
        let clean = permission
            .targets
            .get(repo)
            .is_some_and(|scope| scope.is_default());
        if !clean {
            let scope = permission.targets.get(repo).cloned().unwrap_or_default();
            report.warn(format!(
                "'{}': Ignoring repo due to its permission target having non-default include/exclude patterns: permission target: '{}', include: {:?}, exclude: {:?}",
                repo, permission.name, scope.include, scope.exclude
            ));
            return false;
        }
    }
    true
}

/// Renders every record into one document.
pub fn render_combined(records: &[DeclaredRepo], format: Format) -> Result<String> {
    codec::encode(records, format)
}

/// Renders one record as a split-mode document, without its name (the file
/// name carries it).
pub fn render_split(record: &DeclaredRepo, format: Format) -> Result<String> {
    let mut unnamed = record.clone();
    unnamed.name.clear();
    let text = codec::encode(&unnamed, format)?;
    if format == Format::Yaml && text.trim() == "{}" {
        return Ok(String::new());
    }
    Ok(text)
}

/// Writes one `<name>.<ext>` document per record into `folder`, creating it
/// when missing.
pub fn write_split(records: &[DeclaredRepo], folder: &Path, format: Format) -> Result<()> {
    if !folder.exists() {
        log::info!("Creating folder: '{}'", folder.display());
        fs::create_dir_all(folder)?;
    }
    for record in records {
        let name = record.display_name();
        let path = folder.join(format!("{}.{}", name, format.extension()));
        log::info!("Saving repo '{}' to file '{}'", name, path.display());
        fs::write(&path, render_split(record, format)?)?;
    }
    Ok(())
}

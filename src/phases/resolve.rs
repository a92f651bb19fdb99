//! Stage 4: Resolve principals
//!
//! Every principal named in a permission list must exist on the platform as
//! exactly one of a user or a group. When directory integration is enabled,
//! unknown principals are first looked up as directory groups and imported,
//! then created as local users. Successful imports and creations are added
//! to the known identities at once, so later repos see them as existing.
//!
//! A repo that still references an unknown or ambiguous principal is removed
//! from the plan before anything is written for it.

use crate::directory::{self, DirectoryServer, DirectoryService, GroupImportSettings};
use crate::error::{Error, Result};
use crate::ldap_config::LdapConfig;
use crate::model::{DeclaredRepo, Identities, Identity, Lookup};
use crate::platform::{PlatformWriter, SessionTokens, UserRequest};
use crate::report::{PlannedAction, RunReport};

/// Which fallbacks to attempt for an unknown principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub import_groups: bool,
    pub create_users: bool,
    pub dry_run: bool,
}

impl ResolveOptions {
    pub fn enabled(&self) -> bool {
        self.import_groups || self.create_users
    }
}

/// Directory access for the resolver.
pub struct DirectoryAccess<'a> {
    pub service: &'a dyn DirectoryService,
    pub config: &'a LdapConfig,
    pub servers: &'a [DirectoryServer],
    pub group_settings: &'a [GroupImportSettings],
}

/// Creates users and imports groups for principals that do not exist yet.
pub struct Resolver<'a> {
    writer: &'a dyn PlatformWriter,
    directory: Option<DirectoryAccess<'a>>,
    options: ResolveOptions,
    session: Option<SessionTokens>,
}

impl<'a> Resolver<'a> {
    pub fn new(writer: &'a dyn PlatformWriter, options: ResolveOptions) -> Self {
        Self {
            writer,
            directory: None,
            options,
            session: None,
        }
    }

    pub fn with_directory(mut self, directory: DirectoryAccess<'a>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Attempts to bring every unknown principal into existence, in order of
    /// first appearance across `records`.
    pub fn resolve_all(
        &mut self,
        records: &[DeclaredRepo],
        identities: &mut Identities,
        report: &mut RunReport,
    ) {
        if !self.options.enabled() {
            return;
        }

        let mut seen = std::collections::HashSet::new();
        let principals: Vec<&str> = records
            .iter()
            .flat_map(|r| r.principals())
            .filter(|p| seen.insert(*p))
            .collect();

        for principal in principals {
            if identities.lookup(principal) != Lookup::Unknown {
                continue;
            }
            if let Some(identity) = self.resolve(principal, report) {
                identities.add(identity);
            }
        }
    }

    fn resolve(&mut self, principal: &str, report: &mut RunReport) -> Option<Identity> {
        let mut failures = Vec::new();

        if self.options.import_groups {
            log::info!("Importing group: '{}'", principal);
            match self.import_group(principal) {
                Ok(true) => {
                    report.record(PlannedAction::ImportGroup(principal.to_string()));
                    return Some(Identity::GroupName(principal.to_string()));
                }
                Ok(false) => log::info!("Didn't find group: '{}'", principal),
                Err(e) => failures.push(e.to_string()),
            }
        }

        if self.options.create_users {
            log::info!("Creating user: '{}'", principal);
            match self.create_user(principal) {
                Ok(()) => {
                    report.record(PlannedAction::CreateUser(principal.to_string()));
                    return Some(Identity::Username(principal.to_string()));
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if !failures.is_empty() {
            report.warn(format!(
                "Warning: cannot resolve '{}': {}",
                principal,
                failures.join("; ")
            ));
        }
        None
    }

    /// Returns `Ok(false)` when the directory has no such group.
    fn import_group(&mut self, group: &str) -> Result<bool> {
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| Error::precondition("group import requires directory settings"))?;

        let found = directory::find_group(
            directory.service,
            directory.servers,
            directory.group_settings,
            &directory.config.group_settings_name,
            group,
            &directory.config.bind(),
        )?;
        let Some(import) = found else {
            return Ok(false);
        };

        if self.options.dry_run {
            let dns: Vec<&str> = import.import_groups.iter().map(|g| g.group_dn.as_str()).collect();
            log::info!("Would import group '{}' ({})", group, dns.join(", "));
            return Ok(true);
        }

        if self.session.is_none() {
            let session = self.writer.ui_login(
                &directory.config.platform_username,
                &directory.config.platform_password,
            )?;
            self.session = Some(session);
        }
        if let Some(session) = &self.session {
            self.writer.import_group(session, &import)?;
        }
        log::info!("Imported group '{}'", group);
        Ok(true)
    }

    fn create_user(&self, user: &str) -> Result<()> {
        let email = match &self.directory {
            Some(directory) if !directory.servers.is_empty() => {
                directory::find_email(
                    directory.service,
                    directory.servers,
                    user,
                    &directory.config.bind(),
                )?
                .unwrap_or_else(|| directory.config.derived_email(user))
            }
            Some(directory) => directory.config.derived_email(user),
            None => LdapConfig::default().derived_email(user),
        };

        if self.options.dry_run {
            log::info!("Would create user '{}' ({})", user, email);
            return Ok(());
        }
        self.writer.create_user(&UserRequest::external(user, email))?;
        log::info!("'{}': Created user successfully.", user);
        Ok(())
    }
}

/// Resolves what can be resolved, then removes every repo that still
/// references an unknown or ambiguous principal.
pub fn execute(
    records: Vec<DeclaredRepo>,
    identities: &mut Identities,
    resolver: &mut Resolver<'_>,
    report: &mut RunReport,
) -> Vec<DeclaredRepo> {
    resolver.resolve_all(&records, identities, report);
    drop_unresolved(records, identities, report)
}

/// Removes repos referencing principals that are not exactly one of a user
/// or a group.
pub fn drop_unresolved(
    records: Vec<DeclaredRepo>,
    identities: &Identities,
    report: &mut RunReport,
) -> Vec<DeclaredRepo> {
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let mut problems = Vec::new();
        for (action, principals) in record.permission_lists() {
            for principal in principals {
                match identities.lookup(principal) {
                    Lookup::User | Lookup::Group => {}
                    Lookup::Ambiguous => problems.push(format!(
                        "'{}': Permission {}: both user and group exists with the name: '{}'",
                        record.name,
                        action.as_str().to_ascii_lowercase(),
                        principal
                    )),
                    Lookup::Unknown => problems.push(format!(
                        "'{}': Permission {}: no user or group exists with the name: '{}'",
                        record.name,
                        action.as_str().to_ascii_lowercase(),
                        principal
                    )),
                }
            }
        }

        if problems.is_empty() {
            kept.push(record);
            continue;
        }
        for problem in problems {
            report.warn(problem);
        }
        report.warn(format!(
            "'{}': Warning: Ignoring repo: unresolved principals ({})",
            record.name, record.provenance
        ));
        report.unresolved_repos += 1;
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::mock::{entry, group_settings, server, MockDirectory};
    use crate::directory::GroupImport;
    use crate::platform::{PermissionRequest, RepoRequest};
    use std::sync::{Arc, Mutex};

    /// Writer that only records identity writes.
    #[derive(Default)]
    struct MockWriter {
        calls: Arc<Mutex<Vec<String>>>,
        fail_users: bool,
    }

    impl MockWriter {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PlatformWriter for MockWriter {
        fn create_repository(&self, _: &RepoRequest) -> Result<()> {
            unreachable!()
        }
        fn update_repository(&self, _: &RepoRequest) -> Result<()> {
            unreachable!()
        }
        fn create_permission(&self, _: &PermissionRequest) -> Result<()> {
            unreachable!()
        }
        fn update_permission(&self, _: &PermissionRequest) -> Result<()> {
            unreachable!()
        }
        fn create_user(&self, user: &UserRequest) -> Result<()> {
            if self.fail_users {
                return Err(Error::Http {
                    method: "POST".to_string(),
                    url: "/access/api/v2/users".to_string(),
                    status: 400,
                    body: "bad".to_string(),
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("user {} {}", user.username, user.email));
            Ok(())
        }
        fn ui_login(&self, username: &str, _: &str) -> Result<SessionTokens> {
            self.calls.lock().unwrap().push(format!("login {}", username));
            Ok(SessionTokens {
                access: "a".to_string(),
                refresh: "r".to_string(),
            })
        }
        fn import_group(&self, _: &SessionTokens, import: &GroupImport) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("import {}", import.import_groups[0].group_name));
            Ok(())
        }
    }

    fn repo(name: &str, read: &[&str]) -> DeclaredRepo {
        DeclaredRepo {
            name: name.to_string(),
            read: read.iter().map(|s| s.to_string()).collect(),
            ..DeclaredRepo::default()
        }
    }

    fn identities() -> Identities {
        Identities::new(vec!["alice".to_string()], vec!["devs".to_string()])
    }

    #[test]
    fn test_unknown_principal_without_integration_drops_repo() {
        let writer = MockWriter::default();
        let mut resolver = Resolver::new(&writer, ResolveOptions::default());
        let mut report = RunReport::new();
        let mut ids = identities();

        let kept = execute(
            vec![repo("lib", &["alice"]), repo("app", &["carol"])],
            &mut ids,
            &mut resolver,
            &mut report,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "lib");
        assert_eq!(report.unresolved_repos, 1);
        assert!(writer.calls().is_empty());
        assert!(report.warnings[0].contains("no user or group exists with the name: 'carol'"));
    }

    #[test]
    fn test_ambiguous_principal_drops_repo() {
        let writer = MockWriter::default();
        let options = ResolveOptions {
            create_users: true,
            ..ResolveOptions::default()
        };
        let mut resolver = Resolver::new(&writer, options);
        let mut report = RunReport::new();
        let mut ids = Identities::new(vec!["both".to_string()], vec!["both".to_string()]);

        let kept = execute(vec![repo("lib", &["both"])], &mut ids, &mut resolver, &mut report);
        assert!(kept.is_empty());
        assert_eq!(report.unresolved_repos, 1);
        assert!(writer.calls().is_empty());
    }

    #[test]
    fn test_user_created_once_and_visible_to_later_repos() {
        let writer = MockWriter::default();
        let options = ResolveOptions {
            create_users: true,
            ..ResolveOptions::default()
        };
        let mut resolver = Resolver::new(&writer, options);
        let mut report = RunReport::new();
        let mut ids = identities();

        let kept = execute(
            vec![repo("a", &["carol"]), repo("b", &["carol", "alice"])],
            &mut ids,
            &mut resolver,
            &mut report,
        );

        assert_eq!(kept.len(), 2);
        assert_eq!(writer.calls(), vec!["user carol carol@example.com"]);
        assert_eq!(report.created_users, 1);
        assert_eq!(ids.lookup("carol"), Lookup::User);
    }

    #[test]
    fn test_group_import_preferred_over_user_creation() {
        let writer = MockWriter::default();
        let directory = MockDirectory::default().with(
            "(cn=ops)",
            vec![entry("cn=ops,ou=groups,dc=example,dc=com", &[])],
        );
        let config = LdapConfig {
            platform_username: "admin".to_string(),
            ..LdapConfig::default()
        };
        let servers = [server()];
        let settings = [group_settings("groups")];
        let options = ResolveOptions {
            import_groups: true,
            create_users: true,
            dry_run: false,
        };
        let mut resolver = Resolver::new(&writer, options).with_directory(DirectoryAccess {
            service: &directory,
            config: &config,
            servers: &servers,
            group_settings: &settings,
        });
        let mut report = RunReport::new();
        let mut ids = identities();

        let kept = execute(
            vec![repo("a", &["ops", "dave"])],
            &mut ids,
            &mut resolver,
            &mut report,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(
            writer.calls(),
            vec!["login admin", "import ops", "user dave dave@example.com"]
        );
        assert_eq!(report.imported_groups, 1);
        assert_eq!(report.created_users, 1);
        assert_eq!(ids.lookup("ops"), Lookup::Group);
    }

    #[test]
    fn test_user_email_from_directory() {
        let writer = MockWriter::default();
        let directory = MockDirectory::default().with(
            "(sAMAccountName=erin)",
            vec![entry("cn=erin", &[("mail", "erin@corp.example.com")])],
        );
        let config = LdapConfig::default();
        let servers = [server()];
        let options = ResolveOptions {
            create_users: true,
            ..ResolveOptions::default()
        };
        let mut resolver = Resolver::new(&writer, options).with_directory(DirectoryAccess {
            service: &directory,
            config: &config,
            servers: &servers,
            group_settings: &[],
        });
        let mut report = RunReport::new();
        let mut ids = identities();

        execute(vec![repo("a", &["erin"])], &mut ids, &mut resolver, &mut report);
        assert_eq!(writer.calls(), vec!["user erin erin@corp.example.com"]);
    }

    #[test]
    fn test_dry_run_counts_without_writing() {
        let writer = MockWriter::default();
        let options = ResolveOptions {
            create_users: true,
            dry_run: true,
            ..ResolveOptions::default()
        };
        let mut resolver = Resolver::new(&writer, options);
        let mut report = RunReport::new();
        let mut ids = identities();

        let kept = execute(vec![repo("a", &["carol"])], &mut ids, &mut resolver, &mut report);
        assert_eq!(kept.len(), 1);
        assert_eq!(report.created_users, 1);
        assert!(writer.calls().is_empty());
    }

    #[test]
    fn test_failed_creation_drops_repo() {
        let writer = MockWriter {
            fail_users: true,
            ..MockWriter::default()
        };
        let options = ResolveOptions {
            create_users: true,
            ..ResolveOptions::default()
        };
        let mut resolver = Resolver::new(&writer, options);
        let mut report = RunReport::new();
        let mut ids = identities();

        let kept = execute(vec![repo("a", &["carol"])], &mut ids, &mut resolver, &mut report);
        assert!(kept.is_empty());
        assert_eq!(report.created_users, 0);
        assert_eq!(report.unresolved_repos, 1);
        assert!(report.warnings[0].contains("cannot resolve 'carol'"));
    }
}

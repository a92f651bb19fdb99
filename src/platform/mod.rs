//! # Platform Access
//!
//! The artifact platform is reached through two capability traits:
//!
//! - **`PlatformReader`**: fetch-all queries for repositories, permission
//!   targets, users, groups and the directory settings. Pagination is the
//!   implementation's concern; callers always receive complete lists.
//! - **`PlatformWriter`**: the writes the reconciliation engine plans.
//!
//! `http::HttpPlatform` implements both against the platform's REST API.
//! The engine only sees the traits, so tests run it against an in-memory
//! platform instead.
//!
//! `RemoteState` is the snapshot fetched once at the start of a run. A
//! failure while fetching it aborts the run; nothing later does.

pub mod http;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::directory::{DirectoryServer, GroupImport, GroupImportSettings};
use crate::error::Result;
use crate::model::{ActionMap, RemotePermission, RemoteRepo, Scope};

/// Read side of the platform.
pub trait PlatformReader: Send + Sync {
    fn fetch_repositories(&self) -> Result<Vec<RemoteRepo>>;
    fn fetch_permissions(&self) -> Result<Vec<RemotePermission>>;
    fn fetch_users(&self) -> Result<Vec<String>>;
    fn fetch_groups(&self) -> Result<Vec<String>>;
    fn fetch_directory_servers(&self) -> Result<Vec<DirectoryServer>>;
    fn fetch_group_import_settings(&self) -> Result<Vec<GroupImportSettings>>;
}

/// Write side of the platform.
pub trait PlatformWriter: Send + Sync {
    fn create_repository(&self, repo: &RepoRequest) -> Result<()>;
    fn update_repository(&self, repo: &RepoRequest) -> Result<()>;
    fn create_permission(&self, permission: &PermissionRequest) -> Result<()>;
    fn update_permission(&self, permission: &PermissionRequest) -> Result<()>;
    fn create_user(&self, user: &UserRequest) -> Result<()>;

    /// Opens a UI session, required by the group-import endpoint.
    fn ui_login(&self, username: &str, password: &str) -> Result<SessionTokens>;

    fn import_group(&self, session: &SessionTokens, import: &GroupImport) -> Result<()>;
}

/// Repository create/update payload. Defaults are already filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoRequest {
    pub key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub rclass: String,
    #[serde(rename = "packageType", skip_serializing_if = "String::is_empty")]
    pub package_type: String,
    #[serde(rename = "repoLayoutRef", skip_serializing_if = "String::is_empty")]
    pub layout_ref: String,
}

impl From<&RepoRequest> for RemoteRepo {
    fn from(request: &RepoRequest) -> Self {
        RemoteRepo {
            key: request.key.clone(),
            description: request.description.clone(),
            access_class: request.rclass.clone(),
            package_type: request.package_type.clone(),
            layout_ref: request.layout_ref.clone(),
        }
    }
}

/// Principal-to-actions maps of a permission target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Actions {
    pub users: ActionMap,
    pub groups: ActionMap,
}

/// The artifact resource of a permission target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactResource {
    pub actions: Actions,
    pub targets: BTreeMap<String, Scope>,
}

/// Permission-target create/update payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionRequest {
    pub name: String,
    pub artifact: ArtifactResource,
}

impl From<&PermissionRequest> for RemotePermission {
    fn from(request: &PermissionRequest) -> Self {
        RemotePermission {
            name: request.name.clone(),
            users: request.artifact.actions.users.clone(),
            groups: request.artifact.actions.groups.clone(),
            targets: request.artifact.targets.clone(),
        }
    }
}

/// User creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRequest {
    pub username: String,
    pub email: String,
    pub internal_password_disabled: bool,
}

impl UserRequest {
    /// A directory-backed user without a local password.
    pub fn external(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            internal_password_disabled: true,
        }
    }
}

/// Opaque UI session credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

/// Everything the engine knows about the platform at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct RemoteState {
    pub repos: Vec<RemoteRepo>,
    pub permissions: Vec<RemotePermission>,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub directory_servers: Vec<DirectoryServer>,
    pub group_import_settings: Vec<GroupImportSettings>,
}

impl RemoteState {
    /// Fetches the snapshot. Directory settings are only requested when
    /// `with_directory` is set, since reading them needs admin rights.
    pub fn fetch(reader: &dyn PlatformReader, with_directory: bool) -> Result<Self> {
        let repos = reader.fetch_repositories()?;
        log::info!("Repo count: {}", repos.len());
        let permissions = reader.fetch_permissions()?;
        log::info!("Permission count: {}", permissions.len());
        let users = reader.fetch_users()?;
        log::info!("User count: {}", users.len());
        let groups = reader.fetch_groups()?;
        log::info!("Group count: {}", groups.len());

        let (directory_servers, group_import_settings) = if with_directory {
            let servers = reader.fetch_directory_servers()?;
            log::info!("LDAP settings count: {}", servers.len());
            let settings = reader.fetch_group_import_settings()?;
            log::info!("LDAP group settings count: {}", settings.len());
            (servers, settings)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Self {
            repos,
            permissions,
            users,
            groups,
            directory_servers,
            group_import_settings,
        })
    }

    pub fn repo(&self, key: &str) -> Option<&RemoteRepo> {
        self.repos.iter().find(|r| r.key == key)
    }

    pub fn permission(&self, name: &str) -> Option<&RemotePermission> {
        self.permissions.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;

    #[test]
    fn test_repo_request_wire_format() {
        let request = RepoRequest {
            key: "lib".to_string(),
            rclass: "local".to_string(),
            package_type: "generic".to_string(),
            layout_ref: "simple-default".to_string(),
            ..RepoRequest::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["key"], "lib");
        assert_eq!(json["rclass"], "local");
        assert_eq!(json["packageType"], "generic");
        assert_eq!(json["repoLayoutRef"], "simple-default");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_artifact_resource_wire_format() {
        let mut users = ActionMap::new();
        users.insert(
            "alice".to_string(),
            [Action::READ, Action::WRITE].into_iter().collect(),
        );
        let mut targets = BTreeMap::new();
        targets.insert("lib".to_string(), crate::defaults::scope());
        let resource = ArtifactResource {
            actions: Actions {
                users,
                groups: ActionMap::new(),
            },
            targets,
        };

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["actions"]["users"]["alice"], serde_json::json!(["READ", "WRITE"]));
        assert_eq!(json["targets"]["lib"]["include_patterns"], serde_json::json!(["**"]));
        assert_eq!(json["targets"]["lib"]["exclude_patterns"], serde_json::json!([]));
    }

    #[test]
    fn test_session_tokens_are_not_printed() {
        let tokens = SessionTokens {
            access: "secret".to_string(),
            refresh: "secret".to_string(),
        };
        assert!(!format!("{:?}", tokens).contains("secret"));
    }

    #[test]
    fn test_user_request_is_external() {
        let json = serde_json::to_value(UserRequest::external("alice", "alice@example.com")).unwrap();
        assert_eq!(json["internal_password_disabled"], true);
    }
}

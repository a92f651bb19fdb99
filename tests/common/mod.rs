//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let platform = FakePlatform::new().with_users(&["alice"]);
//!     let fixture = TestFixture::new().with_file("lib.yaml", docs::LIB_READ_ALICE);
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use artsync::defaults;
use artsync::directory::{DirectoryServer, GroupImport, GroupImportSettings};
use artsync::error::{Error, Result};
use artsync::model::{RemotePermission, RemoteRepo, Scope};
use artsync::platform::{
    PermissionRequest, PlatformReader, PlatformWriter, RepoRequest, SessionTokens, UserRequest,
};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::docs;
    pub use super::{FakePlatform, TestFixture};
}

/// Repo file snippets for testing.
pub mod docs {
    /// One repo readable by one user.
    pub const LIB_READ_ALICE: &str = "name: lib\nread:\n  - alice\n";

    /// Two repos sharing one permission target name.
    pub const SHARED_PERMISSION: &str = r#"
- name: a
  permissionName: shared
- name: b
  permissionName: shared
"#;

    /// A repo referencing a principal nobody knows.
    pub const UNKNOWN_PRINCIPAL: &str = "name: app\nread:\n  - carol\n";

    /// Several repos in one JSON document.
    pub const MIXED_JSON: &str = r#"[
  {"name": "lib", "read": ["alice"], "write": ["devs"]},
  {"names": ["app-a", "app-b"], "description": "apps", "read": ["devs"]}
]"#;
}

#[derive(Debug, Default)]
struct PlatformState {
    repos: Vec<RemoteRepo>,
    permissions: Vec<RemotePermission>,
    users: Vec<String>,
    groups: Vec<String>,
    writes: Vec<String>,
}

/// In-memory platform implementing both capability traits.
///
/// Writes are applied to the stored state, so a second run observes the
/// effects of the first one. Every write is also logged.
#[derive(Debug, Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(self, users: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .extend(users.iter().map(|u| u.to_string()));
        self
    }

    pub fn with_groups(self, groups: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .groups
            .extend(groups.iter().map(|g| g.to_string()));
        self
    }

    pub fn with_repo(self, repo: RemoteRepo) -> Self {
        self.state.lock().unwrap().repos.push(repo);
        self
    }

    pub fn with_permission(self, permission: RemotePermission) -> Self {
        self.state.lock().unwrap().permissions.push(permission);
        self
    }

    /// Every write performed so far, e.g. `create repo lib`.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn repo(&self, key: &str) -> Option<RemoteRepo> {
        self.state
            .lock()
            .unwrap()
            .repos
            .iter()
            .find(|r| r.key == key)
            .cloned()
    }

    pub fn permission(&self, name: &str) -> Option<RemotePermission> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }
}

impl PlatformReader for FakePlatform {
    fn fetch_repositories(&self) -> Result<Vec<RemoteRepo>> {
        Ok(self.state.lock().unwrap().repos.clone())
    }

    fn fetch_permissions(&self) -> Result<Vec<RemotePermission>> {
        Ok(self.state.lock().unwrap().permissions.clone())
    }

    fn fetch_users(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().users.clone())
    }

    fn fetch_groups(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().groups.clone())
    }

    fn fetch_directory_servers(&self) -> Result<Vec<DirectoryServer>> {
        Ok(Vec::new())
    }

    fn fetch_group_import_settings(&self) -> Result<Vec<GroupImportSettings>> {
        Ok(Vec::new())
    }
}

impl PlatformWriter for FakePlatform {
    fn create_repository(&self, repo: &RepoRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create repo {}", repo.key));
        state.repos.push(RemoteRepo::from(repo));
        Ok(())
    }

    fn update_repository(&self, repo: &RepoRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("update repo {}", repo.key));
        let updated = RemoteRepo::from(repo);
        match state.repos.iter_mut().find(|r| r.key == repo.key) {
            Some(existing) => *existing = updated,
            None => return Err(not_found("repo", &repo.key)),
        }
        Ok(())
    }

    fn create_permission(&self, permission: &PermissionRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create permission {}", permission.name));
        state.permissions.push(RemotePermission::from(permission));
        Ok(())
    }

    fn update_permission(&self, permission: &PermissionRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("update permission {}", permission.name));
        let updated = RemotePermission::from(permission);
        match state.permissions.iter_mut().find(|p| p.name == permission.name) {
            Some(existing) => *existing = updated,
            None => return Err(not_found("permission", &permission.name)),
        }
        Ok(())
    }

    fn create_user(&self, user: &UserRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create user {}", user.username));
        state.users.push(user.username.clone());
        Ok(())
    }

    fn ui_login(&self, _username: &str, _password: &str) -> Result<SessionTokens> {
        Ok(SessionTokens {
            access: "access".to_string(),
            refresh: "refresh".to_string(),
        })
    }

    fn import_group(&self, _session: &SessionTokens, import: &GroupImport) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for group in &import.import_groups {
            state.writes.push(format!("import group {}", group.group_name));
            state.groups.push(group.group_name.clone());
        }
        Ok(())
    }
}

fn not_found(kind: &str, name: &str) -> Error {
    Error::Http {
        method: "PUT".to_string(),
        url: format!("/{}/{}", kind, name),
        status: 404,
        body: "not found".to_string(),
    }
}

/// A live repo carrying the platform defaults.
pub fn remote_repo(key: &str) -> RemoteRepo {
    RemoteRepo {
        key: key.to_string(),
        description: String::new(),
        access_class: defaults::ACCESS_CLASS.to_string(),
        package_type: defaults::PACKAGE_TYPE.to_string(),
        layout_ref: defaults::LAYOUT.to_string(),
    }
}

/// A live permission target bound to `repo` with the given scope.
pub fn remote_permission(name: &str, repo: &str, users: &[(&str, &[&str])], scope: Scope) -> RemotePermission {
    RemotePermission {
        name: name.to_string(),
        users: users
            .iter()
            .map(|(user, actions)| {
                (
                    user.to_string(),
                    actions.iter().map(|a| artsync::model::Action::new(*a)).collect(),
                )
            })
            .collect(),
        groups: Default::default(),
        targets: [(repo.to_string(), scope)].into_iter().collect(),
    }
}

/// A temporary directory holding repo files.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of a file inside the fixture.
    pub fn file(&self, path: &str) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    /// Every document in the fixture, sorted.
    pub fn documents(&self) -> Vec<PathBuf> {
        artsync::phases::load::collect_documents(&[self.path().to_path_buf()])
            .expect("Failed to collect documents")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

//! Blocking REST implementation of the platform traits.
//!
//! Every call authenticates with the bearer token, except the two UI
//! endpoints used for group import, which authenticate with the session
//! cookies returned by `ui_login`. Any non-2xx answer becomes
//! `Error::Http` with the status and response body.

use std::collections::BTreeMap;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    ArtifactResource, PermissionRequest, PlatformReader, PlatformWriter, RepoRequest,
    SessionTokens, UserRequest,
};
use crate::directory::{DirectoryServer, GroupImport, GroupImportSettings};
use crate::error::{Error, Result};
use crate::model::{Action, ActionMap, RemotePermission, RemoteRepo, Scope};

const ACCESS_COOKIE: &str = "ACCESSTOKEN";
const REFRESH_COOKIE: &str = "REFRESHTOKEN";
const REQUESTED_WITH: &str = "X-Requested-With";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Platform client over HTTP.
pub struct HttpPlatform {
    client: Client,
    base: Url,
    token: String,
    progress: bool,
}

impl HttpPlatform {
    /// Creates a client for the platform at `base_url`.
    ///
    /// `insecure` disables TLS certificate verification.
    pub fn new(base_url: &str, token: &str, insecure: bool) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))?;
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| transport(base.as_str(), e))?;
        Ok(Self {
            client,
            base,
            token: token.to_string(),
            progress: false,
        })
    }

    /// Shows a progress bar while fetching per-item details.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::precondition(format!("'{}' cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.client
            .request(method, url.clone())
            .bearer_auth(&self.token)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        log::debug!("GET {}", url);
        let response = self
            .request(Method::GET, url)
            .send()
            .map_err(|e| transport(url.as_str(), e))?;
        let response = check(Method::GET, url, response)?;
        response.json().map_err(|e| transport(url.as_str(), e))
    }

    fn send_json<T: Serialize + ?Sized>(&self, method: Method, url: &Url, body: &T) -> Result<()> {
        log::debug!("{} {}", method, url);
        let response = self
            .request(method.clone(), url)
            .json(body)
            .send()
            .map_err(|e| transport(url.as_str(), e))?;
        check(method, url, response)?;
        Ok(())
    }

    /// Follows `cursor` until the platform stops returning one.
    fn paginate<P, T>(&self, segments: &[&str], mut take: impl FnMut(P) -> (Vec<T>, Option<String>)) -> Result<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut url = self.endpoint(segments)?;
            if let Some(cursor) = cursor.as_deref() {
                url.query_pairs_mut().append_pair("cursor", cursor);
            }
            let (items, next) = take(self.get_json(&url)?);
            all.extend(items);
            match next.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    fn progress_bar(&self, len: usize, message: &'static str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(message);
        bar
    }
}

fn transport(url: &str, error: reqwest::Error) -> Error {
    Error::Transport {
        url: url.to_string(),
        message: error.to_string(),
    }
}

fn check(method: Method, url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(Error::Http {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[derive(Deserialize)]
struct RepoSummary {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoDetails {
    key: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    rclass: Option<String>,
    #[serde(default)]
    package_type: Option<String>,
    #[serde(default)]
    repo_layout_ref: Option<String>,
}

impl From<RepoDetails> for RemoteRepo {
    fn from(details: RepoDetails) -> Self {
        RemoteRepo {
            key: details.key,
            description: details.description.unwrap_or_default(),
            access_class: details.rclass.unwrap_or_default(),
            package_type: details.package_type.unwrap_or_default(),
            layout_ref: details.repo_layout_ref.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Deserialize)]
struct PermissionsPage {
    #[serde(default)]
    permissions: Option<Vec<NamedEntry>>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct UserEntry {
    username: String,
}

#[derive(Deserialize)]
struct UsersPage {
    #[serde(default)]
    users: Option<Vec<UserEntry>>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct GroupEntry {
    group_name: String,
}

#[derive(Deserialize)]
struct GroupsPage {
    #[serde(default)]
    groups: Option<Vec<GroupEntry>>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize, Default)]
struct ActionsDetails {
    #[serde(default)]
    users: Option<BTreeMap<String, Vec<Action>>>,
    #[serde(default)]
    groups: Option<BTreeMap<String, Vec<Action>>>,
}

#[derive(Deserialize, Default)]
struct ScopeDetails {
    #[serde(default)]
    include_patterns: Option<Vec<String>>,
    #[serde(default)]
    exclude_patterns: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct ArtifactDetails {
    #[serde(default)]
    actions: Option<ActionsDetails>,
    #[serde(default)]
    targets: Option<BTreeMap<String, Option<ScopeDetails>>>,
}

#[derive(Deserialize, Default)]
struct ResourcesDetails {
    #[serde(default)]
    artifact: Option<ArtifactDetails>,
}

#[derive(Deserialize)]
struct PermissionDetails {
    name: String,
    #[serde(default)]
    resources: Option<ResourcesDetails>,
}

fn to_action_map(map: Option<BTreeMap<String, Vec<Action>>>) -> ActionMap {
    map.unwrap_or_default()
        .into_iter()
        .map(|(principal, actions)| (principal, actions.into_iter().collect()))
        .collect()
}

impl From<PermissionDetails> for RemotePermission {
    fn from(details: PermissionDetails) -> Self {
        let artifact = details
            .resources
            .and_then(|r| r.artifact)
            .unwrap_or_default();
        let actions = artifact.actions.unwrap_or_default();
        let targets = artifact
            .targets
            .unwrap_or_default()
            .into_iter()
            .map(|(repo, scope)| {
                let scope = scope.unwrap_or_default();
                (
                    repo,
                    Scope {
                        include: scope.include_patterns.unwrap_or_default(),
                        exclude: scope.exclude_patterns.unwrap_or_default(),
                    },
                )
            })
            .collect();

        RemotePermission {
            name: details.name,
            users: to_action_map(actions.users),
            groups: to_action_map(actions.groups),
            targets,
        }
    }
}

#[derive(Serialize)]
struct PermissionCreate<'a> {
    name: &'a str,
    resources: PermissionCreateResources<'a>,
}

#[derive(Serialize)]
struct PermissionCreateResources<'a> {
    artifact: &'a ArtifactResource,
}

#[derive(Serialize)]
struct Login<'a> {
    username: &'a str,
    password: &'a str,
}

/// Reads `name=value` out of a `Set-Cookie` header.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let pair = header.split(';').next()?;
    let (key, value) = pair.split_once('=')?;
    (key.trim() == name && !value.trim().is_empty()).then(|| value.trim())
}

impl PlatformReader for HttpPlatform {
    fn fetch_repositories(&self) -> Result<Vec<RemoteRepo>> {
        let url = self.endpoint(&["artifactory", "api", "repositories"])?;
        let summaries: Vec<RepoSummary> = self.get_json(&url)?;

        let bar = self.progress_bar(summaries.len(), "Getting repo details");
        let mut repos = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let url = self.endpoint(&["artifactory", "api", "repositories", &summary.key])?;
            let details: RepoDetails = self.get_json(&url)?;
            repos.push(details.into());
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(repos)
    }

    fn fetch_permissions(&self) -> Result<Vec<RemotePermission>> {
        let names = self.paginate(&["access", "api", "v2", "permissions"], |page: PermissionsPage| {
            (page.permissions.unwrap_or_default(), page.cursor)
        })?;

        let bar = self.progress_bar(names.len(), "Getting permission details");
        let mut permissions = Vec::with_capacity(names.len());
        for entry in names {
            let url = self.endpoint(&["access", "api", "v2", "permissions", &entry.name])?;
            let details: PermissionDetails = self.get_json(&url)?;
            permissions.push(details.into());
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(permissions)
    }

    fn fetch_users(&self) -> Result<Vec<String>> {
        let users = self.paginate(&["access", "api", "v2", "users"], |page: UsersPage| {
            (page.users.unwrap_or_default(), page.cursor)
        })?;
        Ok(users.into_iter().map(|u| u.username).collect())
    }

    fn fetch_groups(&self) -> Result<Vec<String>> {
        let groups = self.paginate(&["access", "api", "v2", "groups"], |page: GroupsPage| {
            (page.groups.unwrap_or_default(), page.cursor)
        })?;
        Ok(groups.into_iter().map(|g| g.group_name).collect())
    }

    fn fetch_directory_servers(&self) -> Result<Vec<DirectoryServer>> {
        let url = self.endpoint(&["access", "api", "v1", "ldap", "settings"])?;
        self.get_json(&url)
    }

    fn fetch_group_import_settings(&self) -> Result<Vec<GroupImportSettings>> {
        let url = self.endpoint(&["access", "api", "v1", "ldap", "groups"])?;
        self.get_json(&url)
    }
}

impl PlatformWriter for HttpPlatform {
    fn create_repository(&self, repo: &RepoRequest) -> Result<()> {
        let url = self.endpoint(&["artifactory", "api", "repositories", &repo.key])?;
        self.send_json(Method::PUT, &url, repo)
    }

    fn update_repository(&self, repo: &RepoRequest) -> Result<()> {
        let url = self.endpoint(&["artifactory", "api", "repositories", &repo.key])?;
        self.send_json(Method::POST, &url, repo)
    }

    fn create_permission(&self, permission: &PermissionRequest) -> Result<()> {
        let url = self.endpoint(&["access", "api", "v2", "permissions"])?;
        let body = PermissionCreate {
            name: &permission.name,
            resources: PermissionCreateResources {
                artifact: &permission.artifact,
            },
        };
        self.send_json(Method::POST, &url, &body)
    }

    fn update_permission(&self, permission: &PermissionRequest) -> Result<()> {
        let url = self.endpoint(&["access", "api", "v2", "permissions", &permission.name, "artifact"])?;
        self.send_json(Method::PUT, &url, &permission.artifact)
    }

    fn create_user(&self, user: &UserRequest) -> Result<()> {
        let url = self.endpoint(&["access", "api", "v2", "users"])?;
        self.send_json(Method::POST, &url, user)
    }

    fn ui_login(&self, username: &str, password: &str) -> Result<SessionTokens> {
        let url = self.endpoint(&["ui", "api", "v1", "access", "auth", "login"])?;
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .header(REQUESTED_WITH, "XMLHttpRequest")
            .json(&Login { username, password })
            .send()
            .map_err(|e| transport(url.as_str(), e))?;
        let response = check(Method::POST, &url, response)?;

        let mut access = None;
        let mut refresh = None;
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            if let Some(value) = cookie_value(header, ACCESS_COOKIE) {
                access = Some(value.to_string());
            }
            if let Some(value) = cookie_value(header, REFRESH_COOKIE) {
                refresh = Some(value.to_string());
            }
        }

        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(SessionTokens { access, refresh }),
            _ => Err(Error::Transport {
                url: url.to_string(),
                message: "unable to obtain UI tokens".to_string(),
            }),
        }
    }

    fn import_group(&self, session: &SessionTokens, import: &GroupImport) -> Result<()> {
        let url = self.endpoint(&["ui", "api", "v1", "access", "api", "ui", "ldap", "groups", "import"])?;
        log::debug!("POST {}", url);
        let cookies = format!(
            "{}={}; {}={}",
            ACCESS_COOKIE, session.access, REFRESH_COOKIE, session.refresh
        );
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(REQUESTED_WITH, "XMLHttpRequest")
            .header(COOKIE, cookies)
            .json(import)
            .send()
            .map_err(|e| transport(url.as_str(), e))?;
        check(Method::POST, &url, response)?;
        Ok(())
    }
}

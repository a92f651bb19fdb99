//! # Data Model
//!
//! The types shared by every stage of the pipeline: what the user declared
//! (`DeclaredRepo`), what the platform currently holds (`RemoteRepo`,
//! `RemotePermission`) and the identities known to exist (`Identities`).
//!
//! Permission actions are an open set. The six actions artsync manages are
//! exposed as constants on `Action`, but any token read from the platform is
//! carried through untouched.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Where a declared record came from. Diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Path of the source document.
    pub source: String,
    /// Byte offset at which the record starts.
    pub offset: usize,
    /// 1-based line at which the record starts.
    pub line: usize,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// A repository as the user intends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRepo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Shorthand for several repos sharing every other field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// local, remote or virtual. Empty means local.
    #[serde(
        default,
        rename = "rclass",
        alias = "accessClass",
        skip_serializing_if = "String::is_empty"
    )]
    pub access_class: String,
    /// Empty means generic.
    #[serde(
        default,
        rename = "packageType",
        skip_serializing_if = "String::is_empty"
    )]
    pub package_type: String,
    /// Empty means the platform default layout.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub layout: String,
    /// Empty means the permission target is named after the repo.
    #[serde(
        default,
        rename = "permissionName",
        skip_serializing_if = "String::is_empty"
    )]
    pub permission_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotate: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manage: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scan: Vec<String>,
    #[serde(skip)]
    pub provenance: Provenance,
}

impl DeclaredRepo {
    /// Creates a record with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The permission target this repo resolves to.
    pub fn effective_permission_name(&self) -> &str {
        if self.permission_name.is_empty() {
            &self.name
        } else {
            &self.permission_name
        }
    }

    /// The six principal lists paired with the action they grant, in the
    /// fixed READ..SCAN order.
    pub fn permission_lists(&self) -> [(Action, &[String]); 6] {
        [
            (Action::READ, self.read.as_slice()),
            (Action::ANNOTATE, self.annotate.as_slice()),
            (Action::WRITE, self.write.as_slice()),
            (Action::DELETE, self.delete.as_slice()),
            (Action::MANAGE, self.manage.as_slice()),
            (Action::SCAN, self.scan.as_slice()),
        ]
    }

    /// Mutable access to the principal list for one of the six known actions.
    pub fn permission_list_mut(&mut self, action: &Action) -> Option<&mut Vec<String>> {
        match action.as_str() {
            "READ" => Some(&mut self.read),
            "ANNOTATE" => Some(&mut self.annotate),
            "WRITE" => Some(&mut self.write),
            "DELETE" => Some(&mut self.delete),
            "MANAGE" => Some(&mut self.manage),
            "SCAN" => Some(&mut self.scan),
            _ => None,
        }
    }

    /// Every principal referenced by this repo, first occurrence first.
    pub fn principals(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.permission_lists()
            .into_iter()
            .flat_map(|(_, list)| list.iter())
            .filter(|p| seen.insert(p.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// `name`, or the first of `names` for a combined record.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.names.first().map(String::as_str).unwrap_or("")
        } else {
            &self.name
        }
    }
}

/// A permission action token such as `READ`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub const READ: Action = Action(Cow::Borrowed("READ"));
    pub const ANNOTATE: Action = Action(Cow::Borrowed("ANNOTATE"));
    pub const WRITE: Action = Action(Cow::Borrowed("WRITE"));
    pub const DELETE: Action = Action(Cow::Borrowed("DELETE"));
    pub const MANAGE: Action = Action(Cow::Borrowed("MANAGE"));
    pub const SCAN: Action = Action(Cow::Borrowed("SCAN"));

    /// The actions artsync manages, in declaration order.
    pub const KNOWN: [Action; 6] = [
        Action::READ,
        Action::ANNOTATE,
        Action::WRITE,
        Action::DELETE,
        Action::MANAGE,
        Action::SCAN,
    ];

    /// Wraps an arbitrary token.
    pub fn new(token: impl Into<String>) -> Self {
        Action(Cow::Owned(token.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the six managed actions.
    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(self)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(token: &str) -> Self {
        Action::new(token)
    }
}

/// Set of actions held by one principal.
pub type ActionSet = BTreeSet<Action>;

/// Principal name to the actions it holds.
pub type ActionMap = BTreeMap<String, ActionSet>;

/// Live repository state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRepo {
    pub key: String,
    pub description: String,
    pub access_class: String,
    pub package_type: String,
    pub layout_ref: String,
}

/// Include/exclude glob patterns restricting a permission target to part of
/// a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, rename = "include_patterns")]
    pub include: Vec<String>,
    #[serde(default, rename = "exclude_patterns")]
    pub exclude: Vec<String>,
}

impl Scope {
    /// `include=["**"]` with no exclude (an exclude of `[""]` counts as none).
    pub fn is_default(&self) -> bool {
        let include_default = self.include.len() == 1 && self.include[0] == "**";
        let exclude_default =
            self.exclude.is_empty() || (self.exclude.len() == 1 && self.exclude[0].is_empty());
        include_default && exclude_default
    }
}

/// Live permission-target state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePermission {
    pub name: String,
    pub users: ActionMap,
    pub groups: ActionMap,
    /// Repository key to the scope within that repository.
    pub targets: BTreeMap<String, Scope>,
}

impl RemotePermission {
    /// Whether this target's scope covers `repo`.
    pub fn binds(&self, repo: &str) -> bool {
        self.targets.contains_key(repo)
    }

    /// Whether this target covers `repo` and nothing else.
    pub fn binds_only(&self, repo: &str) -> bool {
        self.targets.len() == 1 && self.binds(repo)
    }
}

/// A resolved principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Username(String),
    GroupName(String),
}

/// How a principal name resolves against the known identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    User,
    Group,
    /// A user and a group share the name.
    Ambiguous,
    Unknown,
}

/// The users and groups known to exist on the platform.
///
/// Append-only: entries are added after a successful user creation or group
/// import so later repos in the same run see them as resolved.
#[derive(Debug, Clone, Default)]
pub struct Identities {
    users: HashSet<String>,
    groups: HashSet<String>,
}

impl Identities {
    pub fn new<U, G>(users: U, groups: G) -> Self
    where
        U: IntoIterator<Item = String>,
        G: IntoIterator<Item = String>,
    {
        Self {
            users: users.into_iter().collect(),
            groups: groups.into_iter().collect(),
        }
    }

    pub fn lookup(&self, principal: &str) -> Lookup {
        match (
            self.users.contains(principal),
            self.groups.contains(principal),
        ) {
            (true, true) => Lookup::Ambiguous,
            (true, false) => Lookup::User,
            (false, true) => Lookup::Group,
            (false, false) => Lookup::Unknown,
        }
    }

    pub fn is_user(&self, principal: &str) -> bool {
        self.users.contains(principal)
    }

    pub fn add(&mut self, identity: Identity) {
        match identity {
            Identity::Username(name) => self.users.insert(name),
            Identity::GroupName(name) => self.groups.insert(name),
        };
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

//! # Directory Integration
//!
//! Lookups against the directory service (LDAP) that back group import and
//! user creation.
//!
//! The platform owns the directory configuration: each `DirectoryServer`
//! describes one LDAP connection plus its user search, and each
//! `GroupImportSettings` describes how groups are found on one of those
//! servers. artsync only reads these definitions, builds the search from
//! them, and queries the server through a `DirectoryService`.
//!
//! ## Design
//!
//! `DirectoryService` is the seam: `LdapDirectory` talks to a real server
//! with `ldap3`, while tests substitute a mock returning canned entries. The
//! search-building helpers are plain functions so they can be tested
//! without a server.

use std::collections::HashMap;

use ldap3::{LdapConn, Scope, SearchEntry};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Attribute read as a fallback when a server's email attribute is empty.
pub const PRINCIPAL_NAME_ATTRIBUTE: &str = "userPrincipalName";

/// Marker the platform expects for a group that does not exist yet.
pub const REQUIRED_UPDATE_NEW: &str = "DOES_NOT_EXIST";

/// User search part of a directory server definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSearch {
    #[serde(default)]
    pub search_filter: String,
    /// One or more base DNs separated by `|`.
    #[serde(default)]
    pub search_base: String,
    #[serde(default)]
    pub search_sub_tree: bool,
    #[serde(default)]
    pub manager_dn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manager_password: String,
}

/// A directory server definition as configured on the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryServer {
    pub key: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ldap_url: String,
    #[serde(default)]
    pub search: UserSearch,
    #[serde(default)]
    pub auto_create_user: bool,
    #[serde(default)]
    pub email_attribute: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A group-import definition as configured on the platform.
///
/// The whole definition is echoed back to the platform on import, so fields
/// artsync does not use are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupImportSettings {
    pub name: String,
    /// Key of the `DirectoryServer` this definition searches.
    #[serde(default)]
    pub enabled_ldap: String,
    #[serde(default)]
    pub group_base_dn: String,
    #[serde(default)]
    pub group_name_attribute: String,
    #[serde(default)]
    pub group_member_attribute: String,
    #[serde(default)]
    pub sub_tree: bool,
    #[serde(default)]
    pub force_attribute_search: bool,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub description_attribute: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Credentials used to bind to the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bind {
    pub dn: String,
    pub password: String,
}

/// One search result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First non-empty value of `attr`.
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.attrs
            .get(attr)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// A group found in the directory, ready to be imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedGroup {
    pub group_name: String,
    pub description: String,
    pub group_dn: String,
    pub required_update: String,
}

/// Payload of a group import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupImport {
    pub import_groups: Vec<ImportedGroup>,
    pub ldap_group_settings: GroupImportSettings,
}

/// Directory queries the reconciliation engine relies on.
pub trait DirectoryService: Send + Sync {
    /// Runs a subtree search and returns every matching entry.
    fn search(
        &self,
        server_url: &str,
        base_dn: &str,
        filter: &str,
        attrs: &[&str],
        bind: &Bind,
    ) -> Result<Vec<DirectoryEntry>>;
}

/// `DirectoryService` backed by a live LDAP server.
#[derive(Debug, Default)]
pub struct LdapDirectory;

impl DirectoryService for LdapDirectory {
    fn search(
        &self,
        server_url: &str,
        base_dn: &str,
        filter: &str,
        attrs: &[&str],
        bind: &Bind,
    ) -> Result<Vec<DirectoryEntry>> {
        log::debug!(
            "server: '{}', baseDN: '{}', filter: '{}', bindDN: '{}'",
            server_url,
            base_dn,
            filter,
            bind.dn
        );

        let mut conn = LdapConn::new(server_url)
            .map_err(|e| Error::directory(format!("failed to connect to '{}': {}", server_url, e)))?;

        if !bind.dn.is_empty() {
            conn.simple_bind(&bind.dn, &bind.password)
                .and_then(|result| result.success())
                .map_err(|e| Error::directory(format!("bind failed for '{}': {}", bind.dn, e)))?;
        }

        let (entries, _) = conn
            .search(base_dn, Scope::Subtree, filter, attrs.to_vec())
            .and_then(|result| result.success())
            .map_err(|e| Error::directory(format!("search failed: {}", e)))?;

        if let Err(e) = conn.unbind() {
            log::debug!("unbind from '{}' failed: {}", server_url, e);
        }

        let entries: Vec<DirectoryEntry> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attrs: entry.attrs,
            })
            .collect();

        log::debug!("Got {} entries", entries.len());
        Ok(entries)
    }
}

/// The base DN carried in the path of an LDAP URL
/// (`ldap://host:389/dc=example,dc=com` gives `dc=example,dc=com`).
pub fn url_base_dn(ldap_url: &str) -> Option<&str> {
    let mut parts = ldap_url.splitn(4, '/');
    let suffix = parts.nth(3)?;
    (!suffix.is_empty()).then_some(suffix)
}

/// Joins a relative base DN with the one carried by the server URL.
pub fn join_base_dn(relative: &str, ldap_url: &str) -> String {
    match (relative.is_empty(), url_base_dn(ldap_url)) {
        (false, Some(suffix)) => format!("{},{}", relative, suffix),
        (true, Some(suffix)) => suffix.to_string(),
        (_, None) => relative.to_string(),
    }
}

/// Filter matching one group by name, combined with the definition's own
/// filter when it has one.
pub fn group_filter(settings: &GroupImportSettings, group: &str) -> String {
    let term = format!(
        "({}={})",
        settings.group_name_attribute,
        ldap3::ldap_escape(group)
    );
    if settings.filter.is_empty() {
        term
    } else {
        format!("(&{}{})", settings.filter, term)
    }
}

/// The server's user search filter with `{0}` replaced by the user name.
pub fn user_filter(search_filter: &str, user: &str) -> String {
    search_filter.replace("{0}", &ldap3::ldap_escape(user))
}

/// Finds the group-import definitions to try, in order.
///
/// A non-empty `selector` picks the definition with that name; an empty one
/// tries every definition.
pub fn select_group_settings<'a>(
    settings: &'a [GroupImportSettings],
    selector: &str,
) -> Result<Vec<&'a GroupImportSettings>> {
    if settings.is_empty() {
        return Err(Error::directory("missing LDAP group settings"));
    }
    if selector.is_empty() {
        return Ok(settings.iter().collect());
    }
    settings
        .iter()
        .find(|s| s.name == selector)
        .map(|s| vec![s])
        .ok_or_else(|| Error::directory(format!("LDAP group settings named '{}' not found", selector)))
}

/// Looks a group up in the directory.
///
/// Returns `Ok(None)` when no definition finds it, and an error when a
/// definition finds more than one entry or refers to an unknown server.
pub fn find_group(
    service: &dyn DirectoryService,
    servers: &[DirectoryServer],
    settings: &[GroupImportSettings],
    selector: &str,
    group: &str,
    bind: &Bind,
) -> Result<Option<GroupImport>> {
    if servers.is_empty() {
        return Err(Error::directory("missing LDAP settings"));
    }

    for definition in select_group_settings(settings, selector)? {
        log::debug!(
            "Looking up group '{}' with group settings '{}'",
            group,
            definition.name
        );
        let server = servers
            .iter()
            .find(|s| s.key == definition.enabled_ldap)
            .ok_or_else(|| {
                Error::directory(format!(
                    "LDAP settings named '{}' not found",
                    definition.enabled_ldap
                ))
            })?;

        let base_dn = join_base_dn(&definition.group_base_dn, &server.ldap_url);
        let filter = group_filter(definition, group);
        let entries = service.search(
            &server.ldap_url,
            &base_dn,
            &filter,
            &[definition.description_attribute.as_str()],
            bind,
        )?;

        match entries.as_slice() {
            [] => continue,
            [entry] => {
                let description = entry
                    .first(&definition.description_attribute)
                    .unwrap_or_default()
                    .to_string();
                return Ok(Some(GroupImport {
                    import_groups: vec![ImportedGroup {
                        group_name: group.to_string(),
                        description,
                        group_dn: entry.dn.clone(),
                        required_update: REQUIRED_UPDATE_NEW.to_string(),
                    }],
                    ldap_group_settings: definition.clone(),
                }));
            }
            _ => {
                return Err(Error::directory(format!(
                    "multiple DNs found for group: '{}'",
                    group
                )))
            }
        }
    }

    Ok(None)
}

/// Looks up the email address of a user in the directory.
///
/// Every server is searched with each of its `|`-separated search bases in
/// turn. Returns `Ok(None)` when the user is not found or the entry carries
/// no address.
pub fn find_email(
    service: &dyn DirectoryService,
    servers: &[DirectoryServer],
    user: &str,
    bind: &Bind,
) -> Result<Option<String>> {
    for server in servers {
        let filter = user_filter(&server.search.search_filter, user);
        for base in server.search.search_base.split('|') {
            let base_dn = join_base_dn(base, &server.ldap_url);
            let entries = service.search(
                &server.ldap_url,
                &base_dn,
                &filter,
                &[server.email_attribute.as_str(), PRINCIPAL_NAME_ATTRIBUTE],
                bind,
            )?;
            log::debug!("{}: {}: {}", server.key, base, entries.len());

            match entries.as_slice() {
                [] => continue,
                [entry] => {
                    let email = entry
                        .first(&server.email_attribute)
                        .or_else(|| entry.first(PRINCIPAL_NAME_ATTRIBUTE))
                        .map(str::to_string);
                    return Ok(email);
                }
                _ => {
                    return Err(Error::directory(format!(
                        "multiple DNs found for user: '{}' in base dn: '{}'",
                        user, base_dn
                    )))
                }
            }
        }
    }
    Ok(None)
}

//! # LDAP Configuration
//!
//! Credentials needed when artsync creates users or imports groups: the
//! bind identity for directory searches, the platform UI login used by the
//! group-import endpoint, and the name of the group-import definition to use.
//!
//! The values come from a JSON file (`ldap.config` by default). Each value
//! can be overridden from the environment; when all five credentials are
//! present in the environment the file is not read at all:
//!
//! | Key | Environment |
//! |---|---|
//! | `ldapUsername` | `ARTSYNC_LDAP_USERNAME` |
//! | `ldapPassword` | `ARTSYNC_LDAP_PASSWORD` |
//! | `groupSettingsName` | `ARTSYNC_GROUPSETTINGSNAME` |
//! | `platformUsername` | `ARTSYNC_ARTIFACTORY_USERNAME` |
//! | `platformPassword` | `ARTSYNC_ARTIFACTORY_PASSWORD` |
//! | `emailDomain` | `ARTSYNC_EMAIL_DOMAIN` |

use std::path::Path;

use serde::Deserialize;

use crate::defaults;
use crate::directory::Bind;
use crate::error::{Error, Result};

pub const ENV_LDAP_USERNAME: &str = "ARTSYNC_LDAP_USERNAME";
pub const ENV_LDAP_PASSWORD: &str = "ARTSYNC_LDAP_PASSWORD";
pub const ENV_GROUP_SETTINGS_NAME: &str = "ARTSYNC_GROUPSETTINGSNAME";
pub const ENV_PLATFORM_USERNAME: &str = "ARTSYNC_ARTIFACTORY_USERNAME";
pub const ENV_PLATFORM_PASSWORD: &str = "ARTSYNC_ARTIFACTORY_PASSWORD";
pub const ENV_EMAIL_DOMAIN: &str = "ARTSYNC_EMAIL_DOMAIN";

/// Directory and UI credentials.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfig {
    #[serde(default)]
    pub ldap_username: String,
    #[serde(default)]
    pub ldap_password: String,
    /// Group-import definition to use; empty tries all of them.
    #[serde(default)]
    pub group_settings_name: String,
    #[serde(default)]
    pub platform_username: String,
    #[serde(default)]
    pub platform_password: String,
    #[serde(default)]
    pub email_domain: String,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("ldap_username", &self.ldap_username)
            .field("group_settings_name", &self.group_settings_name)
            .field("platform_username", &self.platform_username)
            .field("email_domain", &self.email_domain)
            .finish_non_exhaustive()
    }
}

impl LdapConfig {
    /// Bind credentials for directory searches.
    pub fn bind(&self) -> Bind {
        Bind {
            dn: self.ldap_username.clone(),
            password: self.ldap_password.clone(),
        }
    }

    /// Domain used when deriving an email address.
    pub fn email_domain(&self) -> &str {
        defaults::or_default(&self.email_domain, defaults::EMAIL_DOMAIN)
    }

    /// Email for a created user that the directory had no address for.
    pub fn derived_email(&self, username: &str) -> String {
        if username.contains('@') {
            username.to_string()
        } else {
            format!("{}@{}", username, self.email_domain())
        }
    }
}

/// Parses the JSON config file contents.
pub fn parse(text: &str) -> Result<LdapConfig> {
    serde_json::from_str(text).map_err(|e| Error::ConfigParse {
        message: format!("invalid LDAP config: {}", e),
        hint: Some("The file must be a JSON object with ldapUsername, ldapPassword, groupSettingsName, platformUsername and platformPassword".to_string()),
    })
}

/// Loads the config, applying environment overrides through `env`.
///
/// `env` is injected so callers decide where variables come from; the CLI
/// passes `std::env::var`.
pub fn load<F>(path: &Path, env: F) -> Result<LdapConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let overrides = [
        env(ENV_LDAP_USERNAME),
        env(ENV_LDAP_PASSWORD),
        env(ENV_GROUP_SETTINGS_NAME),
        env(ENV_PLATFORM_USERNAME),
        env(ENV_PLATFORM_PASSWORD),
    ];

    let mut config = if overrides.iter().all(Option::is_some) {
        log::debug!("LDAP config taken from the environment");
        LdapConfig::default()
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
            message: format!("cannot read LDAP config '{}': {}", path.display(), e),
            hint: Some(format!(
                "Create the file or set {}, {}, {}, {} and {}",
                ENV_LDAP_USERNAME,
                ENV_LDAP_PASSWORD,
                ENV_GROUP_SETTINGS_NAME,
                ENV_PLATFORM_USERNAME,
                ENV_PLATFORM_PASSWORD
            )),
        })?;
        parse(&text)?
    };

    let [ldap_username, ldap_password, group_settings_name, platform_username, platform_password] =
        overrides;
    if let Some(value) = ldap_username {
        config.ldap_username = value;
    }
    if let Some(value) = ldap_password {
        config.ldap_password = value;
    }
    if let Some(value) = group_settings_name {
        config.group_settings_name = value;
    }
    if let Some(value) = platform_username {
        config.platform_username = value;
    }
    if let Some(value) = platform_password {
        config.platform_password = value;
    }
    if let Some(value) = env(ENV_EMAIL_DOMAIN) {
        config.email_domain = value;
    }

    Ok(config)
}

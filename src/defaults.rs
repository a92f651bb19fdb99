//! Default values for the artifact platform and for artsync itself.
//!
//! These are the values the platform assumes when a field is left out. The
//! provisioner fills them in right before diffing and the generator elides
//! them, so both directions must agree on this one list.

use crate::model::Scope;

/// Access class assumed when a declared repo leaves `rclass` empty.
pub const ACCESS_CLASS: &str = "local";

/// Package type assumed when a declared repo leaves `packageType` empty.
pub const PACKAGE_TYPE: &str = "generic";

/// Layout assumed when a declared repo leaves `layout` empty.
pub const LAYOUT: &str = "simple-default";

/// Include pattern of an unrestricted permission target.
pub const INCLUDE_PATTERN: &str = "**";

/// LDAP config file read when user creation or group import is enabled.
pub const LDAP_CONFIG_FILE: &str = "ldap.config";

/// Domain used to derive an email address for a created user.
pub const EMAIL_DOMAIN: &str = "example.com";

/// Returns the scope of an unrestricted permission target
/// (`include=["**"]`, `exclude=[]`).
pub fn scope() -> Scope {
    Scope {
        include: vec![INCLUDE_PATTERN.to_string()],
        exclude: Vec::new(),
    }
}

/// Returns `value`, or `default` when `value` is empty.
pub fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

/// Platform attribute comparison is case-insensitive.
pub fn same_attribute(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

//! # Error Handling
//!
//! This module defines the centralized error type for the `artsync` library.
//! It uses the `thiserror` library to create an `Error` enum covering every
//! failure the engine can surface, with enough context (URL, status, path) to
//! make a log line actionable on its own.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Document-level and record-level problems are
//!   normally reported as warnings and never reach this type; it is reserved
//!   for failures of a collaborator call or of a precondition.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Only two situations abort a whole run: a failure while fetching the initial
//! remote snapshot, and a precondition violation detected before any
//! repository is processed. Everything else is localized to one repository.

use thiserror::Error;

/// Main error type for artsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A declared-configuration document or the LDAP config file could not be
    /// parsed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A declared-configuration document was unusable as a whole.
    #[error("Invalid repo file '{path}': {message}")]
    Document { path: String, message: String },

    /// The platform answered with an unexpected status code.
    #[error("HTTP {method} {url} failed with status {status}: {body}")]
    Http {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The platform could not be reached, or its answer could not be read.
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A directory-service lookup or import failed.
    #[error("Directory error: {message}")]
    Directory { message: String },

    /// A precondition for the run does not hold (conflicting flags, missing
    /// directory settings, ...).
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Shorthand for a `Directory` error.
    pub fn directory(message: impl Into<String>) -> Self {
        Error::Directory {
            message: message.into(),
        }
    }

    /// Shorthand for a `Precondition` error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition {
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

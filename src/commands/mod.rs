//! # CLI Command Implementations
//!
//! Each subcommand of `artsync` lives in its own file and exposes:
//! - An `Args` struct deriving `clap::Args`.
//! - An `execute` function that takes the parsed `Args` and calls into the
//!   `artsync` library.
//!
//! Arguments shared by the commands that talk to the platform are defined
//! here.

pub mod check;
pub mod completions;
pub mod generate;
pub mod provision;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use artsync::platform::http::HttpPlatform;
use artsync::suggestions;

/// Platform connection arguments
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Base URL of the platform, e.g. https://artifacts.example.com
    #[arg(long, value_name = "URL", env = "ARTSYNC_BASEURL")]
    pub url: String,

    /// File containing the access token
    #[arg(long, value_name = "FILE", default_value = ".token")]
    pub token_file: PathBuf,

    /// Access token, used instead of --token-file when set
    #[arg(long, value_name = "TOKEN", env = "ARTSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "ARTSYNC_IGNORE_CERT")]
    pub insecure: bool,
}

impl ConnectionArgs {
    /// Reads the token, preferring the environment over the token file.
    pub fn token(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        if !self.token_file.exists() {
            return Err(suggestions::token_missing(&self.token_file));
        }
        let token = std::fs::read_to_string(&self.token_file)
            .with_context(|| format!("Failed to read token file: {}", self.token_file.display()))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(suggestions::token_missing(&self.token_file));
        }
        Ok(token.to_string())
    }

    /// Connects to the platform.
    pub fn connect(&self) -> Result<HttpPlatform> {
        if self.insecure {
            log::warn!("TLS certificate verification is disabled");
        }
        let platform = HttpPlatform::new(&self.url, &self.token()?, self.insecure)?;
        Ok(platform.with_progress(console::Term::stderr().is_term()))
    }
}

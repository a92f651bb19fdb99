//! # Error Suggestions
//!
//! User-facing errors that say what went wrong and how to fix it. Commands
//! return these instead of bare `anyhow::bail!` messages.
//!
//! ```rust,ignore
//! use artsync::suggestions;
//!
//! if !path.exists() {
//!     return Err(suggestions::repo_file_not_found(path));
//! }
//! ```

use std::path::{Path, PathBuf};

/// No access token in the environment or the token file.
pub fn token_missing(token_file: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "No access token found (looked in {path})\n\n\
         hint: Write the token to {path} or pass --token-file <FILE>\n\
         hint: Set the ARTSYNC_TOKEN environment variable",
        path = token_file.display()
    )
}

/// A repo file or directory given on the command line does not exist.
pub fn repo_file_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Repo file not found: {path}\n\n\
         hint: Pass repo files or directories as arguments\n\
         hint: Set ARTSYNC_REPOFILES to a comma-separated list of paths",
        path = path.display()
    )
}

/// The given directories contain no document.
pub fn no_repo_files(paths: &[PathBuf]) -> anyhow::Error {
    let paths = paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    anyhow::anyhow!(
        "No repo files found in: {paths}\n\n\
         hint: Repo files must end in .json, .yaml or .yml"
    )
}

/// The generate output file exists already.
pub fn output_exists(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Output file already exists: {path}\n\n\
         hint: Use --overwrite to replace it\n\
         hint: Use --split to write one file per repo into a folder",
        path = path.display()
    )
}

/// Every loaded repo was dropped.
pub fn no_valid_repos(warnings: usize) -> anyhow::Error {
    anyhow::anyhow!(
        "No valid repos left ({warnings} warning(s))\n\n\
         hint: Fix the warnings logged above and run 'artsync check' again\n\
         hint: Use --provision-empty to accept empty repo files"
    )
}

//! # artsync
//!
//! Declarative provisioning of artifact repositories and their permission
//! targets. Repo files describe the repositories that should exist and who
//! may read, annotate, write, delete, manage or scan them; artsync diffs
//! them against the live platform and applies only the difference. It is a
//! one-shot, idempotent synchronization: running it twice in a row makes no
//! changes the second time.
//!
//! ## Quick Example
//!
//! ```
//! use artsync::codec;
//! use artsync::phases::{dedup, load};
//! use artsync::report::RunReport;
//!
//! let text = r#"
//! - name: libs
//!   read: [developers]
//! - names: [app-a, app-b]
//!   write: [builders]
//! "#;
//!
//! let mut report = RunReport::new();
//! let records = load::expand(codec::decode(text, "repos.yaml").unwrap(), &mut report);
//! let records = dedup::execute(records, &mut report);
//! assert_eq!(records.len(), 3);
//! assert_eq!(records[2].name, "app-b");
//! ```
//!
//! ## Core Concepts
//!
//! - **Declared repos (`model`)**: a repository as the user intends it, with
//!   six principal lists. Whether a principal is a user or a group is not
//!   declared; it is resolved against the platform.
//! - **Codec (`codec`)**: JSON and YAML documents holding one record or a
//!   list, with the line each record starts at kept for diagnostics.
//! - **Platform (`platform`)**: capability traits for reading and writing
//!   the artifact platform, with a blocking HTTP implementation.
//! - **Directory (`directory`, `ldap_config`)**: LDAP lookups used to import
//!   groups and to find the email of users that are created.
//! - **Run report (`report`)**: counters and warnings of one run. Nothing in
//!   the library keeps global state.
//!
//! ## Execution Flow
//!
//! `phases::orchestrator` runs:
//!
//! 1.  **Load**: parse every document and expand `names` shorthand.
//! 2.  **Dedup**: drop every record whose name is declared more than once.
//! 3.  **Validate**: drop bad names and repos fighting over one permission
//!     target.
//! 4.  **Resolve**: import groups and create users where enabled, then drop
//!     repos that still reference unknown principals.
//! 5.  **Provision**: create or update each repository and its permission
//!     target, in input order.
//!
//! `phases::generate` runs the other direction, turning the live state back
//! into repo files.

pub mod codec;
pub mod defaults;
pub mod directory;
pub mod error;
pub mod ldap_config;
pub mod model;
pub mod output;
pub mod phases;
pub mod platform;
pub mod report;
pub mod suggestions;

#[cfg(test)]
mod pipeline_proptest;

//! The stages of a reconciliation run.
//!
//! ## Overview
//!
//! Provisioning runs these stages in order, each consuming the survivors of
//! the previous one:
//! 1. Load - Parse documents and expand `names` into one record per name
//! 2. Dedup - Remove every record whose name occurs more than once
//! 3. Validate - Remove bad names and permission-name conflicts
//! 4. Resolve - Import groups and create users, then drop repos that still
//!    reference unknown principals
//! 5. Provision - Diff each repo and its permission target against the live
//!    state and apply the difference
//!
//! Generate is the inverse direction: live state back into documents.
//!
//! Every stage reports into the same `RunReport`. Nothing in a stage aborts
//! the run; only the initial state fetch and configuration errors do.

pub mod dedup;
pub mod generate;
pub mod load;
pub mod orchestrator;
pub mod provision;
pub mod resolve;
pub mod validate;

//! Stage 2: Deduplicate
//!
//! A name declared more than once is ambiguous, and there is no way to tell
//! which declaration is the intended one. Every record carrying such a name
//! is removed, not just the later copies.

use std::collections::BTreeMap;

use crate::model::DeclaredRepo;
use crate::report::RunReport;

/// Removes all records whose name occurs more than once.
///
/// One warning is emitted per duplicated name, in name order, listing the
/// `file:line` of every removed record in sorted order.
pub fn execute(records: Vec<DeclaredRepo>, report: &mut RunReport) -> Vec<DeclaredRepo> {
    let mut occurrences: BTreeMap<&str, Vec<(&str, usize)>> = BTreeMap::new();
    for record in &records {
        occurrences
            .entry(record.name.as_str())
            .or_default()
            .push((record.provenance.source.as_str(), record.provenance.line));
    }

    let mut removed = 0;
    let mut warnings = Vec::new();
    let duplicated: Vec<String> = occurrences
        .into_iter()
        .filter(|(_, locations)| locations.len() > 1)
        .map(|(name, mut locations)| {
            locations.sort();
            removed += locations.len();
            let locations: Vec<String> = locations
                .iter()
                .map(|(source, line)| format!("{}:{}", source, line))
                .collect();
            warnings.push(format!(
                "Warning: Ignoring {} repos due to duplicate name. Name: '{}', objects (file:line): {}",
                locations.len(),
                name,
                locations.join(", ")
            ));
            name.to_string()
        })
        .collect();

    for warning in warnings {
        report.warn(warning);
    }
    report.duplicate_repos += removed;

    records
        .into_iter()
        .filter(|record| !duplicated.contains(&record.name))
        .collect()
}

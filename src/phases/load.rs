//! Stage 1: Load
//!
//! Reads every repo file, decodes it with [`crate::codec`] and expands the
//! `names` shorthand into one record per name.
//!
//! A document that cannot be read, cannot be parsed or holds no records is
//! reported and skipped; the run carries on with the remaining documents.
//!
//! ## Name expansion
//!
//! - `names: [a, b]` becomes two records named `a` and `b` with the other
//!   fields copied.
//! - A record with both `name` and `names` is dropped.
//! - A record with neither is named after its file (`repos/lib.yaml` gives
//!   `lib`).

use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::Result;
use crate::model::DeclaredRepo;
use crate::report::RunReport;

/// Extensions picked up when a directory is given as input.
pub const DOCUMENT_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Loads and expands every document in `paths`, in order.
pub fn execute(paths: &[PathBuf], provision_empty: bool, report: &mut RunReport) -> Vec<DeclaredRepo> {
    let mut records = Vec::new();
    for path in paths {
        let source = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(text) => records.extend(load_document(&source, &text, provision_empty, report)),
            Err(e) => {
                report.warn(format!(
                    "'{}': Warning: Ignoring invalid repo file: error reading file: {}",
                    source, e
                ));
                report.invalid_documents += 1;
            }
        }
    }
    expand(records, report)
}

/// Decodes one document that has already been read.
///
/// An empty document is skipped unless `provision_empty` is set, in which
/// case a single record named after the file stands in for it.
pub fn load_document(
    source: &str,
    text: &str,
    provision_empty: bool,
    report: &mut RunReport,
) -> Vec<DeclaredRepo> {
    let records = match codec::decode(text, source) {
        Ok(records) => records,
        Err(e) => {
            report.warn(format!("'{}': Warning: Ignoring invalid repo file: {}", source, e));
            report.invalid_documents += 1;
            return Vec::new();
        }
    };

    if !records.is_empty() {
        return records;
    }

    if provision_empty {
        log::info!("'{}': Empty repo file, provisioning repo '{}'", source, file_stem(source));
        let mut placeholder = DeclaredRepo::named(file_stem(source));
        placeholder.provenance.source = source.to_string();
        placeholder.provenance.line = 1;
        return vec![placeholder];
    }

    report.warn(format!(
        "'{}': Warning: Ignoring invalid repo file: empty json/yaml file",
        source
    ));
    report.invalid_documents += 1;
    Vec::new()
}

/// Applies the name rules to the loaded records.
pub fn expand(records: Vec<DeclaredRepo>, report: &mut RunReport) -> Vec<DeclaredRepo> {
    let mut expanded = Vec::with_capacity(records.len());

    for mut record in records {
        match (record.name.is_empty(), record.names.is_empty()) {
            (false, false) => {
                report.warn(format!(
                    "Warning: Ignoring repo: Repo must not have both a name ({}) and names ({}) ({})",
                    record.name,
                    record.names.join(", "),
                    record.provenance
                ));
                report.invalid_repos += 1;
            }
            (false, true) => expanded.push(record),
            (true, true) => {
                record.name = file_stem(&record.provenance.source);
                expanded.push(record);
            }
            (true, false) => {
                let names = std::mem::take(&mut record.names);
                for name in &names {
                    log::debug!("Expanding: '{}' -> '{}'", names.join("', '"), name);
                    let mut copy = record.clone();
                    copy.name = name.clone();
                    expanded.push(copy);
                }
            }
        }
    }

    expanded
}

/// Resolves files and directories into the list of documents to load.
///
/// Directories are walked recursively for `*.json`, `*.yaml` and `*.yml`
/// files, sorted by path. Files are taken as given.
pub fn collect_documents(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_document_extension(p))
                .collect();
            found.sort();
            documents.extend(found);
        } else {
            documents.push(input.clone());
        }
    }
    Ok(documents)
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Base file name without its extension.
pub fn file_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_document_array() {
        let mut report = RunReport::new();
        let records = load_document(
            "repos.yaml",
            "- name: a\n- name: b\n",
            false,
            &mut report,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(report.invalid_documents, 0);
    }

    #[test]
    fn test_unparsable_document_is_counted_and_skipped() {
        let mut report = RunReport::new();
        let records = load_document("bad.yaml", "name: [oops", false, &mut report);
        assert!(records.is_empty());
        assert_eq!(report.invalid_documents, 1);
        assert!(report.warnings[0].contains("bad.yaml"));
    }

    #[test]
    fn test_empty_document_without_provisioning() {
        let mut report = RunReport::new();
        let records = load_document("lib.yaml", "# nothing\n", false, &mut report);
        assert!(records.is_empty());
        assert_eq!(report.invalid_documents, 1);
        assert!(report.warnings[0].contains("empty json/yaml file"));
    }

    #[test]
    fn test_empty_document_with_provisioning() {
        let mut report = RunReport::new();
        let records = load_document("dir/lib.json", "[]", true, &mut report);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "lib");
        assert_eq!(report.invalid_documents, 0);
    }

    #[test]
    fn test_expand_names() {
        let mut report = RunReport::new();
        let record = DeclaredRepo {
            names: vec!["a".to_string(), "b".to_string()],
            read: vec!["alice".to_string()],
            ..DeclaredRepo::default()
        };
        let expanded = expand(vec![record], &mut report);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].name, "a");
        assert_eq!(expanded[1].name, "b");
        assert!(expanded.iter().all(|r| r.names.is_empty()));
        assert!(expanded.iter().all(|r| r.read == vec!["alice"]));
    }

    #[test]
    fn test_expand_rejects_name_and_names() {
        let mut report = RunReport::new();
        let record = DeclaredRepo {
            name: "a".to_string(),
            names: vec!["b".to_string()],
            ..DeclaredRepo::default()
        };
        assert!(expand(vec![record], &mut report).is_empty());
        assert_eq!(report.invalid_repos, 1);
    }

    #[test]
    fn test_expand_falls_back_to_file_stem() {
        let mut report = RunReport::new();
        let mut record = DeclaredRepo::default();
        record.provenance.source = "repos/team-lib.yaml".to_string();
        let expanded = expand(vec![record], &mut report);
        assert_eq!(expanded[0].name, "team-lib");
    }

    #[test]
    fn test_execute_reads_files_and_counts_missing() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good.yaml");
        fs::write(&good, "read: [alice]\n").unwrap();
        let missing = temp.path().join("missing.yaml");

        let mut report = RunReport::new();
        let records = execute(&[good, missing], false, &mut report);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "good");
        assert_eq!(records[0].read, vec!["alice"]);
        assert_eq!(report.invalid_documents, 1);
    }

    #[test]
    fn test_collect_documents_walks_directories_sorted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("b.yaml"), "").unwrap();
        fs::write(temp.path().join("a.json"), "").unwrap();
        fs::write(temp.path().join("nested/c.yml"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();

        let documents = collect_documents(&[temp.path().to_path_buf()]).unwrap();
        let names: Vec<_> = documents
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml", "nested/c.yml"]);
    }
}

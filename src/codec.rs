//! # Declared-Document Codec
//!
//! Turns the raw text of a repo file into `DeclaredRepo` records and back.
//!
//! A document holds either a list of records or a single record, written as
//! JSON or YAML. JSON is tried first because its scanner gives exact record
//! positions; anything JSON rejects is handed to YAML (which also accepts
//! most JSON). Neither decoder exposes positions, so after a successful parse
//! the raw text is scanned a second time to find where each record starts.
//! When that scan cannot be matched one-to-one with the decoded records, the
//! records are attributed to the start of the document instead.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::DeclaredRepo;

/// Serialization used when writing generated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
        }
    }
}

/// Where a record begins in the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
}

impl Position {
    const START: Position = Position { offset: 0, line: 1 };

    fn at(text: &str, offset: usize) -> Self {
        let line = 1 + text.as_bytes()[..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        Position { offset, line }
    }
}

/// Whether the document contains nothing but whitespace, comments and
/// document markers.
pub fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

/// Decodes a document, attaching provenance to every record.
///
/// Returns an empty list for a document that is syntactically empty (blank,
/// comments only, `[]` or YAML `null`). Returns `Error::Document` when the
/// text is neither a list of records nor a single record.
pub fn decode(text: &str, source: &str) -> Result<Vec<DeclaredRepo>> {
    if is_blank(text) {
        return Ok(Vec::new());
    }

    let (mut records, positions) = match decode_json(text) {
        Some(decoded) => decoded,
        None => decode_yaml(text).ok_or_else(|| Error::Document {
            path: source.to_string(),
            message: "unparsable json/yaml file".to_string(),
        })?,
    };

    let positions = if positions.len() == records.len() {
        positions
    } else {
        log::debug!(
            "'{}': found {} record starts for {} records, using document start",
            source,
            positions.len(),
            records.len()
        );
        vec![Position::START; records.len()]
    };

    for (record, position) in records.iter_mut().zip(positions) {
        record.provenance.source = source.to_string();
        record.provenance.offset = position.offset;
        record.provenance.line = position.line;
    }

    Ok(records)
}

type Decoded = (Vec<DeclaredRepo>, Vec<Position>);

fn decode_json(text: &str) -> Option<Decoded> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value {
        serde_json::Value::Array(_) => {
            let records: Vec<DeclaredRepo> = serde_json::from_value(value).ok()?;
            if records.is_empty() {
                // Let YAML have a go; an empty list is empty there too.
                return None;
            }
            Some((records, json_object_starts(text, 1)))
        }
        serde_json::Value::Object(_) => {
            let record: DeclaredRepo = serde_json::from_value(value).ok()?;
            Some((vec![record], json_object_starts(text, 0)))
        }
        _ => None,
    }
}

fn decode_yaml(text: &str) -> Option<Decoded> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    match value {
        serde_yaml::Value::Null => Some((Vec::new(), Vec::new())),
        serde_yaml::Value::Sequence(_) => {
            let records: Vec<DeclaredRepo> = serde_yaml::from_value(value).ok()?;
            let positions = yaml_item_starts(text);
            Some((records, positions))
        }
        serde_yaml::Value::Mapping(_) => {
            let record: DeclaredRepo = serde_yaml::from_value(value).ok()?;
            Some((vec![record], vec![yaml_content_start(text)]))
        }
        _ => None,
    }
}

/// Offsets of every `{` opened at nesting `depth` (0 for a top-level object,
/// 1 for objects directly inside a top-level array).
fn json_object_starts(text: &str, depth: usize) -> Vec<Position> {
    let mut starts = Vec::new();
    let mut level = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => {
                if level == depth {
                    starts.push(Position::at(text, offset));
                }
                level += 1;
            }
            b'[' => level += 1,
            b'}' | b']' => level = level.saturating_sub(1),
            _ => {}
        }
    }
    starts
}

/// Offsets of the `-` markers of a root block sequence.
///
/// The root column is the indentation of the first item marker; only markers
/// at exactly that column start a record.
fn yaml_item_starts(text: &str) -> Vec<Position> {
    let mut starts = Vec::new();
    let mut root_indent: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let indent = body.len() - body.trim_start_matches(' ').len();
        let rest = &body[indent..];
        let is_marker = rest == "-" || rest.starts_with("- ") || rest.starts_with("-\t");

        if is_marker {
            let root = *root_indent.get_or_insert(indent);
            if indent == root {
                starts.push(Position::at(text, offset + indent));
            }
        }
        offset += line.len();
    }
    starts
}

/// Position of the first line that is not blank, a comment or `---`.
fn yaml_content_start(text: &str) -> Position {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if !(trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "---") {
            let indent = line.len() - line.trim_start().len();
            return Position::at(text, offset + indent);
        }
        offset += line.len();
    }
    Position::START
}

/// Serializes generated records in the requested format.
pub fn encode<T: Serialize + ?Sized>(value: &T, format: Format) -> Result<String> {
    match format {
        Format::Yaml => Ok(serde_yaml::to_string(value)?),
        Format::Json => {
            let mut text = serde_json::to_string_pretty(value)?;
            text.push('\n');
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_array_with_lines() {
        let text = "[\n  {\"name\": \"a\"},\n  {\n    \"name\": \"b\",\n    \"read\": [\"x\"]\n  }\n]\n";
        let records = decode(text, "repos.json").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a");
        assert_eq!(records[0].provenance.line, 2);
        assert_eq!(records[0].provenance.offset, 4);
        assert_eq!(records[1].provenance.line, 3);
        assert_eq!(records[1].read, vec!["x"]);
        assert_eq!(records[1].provenance.source, "repos.json");
    }

    #[test]
    fn test_decode_json_braces_inside_strings_are_ignored() {
        let text = r#"[{"name": "a", "description": "{not an object}"}, {"name": "b"}]"#;
        let records = decode(text, "r.json").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].provenance.offset, text.find(r#"{"name": "b""#).unwrap());
    }

    #[test]
    fn test_decode_json_single_object() {
        let text = "\n{\"name\": \"lib\", \"packageType\": \"maven\"}";
        let records = decode(text, "lib.json").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].package_type, "maven");
        assert_eq!(records[0].provenance.line, 2);
    }

    #[test]
    fn test_decode_yaml_sequence_with_lines() {
        let text = "# repos\n- name: a\n  read:\n    - alice\n- name: b\n";
        let records = decode(text, "repos.yaml").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].read, vec!["alice"]);
        assert_eq!(records[0].provenance.line, 2);
        assert_eq!(records[1].provenance.line, 5);
        assert_eq!(records[1].provenance.offset, text.find("- name: b").unwrap());
    }

    #[test]
    fn test_decode_yaml_single_mapping() {
        let text = "---\nname: lib\nrclass: virtual\n";
        let records = decode(text, "lib.yaml").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].access_class, "virtual");
        assert_eq!(records[0].provenance.line, 2);
    }

    #[test]
    fn test_decode_empty_documents() {
        assert!(decode("", "a.yaml").unwrap().is_empty());
        assert!(decode("# only a comment\n", "a.yaml").unwrap().is_empty());
        assert!(decode("[]", "a.json").unwrap().is_empty());
        assert!(decode("null\n", "a.yaml").unwrap().is_empty());
    }

    #[test]
    fn test_decode_unparsable() {
        let error = decode("name: [unclosed", "bad.yaml").unwrap_err();
        assert!(error.to_string().contains("unparsable json/yaml file"));
        assert!(error.to_string().contains("bad.yaml"));

        assert!(decode("just a scalar", "bad.yaml").is_err());
        assert!(decode(r#"[{"read": "not-a-list"}]"#, "bad.json").is_err());
    }

    #[test]
    fn test_yaml_nested_sequences_do_not_count() {
        let text = "- name: a\n  write:\n  - bob\n  - carol\n- name: b\n";
        let records = decode(text, "r.yaml").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].provenance.line, 5);
    }

    #[test]
    fn test_yaml_flow_sequence_falls_back_to_document_start() {
        let text = "[ {name: a}, {name: b} ]\n";
        let records = decode(text, "r.yaml").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].provenance.line, 1);
        assert_eq!(records[1].provenance.offset, 0);
    }

    #[test]
    fn test_encode_elides_empty_fields() {
        let repos = vec![DeclaredRepo {
            name: "lib".to_string(),
            read: vec!["alice".to_string()],
            ..DeclaredRepo::default()
        }];
        let yaml = encode(&repos, Format::Yaml).unwrap();
        assert_eq!(yaml, "- name: lib\n  read:\n  - alice\n");

        let json = encode(&repos, Format::Json).unwrap();
        assert!(json.contains("\"name\": \"lib\""));
        assert!(!json.contains("description"));
        assert!(json.ends_with("]\n"));
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(Format::Yaml.extension(), "yaml");
        assert_eq!(Format::Json.extension(), "json");
    }
}

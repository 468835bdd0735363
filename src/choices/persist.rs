//! Persisted choices: a flat properties file recording the resolved answers
//! so that a project can be regenerated with the same inputs.
//!
//! Flow answers are written under a reserved key prefix (`FLOW.` by
//! default). Other keys in an existing file are left to their owners and
//! returned separately when reading.

use std::path::Path;

use indexmap::IndexMap;
use java_properties::{PropertiesError, PropertiesIter, PropertiesWriter};

use super::ChoiceTree;
use crate::error::{ArchetypeError, Result};

#[derive(Debug, Default)]
pub struct PersistedChoices {
    /// Flow answers with the prefix stripped, in file order.
    pub choices: Vec<(String, String)>,
    /// Entries outside the reserved prefix.
    pub other: IndexMap<String, String>,
}

pub fn write_choices(path: &Path, tree: &ChoiceTree, prefix: &str) -> Result<()> {
    let properties_error = |source| ArchetypeError::ChoicesFile {
        path: path.to_path_buf(),
        source,
    };

    let mut content = Vec::new();
    let mut writer = PropertiesWriter::new(&mut content);
    writer
        .write_comment(&format!(
            "archetype-flow {} resolved choices",
            env!("CARGO_PKG_VERSION")
        ))
        .map_err(properties_error)?;
    for node in tree.iter() {
        writer
            .write(
                &format!("{prefix}{}", node.path),
                &node.value.to_flat_string(),
            )
            .map_err(properties_error)?;
    }
    writer.finish().map_err(properties_error)?;
    drop(writer);

    std::fs::write(path, content).map_err(|e| ArchetypeError::Io {
        context: format!("writing choices file {}", path.display()),
        source: e,
    })
}

pub fn read_choices(path: &Path, prefix: &str) -> Result<PersistedChoices> {
    let content = std::fs::read(path).map_err(|e| ArchetypeError::Io {
        context: format!("reading choices file {}", path.display()),
        source: e,
    })?;
    let entries = parse_properties(&content).map_err(|source| ArchetypeError::ChoicesFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut persisted = PersistedChoices::default();
    for (key, value) in entries {
        match key.strip_prefix(prefix) {
            Some(flow_key) if !flow_key.is_empty() => {
                persisted.choices.push((flow_key.to_string(), value));
            }
            _ => {
                persisted.other.insert(key, value);
            }
        }
    }
    Ok(persisted)
}

/// Entries of a properties document in file order.
pub fn parse_properties(
    content: &[u8],
) -> std::result::Result<Vec<(String, String)>, PropertiesError> {
    let mut entries = Vec::new();
    PropertiesIter::new(content).read_into(|key, value| entries.push((key, value)))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choices::{ContextValue, SetOptions};
    use crate::path::ContextPath;
    use rstest::rstest;

    #[test]
    fn writes_and_reads_flow_choices() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".archetype");

        let mut tree = ChoiceTree::new();
        tree.set(
            ContextPath::parse("package").unwrap(),
            ContextValue::Text("com.example: app".into()),
            SetOptions::default(),
        )
        .unwrap();
        tree.set(
            ContextPath::parse("features").unwrap(),
            ContextValue::select(["health", "metrics"]),
            SetOptions::default(),
        )
        .unwrap();

        write_choices(&file, &tree, "FLOW.").unwrap();
        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.contains("FLOW.features=health,metrics"));

        let read = read_choices(&file, "FLOW.").unwrap();
        assert_eq!(
            read.choices,
            vec![
                ("features".to_string(), "health,metrics".to_string()),
                ("package".to_string(), "com.example: app".to_string()),
            ]
        );
        assert!(read.other.is_empty());
    }

    #[test]
    fn keeps_foreign_keys_apart() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".helidon");
        std::fs::write(
            &file,
            "# generated\nproject.directory=/tmp/x\nFLOW.base=se\n! bang comment\n",
        )
        .unwrap();

        let read = read_choices(&file, "FLOW.").unwrap();
        assert_eq!(read.choices, vec![("base".to_string(), "se".to_string())]);
        assert_eq!(read.other["project.directory"], "/tmp/x");
    }

    #[test]
    fn malformed_escapes_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".archetype");
        std::fs::write(&file, "FLOW.name=\\uZZZZ\n").unwrap();

        match read_choices(&file, "FLOW.") {
            Err(ArchetypeError::ChoicesFile { path, .. }) => assert_eq!(path, file),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_ascii_values_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".archetype");
        let mut tree = ChoiceTree::new();
        tree.set(
            ContextPath::parse("name").unwrap(),
            ContextValue::Text("caf\u{e9} cr\u{e8}me".into()),
            SetOptions::default(),
        )
        .unwrap();

        write_choices(&file, &tree, "FLOW.").unwrap();
        let read = read_choices(&file, "FLOW.").unwrap();
        assert_eq!(
            read.choices,
            vec![("name".to_string(), "caf\u{e9} cr\u{e8}me".to_string())]
        );
    }

    #[rstest]
    #[case("a=b", "a", "b")]
    #[case("a = b", "a", "b")]
    #[case("a: b", "a", "b")]
    #[case("a b", "a", "b")]
    #[case("a\\=x=y", "a=x", "y")]
    #[case("key", "key", "")]
    #[case("a=line\\nbreak", "a", "line\nbreak")]
    fn parses_property_lines(#[case] line: &str, #[case] key: &str, #[case] value: &str) {
        let entries = parse_properties(line.as_bytes()).unwrap();
        assert_eq!(entries, vec![(key.to_string(), value.to_string())]);
    }

    #[test]
    fn joins_continuation_lines() {
        let entries = parse_properties(b"list=a,\\\n    b,\\\n    c\n").unwrap();
        assert_eq!(entries, vec![("list".to_string(), "a,b,c".to_string())]);
    }
}

//! The run-time choice tree: resolved answers keyed by context path.
//!
//! The tree only grows during a session. Values may be replaced by the user
//! until they are locked read-only by a `flow-context` preset.

pub mod persist;
pub mod value;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{ArchetypeError, Result};
use crate::path::ContextPath;

pub use persist::{read_choices, write_choices, PersistedChoices};
pub use value::ContextValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextNode {
    pub path: ContextPath,
    pub value: ContextValue,
    /// Supplied from outside the flow (CLI `--input`, query parameter,
    /// persisted choices) before any preset ran.
    pub external: bool,
    /// Locked by a preset; user input can no longer change it.
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub external: bool,
    pub read_only: bool,
}

impl SetOptions {
    pub fn external() -> Self {
        Self {
            external: true,
            read_only: false,
        }
    }

    pub fn read_only() -> Self {
        Self {
            external: false,
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetOutcome {
    /// The preset value was stored and locked.
    Applied,
    /// An identical value already existed; it is now locked.
    Unchanged,
    /// An external value already occupies the path and was kept.
    ExternalWins,
}

#[derive(Debug, Clone, Default)]
pub struct ChoiceTree {
    nodes: BTreeMap<ContextPath, ContextNode>,
}

impl ChoiceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `path`.
    ///
    /// Fails with [`ArchetypeError::ReadOnlyViolation`] when the path is
    /// locked and `value` differs; setting the identical value is a no-op.
    pub fn set(&mut self, path: ContextPath, value: ContextValue, options: SetOptions) -> Result<()> {
        if let Some(existing) = self.nodes.get_mut(&path) {
            if existing.read_only {
                if existing.value != value {
                    return Err(ArchetypeError::ReadOnlyViolation {
                        path: path.to_string(),
                        current: existing.value.to_string(),
                        attempted: value.to_string(),
                    });
                }
                return Ok(());
            }
            if existing.value == value {
                existing.external |= options.external;
                existing.read_only |= options.read_only;
                return Ok(());
            }
        }

        debug!(path = %path, value = %value, external = options.external, "set choice");
        self.nodes.insert(
            path.clone(),
            ContextNode {
                path,
                value,
                external: options.external,
                read_only: options.read_only,
            },
        );
        Ok(())
    }

    /// Apply a `flow-context` preset.
    ///
    /// External values win over presets: the preset is rejected and the
    /// external value kept. A preset contradicting a locked or previously
    /// answered value is a [`ArchetypeError::ReadOnlyViolation`].
    pub fn preset(&mut self, path: ContextPath, value: ContextValue) -> Result<PresetOutcome> {
        match self.nodes.get_mut(&path) {
            Some(existing) if existing.external && existing.value != value => {
                warn!(
                    path = %path,
                    external = %existing.value,
                    preset = %value,
                    "preset rejected, keeping external value"
                );
                Ok(PresetOutcome::ExternalWins)
            }
            Some(existing) if existing.value == value => {
                existing.read_only = true;
                Ok(PresetOutcome::Unchanged)
            }
            Some(existing) => Err(ArchetypeError::ReadOnlyViolation {
                path: path.to_string(),
                current: existing.value.to_string(),
                attempted: value.to_string(),
            }),
            None => {
                debug!(path = %path, value = %value, "preset choice");
                self.nodes.insert(
                    path.clone(),
                    ContextNode {
                        path,
                        value,
                        external: false,
                        read_only: true,
                    },
                );
                Ok(PresetOutcome::Applied)
            }
        }
    }

    pub fn get(&self, path: &ContextPath) -> Option<&ContextNode> {
        self.nodes.get(path)
    }

    pub fn value(&self, path: &ContextPath) -> Option<&ContextValue> {
        self.nodes.get(path).map(|n| &n.value)
    }

    pub fn contains(&self, path: &ContextPath) -> bool {
        self.nodes.contains_key(path)
    }

    /// Nodes stored exactly one level below `path`.
    pub fn children(&self, path: &ContextPath) -> Vec<&ContextNode> {
        self.nodes
            .range(path.clone()..)
            .take_while(|(p, _)| p.starts_with(path))
            .filter(|(p, _)| p.depth() == path.depth() + 1)
            .map(|(_, n)| n)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextNode> {
        self.nodes.values()
    }

    /// Values keyed by dotted path, the shape templates see as `choices`.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.nodes
            .iter()
            .map(|(path, node)| (path.to_string(), node.value.to_json()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn p(s: &str) -> ContextPath {
        ContextPath::parse(s).unwrap()
    }

    fn text(s: &str) -> ContextValue {
        ContextValue::Text(s.to_string())
    }

    #[test]
    fn read_only_rejects_different_value() {
        let mut tree = ChoiceTree::new();
        tree.set(p("base"), text("se"), SetOptions::read_only())
            .unwrap();
        let err = tree
            .set(p("base"), text("mp"), SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, ArchetypeError::ReadOnlyViolation { .. }));
        assert_eq!(tree.value(&p("base")), Some(&text("se")));
    }

    #[rstest]
    #[case(SetOptions::read_only())]
    #[case(SetOptions::default())]
    fn same_value_is_idempotent(#[case] first: SetOptions) {
        let mut tree = ChoiceTree::new();
        tree.set(p("base"), text("se"), first).unwrap();
        tree.set(p("base"), text("se"), SetOptions::default())
            .unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn user_values_can_be_replaced() {
        let mut tree = ChoiceTree::new();
        tree.set(p("name"), text("a"), SetOptions::default()).unwrap();
        tree.set(p("name"), text("b"), SetOptions::default()).unwrap();
        assert_eq!(tree.value(&p("name")), Some(&text("b")));
    }

    #[test]
    fn external_value_wins_over_preset() {
        let mut tree = ChoiceTree::new();
        tree.set(p("base"), text("mp"), SetOptions::external())
            .unwrap();
        let outcome = tree.preset(p("base"), text("se")).unwrap();
        assert_eq!(outcome, PresetOutcome::ExternalWins);
        let node = tree.get(&p("base")).unwrap();
        assert_eq!(node.value, text("mp"));
        assert!(!node.read_only);
    }

    #[test]
    fn preset_locks_matching_value() {
        let mut tree = ChoiceTree::new();
        tree.set(p("base"), text("se"), SetOptions::external())
            .unwrap();
        assert_eq!(
            tree.preset(p("base"), text("se")).unwrap(),
            PresetOutcome::Unchanged
        );
        assert!(tree.get(&p("base")).unwrap().read_only);
    }

    #[test]
    fn conflicting_presets_fail() {
        let mut tree = ChoiceTree::new();
        assert_eq!(
            tree.preset(p("base"), text("se")).unwrap(),
            PresetOutcome::Applied
        );
        assert!(tree.preset(p("base"), text("mp")).is_err());
    }

    #[test]
    fn children_are_direct_descendants() {
        let mut tree = ChoiceTree::new();
        for path in ["a", "a.b", "a.c", "a.b.d", "ab"] {
            tree.set(p(path), ContextValue::Boolean(true), SetOptions::default())
                .unwrap();
        }
        let children: Vec<String> = tree
            .children(&p("a"))
            .iter()
            .map(|n| n.path.to_string())
            .collect();
        assert_eq!(children, vec!["a.b", "a.c"]);
        assert_eq!(tree.children(&ContextPath::root()).len(), 2);
    }
}

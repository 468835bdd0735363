//! The descriptor model: descriptor documents linked into one validated
//! [`Archetype`].
//!
//! Loading happens in four passes:
//!
//! 1. [`xml`] reads each file into [`model::Document`] declarations
//! 2. [`loader`] follows `invoke`/`include` sources into an [`InvokeGraph`],
//!    rejecting cycles and missing files
//! 3. [`link`] expands invokes in place into an arena of flow nodes
//! 4. [`validate`] resolves every path, compiles every expression and
//!    checks the structural rules
//!
//! The resulting [`Archetype`] is immutable and can be shared across any
//! number of resolution sessions.

pub mod link;
pub mod loader;
pub mod model;
pub mod validate;
pub mod xml;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::choices::{ChoiceTree, ContextValue};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::expr::{Condition, DeclaredPaths, PathKind};
use crate::output::transform::{Interpolated, Transformation};
use crate::path::{ContextPath, PathResolver};
use crate::render::TemplateEngine;

pub use loader::{DescriptorCache, InvokeGraph};
pub use model::{FileSetKind, InputKind, Location};

/// Default `order` of model entries without one.
pub const DEFAULT_MODEL_ORDER: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Step {
        optional: bool,
    },
    Input {
        kind: InputKind,
        default: Option<ContextValue>,
    },
    Option,
}

#[derive(Debug, Clone)]
pub struct FlowNode {
    pub id: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub kind: NodeKind,
    /// Value path for inputs and options; the enclosing scope for steps.
    pub path: ContextPath,
    pub parent: Option<NodeId>,
    /// Directly nested flow nodes (options of a select, nested inputs and
    /// steps) in declaration order.
    pub children: Vec<NodeId>,
    /// Ordered contents walked by the flow resolver.
    pub body: Vec<FlowItem>,
    pub condition: Option<Condition>,
    pub location: Location,
}

impl FlowNode {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn is_step(&self) -> bool {
        matches!(self.kind, NodeKind::Step { .. })
    }

    pub fn input_kind(&self) -> Option<InputKind> {
        match self.kind {
            NodeKind::Input { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn default_value(&self) -> Option<&ContextValue> {
        match &self.kind {
            NodeKind::Input { default, .. } => default.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowItem {
    Node(NodeId),
    /// Index into [`Archetype::preset_group`].
    Presets(usize),
}

#[derive(Debug, Clone)]
pub struct PresetGroup {
    pub owner: Option<NodeId>,
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone)]
pub struct Preset {
    pub path: ContextPath,
    pub value: ContextValue,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct OutputBlock {
    pub owner: Option<NodeId>,
    pub condition: Option<Condition>,
    pub file_sets: Vec<FileSet>,
    pub model: Vec<ModelEntry>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct FileSet {
    /// Engine rendering the files; `None` copies them verbatim.
    pub engine: Option<TemplateEngine>,
    /// Absolute source directory.
    pub directory: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub transformations: Vec<String>,
    pub condition: Option<Condition>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub key: Option<String>,
    pub order: i32,
    /// Position in the linked (invoke-expanded) declaration sequence.
    pub declaration: usize,
    pub condition: Option<Condition>,
    pub node: ModelNode,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum ModelNode {
    Value(ModelValue),
    List(Vec<ModelEntry>),
    Map(Vec<ModelEntry>),
}

#[derive(Debug, Clone)]
pub struct ModelValue {
    /// Inline text with its `${path}` references bound.
    pub text: Interpolated,
    /// Absolute path of an external file providing the text.
    pub file: Option<PathBuf>,
    /// Engine used to pre-render the text.
    pub template: Option<TemplateEngine>,
}

#[derive(Debug)]
pub struct Archetype {
    pub(crate) root: PathBuf,
    pub(crate) nodes: Vec<FlowNode>,
    pub(crate) flow: Vec<FlowItem>,
    pub(crate) presets: Vec<PresetGroup>,
    pub(crate) outputs: Vec<OutputBlock>,
    pub(crate) transformations: IndexMap<String, Transformation>,
    pub(crate) paths: HashMap<ContextPath, NodeId>,
    pub(crate) resolver: PathResolver,
}

impl Archetype {
    /// Load, link and validate the archetype rooted at `descriptor`.
    pub fn load(
        descriptor: &Path,
        cache: &mut DescriptorCache,
        config: &EngineConfig,
    ) -> Result<Self> {
        let (graph, root) = InvokeGraph::build(cache, descriptor)?;
        let draft = link::link(&graph, root)?;
        validate::finish(draft, config)
    }

    pub fn root_descriptor(&self) -> &Path {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> &FlowNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FlowNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn preset_group_count(&self) -> usize {
        self.presets.len()
    }

    pub fn flow(&self) -> &[FlowItem] {
        &self.flow
    }

    pub fn preset_group(&self, index: usize) -> &PresetGroup {
        &self.presets[index]
    }

    pub fn outputs(&self) -> &[OutputBlock] {
        &self.outputs
    }

    pub fn transformation(&self, id: &str) -> Option<&Transformation> {
        self.transformations.get(id)
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// The input or option declared at `path`.
    pub fn node_at(&self, path: &ContextPath) -> Option<NodeId> {
        self.paths.get(path).copied()
    }

    /// All steps in declaration order.
    pub fn steps(&self) -> Vec<NodeId> {
        let mut steps = Vec::new();
        self.collect_nodes(&self.flow, &mut |id, node| {
            if node.is_step() {
                steps.push(id);
            }
            true
        });
        steps
    }

    /// Inputs presented by `step`, in declaration order, excluding those of
    /// nested steps.
    pub fn step_inputs(&self, step: NodeId) -> Vec<NodeId> {
        let mut inputs = Vec::new();
        self.collect_nodes(&self.node(step).body, &mut |id, node| match node.kind {
            NodeKind::Step { .. } => false,
            NodeKind::Input { .. } => {
                inputs.push(id);
                true
            }
            NodeKind::Option => true,
        });
        inputs
    }

    /// The closest enclosing step of `id`.
    pub fn step_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            if self.node(parent).is_step() {
                return Some(parent);
            }
            current = self.node(parent).parent;
        }
        None
    }

    /// Options of a select input.
    pub fn options_of(&self, input: NodeId) -> Vec<NodeId> {
        self.node(input)
            .children
            .iter()
            .copied()
            .filter(|c| matches!(self.node(*c).kind, NodeKind::Option))
            .collect()
    }

    /// Whether `id` takes part in the flow: its own condition holds and the
    /// content of every ancestor is reachable.
    pub fn is_active(&self, id: NodeId, tree: &ChoiceTree) -> Result<bool> {
        let node = self.node(id);
        if let Some(condition) = &node.condition {
            if !condition.eval(tree)? {
                return Ok(false);
            }
        }
        self.content_active(node.parent, tree)
    }

    /// Whether items nested in `owner` are reachable. Content of an option
    /// needs the option selected; content of a boolean input needs `true`.
    pub fn content_active(&self, owner: Option<NodeId>, tree: &ChoiceTree) -> Result<bool> {
        let Some(owner) = owner else {
            return Ok(true);
        };
        let node = self.node(owner);
        let gate = match &node.kind {
            NodeKind::Option => match (node.path.parent(), node.path.last()) {
                (Some(input), Some(option)) => tree
                    .value(&input)
                    .is_some_and(|value| value.selects(option)),
                _ => false,
            },
            NodeKind::Input {
                kind: InputKind::Boolean,
                ..
            } => tree.value(&node.path) == Some(&ContextValue::Boolean(true)),
            _ => true,
        };
        Ok(gate && self.is_active(owner, tree)?)
    }

    /// Parse the string form of a value for input `id`.
    pub fn parse_value(&self, id: NodeId, raw: &str) -> std::result::Result<ContextValue, String> {
        let node = self.node(id);
        let Some(kind) = node.input_kind() else {
            return Err(format!("'{}' is not an input", node.path));
        };
        let options: Vec<&str> = self
            .options_of(id)
            .into_iter()
            .map(|o| self.node(o).id.as_str())
            .collect();
        parse_input_value(kind, &options, raw)
    }

    fn collect_nodes<F>(&self, items: &[FlowItem], visit: &mut F)
    where
        F: FnMut(NodeId, &FlowNode) -> bool,
    {
        for item in items {
            if let FlowItem::Node(id) = item {
                let node = self.node(*id);
                if visit(*id, node) {
                    self.collect_nodes(&node.body, visit);
                }
            }
        }
    }
}

impl DeclaredPaths for Archetype {
    fn kind_of(&self, path: &ContextPath) -> Option<PathKind> {
        let id = self.node_at(path)?;
        Some(path_kind(&self.node(id).kind, || {
            self.options_of(id)
                .into_iter()
                .map(|o| self.node(o).id.clone())
                .collect()
        }))
    }
}

fn path_kind<F>(kind: &NodeKind, options: F) -> PathKind
where
    F: FnOnce() -> Vec<String>,
{
    match kind {
        NodeKind::Input {
            kind: InputKind::Text,
            ..
        } => PathKind::Text,
        NodeKind::Input {
            kind: InputKind::Boolean,
            ..
        } => PathKind::Boolean,
        NodeKind::Input {
            kind: InputKind::Select { multiple },
            ..
        } => PathKind::Select {
            multiple: *multiple,
            options: options(),
        },
        NodeKind::Option | NodeKind::Step { .. } => PathKind::Option,
    }
}

/// Parse the string form of an input value: `true`/`false` for booleans,
/// an option id for selects, comma separated ids for multi selects.
pub fn parse_input_value(
    kind: InputKind,
    options: &[&str],
    raw: &str,
) -> std::result::Result<ContextValue, String> {
    match kind {
        InputKind::Text => Ok(ContextValue::Text(raw.to_string())),
        InputKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" => Ok(ContextValue::Boolean(true)),
            "false" | "no" | "n" | "0" | "off" => Ok(ContextValue::Boolean(false)),
            other => Err(format!("'{other}' is not a boolean")),
        },
        InputKind::Select { multiple } => {
            let ids: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if !multiple && ids.len() != 1 {
                return Err(format!("expected exactly one of: {}", options.join(", ")));
            }
            if let Some(unknown) = ids.iter().find(|id| !options.contains(id)) {
                return Err(format!(
                    "'{unknown}' is not one of: {}",
                    options.join(", ")
                ));
            }
            Ok(ContextValue::select(ids))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const OPTIONS: &[&str] = &["zipkin", "jaeger"];

    #[rstest]
    #[case(InputKind::Text, " spaced ", ContextValue::Text(" spaced ".into()))]
    #[case(InputKind::Boolean, "yes", ContextValue::Boolean(true))]
    #[case(InputKind::Boolean, "FALSE", ContextValue::Boolean(false))]
    #[case(InputKind::Select { multiple: false }, "jaeger", ContextValue::select(["jaeger"]))]
    #[case(InputKind::Select { multiple: true }, "jaeger, zipkin", ContextValue::select(["jaeger", "zipkin"]))]
    #[case(InputKind::Select { multiple: true }, "", ContextValue::Select(vec![]))]
    fn parses_valid_values(
        #[case] kind: InputKind,
        #[case] raw: &str,
        #[case] expected: ContextValue,
    ) {
        assert_eq!(parse_input_value(kind, OPTIONS, raw).unwrap(), expected);
    }

    #[rstest]
    #[case(InputKind::Boolean, "maybe")]
    #[case(InputKind::Select { multiple: false }, "ant")]
    #[case(InputKind::Select { multiple: false }, "zipkin,jaeger")]
    #[case(InputKind::Select { multiple: false }, "")]
    #[case(InputKind::Select { multiple: true }, "zipkin,ant")]
    fn rejects_invalid_values(#[case] kind: InputKind, #[case] raw: &str) {
        assert!(parse_input_value(kind, OPTIONS, raw).is_err());
    }
}

//! Turns a linked [`Draft`] into a validated [`Archetype`].
//!
//! Everything that can be checked without answers is checked here, so a
//! session never reaches a state that fails because of a bad descriptor.

use std::collections::HashMap;

use globset::Glob;
use indexmap::IndexMap;
use tracing::debug;

use super::link::{Draft, DraftKind, DraftNode, DraftOutput};
use super::model::{
    FileSetDecl, FileSetKind, InputKind, Location, ModelEntryDecl, ModelNodeDecl, OutputDecl,
};
use super::{
    parse_input_value, Archetype, FileSet, FlowNode, ModelEntry, ModelNode, ModelValue,
    NodeId, NodeKind, OutputBlock, Preset, PresetGroup, DEFAULT_MODEL_ORDER,
};
use crate::config::EngineConfig;
use crate::error::{ArchetypeError, Result};
use crate::expr::{Condition, DeclaredPaths, PathKind};
use crate::output::transform::{Interpolated, Transformation};
use crate::path::{ContextPath, PathResolver};
use crate::render::TemplateEngine;

fn invalid(location: &Location, reason: String) -> ArchetypeError {
    ArchetypeError::DescriptorValidation {
        location: location.to_string(),
        reason,
    }
}

/// Declared-path view over the draft, used while compiling expressions.
struct Index<'d> {
    nodes: &'d [DraftNode],
    paths: HashMap<ContextPath, NodeId>,
}

impl Index<'_> {
    fn options_of(&self, id: NodeId) -> Vec<String> {
        self.nodes[id.0]
            .children
            .iter()
            .map(|c| &self.nodes[c.0])
            .filter(|n| matches!(n.kind, DraftKind::Option))
            .map(|n| n.id.clone())
            .collect()
    }
}

impl DeclaredPaths for Index<'_> {
    fn kind_of(&self, path: &ContextPath) -> Option<PathKind> {
        let id = *self.paths.get(path)?;
        Some(match &self.nodes[id.0].kind {
            DraftKind::Input {
                kind: InputKind::Text,
                ..
            } => PathKind::Text,
            DraftKind::Input {
                kind: InputKind::Boolean,
                ..
            } => PathKind::Boolean,
            DraftKind::Input {
                kind: InputKind::Select { multiple },
                ..
            } => PathKind::Select {
                multiple: *multiple,
                options: self.options_of(id),
            },
            DraftKind::Option | DraftKind::Step { .. } => PathKind::Option,
        })
    }
}

pub fn finish(draft: Draft, config: &EngineConfig) -> Result<Archetype> {
    let prefix = draft
        .common_prefix
        .as_deref()
        .or(config.archetype.common_prefix.as_deref())
        .unwrap_or_default();
    let resolver = PathResolver::new(ContextPath::parse(prefix)?);

    check_sibling_ids(&draft)?;
    let index = Index {
        nodes: &draft.nodes,
        paths: declared_paths(&draft.nodes)?,
    };

    let mut nodes = Vec::with_capacity(draft.nodes.len());
    for (i, node) in draft.nodes.iter().enumerate() {
        nodes.push(flow_node(NodeId(i), node, &index, &resolver)?);
    }
    check_steps(&draft.nodes, &nodes)?;

    let mut presets = Vec::with_capacity(draft.presets.len());
    // presets applied in every resolution, by path
    let mut fixed: HashMap<ContextPath, (crate::choices::ContextValue, Location)> = HashMap::new();
    for group in &draft.presets {
        let always = always_applied(group.owner, &nodes);
        let mut seen: HashMap<ContextPath, usize> = HashMap::new();
        let mut compiled: Vec<Preset> = Vec::new();
        for decl in &group.presets {
            let path = resolver.resolve(&decl.path, &group.scope, |p| {
                index
                    .paths
                    .get(p)
                    .is_some_and(|id| matches!(draft.nodes[id.0].kind, DraftKind::Input { .. }))
            })?;
            let id = index.paths[&path];
            let value = input_value(&draft.nodes, id, &decl.value)
                .map_err(|reason| invalid(&decl.location, format!("preset '{path}': {reason}")))?;

            if let Some(&previous) = seen.get(&path) {
                if compiled[previous].value != value {
                    return Err(invalid(
                        &decl.location,
                        format!(
                            "conflicting presets for '{path}': '{}' and '{value}'",
                            compiled[previous].value
                        ),
                    ));
                }
                continue;
            }
            if always {
                if let Some((other, at)) = fixed.get(&path) {
                    if other != &value {
                        return Err(invalid(
                            &decl.location,
                            format!(
                                "conflicting presets for '{path}': '{other}' at {at} and '{value}'"
                            ),
                        ));
                    }
                } else {
                    fixed.insert(path.clone(), (value.clone(), decl.location.clone()));
                }
            }
            seen.insert(path.clone(), compiled.len());
            compiled.push(Preset {
                path,
                value,
                location: decl.location.clone(),
            });
        }
        presets.push(PresetGroup {
            owner: group.owner,
            presets: compiled,
        });
    }

    let mut transformations: IndexMap<String, Transformation> = IndexMap::new();
    let mut declared_at: HashMap<String, Location> = HashMap::new();
    for output in &draft.outputs {
        for decl in &output.decl.transformations {
            if let Some(previous) = declared_at.get(&decl.id) {
                // the same document included twice declares the same pipeline
                if previous == &decl.location {
                    continue;
                }
                return Err(invalid(
                    &decl.location,
                    format!(
                        "transformation '{}' is already declared at {previous}",
                        decl.id
                    ),
                ));
            }
            let compiled = Transformation::compile(decl, &output.scope, &resolver, &index)?;
            declared_at.insert(decl.id.clone(), decl.location.clone());
            transformations.insert(decl.id.clone(), compiled);
        }
    }

    let mut declaration = 0usize;
    let mut outputs = Vec::with_capacity(draft.outputs.len());
    for output in &draft.outputs {
        outputs.push(output_block(
            output,
            &index,
            &resolver,
            &transformations,
            &mut declaration,
        )?);
    }

    debug!(
        root = %draft.root.display(),
        nodes = nodes.len(),
        outputs = outputs.len(),
        transformations = transformations.len(),
        "archetype built"
    );

    Ok(Archetype {
        root: draft.root,
        nodes,
        flow: draft.flow,
        presets,
        outputs,
        transformations,
        paths: index.paths,
        resolver,
    })
}

fn check_sibling_ids(draft: &Draft) -> Result<()> {
    let mut roots = Vec::new();
    for (i, node) in draft.nodes.iter().enumerate() {
        if node.parent.is_none() {
            roots.push(NodeId(i));
        }
    }

    let groups = std::iter::once(&roots).chain(draft.nodes.iter().map(|n| &n.children));
    for siblings in groups {
        let mut seen: HashMap<&str, &Location> = HashMap::new();
        for id in siblings {
            let node = &draft.nodes[id.0];
            if let Some(first) = seen.insert(&node.id, &node.location) {
                return Err(invalid(
                    &node.location,
                    format!(
                        "identifier '{}' is already used by a sibling at {first}",
                        node.id
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn declared_paths(nodes: &[DraftNode]) -> Result<HashMap<ContextPath, NodeId>> {
    let mut paths: HashMap<ContextPath, NodeId> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if matches!(node.kind, DraftKind::Step { .. }) {
            continue;
        }
        if let Some(previous) = paths.insert(node.path.clone(), NodeId(i)) {
            return Err(invalid(
                &node.location,
                format!(
                    "path '{}' is already declared at {}",
                    node.path, nodes[previous.0].location
                ),
            ));
        }
    }
    Ok(paths)
}

fn input_value(
    nodes: &[DraftNode],
    id: NodeId,
    raw: &str,
) -> std::result::Result<crate::choices::ContextValue, String> {
    let DraftKind::Input { kind, .. } = nodes[id.0].kind else {
        return Err(format!("'{}' is not an input", nodes[id.0].path));
    };
    let options: Vec<&str> = nodes[id.0]
        .children
        .iter()
        .map(|c| &nodes[c.0])
        .filter(|n| matches!(n.kind, DraftKind::Option))
        .map(|n| n.id.as_str())
        .collect();
    parse_input_value(kind, &options, raw)
}

fn compile_condition(
    source: Option<&str>,
    scope: &ContextPath,
    index: &Index<'_>,
    resolver: &PathResolver,
) -> Result<Option<Condition>> {
    source
        .map(|s| Condition::compile(s, scope, resolver, index))
        .transpose()
}

fn flow_node(
    id: NodeId,
    node: &DraftNode,
    index: &Index<'_>,
    resolver: &PathResolver,
) -> Result<FlowNode> {
    let kind = match &node.kind {
        DraftKind::Step { optional } => NodeKind::Step {
            optional: *optional,
        },
        DraftKind::Option => NodeKind::Option,
        DraftKind::Input { kind, default } => {
            if let InputKind::Select { .. } = kind {
                if index.options_of(id).is_empty() {
                    return Err(invalid(
                        &node.location,
                        format!("select input '{}' declares no options", node.path),
                    ));
                }
            }
            let default = default
                .as_deref()
                .map(|raw| input_value(index.nodes, id, raw))
                .transpose()
                .map_err(|reason| {
                    invalid(
                        &node.location,
                        format!("invalid default for '{}': {reason}", node.path),
                    )
                })?;
            NodeKind::Input {
                kind: *kind,
                default,
            }
        }
    };

    Ok(FlowNode {
        id: node.id.clone(),
        label: node.label.clone(),
        help: node.help.clone(),
        kind,
        path: node.path.clone(),
        parent: node.parent,
        children: node.children.clone(),
        body: node.body.clone(),
        condition: compile_condition(node.condition.as_deref(), &node.scope, index, resolver)?,
        location: node.location.clone(),
    })
}

/// Whether presets owned by `owner` run in every resolution: at the root,
/// or inside required steps that carry no condition.
fn always_applied(owner: Option<NodeId>, nodes: &[FlowNode]) -> bool {
    let mut current = owner;
    while let Some(id) = current {
        let node = &nodes[id.0];
        if node.condition.is_some() || !matches!(node.kind, NodeKind::Step { optional: false }) {
            return false;
        }
        current = node.parent;
    }
    true
}

/// Every input sits inside a step, and optional steps only hold inputs
/// that can be answered from a default.
fn check_steps(draft: &[DraftNode], nodes: &[FlowNode]) -> Result<()> {
    for node in nodes {
        let NodeKind::Input { default, .. } = &node.kind else {
            continue;
        };
        let mut step = None;
        let mut current = node.parent;
        while let Some(parent) = current {
            if nodes[parent.0].is_step() {
                step = Some(parent);
                break;
            }
            current = nodes[parent.0].parent;
        }

        let Some(step) = step else {
            return Err(invalid(
                &node.location,
                format!("input '{}' is not inside any flow-step", node.path),
            ));
        };
        let step_node = &nodes[step.0];
        if let NodeKind::Step { optional: true } = step_node.kind {
            if default.is_none() {
                return Err(invalid(
                    &node.location,
                    format!(
                        "input '{}' has no default, but its step '{}' (at {}) is optional",
                        node.path, step_node.id, draft[step.0].location
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn output_block(
    output: &DraftOutput,
    index: &Index<'_>,
    resolver: &PathResolver,
    transformations: &IndexMap<String, Transformation>,
    declaration: &mut usize,
) -> Result<OutputBlock> {
    let OutputDecl {
        condition,
        file_sets,
        model,
        location,
        ..
    } = &output.decl;

    let mut sets = Vec::with_capacity(file_sets.len());
    for set in file_sets {
        sets.push(file_set(set, output, index, resolver, transformations)?);
    }

    let mut entries = Vec::with_capacity(model.len());
    for entry in model {
        entries.push(model_entry(entry, output, index, resolver, declaration)?);
    }

    Ok(OutputBlock {
        owner: output.owner,
        condition: compile_condition(condition.as_deref(), &output.scope, index, resolver)?,
        file_sets: sets,
        model: entries,
        location: location.clone(),
    })
}

fn file_set(
    set: &FileSetDecl,
    output: &DraftOutput,
    index: &Index<'_>,
    resolver: &PathResolver,
    transformations: &IndexMap<String, Transformation>,
) -> Result<FileSet> {
    let engine = match &set.kind {
        FileSetKind::Templates { engine } => Some(check_engine(engine, &set.location)?),
        FileSetKind::Files => None,
    };
    for id in &set.transformations {
        if !transformations.contains_key(id) {
            return Err(invalid(
                &set.location,
                format!("unknown transformation '{id}'"),
            ));
        }
    }
    for pattern in set.includes.iter().chain(&set.excludes) {
        Glob::new(pattern).map_err(|e| ArchetypeError::GlobPattern {
            pattern: pattern.clone(),
            source: e,
        })?;
    }

    Ok(FileSet {
        engine,
        directory: output.dir.join(&set.directory),
        includes: set.includes.clone(),
        excludes: set.excludes.clone(),
        transformations: set.transformations.clone(),
        condition: compile_condition(set.condition.as_deref(), &output.scope, index, resolver)?,
        location: set.location.clone(),
    })
}

fn check_engine(engine: &str, location: &Location) -> Result<TemplateEngine> {
    TemplateEngine::from_name(engine).ok_or_else(|| {
        let supported: Vec<&str> = TemplateEngine::ALL.iter().map(|e| e.name()).collect();
        invalid(
            location,
            format!(
                "unsupported template engine '{engine}', expected one of: {}",
                supported.join(", ")
            ),
        )
    })
}

fn model_entry(
    entry: &ModelEntryDecl,
    output: &DraftOutput,
    index: &Index<'_>,
    resolver: &PathResolver,
    declaration: &mut usize,
) -> Result<ModelEntry> {
    let position = *declaration;
    *declaration += 1;

    let node = match &entry.node {
        ModelNodeDecl::Value {
            text,
            template,
            file,
        } => {
            let template = template
                .as_deref()
                .map(|engine| check_engine(engine, &entry.location))
                .transpose()?;
            let text = Interpolated::compile(text, &entry.location, &output.scope, resolver, index)?;
            ModelNode::Value(ModelValue {
                text,
                file: file.as_deref().map(|f| output.dir.join(f)),
                template,
            })
        }
        ModelNodeDecl::List(items) => ModelNode::List(
            items
                .iter()
                .map(|item| model_entry(item, output, index, resolver, declaration))
                .collect::<Result<_>>()?,
        ),
        ModelNodeDecl::Map(entries) => ModelNode::Map(
            entries
                .iter()
                .map(|child| model_entry(child, output, index, resolver, declaration))
                .collect::<Result<_>>()?,
        ),
    };

    Ok(ModelEntry {
        key: entry.key.clone(),
        order: entry.order.unwrap_or(DEFAULT_MODEL_ORDER),
        declaration: position,
        condition: compile_condition(entry.condition.as_deref(), &output.scope, index, resolver)?,
        node,
        location: entry.location.clone(),
    })
}

//! Expands the invoke graph into one arena of flow nodes.
//!
//! An `invoke` splices the target document's body in place, so its steps
//! and inputs land in the caller's scope. An `include` contributes only the
//! target's top-level outputs, owned by whatever encloses the include.
//! Nothing here resolves paths or checks types; the draft still carries
//! raw strings for [`super::validate`] to compile.

use std::path::PathBuf;

use super::loader::{DocId, InvokeGraph};
use super::model::{
    Directive, InputDecl, InputKind, Location, OptionDecl, OutputDecl, PresetDecl, SourceRef,
    StepDecl,
};
use super::{FlowItem, NodeId};
use crate::error::{ArchetypeError, Result};
use crate::path::ContextPath;

#[derive(Debug, Default)]
pub struct Draft {
    pub root: PathBuf,
    pub common_prefix: Option<String>,
    pub nodes: Vec<DraftNode>,
    pub flow: Vec<FlowItem>,
    pub presets: Vec<DraftPresets>,
    pub outputs: Vec<DraftOutput>,
}

#[derive(Debug, Clone)]
pub enum DraftKind {
    Step { optional: bool },
    Input { kind: InputKind, default: Option<String> },
    Option,
}

#[derive(Debug, Clone)]
pub struct DraftNode {
    pub id: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub kind: DraftKind,
    pub path: ContextPath,
    /// Scope the node's own `if` expression resolves against.
    pub scope: ContextPath,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub body: Vec<FlowItem>,
    pub condition: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct DraftPresets {
    pub owner: Option<NodeId>,
    pub scope: ContextPath,
    pub presets: Vec<PresetDecl>,
}

#[derive(Debug, Clone)]
pub struct DraftOutput {
    pub owner: Option<NodeId>,
    pub scope: ContextPath,
    /// Directory of the declaring document.
    pub dir: PathBuf,
    pub decl: OutputDecl,
}

pub fn link(graph: &InvokeGraph, root: DocId) -> Result<Draft> {
    let doc = graph.document(root);
    let mut linker = Linker {
        graph,
        draft: Draft {
            root: doc.path.clone(),
            common_prefix: doc.common_prefix.clone(),
            ..Draft::default()
        },
    };
    let flow = linker.body(root, &doc.body, None, &ContextPath::root())?;
    linker.draft.flow = flow;
    Ok(linker.draft)
}

struct Linker<'g> {
    graph: &'g InvokeGraph,
    draft: Draft,
}

impl Linker<'_> {
    fn body(
        &mut self,
        doc: DocId,
        directives: &[Directive],
        owner: Option<NodeId>,
        scope: &ContextPath,
    ) -> Result<Vec<FlowItem>> {
        let mut items = Vec::new();
        for directive in directives {
            match directive {
                Directive::Context(presets) => {
                    items.push(FlowItem::Presets(self.draft.presets.len()));
                    self.draft.presets.push(DraftPresets {
                        owner,
                        scope: scope.clone(),
                        presets: presets.clone(),
                    });
                }
                Directive::Step(step) => {
                    items.push(FlowItem::Node(self.step(doc, step, owner, scope)?));
                }
                Directive::Input(input) => {
                    items.push(FlowItem::Node(self.input(doc, input, owner, scope)?));
                }
                Directive::Invoke(source) => {
                    let target = self.target(doc, source)?;
                    let graph = self.graph;
                    items.extend(self.body(target, &graph.document(target).body, owner, scope)?);
                }
                Directive::Include(source) => {
                    let target = self.target(doc, source)?;
                    self.include(target, owner, scope)?;
                }
                Directive::Output(output) => self.output(doc, output, owner, scope),
            }
        }
        Ok(items)
    }

    fn include(&mut self, doc: DocId, owner: Option<NodeId>, scope: &ContextPath) -> Result<()> {
        let graph = self.graph;
        for directive in &graph.document(doc).body {
            match directive {
                Directive::Output(output) => self.output(doc, output, owner, scope),
                Directive::Include(source) => {
                    let target = self.target(doc, source)?;
                    self.include(target, owner, scope)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn output(&mut self, doc: DocId, output: &OutputDecl, owner: Option<NodeId>, scope: &ContextPath) {
        self.draft.outputs.push(DraftOutput {
            owner,
            scope: scope.clone(),
            dir: self.graph.document(doc).dir(),
            decl: output.clone(),
        });
    }

    fn target(&self, doc: DocId, source: &SourceRef) -> Result<DocId> {
        self.graph
            .target(doc, &source.src)
            .ok_or_else(|| ArchetypeError::DescriptorLoad {
                path: PathBuf::from(&source.src),
                reason: format!("not part of the descriptor graph (referenced from {})", source.location),
            })
    }

    fn add(&mut self, node: DraftNode) -> NodeId {
        let id = NodeId(self.draft.nodes.len());
        if let Some(parent) = node.parent {
            self.draft.nodes[parent.0].children.push(id);
        }
        self.draft.nodes.push(node);
        id
    }

    fn step(
        &mut self,
        doc: DocId,
        step: &StepDecl,
        owner: Option<NodeId>,
        scope: &ContextPath,
    ) -> Result<NodeId> {
        let id = self.add(DraftNode {
            id: step.id.clone(),
            label: step.label.clone(),
            help: step.help.clone(),
            kind: DraftKind::Step {
                optional: step.optional,
            },
            path: scope.clone(),
            scope: scope.clone(),
            parent: owner,
            children: Vec::new(),
            body: Vec::new(),
            condition: step.condition.clone(),
            location: step.location.clone(),
        });
        let body = self.body(doc, &step.body, Some(id), scope)?;
        self.draft.nodes[id.0].body = body;
        Ok(id)
    }

    fn input(
        &mut self,
        doc: DocId,
        input: &InputDecl,
        owner: Option<NodeId>,
        scope: &ContextPath,
    ) -> Result<NodeId> {
        let path = scope.child(&input.id);
        let id = self.add(DraftNode {
            id: input.id.clone(),
            label: input.label.clone(),
            help: input.help.clone(),
            kind: DraftKind::Input {
                kind: input.kind,
                default: input.default.clone(),
            },
            path: path.clone(),
            scope: scope.clone(),
            parent: owner,
            children: Vec::new(),
            body: Vec::new(),
            condition: input.condition.clone(),
            location: input.location.clone(),
        });

        let mut body = Vec::new();
        for option in &input.options {
            body.push(FlowItem::Node(self.option(doc, option, id, &path)?));
        }
        body.extend(self.body(doc, &input.body, Some(id), &path)?);
        self.draft.nodes[id.0].body = body;
        Ok(id)
    }

    fn option(
        &mut self,
        doc: DocId,
        option: &OptionDecl,
        input: NodeId,
        input_path: &ContextPath,
    ) -> Result<NodeId> {
        let path = input_path.child(&option.id);
        let id = self.add(DraftNode {
            id: option.id.clone(),
            label: option.label.clone(),
            help: option.help.clone(),
            kind: DraftKind::Option,
            path: path.clone(),
            scope: input_path.clone(),
            parent: Some(input),
            children: Vec::new(),
            body: Vec::new(),
            condition: option.condition.clone(),
            location: option.location.clone(),
        });
        let body = self.body(doc, &option.body, Some(id), &path)?;
        self.draft.nodes[id.0].body = body;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::descriptor::DescriptorCache;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(
            dir.join(name),
            format!("<archetype-flow>{body}</archetype-flow>"),
        )
        .unwrap();
    }

    fn link_root(dir: &Path) -> Draft {
        let mut cache = DescriptorCache::new();
        let (graph, root) = InvokeGraph::build(&mut cache, &dir.join("root.xml")).unwrap();
        link(&graph, root).unwrap()
    }

    fn paths(draft: &Draft) -> Vec<String> {
        draft.nodes.iter().map(|n| n.path.to_string()).collect()
    }

    #[test]
    fn invoke_expands_in_place_at_the_caller_scope() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "root.xml",
            r#"<flow-step id="s">
                 <flow-input id="media" type="boolean">
                   <invoke src="media.xml"/>
                 </flow-input>
               </flow-step>"#,
        );
        write(
            tmp.path(),
            "media.xml",
            r#"<flow-step id="m"><flow-input id="provider" type="text"/></flow-step>"#,
        );

        let draft = link_root(tmp.path());
        assert_eq!(paths(&draft), vec!["", "media", "media", "media.provider"]);
        let inner_step = &draft.nodes[2];
        assert_eq!(inner_step.parent, Some(NodeId(1)));
        assert_eq!(draft.nodes[1].children, vec![NodeId(2)]);
    }

    #[test]
    fn options_precede_nested_content() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "root.xml",
            r#"<flow-step id="s">
                 <flow-input id="tracing" type="select">
                   <flow-option id="zipkin">
                     <flow-input id="endpoint" type="text"/>
                   </flow-option>
                   <flow-option id="jaeger"/>
                 </flow-input>
               </flow-step>"#,
        );

        let draft = link_root(tmp.path());
        assert_eq!(
            paths(&draft),
            vec!["", "tracing", "tracing.zipkin", "tracing.zipkin.endpoint", "tracing.jaeger"]
        );
        assert_eq!(draft.nodes[3].scope.to_string(), "tracing.zipkin");
        assert_eq!(draft.nodes[1].body.len(), 2);
    }

    #[test]
    fn include_contributes_only_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "root.xml",
            r#"<flow-step id="s">
                 <flow-input id="web" type="boolean">
                   <include src="common.xml"/>
                 </flow-input>
               </flow-step>"#,
        );
        write(
            tmp.path(),
            "common.xml",
            r#"<flow-step id="ignored"/>
               <output><model><value key="k">v</value></model></output>
               <include src="more.xml"/>"#,
        );
        write(
            tmp.path(),
            "more.xml",
            r#"<output><model><value key="other">v</value></model></output>"#,
        );

        let draft = link_root(tmp.path());
        assert_eq!(draft.nodes.len(), 2);
        assert_eq!(draft.outputs.len(), 2);
        for output in &draft.outputs {
            assert_eq!(output.owner, Some(NodeId(1)));
            assert_eq!(output.scope.to_string(), "web");
        }
    }
}

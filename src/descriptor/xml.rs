//! Reads descriptor XML into [`Document`] declarations.
//!
//! roxmltree gives us an immutable arena of nodes; this pass only checks
//! structure (known elements, required attributes, attribute syntax).
//! Paths and expressions are left as raw strings for the validation pass.

use std::path::Path;

use roxmltree::Node;

use super::model::*;
use crate::error::{ArchetypeError, Result};

pub const ROOT_ELEMENT: &str = "archetype-flow";

pub fn parse_document(path: &Path, text: &str) -> Result<Document> {
    let xml = roxmltree::Document::parse(text).map_err(|e| ArchetypeError::DescriptorParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = Reader { path, xml: &xml };

    let root = xml.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(reader.invalid(
            root,
            format!(
                "expected <{ROOT_ELEMENT}> root element, found <{}>",
                root.tag_name().name()
            ),
        ));
    }

    Ok(Document {
        path: path.to_path_buf(),
        common_prefix: root.attribute("common-prefix").map(str::to_string),
        body: reader.body(root, Container::Document)?.directives,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Document,
    Step,
    BooleanInput,
    SelectInput,
    TextInput,
    Option,
}

impl Container {
    fn allows(self, element: &str) -> bool {
        match self {
            Container::Document => matches!(
                element,
                "flow-context" | "flow-step" | "flow-input" | "invoke" | "include" | "output"
            ),
            Container::Step | Container::BooleanInput | Container::Option => matches!(
                element,
                "help"
                    | "flow-context"
                    | "flow-step"
                    | "flow-input"
                    | "invoke"
                    | "include"
                    | "output"
            ),
            Container::SelectInput => matches!(element, "help" | "flow-option" | "output"),
            Container::TextInput => matches!(element, "help" | "output"),
        }
    }
}

#[derive(Default)]
struct Body {
    help: Option<String>,
    options: Vec<OptionDecl>,
    directives: Vec<Directive>,
}

struct Reader<'a, 'input> {
    path: &'a Path,
    xml: &'a roxmltree::Document<'input>,
}

impl<'a, 'input> Reader<'a, 'input> {
    fn location(&self, node: Node) -> Location {
        Location {
            file: self.path.to_path_buf(),
            line: self.xml.text_pos_at(node.range().start).row,
        }
    }

    fn invalid(&self, node: Node, reason: String) -> ArchetypeError {
        ArchetypeError::DescriptorValidation {
            location: self.location(node).to_string(),
            reason,
        }
    }

    fn required(&self, node: Node, name: &str) -> Result<String> {
        match node.attribute(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(self.invalid(
                node,
                format!(
                    "<{}> requires a non-empty '{name}' attribute",
                    node.tag_name().name()
                ),
            )),
        }
    }

    fn flag(&self, node: Node, name: &str) -> Result<bool> {
        match node.attribute(name) {
            None => Ok(false),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(self.invalid(
                node,
                format!("attribute '{name}' must be true or false, found '{other}'"),
            )),
        }
    }

    fn body(&self, parent: Node, container: Container) -> Result<Body> {
        let mut body = Body::default();
        for child in parent.children().filter(Node::is_element) {
            let name = child.tag_name().name();
            if !container.allows(name) {
                return Err(self.invalid(
                    child,
                    format!(
                        "<{name}> is not allowed inside <{}>",
                        parent.tag_name().name()
                    ),
                ));
            }
            match name {
                "help" => body.help = Some(text_of(child)),
                "flow-option" => body.options.push(self.option(child)?),
                "flow-context" => body.directives.push(Directive::Context(self.presets(child)?)),
                "flow-step" => body.directives.push(Directive::Step(self.step(child)?)),
                "flow-input" => body.directives.push(Directive::Input(self.input(child)?)),
                "invoke" => body.directives.push(Directive::Invoke(self.source_ref(child)?)),
                "include" => body.directives.push(Directive::Include(self.source_ref(child)?)),
                "output" => body.directives.push(Directive::Output(self.output(child)?)),
                _ => unreachable!("filtered by Container::allows"),
            }
        }
        Ok(body)
    }

    fn presets(&self, node: Node) -> Result<Vec<PresetDecl>> {
        let mut presets = Vec::new();
        for child in node.children().filter(Node::is_element) {
            if child.tag_name().name() != "preset" {
                return Err(self.invalid(
                    child,
                    format!(
                        "<{}> is not allowed inside <flow-context>",
                        child.tag_name().name()
                    ),
                ));
            }
            presets.push(PresetDecl {
                path: self.required(child, "path")?,
                value: child.attribute("value").unwrap_or_default().to_string(),
                location: self.location(child),
            });
        }
        Ok(presets)
    }

    fn source_ref(&self, node: Node) -> Result<SourceRef> {
        Ok(SourceRef {
            src: self.required(node, "src")?,
            location: self.location(node),
        })
    }

    fn step(&self, node: Node) -> Result<StepDecl> {
        let body = self.body(node, Container::Step)?;
        Ok(StepDecl {
            id: self.required(node, "id")?,
            label: node.attribute("label").map(str::to_string),
            help: body.help,
            optional: self.flag(node, "optional")?,
            condition: node.attribute("if").map(str::to_string),
            body: body.directives,
            location: self.location(node),
        })
    }

    fn input(&self, node: Node) -> Result<InputDecl> {
        let multiple = self.flag(node, "multiple")?;
        let (kind, container) = match node.attribute("type").unwrap_or("text") {
            "text" => (InputKind::Text, Container::TextInput),
            "boolean" | "option" => (InputKind::Boolean, Container::BooleanInput),
            "select" => (InputKind::Select { multiple }, Container::SelectInput),
            other => {
                return Err(self.invalid(
                    node,
                    format!("unknown input type '{other}', expected text, boolean or select"),
                ))
            }
        };
        if multiple && !matches!(kind, InputKind::Select { .. }) {
            return Err(self.invalid(node, "'multiple' only applies to select inputs".into()));
        }

        let body = self.body(node, container)?;
        Ok(InputDecl {
            id: self.required(node, "id")?,
            label: node.attribute("label").map(str::to_string),
            help: body.help,
            kind,
            default: node.attribute("default").map(str::to_string),
            condition: node.attribute("if").map(str::to_string),
            options: body.options,
            body: body.directives,
            location: self.location(node),
        })
    }

    fn option(&self, node: Node) -> Result<OptionDecl> {
        let body = self.body(node, Container::Option)?;
        Ok(OptionDecl {
            id: self.required(node, "id")?,
            label: node.attribute("label").map(str::to_string),
            help: body.help,
            condition: node.attribute("if").map(str::to_string),
            body: body.directives,
            location: self.location(node),
        })
    }

    fn output(&self, node: Node) -> Result<OutputDecl> {
        let mut output = OutputDecl {
            condition: node.attribute("if").map(str::to_string),
            transformations: Vec::new(),
            file_sets: Vec::new(),
            model: Vec::new(),
            location: self.location(node),
        };

        for child in node.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "transformation" => output.transformations.push(self.transformation(child)?),
                "templates" => {
                    let engine = child.attribute("engine").unwrap_or("tera").to_string();
                    output
                        .file_sets
                        .push(self.file_set(child, FileSetKind::Templates { engine })?);
                }
                "files" => output.file_sets.push(self.file_set(child, FileSetKind::Files)?),
                "model" => {
                    for entry in child.children().filter(Node::is_element) {
                        output.model.push(self.model_entry(entry, true)?);
                    }
                }
                other => {
                    return Err(self.invalid(
                        child,
                        format!("<{other}> is not allowed inside <output>"),
                    ))
                }
            }
        }
        Ok(output)
    }

    fn transformation(&self, node: Node) -> Result<TransformationDecl> {
        let mut replacements = Vec::new();
        for child in node.children().filter(Node::is_element) {
            if child.tag_name().name() != "replace" {
                return Err(self.invalid(
                    child,
                    format!(
                        "<{}> is not allowed inside <transformation>",
                        child.tag_name().name()
                    ),
                ));
            }
            replacements.push(ReplaceDecl {
                regex: self.required(child, "regex")?,
                replacement: child.attribute("replacement").unwrap_or_default().to_string(),
            });
        }
        Ok(TransformationDecl {
            id: self.required(node, "id")?,
            replacements,
            location: self.location(node),
        })
    }

    fn file_set(&self, node: Node, kind: FileSetKind) -> Result<FileSetDecl> {
        let mut directory = None;
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for child in node.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "directory" => directory = Some(text_of(child)),
                "includes" => includes.extend(self.patterns(child, "include")?),
                "excludes" => excludes.extend(self.patterns(child, "exclude")?),
                other => {
                    return Err(self.invalid(
                        child,
                        format!(
                            "<{other}> is not allowed inside <{}>",
                            node.tag_name().name()
                        ),
                    ))
                }
            }
        }

        let directory = directory.filter(|d| !d.is_empty()).ok_or_else(|| {
            self.invalid(
                node,
                format!("<{}> requires a <directory>", node.tag_name().name()),
            )
        })?;

        Ok(FileSetDecl {
            kind,
            directory,
            includes,
            excludes,
            transformations: node
                .attribute("transformations")
                .map(split_list)
                .unwrap_or_default(),
            condition: node.attribute("if").map(str::to_string),
            location: self.location(node),
        })
    }

    fn patterns(&self, node: Node, item: &str) -> Result<Vec<String>> {
        let mut patterns = Vec::new();
        for child in node.children().filter(Node::is_element) {
            if child.tag_name().name() != item {
                return Err(self.invalid(
                    child,
                    format!(
                        "<{}> is not allowed inside <{}>",
                        child.tag_name().name(),
                        node.tag_name().name()
                    ),
                ));
            }
            patterns.push(text_of(child));
        }
        Ok(patterns)
    }

    fn model_entry(&self, node: Node, keyed: bool) -> Result<ModelEntryDecl> {
        let key = node.attribute("key").map(str::to_string);
        if keyed && key.is_none() {
            return Err(self.invalid(
                node,
                format!("<{}> requires a 'key' attribute here", node.tag_name().name()),
            ));
        }
        if !keyed && key.is_some() {
            return Err(self.invalid(node, "list items cannot have a 'key'".into()));
        }

        let order = match node.attribute("order") {
            None => None,
            Some(raw) => Some(raw.trim().parse::<i32>().map_err(|_| {
                self.invalid(node, format!("'order' must be an integer, found '{raw}'"))
            })?),
        };

        let model_node = match node.tag_name().name() {
            "value" => ModelNodeDecl::Value {
                text: text_of(node),
                template: node.attribute("template").map(str::to_string),
                file: node.attribute("file").map(str::to_string),
            },
            "list" => ModelNodeDecl::List(
                node.children()
                    .filter(Node::is_element)
                    .map(|c| self.model_entry(c, false))
                    .collect::<Result<_>>()?,
            ),
            "map" => ModelNodeDecl::Map(
                node.children()
                    .filter(Node::is_element)
                    .map(|c| self.model_entry(c, true))
                    .collect::<Result<_>>()?,
            ),
            other => {
                return Err(self.invalid(
                    node,
                    format!("<{other}> is not a model entry, expected value, list or map"),
                ))
            }
        };

        Ok(ModelEntryDecl {
            key,
            order,
            condition: node.attribute("if").map(str::to_string),
            node: model_node,
            location: self.location(node),
        })
    }
}

fn text_of(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<Document> {
        parse_document(Path::new("test.xml"), xml)
    }

    #[test]
    fn parses_steps_inputs_and_options() {
        let doc = parse(
            r#"<archetype-flow common-prefix="app">
                 <flow-step id="tracing" label="Tracing">
                   <help>Pick a tracer</help>
                   <flow-input id="tracer" type="select">
                     <flow-option id="zipkin" label="Zipkin"/>
                     <flow-option id="jaeger"/>
                   </flow-input>
                 </flow-step>
               </archetype-flow>"#,
        )
        .unwrap();

        assert_eq!(doc.common_prefix.as_deref(), Some("app"));
        let Directive::Step(step) = &doc.body[0] else {
            panic!("expected a step");
        };
        assert_eq!(step.help.as_deref(), Some("Pick a tracer"));
        let Directive::Input(input) = &step.body[0] else {
            panic!("expected an input");
        };
        assert_eq!(input.kind, InputKind::Select { multiple: false });
        assert_eq!(input.options.len(), 2);
        assert_eq!(input.options[0].label.as_deref(), Some("Zipkin"));
    }

    #[test]
    fn parses_output_block() {
        let doc = parse(
            r#"<archetype-flow>
                 <output if="${x}">
                   <transformation id="mustache">
                     <replace regex="\.mustache$" replacement=""/>
                   </transformation>
                   <templates engine="tera" transformations="mustache, packaged">
                     <directory>files</directory>
                     <includes><include>**/*.mustache</include></includes>
                     <excludes><exclude>**/skip/**</exclude></excludes>
                   </templates>
                   <model>
                     <value key="name" order="10">demo</value>
                     <list key="deps"><value>a</value><map><value key="g">x</value></map></list>
                   </model>
                 </output>
               </archetype-flow>"#,
        )
        .unwrap();

        let Directive::Output(output) = &doc.body[0] else {
            panic!("expected an output");
        };
        assert_eq!(output.transformations[0].replacements[0].regex, r"\.mustache$");
        let set = &output.file_sets[0];
        assert_eq!(set.transformations, vec!["mustache", "packaged"]);
        assert_eq!(set.includes, vec!["**/*.mustache"]);
        assert_eq!(set.excludes, vec!["**/skip/**"]);
        assert_eq!(output.model[0].order, Some(10));
        assert!(matches!(output.model[1].node, ModelNodeDecl::List(ref items) if items.len() == 2));
    }

    #[test]
    fn rejects_unknown_elements_with_location() {
        let err = parse("<archetype-flow>\n  <flow-bogus/>\n</archetype-flow>").unwrap_err();
        match err {
            ArchetypeError::DescriptorValidation { location, .. } => {
                assert_eq!(location, "test.xml:2")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_options_outside_select() {
        let result = parse(
            r#"<archetype-flow><flow-step id="s">
                 <flow-input id="name" type="text"><flow-option id="x"/></flow-input>
               </flow-step></archetype-flow>"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_keyed_list_items() {
        let result = parse(
            r#"<archetype-flow><output><model>
                 <list key="deps"><value key="oops">a</value></list>
               </model></output></archetype-flow>"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn reports_malformed_xml() {
        assert!(matches!(
            parse("<archetype-flow>"),
            Err(ArchetypeError::DescriptorParse { .. })
        ));
    }
}

//! Declarations of a single descriptor document, as read from XML and
//! before any invoke is expanded or any path is resolved.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    /// Canonical path of the file.
    pub path: PathBuf,
    pub common_prefix: Option<String>,
    pub body: Vec<Directive>,
}

impl Document {
    /// Directory that `invoke`/`include` sources and output directories are
    /// relative to.
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub enum Directive {
    Context(Vec<PresetDecl>),
    Step(StepDecl),
    Input(InputDecl),
    Invoke(SourceRef),
    Include(SourceRef),
    Output(OutputDecl),
}

#[derive(Debug, Clone)]
pub struct PresetDecl {
    pub path: String,
    pub value: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct SourceRef {
    pub src: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct StepDecl {
    pub id: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub optional: bool,
    pub condition: Option<String>,
    pub body: Vec<Directive>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Boolean,
    Select { multiple: bool },
}

impl InputKind {
    pub fn name(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Boolean => "boolean",
            InputKind::Select { multiple: false } => "select",
            InputKind::Select { multiple: true } => "multi-select",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputDecl {
    pub id: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub kind: InputKind,
    pub default: Option<String>,
    pub condition: Option<String>,
    pub options: Vec<OptionDecl>,
    pub body: Vec<Directive>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct OptionDecl {
    pub id: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub condition: Option<String>,
    pub body: Vec<Directive>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct OutputDecl {
    pub condition: Option<String>,
    pub transformations: Vec<TransformationDecl>,
    pub file_sets: Vec<FileSetDecl>,
    pub model: Vec<ModelEntryDecl>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct TransformationDecl {
    pub id: String,
    pub replacements: Vec<ReplaceDecl>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ReplaceDecl {
    pub regex: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSetKind {
    /// Rendered by the template engine named here.
    Templates { engine: String },
    /// Copied verbatim.
    Files,
}

#[derive(Debug, Clone)]
pub struct FileSetDecl {
    pub kind: FileSetKind,
    pub directory: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub transformations: Vec<String>,
    pub condition: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ModelEntryDecl {
    /// Required for top-level and map entries, absent for list items.
    pub key: Option<String>,
    pub order: Option<i32>,
    pub condition: Option<String>,
    pub node: ModelNodeDecl,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum ModelNodeDecl {
    Value {
        text: String,
        template: Option<String>,
        file: Option<String>,
    },
    List(Vec<ModelEntryDecl>),
    Map(Vec<ModelEntryDecl>),
}

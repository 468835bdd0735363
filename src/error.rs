#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ArchetypeError {
    #[error("Failed to load descriptor {path}: {reason}")]
    #[diagnostic(help("Check that the file exists and that invoke/include 'src' paths are relative to the declaring descriptor"))]
    DescriptorLoad { path: PathBuf, reason: String },

    #[error("Failed to parse descriptor {path}")]
    #[diagnostic(help("Check the XML syntax of the descriptor"))]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Cyclic invoke detected: {}", chain.join(" -> "))]
    #[diagnostic(help("Remove the circular invoke/include between these descriptors"))]
    CyclicInvoke { chain: Vec<String> },

    #[error("Invalid descriptor {location}: {reason}")]
    DescriptorValidation { location: String, reason: String },

    #[error("Invalid path '{path}' in scope '{scope}': {reason}")]
    #[diagnostic(help("Use a declared input path, ROOT.<path> or PARENT.<path>"))]
    InvalidPath {
        path: String,
        scope: String,
        reason: String,
    },

    #[error("Syntax error in expression '{expr}' at offset {offset}: {reason}")]
    ExpressionSyntax {
        expr: String,
        offset: usize,
        reason: String,
    },

    #[error("Type error in expression '{expr}': {reason}")]
    ExpressionType { expr: String, reason: String },

    #[error("Expression evaluation failed for '{path}': {reason}")]
    #[diagnostic(help("This indicates a descriptor validation gap; please report it"))]
    ExpressionEvaluation { path: String, reason: String },

    #[error("Cannot change read-only value at '{path}' from '{current}' to '{attempted}'")]
    ReadOnlyViolation {
        path: String,
        current: String,
        attempted: String,
    },

    #[error("Output resolution failed: {reason}")]
    OutputResolution { reason: String },

    #[error("No value provided for required input '{path}'")]
    #[diagnostic(help("Pass it with --input {path}=<value> or run interactively"))]
    MissingInput { path: String },

    #[error("Invalid value for input '{path}': {reason}")]
    InvalidInput { path: String, reason: String },

    #[error("Step '{step}' is not the active step")]
    StepNotActive { step: String },

    #[error("Cannot continue step '{step}': input '{path}' has no value")]
    CannotContinue { step: String, path: String },

    #[error("Step '{step}' is not optional and cannot be skipped")]
    StepNotOptional { step: String },

    #[error("Prompt cancelled by user")]
    PromptCancelled,

    #[error("Failed to parse {path}")]
    #[diagnostic(help("Check the TOML syntax in your archetype.toml file"))]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    #[error("Glob pattern error: {pattern}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to render {name}")]
    #[diagnostic(help("Check your Tera template syntax"))]
    RenderError {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("Failed to render {name}")]
    #[diagnostic(help("Check your Mustache template syntax"))]
    MustacheError {
        name: String,
        #[source]
        source: mustache::Error,
    },

    #[error("Output directory already exists: {path}")]
    #[diagnostic(help("Use --overwrite to replace the existing directory"))]
    OutputExists { path: PathBuf },

    #[error("Malformed choices file {path}")]
    #[diagnostic(help("Choices files use the Java properties format"))]
    ChoicesFile {
        path: PathBuf,
        #[source]
        source: java_properties::PropertiesError,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArchetypeError>;

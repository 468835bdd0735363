use std::path::Path;

use walkdir::WalkDir;

use crate::config::load_config;
use crate::descriptor::{Archetype, DescriptorCache, FileSet, ModelEntry, ModelNode};
use crate::error::Result;
use crate::output::build_glob_set;
use crate::render::file::is_binary_file;
use crate::render::TemplateEngine;

/// Result of validating an archetype.
pub struct CheckResult {
    pub descriptor: String,
    pub step_count: usize,
    pub input_count: usize,
    pub output_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Validate an archetype directory.
///
/// Configuration errors are returned as `Err`; everything found in the
/// descriptors and their template sets is collected into the result.
pub fn check_archetype(archetype_dir: &Path) -> Result<CheckResult> {
    let config = load_config(archetype_dir)?;
    let descriptor = archetype_dir.join(&config.archetype.descriptor);

    let mut result = CheckResult {
        descriptor: config.archetype.descriptor.clone(),
        step_count: 0,
        input_count: 0,
        output_count: 0,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    if !descriptor.is_file() {
        result.errors.push(format!(
            "Root descriptor not found: {}",
            descriptor.display()
        ));
        return Ok(result);
    }

    let archetype = match Archetype::load(&descriptor, &mut DescriptorCache::new(), &config) {
        Ok(archetype) => archetype,
        Err(e) => {
            result.errors.push(e.to_string());
            return Ok(result);
        }
    };

    let steps = archetype.steps();
    result.step_count = steps.len();
    result.input_count = archetype
        .nodes()
        .filter(|(_, node)| node.input_kind().is_some())
        .count();
    result.output_count = archetype.outputs().len();

    for step in steps {
        if archetype.step_inputs(step).is_empty() {
            result.warnings.push(format!(
                "Step '{}' declares no inputs",
                archetype.node(step).id
            ));
        }
    }

    for block in archetype.outputs() {
        if block.file_sets.is_empty() && block.model.is_empty() {
            result
                .warnings
                .push(format!("Output at {} is empty", block.location));
        }
        for set in &block.file_sets {
            check_file_set(set, &mut result.warnings, &mut result.errors);
        }
        for entry in &block.model {
            check_model_entry(entry, &mut result.warnings, &mut result.errors);
        }
    }

    Ok(result)
}

fn check_file_set(set: &FileSet, warnings: &mut Vec<String>, errors: &mut Vec<String>) {
    if !set.directory.is_dir() {
        errors.push(format!(
            "Directory {} declared at {} not found",
            set.directory.display(),
            set.location
        ));
        return;
    }
    let Some(engine) = set.engine else {
        return;
    };

    let (includes, excludes) = match (build_glob_set(&set.includes), build_glob_set(&set.excludes))
    {
        (Ok(includes), Ok(excludes)) => (includes, excludes),
        (Err(e), _) | (_, Err(e)) => {
            errors.push(format!("{e} at {}", set.location));
            return;
        }
    };

    let walker = WalkDir::new(&set.directory)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok());
    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(&set.directory).unwrap_or(path);
        if (!set.includes.is_empty() && !includes.is_match(rel)) || excludes.is_match(rel) {
            continue;
        }
        if is_binary_file(path) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => {
                if let Err(e) = engine.check_syntax(&content) {
                    errors.push(format!(
                        "{} syntax error in {}: {e}",
                        engine_title(engine),
                        rel.display()
                    ));
                }
            }
            Err(e) => {
                warnings.push(format!("Could not read {}: {e}", rel.display()));
            }
        }
    }
}

fn check_model_entry(entry: &ModelEntry, warnings: &mut Vec<String>, errors: &mut Vec<String>) {
    match &entry.node {
        ModelNode::Value(value) => {
            let text = match &value.file {
                Some(file) => match std::fs::read_to_string(file) {
                    Ok(text) => text,
                    Err(e) => {
                        errors.push(format!(
                            "Model file {} declared at {}: {e}",
                            file.display(),
                            entry.location
                        ));
                        return;
                    }
                },
                None => value.text.source().to_string(),
            };
            if let Some(engine) = value.template {
                if let Err(e) = engine.check_syntax(&text) {
                    errors.push(format!(
                        "{} syntax error in model value at {}: {e}",
                        engine_title(engine),
                        entry.location
                    ));
                }
            }
        }
        ModelNode::List(items) | ModelNode::Map(items) => {
            for item in items {
                check_model_entry(item, warnings, errors);
            }
        }
    }
}

fn engine_title(engine: TemplateEngine) -> &'static str {
    match engine {
        TemplateEngine::Tera => "Tera",
        TemplateEngine::Mustache => "Mustache",
    }
}

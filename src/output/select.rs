use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use super::merge::{merge_model, MergedModel};
use crate::choices::ChoiceTree;
use crate::descriptor::{Archetype, FileSet, OutputBlock};
use crate::error::{ArchetypeError, Result};
use crate::render::TemplateEngine;

/// A file the renderer should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFileEntry {
    /// Absolute source file.
    pub source: PathBuf,
    /// Target path relative to the output directory, after transformations.
    pub target: PathBuf,
    /// Engine rendering the file; `None` copies it.
    pub engine: Option<TemplateEngine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedOutputs {
    pub files: Vec<ResolvedFileEntry>,
    pub model: MergedModel,
}

/// Select the output blocks enabled by `tree`, expand their file sets and
/// merge their model entries.
pub fn select_outputs(archetype: &Archetype, tree: &ChoiceTree) -> Result<SelectedOutputs> {
    let mut blocks = Vec::new();
    for block in archetype.outputs() {
        if block_enabled(archetype, block, tree)? {
            blocks.push(block);
        } else {
            debug!(location = %block.location, "output block disabled");
        }
    }

    let mut files: IndexMap<PathBuf, ResolvedFileEntry> = IndexMap::new();
    for block in &blocks {
        for set in &block.file_sets {
            if let Some(condition) = &set.condition {
                if !condition.eval(tree)? {
                    continue;
                }
            }
            for entry in expand_file_set(archetype, set, tree)? {
                if let Some(previous) = files.shift_remove(&entry.target) {
                    debug!(
                        file = %entry.target.display(),
                        replaced = %previous.source.display(),
                        "later file set overrides target"
                    );
                }
                files.insert(entry.target.clone(), entry);
            }
        }
    }

    let model = merge_model(blocks.iter().flat_map(|b| b.model.iter()), tree)?;

    Ok(SelectedOutputs {
        files: files.into_values().collect(),
        model,
    })
}

fn block_enabled(archetype: &Archetype, block: &OutputBlock, tree: &ChoiceTree) -> Result<bool> {
    if !archetype.content_active(block.owner, tree)? {
        return Ok(false);
    }
    match &block.condition {
        Some(condition) => condition.eval(tree),
        None => Ok(true),
    }
}

fn expand_file_set(
    archetype: &Archetype,
    set: &FileSet,
    tree: &ChoiceTree,
) -> Result<Vec<ResolvedFileEntry>> {
    if !set.directory.is_dir() {
        return Err(ArchetypeError::OutputResolution {
            reason: format!(
                "directory {} declared at {} does not exist",
                set.directory.display(),
                set.location
            ),
        });
    }

    let includes = compile_each(&set.includes)?;
    let excludes = build_glob_set(&set.excludes)?;
    let mut matched = vec![false; includes.len()];
    let mut entries = Vec::new();

    for entry in WalkDir::new(&set.directory)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(rel_path) = entry.path().strip_prefix(&set.directory) else {
            continue;
        };
        let rel = slash_path(rel_path);

        let included = if includes.is_empty() {
            true
        } else {
            let mut any = false;
            for (i, matcher) in includes.iter().enumerate() {
                if matcher.is_match(&rel) {
                    matched[i] = true;
                    any = true;
                }
            }
            any
        };
        if !included || excludes.is_match(&rel) {
            continue;
        }

        let mut target = rel;
        for id in &set.transformations {
            let transformation =
                archetype
                    .transformation(id)
                    .ok_or_else(|| ArchetypeError::OutputResolution {
                        reason: format!("unknown transformation '{id}'"),
                    })?;
            target = transformation.apply(&target, tree)?;
        }
        let target = PathBuf::from(target);
        if !stays_inside(&target) {
            return Err(ArchetypeError::OutputResolution {
                reason: format!(
                    "{} from {} at {} maps to '{}', outside the output directory",
                    rel_path.display(),
                    set.directory.display(),
                    set.location,
                    target.display()
                ),
            });
        }

        entries.push(ResolvedFileEntry {
            source: entry.path().to_path_buf(),
            target,
            engine: set.engine,
        });
    }

    if let Some(i) = matched.iter().position(|m| !m) {
        return Err(ArchetypeError::OutputResolution {
            reason: format!(
                "include pattern '{}' at {} matched no files in {}",
                set.includes[i],
                set.location,
                set.directory.display()
            ),
        });
    }

    Ok(entries)
}

/// Whether `target` names a file below the directory it is joined to:
/// relative, without `..`, and not empty.
pub(crate) fn stays_inside(target: &Path) -> bool {
    let mut named = false;
    for component in target.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    named
}

/// Relative path with `/` separators, the form globs and transformations see.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn compile_each(patterns: &[String]) -> Result<Vec<GlobMatcher>> {
    patterns
        .iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map(|g| g.compile_matcher())
                .map_err(|e| ArchetypeError::GlobPattern {
                    pattern: pattern.clone(),
                    source: e,
                })
        })
        .collect()
}

pub(crate) fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ArchetypeError::GlobPattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ArchetypeError::GlobPattern {
        pattern: "<combined>".into(),
        source: e,
    })
}

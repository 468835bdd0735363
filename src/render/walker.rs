use std::path::{Path, PathBuf};

use tracing::debug;

use crate::choices::ChoiceTree;
use crate::error::{ArchetypeError, Result};
use crate::output::{stays_inside, SelectedOutputs};
use crate::render::context::build_context;
use crate::render::file::{is_binary_file, render_file_content};

pub struct GeneratedProject {
    pub output_dir: PathBuf,
    pub files_created: Vec<PathBuf>,
    pub files_copied: Vec<PathBuf>,
}

/// A file that would be created during generation.
pub struct PlannedFile {
    /// Path relative to the output directory.
    pub relative_path: PathBuf,
    /// The file content (rendered template or copied bytes).
    pub content: Vec<u8>,
    /// Whether this file was copied verbatim (true) or rendered from a template (false).
    pub is_copy: bool,
}

/// The result of planning a generation without writing to disk.
pub struct GenerationPlan {
    pub files: Vec<PlannedFile>,
}

/// Render or read every selected file into memory without writing.
pub fn plan_render(outputs: &SelectedOutputs, tree: &ChoiceTree) -> Result<GenerationPlan> {
    let context = build_context(&outputs.model, tree);
    let mut files = Vec::with_capacity(outputs.files.len());

    for entry in &outputs.files {
        let source = &entry.source;
        let engine = match entry.engine {
            Some(engine) if !is_binary_file(source) => engine,
            _ => {
                let content = std::fs::read(source).map_err(|e| ArchetypeError::Io {
                    context: format!("reading {}", source.display()),
                    source: e,
                })?;
                files.push(PlannedFile {
                    relative_path: entry.target.clone(),
                    content,
                    is_copy: true,
                });
                continue;
            }
        };

        let content = std::fs::read_to_string(source).map_err(|e| ArchetypeError::Io {
            context: format!("reading {}", source.display()),
            source: e,
        })?;
        let name = entry.target.to_string_lossy();
        debug!(file = %name, engine = %engine, "rendering template");
        let rendered = render_file_content(&name, &content, engine, &context)?;
        files.push(PlannedFile {
            relative_path: entry.target.clone(),
            content: rendered.into_bytes(),
            is_copy: false,
        });
    }

    Ok(GenerationPlan { files })
}

/// Write the files from a generation plan to disk.
pub fn execute_plan(plan: &GenerationPlan, output_dir: &Path) -> Result<GeneratedProject> {
    let mut files_created = Vec::new();
    let mut files_copied = Vec::new();

    for file in &plan.files {
        if !stays_inside(&file.relative_path) {
            return Err(ArchetypeError::OutputResolution {
                reason: format!(
                    "refusing to write {} outside {}",
                    file.relative_path.display(),
                    output_dir.display()
                ),
            });
        }
        let dest_path = output_dir.join(&file.relative_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArchetypeError::Io {
                context: format!("creating directory {}", parent.display()),
                source: e,
            })?;
        }
        std::fs::write(&dest_path, &file.content).map_err(|e| ArchetypeError::Io {
            context: format!("writing {}", dest_path.display()),
            source: e,
        })?;
        if file.is_copy {
            files_copied.push(file.relative_path.clone());
        } else {
            files_created.push(file.relative_path.clone());
        }
    }

    Ok(GeneratedProject {
        output_dir: output_dir.to_path_buf(),
        files_created,
        files_copied,
    })
}

pub mod check;
pub mod choices;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod expr;
pub mod flow;
pub mod output;
pub mod path;
pub mod prompt;
pub mod render;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::choices::{read_choices, write_choices, ChoiceTree};
use crate::config::{load_config, EngineConfig};
use crate::descriptor::{Archetype, DescriptorCache};
use crate::error::{ArchetypeError, Result};
use crate::flow::{resolve_batch, resolve_interactive, Prompter, Session};
use crate::output::{select_outputs, SelectedOutputs};
use crate::render::{execute_plan, plan_render, GeneratedProject, GenerationPlan};

/// Where externally supplied values come from.
#[derive(Debug, Clone, Default)]
pub struct ExternalInputs {
    /// `path=value` pairs; these win over the choices file.
    pub values: Vec<(String, String)>,
    /// A previously written choices file to replay.
    pub choices_file: Option<PathBuf>,
}

pub struct GenerateOptions {
    pub archetype: PathBuf,
    pub output: Option<PathBuf>,
    pub inputs: ExternalInputs,
    pub overwrite: bool,
}

/// An archetype loaded from its directory together with its configuration.
pub struct LoadedArchetype {
    pub config: EngineConfig,
    pub archetype: Archetype,
}

/// Everything needed to execute a generation that has been planned but not yet written.
pub struct FullGenerationPlan {
    pub render_plan: GenerationPlan,
    pub output_dir: PathBuf,
    pub choices: ChoiceTree,
    pub config: EngineConfig,
}

/// Load `archetype.toml` and the root descriptor of an archetype directory.
pub fn load_archetype(archetype_dir: &Path) -> Result<LoadedArchetype> {
    let config = load_config(archetype_dir)?;
    let descriptor = archetype_dir.join(&config.archetype.descriptor);
    let archetype = Archetype::load(&descriptor, &mut DescriptorCache::new(), &config)?;
    info!(
        descriptor = %descriptor.display(),
        nodes = archetype.node_count(),
        "archetype loaded"
    );
    Ok(LoadedArchetype { config, archetype })
}

/// Collect external values: the choices file first, then explicit pairs,
/// later entries replacing earlier ones for the same key.
pub fn collect_externals(inputs: &ExternalInputs, config: &EngineConfig) -> Result<Vec<(String, String)>> {
    let mut values: IndexMap<String, String> = IndexMap::new();
    if let Some(file) = &inputs.choices_file {
        let persisted = read_choices(file, &config.choices.prefix)?;
        for key in persisted.other.keys() {
            debug!(key = %key, "ignoring non-flow key in choices file");
        }
        values.extend(persisted.choices);
    }
    values.extend(inputs.values.iter().cloned());
    Ok(values.into_iter().collect())
}

/// Run a resolution session to completion. Without a prompter every value
/// must come from `externals`, presets or defaults.
pub fn resolve_choices(
    archetype: &Archetype,
    externals: &[(String, String)],
    prompter: Option<&mut dyn Prompter>,
) -> Result<ChoiceTree> {
    let mut session = Session::new(archetype);
    session.apply_externals(externals.iter().map(|(k, v)| (k, v)))?;
    match prompter {
        Some(prompter) => resolve_interactive(&mut session, prompter)?,
        None => resolve_batch(&mut session)?,
    }
    Ok(session.into_choices())
}

/// Resolve in batch mode and select outputs, without rendering anything.
pub fn plan_outputs(archetype_dir: &Path, inputs: &ExternalInputs) -> Result<SelectedOutputs> {
    let loaded = load_archetype(archetype_dir)?;
    let externals = collect_externals(inputs, &loaded.config)?;
    let tree = resolve_choices(&loaded.archetype, &externals, None)?;
    select_outputs(&loaded.archetype, &tree)
}

/// Plan a project generation: load the archetype, resolve choices, select
/// outputs and render in memory.
///
/// This does **not** write any files to disk.
pub fn plan_generation(
    options: GenerateOptions,
    prompter: Option<&mut dyn Prompter>,
) -> Result<FullGenerationPlan> {
    let output_dir = match options.output {
        Some(out) => out,
        None => std::env::current_dir().map_err(|e| ArchetypeError::Io {
            context: "getting current directory".into(),
            source: e,
        })?,
    };

    if output_dir.exists() && !options.overwrite {
        // An empty dir is fine
        let has_contents = std::fs::read_dir(&output_dir)
            .map(|mut d| d.next().is_some())
            .unwrap_or(false);
        if has_contents {
            return Err(ArchetypeError::OutputExists { path: output_dir });
        }
    }

    let LoadedArchetype { config, archetype } = load_archetype(&options.archetype)?;
    let externals = collect_externals(&options.inputs, &config)?;
    let choices = resolve_choices(&archetype, &externals, prompter)?;
    let outputs = select_outputs(&archetype, &choices)?;
    info!(
        files = outputs.files.len(),
        model_keys = outputs.model.len(),
        "outputs selected"
    );
    let render_plan = plan_render(&outputs, &choices)?;

    Ok(FullGenerationPlan {
        render_plan,
        output_dir,
        choices,
        config,
    })
}

/// Execute a previously planned generation: write files and the choices file.
pub fn execute_generation(plan: FullGenerationPlan) -> Result<GeneratedProject> {
    std::fs::create_dir_all(&plan.output_dir).map_err(|e| ArchetypeError::Io {
        context: format!("creating output directory {}", plan.output_dir.display()),
        source: e,
    })?;

    let result = execute_plan(&plan.render_plan, &plan.output_dir)?;

    write_choices(
        &plan.output_dir.join(&plan.config.choices.file),
        &plan.choices,
        &plan.config.choices.prefix,
    )?;

    Ok(result)
}

/// Generate a project from an archetype.
pub fn generate(
    options: GenerateOptions,
    prompter: Option<&mut dyn Prompter>,
) -> Result<GeneratedProject> {
    let plan = plan_generation(options, prompter)?;
    execute_generation(plan)
}

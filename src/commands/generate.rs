use std::path::PathBuf;

use console::style;
use miette::Result;

use archetype_flow::flow::Prompter;
use archetype_flow::prompt::InquirePrompter;
use archetype_flow::{FullGenerationPlan, GenerateOptions};

use super::external_inputs;
use crate::cli::InputArgs;

pub fn run(
    archetype: PathBuf,
    output: Option<PathBuf>,
    inputs: InputArgs,
    batch: bool,
    dry_run: bool,
    overwrite: bool,
) -> Result<()> {
    let options = GenerateOptions {
        archetype,
        output,
        inputs: external_inputs(inputs)?,
        overwrite,
    };

    let mut prompter = InquirePrompter::new();
    let prompter: Option<&mut dyn Prompter> = if batch { None } else { Some(&mut prompter) };

    if dry_run {
        let plan = archetype_flow::plan_generation(options, prompter)?;
        print_plan(&plan);
        return Ok(());
    }

    let result = archetype_flow::generate(options, prompter)?;

    println!(
        "\n{} Project generated at {}",
        style("✓").green().bold(),
        style(result.output_dir.display()).cyan()
    );
    println!(
        "  {} files rendered, {} files copied",
        result.files_created.len(),
        result.files_copied.len()
    );

    Ok(())
}

fn print_plan(plan: &FullGenerationPlan) {
    println!("\n{} Resolved choices:", style("==>").cyan().bold());
    for node in plan.choices.iter() {
        let marker = if node.read_only {
            " (preset)"
        } else if node.external {
            " (input)"
        } else {
            ""
        };
        println!(
            "  {} = {}{}",
            style(&node.path).bold(),
            node.value,
            style(marker).dim()
        );
    }

    println!(
        "\n{} Files for {}:",
        style("==>").cyan().bold(),
        style(plan.output_dir.display()).cyan()
    );
    let (copied, rendered): (Vec<_>, Vec<_>) =
        plan.render_plan.files.iter().partition(|f| f.is_copy);
    for file in &rendered {
        println!("  {} {}", style("render").green(), file.relative_path.display());
    }
    for file in &copied {
        println!("  {} {}", style("copy  ").green(), file.relative_path.display());
    }
    println!(
        "\n{} rendered, {} copied; nothing written (dry run)",
        rendered.len(),
        copied.len()
    );
}

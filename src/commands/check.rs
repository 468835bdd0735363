use std::path::PathBuf;

use console::style;
use miette::Result;

use archetype_flow::check::check_archetype;

pub fn run(path: PathBuf) -> Result<()> {
    println!(
        "{} {}",
        style("Checking archetype at").bold(),
        style(path.display()).cyan()
    );

    let result = check_archetype(&path)?;

    println!("  Descriptor: {}", result.descriptor);
    println!("  Steps: {}", result.step_count);
    println!("  Inputs: {}", result.input_count);
    println!("  Outputs: {}", result.output_count);

    if !result.warnings.is_empty() {
        println!("\n{}", style("Warnings:").yellow().bold());
        for w in &result.warnings {
            println!("  {} {}", style("⚠").yellow(), w);
        }
    }

    if !result.errors.is_empty() {
        println!("\n{}", style("Errors:").red().bold());
        for e in &result.errors {
            println!("  {} {}", style("✗").red(), e);
        }
        println!(
            "\n{} Archetype has {} error(s)",
            style("✗").red().bold(),
            result.errors.len()
        );
        std::process::exit(1);
    } else {
        println!("\n{} Archetype is valid!", style("✓").green().bold());
    }

    Ok(())
}

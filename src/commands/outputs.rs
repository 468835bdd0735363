use std::path::PathBuf;

use miette::{IntoDiagnostic, Result};

use archetype_flow::plan_outputs;

use super::external_inputs;
use crate::cli::InputArgs;

pub fn run(archetype: PathBuf, inputs: InputArgs) -> Result<()> {
    let inputs = external_inputs(inputs)?;
    let outputs = plan_outputs(&archetype, &inputs)?;
    let json = serde_json::to_string_pretty(&outputs).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

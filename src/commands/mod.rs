pub mod check;
pub mod generate;
pub mod outputs;

use archetype_flow::ExternalInputs;
use miette::{miette, Result};

use crate::cli::InputArgs;

/// Split `path=value` arguments at the first `=`.
fn external_inputs(args: InputArgs) -> Result<ExternalInputs> {
    let values = args
        .inputs
        .into_iter()
        .map(|kv| match kv.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(miette!("invalid input '{kv}', expected PATH=VALUE")),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ExternalInputs {
        values,
        choices_file: args.choices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(inputs: &[&str]) -> InputArgs {
        InputArgs {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            choices: None,
        }
    }

    #[test]
    fn splits_at_first_equals() {
        let inputs = external_inputs(args(&["app.name=a=b", "docker=true"])).unwrap();
        assert_eq!(
            inputs.values,
            vec![
                ("app.name".to_string(), "a=b".to_string()),
                ("docker".to_string(), "true".to_string())
            ]
        );
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(external_inputs(args(&["docker"])).is_err());
        assert!(external_inputs(args(&["=true"])).is_err());
    }
}

use std::fmt;

use console::style;

use crate::choices::ContextValue;
use crate::error::{ArchetypeError, Result};
use crate::flow::{InputPrompt, OptionPrompt, Prompter, StepDecision, StepPrompt};

/// Terminal prompter backed by `inquire`.
#[derive(Debug, Default)]
pub struct InquirePrompter;

impl InquirePrompter {
    pub fn new() -> Self {
        Self
    }
}

/// A select option as shown in the list; the label is displayed, the id is
/// what gets stored.
#[derive(Debug, Clone)]
struct Choice {
    id: String,
    label: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl From<&OptionPrompt> for Choice {
    fn from(option: &OptionPrompt) -> Self {
        Self {
            id: option.id.clone(),
            label: option.label.clone(),
        }
    }
}

impl Prompter for InquirePrompter {
    fn begin_step(&mut self, step: &StepPrompt) -> Result<StepDecision> {
        eprintln!("\n{}", style(&step.label).cyan().bold());
        if let Some(help) = &step.help {
            eprintln!("  {}", style(help).dim());
        }
        if !step.optional {
            return Ok(StepDecision::Enter);
        }

        let enter = inquire::Confirm::new(&format!("Configure {}?", step.label))
            .with_default(true)
            .prompt()
            .map_err(|_| ArchetypeError::PromptCancelled)?;
        if enter {
            return Ok(StepDecision::Enter);
        }
        if step.can_finish {
            let finish = inquire::Confirm::new("Skip all remaining optional steps?")
                .with_default(false)
                .prompt()
                .map_err(|_| ArchetypeError::PromptCancelled)?;
            if finish {
                return Ok(StepDecision::Finish);
            }
        }
        Ok(StepDecision::Skip)
    }

    fn ask(&mut self, prompt: &InputPrompt) -> Result<ContextValue> {
        use crate::descriptor::InputKind;

        let text = prompt.label.as_str();
        let help = prompt.help.as_deref();

        match prompt.kind {
            InputKind::Text => {
                let default = match &prompt.default {
                    Some(ContextValue::Text(s)) => Some(s.as_str()),
                    _ => None,
                };
                let mut input = inquire::Text::new(text);
                if let Some(default) = default {
                    input = input.with_default(default);
                }
                if let Some(help) = help {
                    input = input.with_help_message(help);
                }
                let answer = input.prompt().map_err(|_| ArchetypeError::PromptCancelled)?;
                Ok(ContextValue::Text(answer))
            }
            InputKind::Boolean => {
                let default = matches!(prompt.default, Some(ContextValue::Boolean(true)));
                let mut input = inquire::Confirm::new(text).with_default(default);
                if let Some(help) = help {
                    input = input.with_help_message(help);
                }
                let answer = input.prompt().map_err(|_| ArchetypeError::PromptCancelled)?;
                Ok(ContextValue::Boolean(answer))
            }
            InputKind::Select { multiple: false } => {
                let choices: Vec<Choice> = prompt.options.iter().map(Choice::from).collect();
                if choices.is_empty() {
                    return Err(ArchetypeError::InvalidInput {
                        path: prompt.path.to_string(),
                        reason: "no option is enabled".into(),
                    });
                }
                let cursor = default_indices(&choices, prompt.default.as_ref())
                    .first()
                    .copied()
                    .unwrap_or(0);
                let mut input = inquire::Select::new(text, choices).with_starting_cursor(cursor);
                if let Some(help) = help {
                    input = input.with_help_message(help);
                }
                let answer = input.prompt().map_err(|_| ArchetypeError::PromptCancelled)?;
                Ok(ContextValue::select([answer.id]))
            }
            InputKind::Select { multiple: true } => {
                let choices: Vec<Choice> = prompt.options.iter().map(Choice::from).collect();
                let defaults = default_indices(&choices, prompt.default.as_ref());
                let mut input = inquire::MultiSelect::new(text, choices);
                if !defaults.is_empty() {
                    input = input.with_default(&defaults);
                }
                if let Some(help) = help {
                    input = input.with_help_message(help);
                }
                let answers = input.prompt().map_err(|_| ArchetypeError::PromptCancelled)?;
                Ok(ContextValue::select(answers.into_iter().map(|c| c.id)))
            }
        }
    }
}

/// Positions of the default's selected ids among the enabled choices.
fn default_indices(choices: &[Choice], default: Option<&ContextValue>) -> Vec<usize> {
    let Some(ContextValue::Select(ids)) = default else {
        return Vec::new();
    };
    ids.iter()
        .filter_map(|id| choices.iter().position(|c| &c.id == id))
        .collect()
}

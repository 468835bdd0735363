use std::collections::HashSet;

use tracing::debug;

use super::{Prompter, Session, StepDecision};
use crate::error::{ArchetypeError, Result};

/// Resolve without asking anything: every step continues from external
/// values, presets and defaults.
pub fn resolve_batch(session: &mut Session<'_>) -> Result<()> {
    while let Some(step) = session.next_step()? {
        if let Some(path) = session.missing_input(step)? {
            return Err(ArchetypeError::MissingInput {
                path: path.to_string(),
            });
        }
        session.continue_step(step)?;
    }
    Ok(())
}

/// Resolve by asking `prompter` for every enabled input that has no value
/// yet. Inputs answered externally or locked by a preset are not asked.
pub fn resolve_interactive(session: &mut Session<'_>, prompter: &mut dyn Prompter) -> Result<()> {
    while let Some(step) = session.next_step()? {
        let info = session.step_prompt(step)?;
        match prompter.begin_step(&info)? {
            StepDecision::Skip if info.optional => {
                session.skip_step(step)?;
                continue;
            }
            StepDecision::Finish if info.can_finish => {
                debug!(step = %info.id, "skipping remaining optional steps");
                return session.skip_to_generate();
            }
            _ => {}
        }

        let mut asked = HashSet::new();
        loop {
            let prompts = session.available_options(step)?;
            let Some(prompt) = prompts
                .into_iter()
                .find(|p| p.current.is_none() && !asked.contains(&p.path))
            else {
                break;
            };
            asked.insert(prompt.path.clone());
            let value = prompter.ask(&prompt)?;
            session.submit(&prompt.path, value)?;
        }
        session.continue_step(step)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};

    use super::*;
    use crate::choices::ContextValue;
    use crate::config::EngineConfig;
    use crate::descriptor::{Archetype, DescriptorCache};
    use crate::flow::{InputPrompt, StepPrompt};
    use crate::path::ContextPath;

    fn load(body: &str) -> Archetype {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("root.xml");
        std::fs::write(&path, format!("<archetype-flow>{body}</archetype-flow>")).unwrap();
        Archetype::load(&path, &mut DescriptorCache::new(), &EngineConfig::default()).unwrap()
    }

    const FLOW: &str = r#"
        <flow-step id="project">
          <flow-input id="name" type="text" default="demo"/>
          <flow-input id="tracing" type="select">
            <flow-option id="zipkin"/>
            <flow-option id="jaeger"/>
          </flow-input>
        </flow-step>
        <flow-step id="extras" optional="true">
          <flow-input id="docker" type="boolean" default="false"/>
        </flow-step>"#;

    #[derive(Default)]
    struct Scripted {
        decisions: VecDeque<StepDecision>,
        answers: HashMap<String, ContextValue>,
        asked: Vec<String>,
    }

    impl Prompter for Scripted {
        fn begin_step(&mut self, _step: &StepPrompt) -> Result<StepDecision> {
            Ok(self.decisions.pop_front().unwrap_or(StepDecision::Enter))
        }

        fn ask(&mut self, prompt: &InputPrompt) -> Result<ContextValue> {
            let key = prompt.path.to_string();
            self.asked.push(key.clone());
            match self.answers.get(&key) {
                Some(value) => Ok(value.clone()),
                None => prompt.default.clone().ok_or(ArchetypeError::PromptCancelled),
            }
        }
    }

    fn p(s: &str) -> ContextPath {
        ContextPath::parse(s).unwrap()
    }

    #[test]
    fn batch_reports_missing_required_input() {
        let archetype = load(FLOW);
        let mut session = Session::new(&archetype);
        match resolve_batch(&mut session) {
            Err(ArchetypeError::MissingInput { path }) => assert_eq!(path, "tracing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn batch_completes_from_externals_and_defaults() {
        let archetype = load(FLOW);
        let mut session = Session::new(&archetype);
        session.apply_externals([("tracing", "jaeger")]).unwrap();
        resolve_batch(&mut session).unwrap();

        let tree = session.into_choices();
        assert_eq!(tree.value(&p("name")), Some(&ContextValue::Text("demo".into())));
        assert_eq!(tree.value(&p("tracing")), Some(&ContextValue::select(["jaeger"])));
        assert_eq!(tree.value(&p("docker")), Some(&ContextValue::Boolean(false)));
    }

    #[test]
    fn interactive_asks_only_unanswered_inputs() {
        let archetype = load(FLOW);
        let mut session = Session::new(&archetype);
        session.apply_externals([("name", "shop")]).unwrap();

        let mut prompter = Scripted::default();
        prompter
            .answers
            .insert("tracing".into(), ContextValue::select(["zipkin"]));
        resolve_interactive(&mut session, &mut prompter).unwrap();

        assert_eq!(prompter.asked, vec!["tracing", "docker"]);
        let tree = session.into_choices();
        assert_eq!(tree.value(&p("name")), Some(&ContextValue::Text("shop".into())));
    }

    #[test]
    fn interactive_finish_skips_optional_steps() {
        let archetype = load(FLOW);
        let mut session = Session::new(&archetype);

        let mut prompter = Scripted::default();
        prompter.decisions = VecDeque::from([StepDecision::Enter, StepDecision::Finish]);
        prompter
            .answers
            .insert("tracing".into(), ContextValue::select(["zipkin"]));
        resolve_interactive(&mut session, &mut prompter).unwrap();

        assert_eq!(prompter.asked, vec!["name", "tracing"]);
        assert_eq!(
            session.tree().value(&p("docker")),
            Some(&ContextValue::Boolean(false))
        );
    }
}

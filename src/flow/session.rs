use tracing::debug;

use super::{InputPrompt, OptionPrompt, StepPrompt, StepState};
use crate::choices::{ChoiceTree, ContextValue, PresetOutcome, SetOptions};
use crate::descriptor::{Archetype, FlowItem, InputKind, NodeId, NodeKind};
use crate::error::{ArchetypeError, Result};
use crate::path::ContextPath;

/// One resolution run over an [`Archetype`].
///
/// The session owns its choice tree; the archetype is only borrowed, so
/// any number of sessions can share one.
#[derive(Debug)]
pub struct Session<'a> {
    archetype: &'a Archetype,
    tree: ChoiceTree,
    states: Vec<StepState>,
    applied: Vec<bool>,
    current: Option<NodeId>,
}

impl<'a> Session<'a> {
    pub fn new(archetype: &'a Archetype) -> Self {
        Self {
            archetype,
            tree: ChoiceTree::new(),
            states: vec![StepState::Pending; archetype.node_count()],
            applied: vec![false; archetype.preset_group_count()],
            current: None,
        }
    }

    pub fn archetype(&self) -> &'a Archetype {
        self.archetype
    }

    pub fn tree(&self) -> &ChoiceTree {
        &self.tree
    }

    pub fn state(&self, step: NodeId) -> StepState {
        self.states[step.0]
    }

    pub fn current_step(&self) -> Option<NodeId> {
        self.current
    }

    /// Store values supplied from outside the flow (CLI, query parameters,
    /// persisted choices). Paths are absolute; call this before the first
    /// [`next_step`](Self::next_step) so the values are in place before any
    /// preset runs.
    pub fn apply_externals<I, K, V>(&mut self, inputs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (raw_path, raw_value) in inputs {
            let (id, path) = self.resolve_input(raw_path.as_ref())?;
            let value = self
                .archetype
                .parse_value(id, raw_value.as_ref())
                .map_err(|reason| ArchetypeError::InvalidInput {
                    path: path.to_string(),
                    reason,
                })?;
            self.tree.set(path, value, SetOptions::external())?;
        }
        Ok(())
    }

    /// The step to answer next, activating it if needed. Presets passed on
    /// the way are applied. `None` means the flow is complete.
    pub fn next_step(&mut self) -> Result<Option<NodeId>> {
        if let Some(current) = self.current {
            return Ok(Some(current));
        }
        let archetype = self.archetype;
        self.walk(archetype.flow())
    }

    /// The step as a prompter sees it.
    pub fn step_prompt(&self, step: NodeId) -> Result<StepPrompt> {
        let node = self.archetype.node(step);
        Ok(StepPrompt {
            node: step,
            id: node.id.clone(),
            label: node.display_label().to_string(),
            help: node.help.clone(),
            optional: is_optional(&node.kind),
            can_finish: self.remaining_optional()?,
        })
    }

    /// Enabled inputs of `step` under the current choices, in declaration
    /// order. Inputs nested under a boolean or an option appear once that
    /// value is chosen.
    pub fn available_options(&self, step: NodeId) -> Result<Vec<InputPrompt>> {
        let archetype = self.archetype;
        let mut prompts = Vec::new();
        for input in archetype.step_inputs(step) {
            if archetype.is_active(input, &self.tree)? {
                prompts.push(self.input_prompt(input)?);
            }
        }
        Ok(prompts)
    }

    /// Store a user answer for an input of the active step.
    pub fn submit(&mut self, path: &ContextPath, value: ContextValue) -> Result<()> {
        let archetype = self.archetype;
        let invalid = |reason: String| ArchetypeError::InvalidInput {
            path: path.to_string(),
            reason,
        };

        let id = archetype
            .node_at(path)
            .filter(|id| archetype.node(*id).input_kind().is_some())
            .ok_or_else(|| invalid("not a declared input".into()))?;

        let step = archetype.step_of(id);
        if step.is_none() || step != self.current {
            return Err(ArchetypeError::StepNotActive {
                step: step
                    .map(|s| archetype.node(s).id.clone())
                    .unwrap_or_default(),
            });
        }
        if !archetype.is_active(id, &self.tree)? {
            return Err(invalid("input is not enabled by the current choices".into()));
        }
        if let Some(reason) = self.check_value(id, &value, &self.tree)? {
            return Err(invalid(reason));
        }

        debug!(path = %path, value = %value, "submit");
        self.tree.set(path.clone(), value, SetOptions::default())
    }

    /// [`submit`](Self::submit) from string forms, as typed on a command line.
    pub fn submit_raw(&mut self, raw_path: &str, raw_value: &str) -> Result<()> {
        let (id, path) = self.resolve_input(raw_path)?;
        let value = self
            .archetype
            .parse_value(id, raw_value)
            .map_err(|reason| ArchetypeError::InvalidInput {
                path: path.to_string(),
                reason,
            })?;
        self.submit(&path, value)
    }

    /// The first enabled input of `step` that has neither a value nor a
    /// default.
    pub fn missing_input(&self, step: NodeId) -> Result<Option<ContextPath>> {
        let mut tree = self.tree.clone();
        self.fill_defaults(step, &mut tree)?;
        self.first_missing(step, &tree)
    }

    pub fn can_continue(&self, step: NodeId) -> Result<bool> {
        if self.current != Some(step) {
            return Ok(false);
        }
        if is_optional(&self.archetype.node(step).kind) {
            return Ok(true);
        }
        Ok(self.missing_input(step)?.is_none())
    }

    /// Finish the active step, filling defaults for unanswered inputs.
    pub fn continue_step(&mut self, step: NodeId) -> Result<()> {
        self.ensure_current(step)?;
        self.finish_step(step, StepState::Answered)
    }

    /// Skip an optional step; its inputs take their defaults.
    pub fn skip_step(&mut self, step: NodeId) -> Result<()> {
        self.ensure_current(step)?;
        let node = self.archetype.node(step);
        if !is_optional(&node.kind) {
            return Err(ArchetypeError::StepNotOptional {
                step: node.id.clone(),
            });
        }
        self.finish_step(step, StepState::Skipped)
    }

    /// Whether every step still reachable is optional.
    pub fn remaining_optional(&self) -> Result<bool> {
        let mut pending = Vec::new();
        self.pending_steps(self.archetype.flow(), &mut pending)?;
        Ok(pending
            .iter()
            .all(|id| is_optional(&self.archetype.node(*id).kind)))
    }

    /// Skip every remaining step. Fails on the first step that is not
    /// optional.
    pub fn skip_to_generate(&mut self) -> Result<()> {
        while let Some(step) = self.next_step()? {
            self.skip_step(step)?;
        }
        Ok(())
    }

    /// Whether no step is left. Activates the next step if there is one.
    pub fn is_complete(&mut self) -> Result<bool> {
        Ok(self.next_step()?.is_none())
    }

    pub fn into_choices(self) -> ChoiceTree {
        self.tree
    }

    fn resolve_input(&self, raw: &str) -> Result<(NodeId, ContextPath)> {
        let archetype = self.archetype;
        let is_input = |p: &ContextPath| {
            archetype
                .node_at(p)
                .is_some_and(|id| archetype.node(id).input_kind().is_some())
        };
        let path = archetype.resolver().resolve_external(raw, is_input)?;
        let id = archetype
            .node_at(&path)
            .ok_or_else(|| ArchetypeError::InvalidInput {
                path: path.to_string(),
                reason: "not a declared input".into(),
            })?;
        Ok((id, path))
    }

    fn walk(&mut self, items: &'a [FlowItem]) -> Result<Option<NodeId>> {
        let archetype = self.archetype;
        for item in items {
            match *item {
                FlowItem::Presets(index) => self.apply_presets(index)?,
                FlowItem::Node(id) => {
                    let node = archetype.node(id);
                    if node.is_step() {
                        if !archetype.is_active(id, &self.tree)? {
                            continue;
                        }
                        if !self.states[id.0].is_resolved() {
                            self.activate(id)?;
                            return Ok(Some(id));
                        }
                    } else if !archetype.content_active(Some(id), &self.tree)? {
                        continue;
                    }
                    if let Some(step) = self.walk(&node.body)? {
                        return Ok(Some(step));
                    }
                }
            }
        }
        Ok(None)
    }

    fn pending_steps(&self, items: &[FlowItem], out: &mut Vec<NodeId>) -> Result<()> {
        let archetype = self.archetype;
        for item in items {
            let FlowItem::Node(id) = *item else {
                continue;
            };
            let node = archetype.node(id);
            if node.is_step() {
                if !archetype.is_active(id, &self.tree)? {
                    continue;
                }
                if !self.states[id.0].is_resolved() {
                    out.push(id);
                }
            } else if !archetype.content_active(Some(id), &self.tree)? {
                continue;
            }
            self.pending_steps(&node.body, out)?;
        }
        Ok(())
    }

    fn activate(&mut self, step: NodeId) -> Result<()> {
        let archetype = self.archetype;
        let node = archetype.node(step);
        debug!(step = %node.id, "step active");
        self.states[step.0] = StepState::Active;
        self.current = Some(step);
        for item in &node.body {
            if let FlowItem::Presets(index) = *item {
                self.apply_presets(index)?;
            }
        }
        Ok(())
    }

    fn apply_presets(&mut self, index: usize) -> Result<()> {
        if self.applied[index] {
            return Ok(());
        }
        let archetype = self.archetype;
        let group = archetype.preset_group(index);
        if !archetype.content_active(group.owner, &self.tree)? {
            return Ok(());
        }
        for preset in &group.presets {
            let outcome = self.tree.preset(preset.path.clone(), preset.value.clone())?;
            if outcome == PresetOutcome::Applied {
                debug!(path = %preset.path, location = %preset.location, "preset applied");
            }
        }
        self.applied[index] = true;
        Ok(())
    }

    fn ensure_current(&self, step: NodeId) -> Result<()> {
        if self.current == Some(step) {
            Ok(())
        } else {
            Err(ArchetypeError::StepNotActive {
                step: self.archetype.node(step).id.clone(),
            })
        }
    }

    fn finish_step(&mut self, step: NodeId, state: StepState) -> Result<()> {
        let mut tree = self.tree.clone();
        self.fill_defaults(step, &mut tree)?;
        if let Some(path) = self.first_missing(step, &tree)? {
            return Err(ArchetypeError::CannotContinue {
                step: self.archetype.node(step).id.clone(),
                path: path.to_string(),
            });
        }
        debug!(step = %self.archetype.node(step).id, ?state, "step resolved");
        self.tree = tree;
        self.states[step.0] = state;
        self.current = None;
        Ok(())
    }

    /// Apply defaults until nothing changes; a defaulted boolean can enable
    /// further inputs of the same step. A default naming a disabled option
    /// is not applied, so the input still needs an answer.
    fn fill_defaults(&self, step: NodeId, tree: &mut ChoiceTree) -> Result<()> {
        let archetype = self.archetype;
        let inputs = archetype.step_inputs(step);
        loop {
            let mut changed = false;
            for &input in &inputs {
                let node = archetype.node(input);
                if tree.contains(&node.path) || !archetype.is_active(input, tree)? {
                    continue;
                }
                let Some(default) = node.default_value() else {
                    continue;
                };
                if let Some(reason) = self.check_value(input, default, tree)? {
                    debug!(path = %node.path, %reason, "default not applicable");
                    continue;
                }
                tree.set(node.path.clone(), default.clone(), SetOptions::default())?;
                changed = true;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn first_missing(&self, step: NodeId, tree: &ChoiceTree) -> Result<Option<ContextPath>> {
        let archetype = self.archetype;
        for input in archetype.step_inputs(step) {
            let path = &archetype.node(input).path;
            if !tree.contains(path) && archetype.is_active(input, tree)? {
                return Ok(Some(path.clone()));
            }
        }
        Ok(None)
    }

    fn input_prompt(&self, input: NodeId) -> Result<InputPrompt> {
        let archetype = self.archetype;
        let node = archetype.node(input);
        let mut options = Vec::new();
        for option in archetype.options_of(input) {
            if archetype.is_active(option, &self.tree)? {
                let option = archetype.node(option);
                options.push(OptionPrompt {
                    id: option.id.clone(),
                    label: option.display_label().to_string(),
                    help: option.help.clone(),
                });
            }
        }
        let stored = self.tree.get(&node.path);
        Ok(InputPrompt {
            node: input,
            path: node.path.clone(),
            label: node.display_label().to_string(),
            help: node.help.clone(),
            kind: node.input_kind().unwrap_or(InputKind::Text),
            options,
            default: node.default_value().cloned(),
            current: stored.map(|n| n.value.clone()),
            read_only: stored.is_some_and(|n| n.read_only),
        })
    }

    fn check_value(
        &self,
        input: NodeId,
        value: &ContextValue,
        tree: &ChoiceTree,
    ) -> Result<Option<String>> {
        let archetype = self.archetype;
        let kind = archetype.node(input).input_kind().unwrap_or(InputKind::Text);
        Ok(match (kind, value) {
            (InputKind::Text, ContextValue::Text(_))
            | (InputKind::Boolean, ContextValue::Boolean(_)) => None,
            (InputKind::Select { multiple }, ContextValue::Select(ids)) => {
                if !multiple && ids.len() != 1 {
                    return Ok(Some("exactly one option must be selected".into()));
                }
                let mut enabled = Vec::new();
                for option in archetype.options_of(input) {
                    if archetype.is_active(option, tree)? {
                        enabled.push(archetype.node(option).id.as_str());
                    }
                }
                ids.iter()
                    .find(|id| !enabled.contains(&id.as_str()))
                    .map(|id| format!("'{id}' is not an enabled option"))
            }
            (kind, value) => Some(format!(
                "expected a {} value, got a {} value",
                kind.name(),
                value.kind_name()
            )),
        })
    }
}

fn is_optional(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Step { optional: true })
}

//! Flow resolution: walks the archetype's steps in declaration order,
//! collecting answers into a [`ChoiceTree`](crate::choices::ChoiceTree).
//!
//! [`Session`] is the step-by-step contract a UI drives (`next_step`,
//! `available_options`, `submit`, `continue_step`). [`resolve_batch`] and
//! [`resolve_interactive`] drive it to completion.

pub mod batch;
pub mod session;

use crate::choices::ContextValue;
use crate::descriptor::{InputKind, NodeId};
use crate::error::Result;
use crate::path::ContextPath;

pub use batch::{resolve_batch, resolve_interactive};
pub use session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Active,
    Answered,
    Skipped,
}

impl StepState {
    pub fn is_resolved(self) -> bool {
        matches!(self, StepState::Answered | StepState::Skipped)
    }
}

/// A step as presented to a prompter.
#[derive(Debug, Clone)]
pub struct StepPrompt {
    pub node: NodeId,
    pub id: String,
    pub label: String,
    pub help: Option<String>,
    pub optional: bool,
    /// Every step still ahead is optional, so generation may start now.
    pub can_finish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Enter,
    Skip,
    /// Skip this and every remaining optional step.
    Finish,
}

#[derive(Debug, Clone)]
pub struct OptionPrompt {
    pub id: String,
    pub label: String,
    pub help: Option<String>,
}

/// An enabled input of the active step.
#[derive(Debug, Clone)]
pub struct InputPrompt {
    pub node: NodeId,
    pub path: ContextPath,
    pub label: String,
    pub help: Option<String>,
    pub kind: InputKind,
    /// Enabled options, for select inputs.
    pub options: Vec<OptionPrompt>,
    pub default: Option<ContextValue>,
    pub current: Option<ContextValue>,
    pub read_only: bool,
}

/// Supplies answers during interactive resolution.
pub trait Prompter {
    /// Called when a step becomes active.
    fn begin_step(&mut self, step: &StepPrompt) -> Result<StepDecision>;

    /// Ask for the value of one input.
    fn ask(&mut self, prompt: &InputPrompt) -> Result<ContextValue>;
}

pub mod context;
pub mod engine;
pub mod file;
pub mod walker;

pub use context::build_context;
pub use engine::{TemplateData, TemplateEngine};
pub use walker::{execute_plan, plan_render, GeneratedProject, GenerationPlan, PlannedFile};

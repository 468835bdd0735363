use tera::Context;

use crate::choices::ChoiceTree;
use crate::output::MergedModel;
use crate::render::engine::TemplateData;

/// Template context: the merged model under `model`, the resolved choices
/// keyed by dotted path under `choices`.
pub fn build_context(model: &MergedModel, tree: &ChoiceTree) -> TemplateData {
    let mut context = Context::new();
    context.insert("model", model);
    context.insert("choices", &tree.to_json());
    TemplateData::new(context)
}

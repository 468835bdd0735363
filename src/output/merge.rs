//! Merges model entries of the selected output blocks into one structure
//! for the renderer.
//!
//! Entries are filtered by their `if`, sorted by `(order, declaration)`
//! and folded key by key: a later value replaces an earlier one, lists
//! concatenate, maps merge recursively.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use tera::Context;
use tracing::{debug, warn};

use crate::choices::ChoiceTree;
use crate::descriptor::{ModelEntry, ModelNode, ModelValue};
use crate::error::{ArchetypeError, Result};
use crate::render::TemplateData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MergedValue {
    Text(String),
    List(Vec<MergedValue>),
    Map(IndexMap<String, MergedValue>),
}

impl MergedValue {
    fn kind_name(&self) -> &'static str {
        match self {
            MergedValue::Text(_) => "value",
            MergedValue::List(_) => "list",
            MergedValue::Map(_) => "map",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MergedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MergedValue]> {
        match self {
            MergedValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, MergedValue>> {
        match self {
            MergedValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Top-level merged model, keys in first-merged order.
pub type MergedModel = IndexMap<String, MergedValue>;

pub fn merge_model<'a, I>(entries: I, tree: &ChoiceTree) -> Result<MergedModel>
where
    I: IntoIterator<Item = &'a ModelEntry>,
{
    let mut context = Context::new();
    context.insert("choices", &tree.to_json());
    let merger = Merger {
        tree,
        data: TemplateData::new(context),
    };
    merger.keyed(entries.into_iter().collect(), "")
}

struct Merger<'t> {
    tree: &'t ChoiceTree,
    data: TemplateData,
}

impl Merger<'_> {
    fn selected<'a>(&self, entries: Vec<&'a ModelEntry>) -> Result<Vec<&'a ModelEntry>> {
        let mut selected = Vec::with_capacity(entries.len());
        for entry in entries {
            let enabled = match &entry.condition {
                Some(condition) => condition.eval(self.tree)?,
                None => true,
            };
            if enabled {
                selected.push(entry);
            }
        }
        selected.sort_by_key(|e| (e.order, e.declaration));
        Ok(selected)
    }

    fn keyed(&self, entries: Vec<&ModelEntry>, prefix: &str) -> Result<MergedModel> {
        let mut merged = MergedModel::new();
        let mut last_order: HashMap<String, i32> = HashMap::new();

        for entry in self.selected(entries)? {
            let Some(key) = entry.key.as_deref() else {
                continue;
            };
            let full_key = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}.{key}")
            };
            let value = self.materialize(&entry.node, &full_key)?;

            match merged.get_mut(key) {
                None => {
                    merged.insert(key.to_string(), value);
                }
                Some(existing) => {
                    if let (MergedValue::Text(old), MergedValue::Text(new)) = (&*existing, &value) {
                        if old != new && last_order.get(key) == Some(&entry.order) {
                            warn!(
                                key = %full_key,
                                order = entry.order,
                                kept = %new,
                                dropped = %old,
                                "model values share an order; the later declaration wins"
                            );
                        }
                    }
                    merge_into(existing, value, &full_key)?;
                }
            }
            last_order.insert(key.to_string(), entry.order);
        }
        Ok(merged)
    }

    fn materialize(&self, node: &ModelNode, key: &str) -> Result<MergedValue> {
        match node {
            ModelNode::Value(value) => self.text(value, key).map(MergedValue::Text),
            ModelNode::List(items) => {
                let mut list = Vec::new();
                for item in self.selected(items.iter().collect())? {
                    list.push(self.materialize(&item.node, key)?);
                }
                Ok(MergedValue::List(list))
            }
            ModelNode::Map(entries) => self
                .keyed(entries.iter().collect(), key)
                .map(MergedValue::Map),
        }
    }

    fn text(&self, value: &ModelValue, key: &str) -> Result<String> {
        let raw = match &value.file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                ArchetypeError::OutputResolution {
                    reason: format!(
                        "model value '{key}' reads {}: {e}",
                        path.display()
                    ),
                }
            })?,
            None => value.text.expand(self.tree)?,
        };

        match value.template {
            None => Ok(raw),
            Some(engine) => {
                debug!(key, engine = %engine, "pre-rendering model value");
                engine.render(&format!("model value '{key}'"), &raw, &self.data)
            }
        }
    }
}

fn merge_into(existing: &mut MergedValue, incoming: MergedValue, key: &str) -> Result<()> {
    match (existing, incoming) {
        (MergedValue::Text(old), MergedValue::Text(new)) => {
            *old = new;
            Ok(())
        }
        (MergedValue::List(old), MergedValue::List(new)) => {
            old.extend(new);
            Ok(())
        }
        (MergedValue::Map(old), MergedValue::Map(new)) => {
            for (k, v) in new {
                match old.get_mut(&k) {
                    Some(slot) => merge_into(slot, v, &format!("{key}.{k}"))?,
                    None => {
                        old.insert(k, v);
                    }
                }
            }
            Ok(())
        }
        (old, new) => Err(ArchetypeError::OutputResolution {
            reason: format!(
                "model key '{key}' is declared both as a {} and as a {}",
                old.kind_name(),
                new.kind_name()
            ),
        }),
    }
}

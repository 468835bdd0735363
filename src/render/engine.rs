use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};

use crate::error::{ArchetypeError, Result};

/// Template engines a descriptor may name for template sets and
/// pre-rendered model values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
    Tera,
    Mustache,
}

impl TemplateEngine {
    pub const ALL: &'static [TemplateEngine] = &[TemplateEngine::Tera, TemplateEngine::Mustache];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            TemplateEngine::Tera => "tera",
            TemplateEngine::Mustache => "mustache",
        }
    }

    /// Render `source` under `name`, the name errors report.
    pub fn render(self, name: &str, source: &str, data: &TemplateData) -> Result<String> {
        match self {
            TemplateEngine::Tera => {
                let mut tera = Tera::default();
                tera.add_raw_template(name, source)
                    .and_then(|_| tera.render(name, &data.tera))
                    .map_err(|e| ArchetypeError::RenderError {
                        name: name.to_string(),
                        source: e,
                    })
            }
            TemplateEngine::Mustache => {
                let mustache_error = |e| ArchetypeError::MustacheError {
                    name: name.to_string(),
                    source: e,
                };
                let template = mustache::compile_str(source).map_err(mustache_error)?;
                let mut out = Vec::new();
                template
                    .render(&mut out, &data.json)
                    .map_err(mustache_error)?;
                String::from_utf8(out).map_err(|e| ArchetypeError::OutputResolution {
                    reason: format!("{name} rendered to invalid UTF-8: {e}"),
                })
            }
        }
    }

    /// Parse `source` without rendering it.
    pub fn check_syntax(self, source: &str) -> std::result::Result<(), String> {
        match self {
            TemplateEngine::Tera => Tera::default()
                .add_raw_template("__check__", source)
                .map_err(|e| e.to_string()),
            TemplateEngine::Mustache => mustache::compile_str(source)
                .map(|_| ())
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The values a template sees, prepared once for every engine.
#[derive(Debug, Clone)]
pub struct TemplateData {
    tera: Context,
    json: Value,
}

impl TemplateData {
    pub fn new(context: Context) -> Self {
        let json = context.clone().into_json();
        Self {
            tera: context,
            json,
        }
    }

    pub fn tera(&self) -> &Context {
        &self.tera
    }

    pub fn json(&self) -> &Value {
        &self.json
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{ArchetypeError, Result};
use crate::path::ContextPath;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub archetype: ArchetypeSection,

    #[serde(default)]
    pub choices: ChoicesSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchetypeSection {
    /// Root descriptor, relative to the archetype directory.
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Prefix that relative expression paths may omit. A `common-prefix`
    /// attribute on the root descriptor takes precedence.
    #[serde(default)]
    pub common_prefix: Option<String>,
}

fn default_descriptor() -> String {
    "helidon-archetype.xml".to_string()
}

impl Default for ArchetypeSection {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
            common_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChoicesSection {
    /// Properties file the resolved choices are persisted to, relative to
    /// the generated project.
    #[serde(default = "default_choices_file")]
    pub file: String,

    /// Key prefix marking flow choices in that file.
    #[serde(default = "default_choices_prefix")]
    pub prefix: String,
}

fn default_choices_file() -> String {
    ".archetype".to_string()
}

fn default_choices_prefix() -> String {
    "FLOW.".to_string()
}

impl Default for ChoicesSection {
    fn default() -> Self {
        Self {
            file: default_choices_file(),
            prefix: default_choices_prefix(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.archetype.descriptor.trim().is_empty() {
            return Err(ArchetypeError::ConfigInvalid {
                reason: "'archetype.descriptor' must not be empty".into(),
            });
        }
        if let Some(prefix) = &self.archetype.common_prefix {
            ContextPath::parse(prefix).map_err(|e| ArchetypeError::ConfigInvalid {
                reason: format!("'archetype.common_prefix': {e}"),
            })?;
        }
        if self.choices.file.trim().is_empty() {
            return Err(ArchetypeError::ConfigInvalid {
                reason: "'choices.file' must not be empty".into(),
            });
        }
        Ok(())
    }
}

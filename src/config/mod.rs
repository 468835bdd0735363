pub mod schema;

use std::path::Path;

use crate::error::{ArchetypeError, Result};

pub use schema::EngineConfig;

pub const CONFIG_FILE: &str = "archetype.toml";

/// Load `archetype.toml` from an archetype directory. A missing file means
/// all defaults.
pub fn load_config(archetype_dir: &Path) -> Result<EngineConfig> {
    let config_path = archetype_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| ArchetypeError::Io {
        context: format!("reading {}", config_path.display()),
        source: e,
    })?;

    let config: EngineConfig =
        toml::from_str(&content).map_err(|e| ArchetypeError::ConfigParse {
            path: config_path.clone(),
            source: e,
        })?;

    config.validate()?;

    Ok(config)
}

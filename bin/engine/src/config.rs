//! Engine configuration.
//!
//! Loaded via the `config` crate from `NODEFLOW_`-prefixed environment
//! variables, with `__` separating nested keys:
//!
//! - `NODEFLOW_PLUGIN__BASE_URL`
//! - `NODEFLOW_PLUGIN__TIMEOUT_SECONDS`
//! - `NODEFLOW_PLUGIN__PLUGINS` (comma separated)
//! - `NODEFLOW_DEFINITIONS_PATH`

use crate::error::EngineError;
use nodeflow_plugin::PluginConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Engine configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Plugin service configuration.
    #[serde(default)]
    pub plugin: PluginConfig,

    /// JSON file holding the workflows and triggers to load at startup.
    #[serde(default)]
    pub definitions_path: Option<PathBuf>,
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("NODEFLOW")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("plugin.plugins")
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_environment(environment())
    }

    fn from_environment(source: config::Environment) -> Result<Self, EngineError> {
        Ok(config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?)
    }
}

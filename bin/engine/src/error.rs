//! Error types for engine startup.

use std::fmt;
use std::path::PathBuf;

/// Errors that stop the engine from starting.
#[derive(Debug)]
pub enum EngineError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The plugin client could not be built.
    Plugin { details: String },
    /// The definitions file could not be read or parsed.
    Definitions { path: PathBuf, details: String },
    /// Reading events failed.
    Input { details: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Plugin { details } => write!(f, "plugin client setup failed: {details}"),
            Self::Definitions { path, details } => {
                write!(f, "failed to load definitions from '{}': {details}", path.display())
            }
            Self::Input { details } => write!(f, "failed to read events: {details}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config { details: e.to_string() }
    }
}

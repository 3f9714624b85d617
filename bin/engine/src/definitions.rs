//! Workflows and triggers loaded at startup.

use crate::error::EngineError;
use nodeflow_trigger::Trigger;
use nodeflow_workflow::Workflow;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::path::Path;

/// The contents of a definitions file.
#[derive(Debug, Default, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl Definitions {
    /// Reads definitions from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Definitions` if the file cannot be read or is
    /// not valid JSON.
    pub async fn load(path: &Path) -> Result<Self, Report<EngineError>> {
        let failed = |details: String| EngineError::Definitions {
            path: path.to_path_buf(),
            details,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(serde_json::from_str(&raw).map_err(|e| failed(e.to_string()))?)
    }
}

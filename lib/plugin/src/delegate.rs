//! Processor that forwards a node to the plugin service.

use crate::client::PluginClient;
use crate::mapping::{map_inputs, merge_config};
use async_trait::async_trait;
use nodeflow_workflow::{ExecutionContext, JsonMap, NodeDefinition, NodeError, NodeProcessor, ProcessorKind};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Runs `node_id` of `plugin_id` on the plugin service.
#[derive(Debug, Clone)]
pub struct DelegateProcessor {
    client: Arc<PluginClient>,
    plugin_id: String,
    node_id: String,
}

impl DelegateProcessor {
    /// Creates a delegate for `plugin_id`/`node_id`.
    #[must_use]
    pub fn new(client: Arc<PluginClient>, plugin_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            client,
            plugin_id: plugin_id.into(),
            node_id: node_id.into(),
        }
    }

    /// The plugin this delegate targets.
    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// The plugin node this delegate runs.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

#[async_trait]
impl NodeProcessor for DelegateProcessor {
    #[instrument(
        skip_all,
        fields(node = %node.id, plugin_id = %self.plugin_id, plugin_node = %self.node_id)
    )]
    async fn execute(
        &self,
        node: &NodeDefinition,
        input: JsonMap,
        _context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        let inputs = map_inputs(&self.node_id, &input);
        let config = merge_config(&self.node_id, &node.config);
        debug!(inputs = inputs.len(), config = config.len(), "calling plugin");

        let result = self
            .client
            .execute(&self.plugin_id, &self.node_id, &inputs, &config)
            .await
            .map_err(|e| {
                warn!(error = %e, "plugin call failed");
                NodeError::domain(format!(
                    "plugin '{}' node '{}' failed: {e}",
                    self.plugin_id, self.node_id
                ))
            })?;

        Ok(normalize(result))
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Delegate
    }
}

/// Keyed maps pass through; anything else is wrapped under `result`.
fn normalize(result: JsonValue) -> JsonValue {
    match result {
        JsonValue::Object(_) => result,
        other => {
            let mut wrapped = JsonMap::new();
            wrapped.insert("result".to_string(), other);
            JsonValue::Object(wrapped)
        }
    }
}

//! In-process processors registered by default.

use crate::context::{ExecutionContext, JsonMap};
use crate::error::NodeError;
use crate::node::NodeDefinition;
use crate::processor::NodeProcessor;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Returns the resolved input map unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

#[async_trait]
impl NodeProcessor for PassthroughProcessor {
    async fn execute(
        &self,
        _node: &NodeDefinition,
        input: JsonMap,
        _context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        Ok(JsonValue::Object(input))
    }
}

/// Emits `config.value`.
///
/// Maps are returned as-is so their keys act as output ports; anything else
/// is wrapped under `result`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantProcessor;

#[async_trait]
impl NodeProcessor for ConstantProcessor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        _input: JsonMap,
        _context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        let value = node
            .config
            .get("value")
            .cloned()
            .ok_or_else(|| NodeError::domain(format!("node {} has no config.value", node.id)))?;

        Ok(match value {
            JsonValue::Object(_) => value,
            other => {
                let mut wrapped = JsonMap::new();
                wrapped.insert("result".to_string(), other);
                JsonValue::Object(wrapped)
            }
        })
    }
}

/// Shallow-merges every object-valued input into one object.
///
/// Inputs are visited in key order; later keys overwrite earlier ones.
/// Non-object inputs are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeProcessor;

#[async_trait]
impl NodeProcessor for MergeProcessor {
    async fn execute(
        &self,
        _node: &NodeDefinition,
        input: JsonMap,
        _context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        let mut merged = JsonMap::new();
        for value in input.into_iter().map(|(_, v)| v) {
            if let JsonValue::Object(map) = value {
                merged.extend(map);
            }
        }
        Ok(JsonValue::Object(merged))
    }
}

/// Always fails with `config.message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailProcessor;

#[async_trait]
impl NodeProcessor for FailProcessor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        _input: JsonMap,
        _context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        let message = node.config_str("message").unwrap_or("node failed");
        Err(NodeError::domain(message))
    }
}

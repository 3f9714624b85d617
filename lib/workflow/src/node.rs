//! Node definitions.
//!
//! A node is one step of a workflow. The engine only cares about the stable
//! attributes below; everything processor-specific lives in `config`, which
//! the engine never interprets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Stable identifier of a node within one workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within the graph.
    #[serde(rename = "node_id")]
    pub id: NodeId,
    /// Key into the node registry.
    pub node_type: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Processor-specific configuration.
    #[serde(default)]
    pub config: Map<String, JsonValue>,
}

impl NodeDefinition {
    /// Creates a node with an empty configuration.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            node_type: node_type.into(),
            config: Map::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a configuration entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Returns a string configuration value.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let node: NodeDefinition =
            serde_json::from_value(json!({"node_id": "n1", "node_type": "passthrough"}))
                .expect("deserialize");
        assert_eq!(node.id.as_str(), "n1");
        assert!(node.name.is_empty());
        assert!(node.config.is_empty());
    }

    #[test]
    fn builder_sets_config() {
        let node = NodeDefinition::new("llm", "plugin:llm/prompt")
            .with_name("Summarise")
            .with_config("model", json!("small"));
        assert_eq!(node.name, "Summarise");
        assert_eq!(node.config_str("model"), Some("small"));
        assert_eq!(node.config_str("missing"), None);
    }
}

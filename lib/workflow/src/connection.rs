//! Connections between nodes.
//!
//! A connection carries a value from a port on one node to a port on
//! another. Several connections may target the same port; the graph keeps
//! them in declaration order and the last one resolved wins.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Default source port name.
pub const DEFAULT_OUTPUT_PORT: &str = "output";
/// Default target port name.
pub const DEFAULT_INPUT_PORT: &str = "input";

fn default_output_port() -> String {
    DEFAULT_OUTPUT_PORT.to_string()
}

fn default_input_port() -> String {
    DEFAULT_INPUT_PORT.to_string()
}

/// A directed edge from one node's output port to another node's input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Upstream node.
    pub from_node_id: NodeId,
    /// Downstream node.
    pub to_node_id: NodeId,
    /// Port read on the upstream node's result.
    #[serde(default = "default_output_port")]
    pub from_port: String,
    /// Port written on the downstream node's input map.
    #[serde(default = "default_input_port")]
    pub to_port: String,
}

impl Connection {
    /// Creates a connection between the default ports.
    #[must_use]
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from_node_id: from.into(),
            to_node_id: to.into(),
            from_port: default_output_port(),
            to_port: default_input_port(),
        }
    }

    /// Sets both port names.
    #[must_use]
    pub fn ports(mut self, from_port: impl Into<String>, to_port: impl Into<String>) -> Self {
        self.from_port = from_port.into();
        self.to_port = to_port.into();
        self
    }

    /// The key this connection writes into the target's input map.
    ///
    /// An empty `to_port` falls back to `input_from_<from_node_id>`.
    #[must_use]
    pub fn target_key(&self) -> String {
        if self.to_port.is_empty() {
            format!("input_from_{}", self.from_node_id)
        } else {
            self.to_port.clone()
        }
    }
}

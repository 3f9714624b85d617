//! The node processor contract.
//!
//! A processor turns a node's resolved input map into a result. The engine
//! never inspects what a processor does; it only dispatches by node type and
//! records the outcome. Processors come in three flavors:
//!
//! - built-in: runs in process
//! - delegate: forwards to an external plugin service
//! - unavailable: a stand-in for a delegate whose backing service is not
//!   known; returns a degraded result instead of failing

use crate::context::{ExecutionContext, JsonMap};
use crate::error::NodeError;
use crate::node::NodeDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fmt;

/// Which flavor of processor handled a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    /// Runs in process.
    BuiltIn,
    /// Forwards to an external plugin service.
    Delegate,
    /// Degraded stand-in for a missing delegate.
    Unavailable,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BuiltIn => "built_in",
            Self::Delegate => "delegate",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Executes a single node.
///
/// `input` is the node's resolved input map, already validated and
/// converted against the node type's schema where one is registered.
/// Implementations must not retain the context beyond the call.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    /// Processes the node and returns its result.
    async fn execute(
        &self,
        node: &NodeDefinition,
        input: JsonMap,
        context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError>;

    /// The processor's flavor.
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::BuiltIn
    }
}

/// Stand-in for a delegate whose plugin service is not known.
///
/// Always succeeds with a structured degraded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableProcessor {
    plugin_id: String,
    node_id: String,
}

impl UnavailableProcessor {
    /// Creates a stand-in for `plugin_id`/`node_id`.
    #[must_use]
    pub fn new(plugin_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            node_id: node_id.into(),
        }
    }

    /// The plugin this stands in for.
    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

#[async_trait]
impl NodeProcessor for UnavailableProcessor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        _input: JsonMap,
        _context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        tracing::warn!(
            node_id = %node.id,
            plugin_id = %self.plugin_id,
            plugin_node = %self.node_id,
            "plugin unavailable, returning degraded result"
        );
        Ok(json!({
            "status": "unavailable",
            "plugin_id": self.plugin_id,
            "node_id": self.node_id,
            "message": format!("plugin '{}' is not available", self.plugin_id),
        }))
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Unavailable
    }
}

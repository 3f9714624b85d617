//! Error types for the workflow crate.
//!
//! Errors are layered for use with rootcause:
//! - `ConversionError`: a value could not be coerced to a port's data type
//! - `GraphError`: the workflow graph is malformed (configuration error)
//! - `NodeError`: a single node failed; recorded, never propagated
//! - `RegistryError`: a node type has no processor
//! - `ExecutionError`: run-level failures and illegal state transitions

use crate::data_type::DataType;
use crate::node::NodeId;
use std::fmt;

/// A value could not be converted to the requested data type.
///
/// Callers treat this as a validation failure: the raw value is kept and
/// the node may still run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// The type the value was being converted to.
    pub target: DataType,
    /// Why the conversion failed.
    pub reason: String,
}

impl ConversionError {
    pub(crate) fn new(target: DataType, reason: impl Into<String>) -> Self {
        Self {
            target,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert to {}: {}", self.target, self.reason)
    }
}

impl std::error::Error for ConversionError {}

/// Errors describing a malformed workflow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two node definitions share an id.
    DuplicateNode { node_id: NodeId },
    /// A connection references a node that is not in the graph.
    UnknownNode { node_id: NodeId },
    /// The graph contains at least one cycle; `nodes` are the ones left
    /// unscheduled by the topological walk.
    CycleDetected { nodes: Vec<NodeId> },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::UnknownNode { node_id } => {
                write!(f, "connection references unknown node: {node_id}")
            }
            Self::CycleDetected { nodes } => {
                let ids: Vec<&str> = nodes.iter().map(NodeId::as_str).collect();
                write!(f, "graph contains a cycle through: {}", ids.join(", "))
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Failure of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// No processor is registered for the node's type.
    Configuration { node_type: String },
    /// The processor (or the service it delegates to) failed.
    Domain { message: String },
}

impl NodeError {
    /// Creates a domain error.
    #[must_use]
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { node_type } => {
                write!(f, "configuration error: no processor registered for node type '{node_type}'")
            }
            Self::Domain { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for NodeError {}

/// Errors from node registry lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No processor is registered for the node type, and it does not name a
    /// plugin.
    NotFound { node_type: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { node_type } => write!(f, "no processor for node type: {node_type}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for NodeError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound { node_type } => Self::Configuration { node_type },
        }
    }
}

/// Run-level execution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The graph could not be scheduled.
    Graph(GraphError),
    /// A node failed and the run was stopped.
    NodeFailed { node_id: NodeId, error: NodeError },
    /// A terminal state was entered twice, or a transition skipped a state.
    InvalidStateTransition { from: String, to: String },
    /// A node's result or error was recorded more than once in one run.
    OutcomeAlreadyRecorded { node_id: NodeId },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(e) => write!(f, "graph error: {e}"),
            Self::NodeFailed { node_id, error } => write!(f, "node {node_id} failed: {error}"),
            Self::InvalidStateTransition { from, to } => {
                write!(f, "invalid state transition from {from} to {to}")
            }
            Self::OutcomeAlreadyRecorded { node_id } => {
                write!(f, "outcome for node {node_id} already recorded")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<GraphError> for ExecutionError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_lists_nodes() {
        let err = GraphError::CycleDetected {
            nodes: vec![NodeId::from("a"), NodeId::from("b")],
        };
        assert_eq!(err.to_string(), "graph contains a cycle through: a, b");
    }

    #[test]
    fn configuration_error_names_type() {
        let err = NodeError::Configuration {
            node_type: "unknown_x".to_string(),
        };
        assert!(err.to_string().contains("unknown_x"));
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn node_failed_wraps_domain_message() {
        let err = ExecutionError::NodeFailed {
            node_id: NodeId::from("extract"),
            error: NodeError::domain("plugin pdf timed out"),
        };
        assert_eq!(err.to_string(), "node extract failed: plugin pdf timed out");
    }
}

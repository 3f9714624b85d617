//! Workflow definitions as handed over by the persistence layer.
//!
//! The engine treats definitions as read-only.

use crate::graph::WorkflowGraph;
use nodeflow_core::WorkflowId;
use serde::{Deserialize, Serialize};

/// A named workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Description of what this workflow does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The nodes and connections.
    #[serde(flatten)]
    pub graph: WorkflowGraph,
}

impl Workflow {
    /// Creates an empty workflow with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(WorkflowId::new(), name)
    }

    /// Creates an empty workflow with a specific id.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            graph: WorkflowGraph::new(),
        }
    }

    /// Replaces the graph.
    #[must_use]
    pub fn with_graph(mut self, graph: WorkflowGraph) -> Self {
        self.graph = graph;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::node::NodeDefinition;
    use serde_json::json;

    #[test]
    fn graph_fields_are_flattened() {
        let mut graph = WorkflowGraph::new();
        graph
            .add_node(NodeDefinition::new("a", "constant"))
            .add_node(NodeDefinition::new("b", "passthrough"));
        graph.connect(Connection::new("a", "b"));
        let workflow = Workflow::new("ingest").with_graph(graph);

        let value = serde_json::to_value(&workflow).expect("serialize");
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["connections"][0]["to_port"], json!("input"));
        assert!(value.get("description").is_none());

        let parsed: Workflow = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, workflow);
    }
}

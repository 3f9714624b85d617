//! Per-execution state.
//!
//! An `ExecutionContext` lives for exactly one run. It is owned by the task
//! driving that run and never shared with other runs, so it needs no
//! locking. Processors only read it; the executor records each node's
//! outcome exactly once.

use crate::definition::Workflow;
use crate::error::ExecutionError;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use nodeflow_core::{ExecutionId, WorkflowId};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Alias for the keyed maps flowing between nodes.
pub type JsonMap = Map<String, JsonValue>;

/// State of one workflow run.
#[derive(Debug)]
pub struct ExecutionContext {
    execution_id: ExecutionId,
    workflow: Arc<Workflow>,
    input_data: JsonMap,
    node_results: HashMap<NodeId, JsonValue>,
    node_errors: HashMap<NodeId, String>,
    shared_data: JsonMap,
    started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Creates a context for a new run of `workflow`.
    #[must_use]
    pub fn new(workflow: Arc<Workflow>, input_data: JsonMap) -> Self {
        Self::with_id(ExecutionId::new(), workflow, input_data)
    }

    /// Creates a context with a caller-chosen execution id.
    #[must_use]
    pub fn with_id(execution_id: ExecutionId, workflow: Arc<Workflow>, input_data: JsonMap) -> Self {
        Self {
            execution_id,
            workflow,
            input_data,
            node_results: HashMap::new(),
            node_errors: HashMap::new(),
            shared_data: JsonMap::new(),
            started_at: Utc::now(),
        }
    }

    /// The id of this run.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// The workflow being run.
    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow.id
    }

    /// The workflow definition.
    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// The triggering payload.
    #[must_use]
    pub fn input_data(&self) -> &JsonMap {
        &self.input_data
    }

    /// When the context was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Resolves the input map for `node_id`.
    ///
    /// Precedence, lowest to highest: the triggering payload, values carried
    /// by incoming connections (in declaration order, so the last connection
    /// into a port wins), then shared data.
    #[must_use]
    pub fn get_input_for_node(&self, node_id: &NodeId) -> JsonMap {
        let mut input = self.input_data.clone();

        for conn in self.workflow.graph.incoming(node_id) {
            let result = match self.node_results.get(&conn.from_node_id) {
                Some(result) if !result.is_null() => result,
                _ => {
                    debug!(
                        from = %conn.from_node_id,
                        to = %node_id,
                        "no upstream result, skipping connection"
                    );
                    continue;
                }
            };

            let value = match result {
                JsonValue::Object(map) if !conn.from_port.is_empty() => map
                    .get(&conn.from_port)
                    .cloned()
                    .unwrap_or_else(|| result.clone()),
                _ => result.clone(),
            };

            let key = conn.target_key();
            debug!(
                from = %conn.from_node_id,
                from_port = %conn.from_port,
                to = %node_id,
                to_port = %key,
                "connection resolved"
            );
            input.insert(key, value);
        }

        for (key, value) in &self.shared_data {
            input.insert(key.clone(), value.clone());
        }
        input
    }

    /// Records a node's result.
    ///
    /// # Errors
    ///
    /// Returns `OutcomeAlreadyRecorded` if this node already has a result or
    /// an error in this run.
    pub fn set_node_result(&mut self, node_id: NodeId, result: JsonValue) -> Result<(), ExecutionError> {
        self.ensure_unrecorded(&node_id)?;
        self.node_results.insert(node_id, result);
        Ok(())
    }

    /// Records a node's error.
    ///
    /// # Errors
    ///
    /// Returns `OutcomeAlreadyRecorded` if this node already has a result or
    /// an error in this run.
    pub fn set_node_error(&mut self, node_id: NodeId, error: impl Into<String>) -> Result<(), ExecutionError> {
        self.ensure_unrecorded(&node_id)?;
        self.node_errors.insert(node_id, error.into());
        Ok(())
    }

    fn ensure_unrecorded(&self, node_id: &NodeId) -> Result<(), ExecutionError> {
        if self.node_results.contains_key(node_id) || self.node_errors.contains_key(node_id) {
            return Err(ExecutionError::OutcomeAlreadyRecorded {
                node_id: node_id.clone(),
            });
        }
        Ok(())
    }

    /// Returns a node's result, if it has one.
    #[must_use]
    pub fn node_result(&self, node_id: &NodeId) -> Option<&JsonValue> {
        self.node_results.get(node_id)
    }

    /// Returns a node's error, if it has one.
    #[must_use]
    pub fn node_error(&self, node_id: &NodeId) -> Option<&str> {
        self.node_errors.get(node_id).map(String::as_str)
    }

    /// All recorded results.
    #[must_use]
    pub fn node_results(&self) -> &HashMap<NodeId, JsonValue> {
        &self.node_results
    }

    /// All recorded errors.
    #[must_use]
    pub fn node_errors(&self) -> &HashMap<NodeId, String> {
        &self.node_errors
    }

    /// Whether any node has failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.node_errors.is_empty()
    }

    /// Cross-node scratch data.
    #[must_use]
    pub fn shared_data(&self) -> &JsonMap {
        &self.shared_data
    }

    /// Sets a shared value, visible in every node's resolved input.
    pub fn set_shared(&mut self, key: impl Into<String>, value: JsonValue) {
        self.shared_data.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::graph::WorkflowGraph;
    use crate::node::NodeDefinition;
    use serde_json::json;

    fn context_for(graph: WorkflowGraph, input: JsonValue) -> ExecutionContext {
        let workflow = Arc::new(Workflow::new("test").with_graph(graph));
        let input = match input {
            JsonValue::Object(map) => map,
            _ => JsonMap::new(),
        };
        ExecutionContext::new(workflow, input)
    }

    fn two_nodes() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph
            .add_node(NodeDefinition::new("a", "constant"))
            .add_node(NodeDefinition::new("b", "passthrough"));
        graph
    }

    #[test]
    fn last_connection_into_a_port_wins() {
        let mut graph = two_nodes();
        graph
            .connect(Connection::new("a", "b").ports("out", "in"))
            .connect(Connection::new("a", "b").ports("out2", "in"));
        let mut ctx = context_for(graph, json!({}));
        ctx.set_node_result(NodeId::from("a"), json!({"out": 1, "out2": 2}))
            .expect("first write");

        let input = ctx.get_input_for_node(&NodeId::from("b"));
        assert_eq!(input.get("in"), Some(&json!(2)));
    }

    #[test]
    fn precedence_is_payload_then_graph_then_shared() {
        let mut graph = two_nodes();
        graph.connect(Connection::new("a", "b").ports("text", "text"));
        let mut ctx = context_for(graph, json!({"text": "payload", "topic": "payload", "keep": 1}));
        ctx.set_node_result(NodeId::from("a"), json!({"text": "graph"}))
            .expect("write");
        ctx.set_shared("topic", json!("shared"));

        let input = ctx.get_input_for_node(&NodeId::from("b"));
        assert_eq!(input["text"], json!("graph"));
        assert_eq!(input["topic"], json!("shared"));
        assert_eq!(input["keep"], json!(1));
    }

    #[test]
    fn missing_or_null_upstream_is_skipped() {
        let mut graph = two_nodes();
        graph.add_node(NodeDefinition::new("c", "constant"));
        graph
            .connect(Connection::new("a", "b"))
            .connect(Connection::new("c", "b").ports("output", "other"));
        let mut ctx = context_for(graph, json!({}));
        ctx.set_node_result(NodeId::from("c"), JsonValue::Null)
            .expect("write");

        let input = ctx.get_input_for_node(&NodeId::from("b"));
        assert!(input.is_empty());
    }

    #[test]
    fn scalar_results_and_missing_ports_pass_whole_value() {
        let mut graph = two_nodes();
        graph.add_node(NodeDefinition::new("c", "constant"));
        graph
            .connect(Connection::new("a", "b").ports("output", "scalar"))
            .connect(Connection::new("c", "b").ports("nope", ""));
        let mut ctx = context_for(graph, json!({}));
        ctx.set_node_result(NodeId::from("a"), json!("hello")).expect("write");
        ctx.set_node_result(NodeId::from("c"), json!({"x": 1})).expect("write");

        let input = ctx.get_input_for_node(&NodeId::from("b"));
        assert_eq!(input["scalar"], json!("hello"));
        assert_eq!(input["input_from_c"], json!({"x": 1}));
    }

    #[test]
    fn outcomes_are_write_once() {
        let mut ctx = context_for(two_nodes(), json!({}));
        let a = NodeId::from("a");
        assert!(!ctx.has_errors());

        ctx.set_node_error(a.clone(), "boom").expect("first write");
        assert!(ctx.has_errors());
        assert_eq!(ctx.node_error(&a), Some("boom"));

        assert_eq!(
            ctx.set_node_result(a.clone(), json!(1)),
            Err(ExecutionError::OutcomeAlreadyRecorded { node_id: a.clone() })
        );
        assert!(ctx.set_node_error(a, "again").is_err());
    }
}

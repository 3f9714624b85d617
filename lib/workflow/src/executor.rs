//! The workflow executor.
//!
//! Runs one workflow to a terminal state:
//!
//! 1. Schedule: topological order over the graph (optionally narrowed to a
//!    target node and everything downstream of it). A malformed graph fails
//!    the run before any node starts.
//! 2. For each node, in order: check cancellation, resolve the node's input,
//!    validate and convert it against the registered schema, dispatch to the
//!    processor and record the outcome.
//! 3. The first node error fails the run; nothing after it is scheduled.
//!
//! Nodes within a run execute sequentially. Separate runs share only the
//! registry and may execute concurrently.

use crate::context::{ExecutionContext, JsonMap};
use crate::definition::Workflow;
use crate::error::{ExecutionError, NodeError};
use crate::execution::ExecutionRecord;
use crate::node::{NodeDefinition, NodeId};
use crate::port::NodeSchema;
use crate::processor::ProcessorKind;
use crate::registry::NodeRegistry;
use nodeflow_core::{ExecutionId, TriggerId};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Everything needed to start one run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Id assigned to the run.
    pub execution_id: ExecutionId,
    /// The workflow to run.
    pub workflow: Arc<Workflow>,
    /// The triggering payload.
    pub input_data: JsonMap,
    /// The trigger that launched the run, if any.
    pub trigger_id: Option<TriggerId>,
    /// Restricts the run to this node and its downstream nodes.
    pub target_node_id: Option<NodeId>,
    /// Initial shared data.
    pub shared_data: JsonMap,
}

impl ExecutionRequest {
    /// Creates a request for a full run of `workflow`.
    #[must_use]
    pub fn new(workflow: Arc<Workflow>, input_data: JsonMap) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            workflow,
            input_data,
            trigger_id: None,
            target_node_id: None,
            shared_data: JsonMap::new(),
        }
    }

    /// Sets the launching trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger_id: TriggerId) -> Self {
        self.trigger_id = Some(trigger_id);
        self
    }

    /// Narrows the run to `node_id` and everything downstream of it.
    #[must_use]
    pub fn with_target_node(mut self, node_id: NodeId) -> Self {
        self.target_node_id = Some(node_id);
        self
    }

    /// Adds an initial shared value.
    #[must_use]
    pub fn with_shared(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.shared_data.insert(key.into(), value);
        self
    }
}

/// Executes workflows against a node registry.
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
}

impl WorkflowExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this executor dispatches through.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Runs a workflow to completion without a cancellation handle.
    pub async fn run(&self, workflow: Arc<Workflow>, input_data: JsonMap) -> ExecutionRecord {
        self.execute(ExecutionRequest::new(workflow, input_data), CancellationToken::new())
            .await
    }

    /// Runs the request to a terminal state and returns its record.
    ///
    /// Never fails: scheduling errors and node errors end up in the record.
    #[instrument(
        name = "workflow_run",
        skip_all,
        fields(
            execution_id = %request.execution_id,
            workflow_id = %request.workflow.id,
        )
    )]
    pub async fn execute(&self, request: ExecutionRequest, cancel: CancellationToken) -> ExecutionRecord {
        let ExecutionRequest {
            execution_id,
            workflow,
            input_data,
            trigger_id,
            target_node_id,
            shared_data,
        } = request;

        let mut ctx = ExecutionContext::with_id(execution_id, Arc::clone(&workflow), input_data);
        for (key, value) in shared_data {
            ctx.set_shared(key, value);
        }
        let mut record = ExecutionRecord::new(
            execution_id,
            workflow.id,
            trigger_id,
            ctx.input_data().clone(),
            ctx.started_at(),
        );

        let order = match self.schedule(&workflow, target_node_id.as_ref()) {
            Ok(order) => order,
            Err(e) => {
                error!(error = %e, "workflow could not be scheduled");
                finish(&mut record, |r| r.fail(e.to_string(), JsonMap::new()));
                return record;
            }
        };

        for warning in workflow
            .graph
            .connection_warnings(|node| self.registry.schema_for(&node.node_type))
        {
            warn!(
                from = %warning.from_node_id,
                to = %warning.to_node_id,
                "{}", warning.message
            );
        }

        info!(nodes = order.len(), "starting workflow run");

        for node_id in &order {
            if cancel.is_cancelled() {
                info!(next_node = %node_id, "run cancelled");
                finish(&mut record, |r| r.cancel(outputs(&ctx)));
                return record;
            }

            let Some(node) = workflow.graph.node(node_id) else {
                continue;
            };
            finish(&mut record, ExecutionRecord::start);

            match self.run_node(node, &ctx).await {
                Ok((kind, result)) => {
                    if kind == ProcessorKind::Unavailable {
                        record.degraded_nodes.push(node_id.clone());
                    }
                    if let Err(e) = ctx.set_node_result(node_id.clone(), result) {
                        error!(error = %e, "failed to record node result");
                    }
                }
                Err(node_error) => {
                    if let Err(e) = ctx.set_node_error(node_id.clone(), node_error.to_string()) {
                        error!(error = %e, "failed to record node error");
                    }
                    let failure = ExecutionError::NodeFailed {
                        node_id: node_id.clone(),
                        error: node_error,
                    };
                    error!(error = %failure, "node failed, stopping run");
                    finish(&mut record, |r| r.fail(failure.to_string(), outputs(&ctx)));
                    return record;
                }
            }
        }

        finish(&mut record, |r| r.complete(outputs(&ctx)));
        info!(
            status = %record.status,
            execution_time_ms = ?record.execution_time_ms,
            degraded = record.degraded_nodes.len(),
            "workflow run finished"
        );
        record
    }

    fn schedule(&self, workflow: &Workflow, target: Option<&NodeId>) -> Result<Vec<NodeId>, ExecutionError> {
        let order = workflow.graph.execution_order()?;
        let Some(target) = target else {
            return Ok(order);
        };
        let keep = workflow.graph.downstream_of(target)?;
        Ok(order.into_iter().filter(|id| keep.contains(id)).collect())
    }

    #[instrument(skip_all, fields(node_id = %node.id, node_type = %node.node_type))]
    async fn run_node(
        &self,
        node: &NodeDefinition,
        ctx: &ExecutionContext,
    ) -> Result<(ProcessorKind, JsonValue), NodeError> {
        let resolved = self.registry.get(&node.node_type)?;

        let mut input = ctx.get_input_for_node(&node.id);
        if let Some(schema) = self.registry.schema_for(&node.node_type) {
            apply_schema(&schema, &mut input);
        }

        debug!(kind = %resolved.kind, inputs = input.len(), "dispatching node");
        let result = resolved.processor.execute(node, input, ctx).await?;
        Ok((resolved.kind, result))
    }
}

/// Validates and converts inputs in place.
///
/// Failures are logged and the raw value is kept; a missing required input
/// does not stop the node.
fn apply_schema(schema: &NodeSchema, input: &mut JsonMap) {
    for port in &schema.input_ports {
        let Some(value) = input.get_mut(&port.name) else {
            if port.required {
                warn!(port = %port.name, "required input is missing");
            }
            continue;
        };
        match port.convert(value) {
            Ok(converted) if converted != *value => {
                debug!(port = %port.name, data_type = %port.data_type, "converted input");
                *value = converted;
            }
            Ok(_) => {}
            Err(e) => warn!(port = %port.name, error = %e, "input failed validation"),
        }
    }
}

fn outputs(ctx: &ExecutionContext) -> JsonMap {
    ctx.node_results()
        .iter()
        .map(|(id, result)| (id.to_string(), result.clone()))
        .collect()
}

fn finish<F>(record: &mut ExecutionRecord, transition: F)
where
    F: FnOnce(&mut ExecutionRecord) -> Result<(), ExecutionError>,
{
    if let Err(e) = transition(record) {
        error!(error = %e, status = %record.status, "illegal execution state transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::execution::ExecutionStatus;
    use crate::data_type::DataType;
    use crate::graph::WorkflowGraph;
    use crate::port::PortSchema;
    use crate::processor::NodeProcessor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every input it sees and echoes it back.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(NodeId, JsonMap)>>,
    }

    #[async_trait]
    impl NodeProcessor for Recording {
        async fn execute(
            &self,
            node: &NodeDefinition,
            input: JsonMap,
            _context: &ExecutionContext,
        ) -> Result<JsonValue, NodeError> {
            self.seen.lock().unwrap().push((node.id.clone(), input.clone()));
            Ok(JsonValue::Object(input))
        }
    }

    /// Cancels the token it holds, then succeeds.
    struct Canceller(CancellationToken);

    #[async_trait]
    impl NodeProcessor for Canceller {
        async fn execute(
            &self,
            _node: &NodeDefinition,
            _input: JsonMap,
            _context: &ExecutionContext,
        ) -> Result<JsonValue, NodeError> {
            self.0.cancel();
            Ok(json!({"cancelled": true}))
        }
    }

    fn map(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(m) => m,
            _ => JsonMap::new(),
        }
    }

    fn workflow(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> Arc<Workflow> {
        let mut graph = WorkflowGraph::new();
        for (id, node_type) in nodes {
            graph.add_node(NodeDefinition::new(*id, *node_type));
        }
        for (from, to) in edges {
            graph.connect(Connection::new(*from, *to));
        }
        Arc::new(Workflow::new("test").with_graph(graph))
    }

    fn executor_with(extra: &[(&str, Arc<dyn NodeProcessor>)]) -> WorkflowExecutor {
        let registry = NodeRegistry::with_builtins();
        for (node_type, processor) in extra {
            registry.register(*node_type, Arc::clone(processor));
        }
        WorkflowExecutor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn linear_chain_completes() {
        let wf = workflow(
            &[("a", "passthrough"), ("b", "passthrough"), ("c", "passthrough")],
            &[("a", "b"), ("b", "c")],
        );
        let record = executor_with(&[]).run(wf, map(json!({"x": 1}))).await;

        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.status.is_success());
        assert!(record.error_message.is_none());
        assert!(record.execution_time_ms.is_some());
        assert_eq!(record.output_data.len(), 3);
        assert_eq!(record.output_data["c"]["x"], json!(1));
        assert_eq!(record.output_data["c"]["input"]["x"], json!(1));
    }

    #[tokio::test]
    async fn empty_workflow_completes() {
        let record = executor_with(&[]).run(workflow(&[], &[]), JsonMap::new()).await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.output_data.is_empty());
    }

    #[tokio::test]
    async fn unknown_node_type_fails_the_node() {
        let recording = Arc::new(Recording::default());
        let wf = workflow(
            &[("a", "rec"), ("b", "unknown_x"), ("c", "rec")],
            &[("a", "b"), ("b", "c")],
        );
        let record = executor_with(&[("rec", recording.clone())]).run(wf, JsonMap::new()).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        let message = record.error_message.expect("error message");
        assert!(message.contains("unknown_x"), "{message}");
        assert!(message.contains("configuration error"), "{message}");
        assert!(record.output_data.contains_key("a"));
        assert!(!record.output_data.contains_key("c"));

        let seen: Vec<NodeId> = recording.seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(seen, vec![NodeId::from("a")]);
    }

    #[tokio::test]
    async fn cycle_fails_before_any_node_runs() {
        let recording = Arc::new(Recording::default());
        let wf = workflow(
            &[("a", "rec"), ("b", "rec"), ("c", "rec")],
            &[("a", "b"), ("b", "c"), ("c", "a")],
        );
        let record = executor_with(&[("rec", recording.clone())]).run(wf, JsonMap::new()).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error_message.is_some_and(|m| m.contains("cycle")));
        assert!(recording.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_failure_stops_scheduling() {
        let recording = Arc::new(Recording::default());
        let mut graph = WorkflowGraph::new();
        graph
            .add_node(NodeDefinition::new("a", "rec"))
            .add_node(NodeDefinition::new("b", "fail").with_config("message", json!("drill")))
            .add_node(NodeDefinition::new("c", "rec"));
        graph.connect(Connection::new("a", "b")).connect(Connection::new("b", "c"));
        let wf = Arc::new(Workflow::new("failing").with_graph(graph));

        let record = executor_with(&[("rec", recording.clone())]).run(wf, JsonMap::new()).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("node b failed: drill"));
        let seen: Vec<NodeId> = recording.seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(seen, vec![NodeId::from("a")]);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let wf = workflow(&[("a", "passthrough")], &[]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let record = executor_with(&[])
            .execute(ExecutionRequest::new(wf, JsonMap::new()), cancel)
            .await;

        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert!(record.output_data.is_empty());
    }

    #[tokio::test]
    async fn cancellation_is_observed_between_nodes() {
        let cancel = CancellationToken::new();
        let recording = Arc::new(Recording::default());
        let wf = workflow(&[("a", "cancel"), ("b", "rec")], &[("a", "b")]);
        let executor = executor_with(&[
            ("cancel", Arc::new(Canceller(cancel.clone()))),
            ("rec", recording.clone()),
        ]);

        let record = executor
            .execute(ExecutionRequest::new(wf, JsonMap::new()), cancel)
            .await;

        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert_eq!(record.output_data["a"], json!({"cancelled": true}));
        assert!(recording.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn target_node_runs_only_downstream() {
        let recording = Arc::new(Recording::default());
        let wf = workflow(
            &[("a", "rec"), ("b", "rec"), ("c", "rec")],
            &[("a", "b"), ("b", "c")],
        );
        let request = ExecutionRequest::new(wf, JsonMap::new()).with_target_node(NodeId::from("b"));

        let record = executor_with(&[("rec", recording.clone())])
            .execute(request, CancellationToken::new())
            .await;

        assert_eq!(record.status, ExecutionStatus::Completed);
        let seen: Vec<NodeId> = recording.seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(seen, vec![NodeId::from("b"), NodeId::from("c")]);
    }

    #[tokio::test]
    async fn unknown_target_node_fails() {
        let wf = workflow(&[("a", "passthrough")], &[]);
        let request = ExecutionRequest::new(wf, JsonMap::new()).with_target_node(NodeId::from("zzz"));
        let record = executor_with(&[]).execute(request, CancellationToken::new()).await;
        assert_eq!(record.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn unavailable_plugin_degrades_but_completes() {
        let wf = workflow(
            &[("ocr", "plugin:vision/ocr"), ("after", "passthrough")],
            &[("ocr", "after")],
        );
        let record = executor_with(&[]).run(wf, JsonMap::new()).await;

        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.degraded_nodes, vec![NodeId::from("ocr")]);
        assert_eq!(record.output_data["ocr"]["status"], json!("unavailable"));
    }

    #[tokio::test]
    async fn inputs_are_converted_to_schema_types() {
        let recording = Arc::new(Recording::default());
        let executor = executor_with(&[("rec", recording.clone())]);
        executor.registry().register_schema(
            "rec",
            NodeSchema::new(
                vec![
                    PortSchema::required("count", DataType::Number),
                    PortSchema::required("flag", DataType::Boolean),
                    PortSchema::required("absent", DataType::String),
                    PortSchema::optional("email", DataType::Email),
                ],
                vec![],
            ),
        );
        let wf = workflow(&[("a", "rec")], &[]);

        let record = executor
            .run(wf, map(json!({"count": "42", "flag": "yes", "email": "nope"})))
            .await;

        assert_eq!(record.status, ExecutionStatus::Completed);
        let seen = recording.seen.lock().unwrap();
        let input = &seen[0].1;
        assert_eq!(input["count"], json!(42));
        assert_eq!(input["flag"], json!(true));
        assert_eq!(input["email"], json!("nope"));
        assert!(!input.contains_key("absent"));
    }

    #[tokio::test]
    async fn shared_data_reaches_every_node() {
        let recording = Arc::new(Recording::default());
        let wf = workflow(&[("a", "rec"), ("b", "rec")], &[("a", "b")]);
        let request = ExecutionRequest::new(wf, map(json!({"event_type": "payload"})))
            .with_shared("event_type", json!("file_upload"));

        executor_with(&[("rec", recording.clone())])
            .execute(request, CancellationToken::new())
            .await;

        for (_, input) in recording.seen.lock().unwrap().iter() {
            assert_eq!(input["event_type"], json!("file_upload"));
        }
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let executor = executor_with(&[]);
        let wf = workflow(&[("a", "passthrough")], &[]);

        let (one, two) = tokio::join!(
            executor.run(Arc::clone(&wf), map(json!({"n": 1}))),
            executor.run(Arc::clone(&wf), map(json!({"n": 2}))),
        );

        assert_ne!(one.execution_id, two.execution_id);
        assert_eq!(one.output_data["a"]["n"], json!(1));
        assert_eq!(two.output_data["a"]["n"], json!(2));
    }
}

//! Event matching and run dispatch.
//!
//! For each inbound event the engine selects every active trigger whose
//! event type and source match and whose conditions hold, then launches one
//! workflow run per match on its own task. Runs never share state; a failed
//! or slow run does not affect its siblings.

use crate::condition::Conditions;
use crate::error::TriggerError;
use crate::store::{ExecutionSink, WorkflowStore};
use crate::trigger::{Event, Trigger};
use nodeflow_core::{ExecutionId, TriggerId};
use chrono::Utc;
use nodeflow_workflow::{ExecutionRecord, ExecutionRequest, JsonMap, WorkflowExecutor};
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// A trigger with its conditions compiled.
#[derive(Debug, Clone)]
struct ArmedTrigger {
    trigger: Trigger,
    conditions: Conditions,
}

/// A run launched for an event.
#[derive(Debug)]
pub struct LaunchedRun {
    /// The trigger that matched.
    pub trigger_id: TriggerId,
    /// The run's id; pass to [`TriggerEngine::cancel`].
    pub execution_id: ExecutionId,
    /// Resolves to the finished record.
    pub handle: JoinHandle<ExecutionRecord>,
}

type RunningRuns = Arc<Mutex<HashMap<ExecutionId, CancellationToken>>>;

/// Drops a run's cancel token from the running set, even if the run task
/// unwinds.
struct RunningEntry {
    running: RunningRuns,
    execution_id: ExecutionId,
}

impl Drop for RunningEntry {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.execution_id);
    }
}

/// Matches events against triggers and launches workflow runs.
pub struct TriggerEngine {
    executor: WorkflowExecutor,
    workflows: Arc<dyn WorkflowStore>,
    sink: Arc<dyn ExecutionSink>,
    triggers: RwLock<HashMap<TriggerId, ArmedTrigger>>,
    running: RunningRuns,
    tasks: TaskTracker,
}

impl std::fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("triggers", &self.trigger_count())
            .field("running", &self.running_count())
            .finish_non_exhaustive()
    }
}

impl TriggerEngine {
    /// Creates an engine with no triggers.
    #[must_use]
    pub fn new(executor: WorkflowExecutor, workflows: Arc<dyn WorkflowStore>, sink: Arc<dyn ExecutionSink>) -> Self {
        Self {
            executor,
            workflows,
            sink,
            triggers: RwLock::new(HashMap::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
            tasks: TaskTracker::new(),
        }
    }

    /// Adds or replaces a trigger.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidConfig` if the conditions do not
    /// compile; the trigger is not stored.
    pub fn upsert(&self, trigger: Trigger) -> nodeflow_core::Result<(), TriggerError> {
        let conditions = trigger.compile_conditions().map_err(TriggerError::from)?;
        debug!(trigger_id = %trigger.id, event_type = %trigger.event_type, "trigger armed");
        self.triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(trigger.id, ArmedTrigger { trigger, conditions });
        Ok(())
    }

    /// Adds triggers in bulk, skipping any whose conditions do not compile.
    ///
    /// Returns how many were stored.
    pub fn load(&self, triggers: impl IntoIterator<Item = Trigger>) -> usize {
        let mut loaded = 0;
        for trigger in triggers {
            let id = trigger.id;
            match self.upsert(trigger) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(trigger_id = %id, error = %e, "skipping trigger"),
            }
        }
        info!(loaded, "triggers loaded");
        loaded
    }

    /// Removes a trigger.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::NotFound` if no such trigger is stored.
    pub fn remove(&self, id: TriggerId) -> nodeflow_core::Result<Trigger, TriggerError> {
        self.triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|armed| armed.trigger)
            .ok_or_else(|| TriggerError::NotFound { id }.into())
    }

    /// Number of stored triggers.
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.triggers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of runs still in flight.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the triggers that match `event`, ordered by id.
    ///
    /// A trigger whose conditions cannot be evaluated is logged and treated
    /// as not matching.
    #[must_use]
    pub fn matching_triggers(&self, event: &Event) -> Vec<Trigger> {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<Trigger> = triggers
            .values()
            .filter(|armed| armed.trigger.selects(event))
            .filter(|armed| match armed.conditions.evaluate(&event.payload) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!(trigger_id = %armed.trigger.id, error = %e, "condition evaluation failed");
                    false
                }
            })
            .map(|armed| armed.trigger.clone())
            .collect();
        matched.sort_by_key(|t| t.id);
        matched
    }

    /// Launches one run per matching trigger.
    ///
    /// Returns once the runs are spawned; the runs themselves continue in
    /// the background and their records go to the sink.
    pub async fn handle_event(&self, event: Event) -> Vec<LaunchedRun> {
        let matched = self.matching_triggers(&event);
        info!(
            event_type = %event.event_type,
            source = event.source.as_deref().unwrap_or(""),
            matched = matched.len(),
            "event received"
        );

        let mut launched = Vec::with_capacity(matched.len());
        for trigger in matched {
            match self.launch(&trigger, &event).await {
                Ok(run) => launched.push(run),
                Err(e) => error!(trigger_id = %trigger.id, error = %e, "failed to launch run"),
            }
        }
        launched
    }

    async fn launch(&self, trigger: &Trigger, event: &Event) -> Result<LaunchedRun, TriggerError> {
        if self.tasks.is_closed() {
            return Err(TriggerError::ShutDown);
        }
        let workflow = self.workflows.get(trigger.workflow_id).await?;

        let mut request = ExecutionRequest::new(workflow, event.payload.clone())
            .with_trigger(trigger.id)
            .with_shared("trigger_id", json!(trigger.id.to_string()))
            .with_shared("event_type", json!(event.event_type))
            .with_shared(
                "event_source",
                event.source.clone().map_or(JsonValue::Null, JsonValue::String),
            )
            .with_shared("event_metadata", JsonValue::Object(event.metadata.clone()));
        if let Some(node_id) = &trigger.target_node_id {
            request = request.with_target_node(node_id.clone());
        }

        let execution_id = request.execution_id;
        let cancel = CancellationToken::new();
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(execution_id, cancel.clone());

        let entry = RunningEntry {
            running: Arc::clone(&self.running),
            execution_id,
        };
        let executor = self.executor.clone();
        let sink = Arc::clone(&self.sink);
        let trigger_id = trigger.id;
        let workflow_id = request.workflow.id;
        let input_data = request.input_data.clone();
        let span = info_span!("triggered_run", %trigger_id, %execution_id);

        let handle = self.tasks.spawn(
            async move {
                let started_at = Utc::now();
                let run = tokio::spawn(
                    async move { executor.execute(request, cancel).await }.in_current_span(),
                );
                let record = match run.await {
                    Ok(record) => record,
                    Err(e) => {
                        error!(error = %e, "workflow run aborted");
                        let mut record = ExecutionRecord::new(
                            execution_id,
                            workflow_id,
                            Some(trigger_id),
                            input_data,
                            started_at,
                        );
                        if let Err(e) = record.fail(format!("run aborted: {e}"), JsonMap::new()) {
                            error!(error = %e, "failed to mark aborted run");
                        }
                        record
                    }
                };
                drop(entry);
                if let Err(e) = sink.record(&record).await {
                    error!(error = %e, "failed to persist execution record");
                }
                record
            }
            .instrument(span),
        );

        Ok(LaunchedRun {
            trigger_id: trigger.id,
            execution_id,
            handle,
        })
    }

    /// Requests cancellation of a live run. The run stops before its next
    /// node; a node already executing is allowed to finish.
    ///
    /// Returns false if the run is unknown or already finished.
    pub fn cancel(&self, execution_id: ExecutionId) -> bool {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.get(&execution_id) {
            Some(token) => {
                info!(%execution_id, "cancelling run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Waits for every launched run to finish. Events handled afterwards
    /// launch nothing.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryExecutionSink, InMemoryWorkflowStore};
    use nodeflow_core::WorkflowId;
    use async_trait::async_trait;
    use nodeflow_workflow::{
        ExecutionContext, ExecutionStatus, NodeDefinition, NodeError, NodeProcessor, NodeRegistry, Workflow,
        WorkflowGraph,
    };

    struct Explode;

    #[async_trait]
    impl NodeProcessor for Explode {
        async fn execute(
            &self,
            _node: &NodeDefinition,
            _input: JsonMap,
            _context: &ExecutionContext,
        ) -> Result<JsonValue, NodeError> {
            panic!("processor bug");
        }
    }

    fn engine_with(workflow: Workflow) -> (TriggerEngine, Arc<InMemoryExecutionSink>) {
        let store = InMemoryWorkflowStore::new();
        store.insert(workflow);
        let sink = Arc::new(InMemoryExecutionSink::new());
        let registry = NodeRegistry::with_builtins();
        registry.register("explode", Arc::new(Explode));
        let executor = WorkflowExecutor::new(Arc::new(registry));
        (TriggerEngine::new(executor, Arc::new(store), sink.clone()), sink)
    }

    fn single_node_workflow() -> Workflow {
        let mut graph = WorkflowGraph::new();
        graph.add_node(NodeDefinition::new("entry", "passthrough"));
        Workflow::new("single").with_graph(graph)
    }

    #[test]
    fn invalid_conditions_are_rejected_on_upsert() {
        let (engine, _) = engine_with(single_node_workflow());
        let trigger = Trigger::new("x", WorkflowId::new()).with_conditions(json!({"a": {"$bogus": 1}}));
        assert!(engine.upsert(trigger).is_err());
        assert_eq!(engine.trigger_count(), 0);
    }

    #[test]
    fn load_skips_bad_triggers() {
        let (engine, _) = engine_with(single_node_workflow());
        let good = Trigger::new("x", WorkflowId::new());
        let bad = Trigger::new("x", WorkflowId::new()).with_conditions(json!("nope"));
        assert_eq!(engine.load([good, bad]), 1);
    }

    #[test]
    fn remove_unknown_trigger_fails() {
        let (engine, _) = engine_with(single_node_workflow());
        let trigger = Trigger::new("x", WorkflowId::new());
        let id = trigger.id;
        engine.upsert(trigger).expect("upsert");
        assert!(engine.remove(id).is_ok());
        assert!(engine.remove(id).is_err());
    }

    #[tokio::test]
    async fn file_upload_scenario_completes() {
        let workflow = single_node_workflow();
        let trigger = Trigger::new("file_upload", workflow.id)
            .with_source("monitor")
            .with_conditions(json!({"filename_pattern": "\\.pdf$"}));
        let trigger_id = trigger.id;
        let (engine, sink) = engine_with(workflow);
        engine.upsert(trigger).expect("upsert");

        let event = Event::new("file_upload")
            .with_source("monitor")
            .with_payload(json!({"filename": "a.pdf", "size": 2048}));
        let runs = engine.handle_event(event).await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].trigger_id, trigger_id);

        let record = runs.into_iter().next().expect("run").handle.await.expect("join");
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.trigger_id, Some(trigger_id));

        let entry = &record.output_data["entry"];
        assert_eq!(entry["filename"], json!("a.pdf"));
        assert_eq!(entry["event_type"], json!("file_upload"));
        assert_eq!(entry["event_source"], json!("monitor"));
        assert_eq!(entry["trigger_id"], json!(trigger_id.to_string()));

        engine.shutdown().await;
        assert_eq!(sink.records().len(), 1);
        assert_eq!(engine.running_count(), 0);
    }

    #[tokio::test]
    async fn non_matching_event_launches_nothing() {
        let workflow = single_node_workflow();
        let trigger = Trigger::new("file_upload", workflow.id).with_conditions(json!({"size": {"$gt": 100}}));
        let (engine, sink) = engine_with(workflow);
        engine.upsert(trigger).expect("upsert");

        let runs = engine
            .handle_event(Event::new("file_upload").with_payload(json!({"size": 100})))
            .await;
        assert!(runs.is_empty());
        engine.shutdown().await;
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn evaluation_errors_do_not_block_other_triggers() {
        let workflow = single_node_workflow();
        let broken = Trigger::new("e", workflow.id).with_conditions(json!({"size": {"$gt": 10}}));
        let fine = Trigger::new("e", workflow.id);
        let fine_id = fine.id;
        let (engine, _) = engine_with(workflow);
        engine.load([broken, fine]);

        let matched = engine.matching_triggers(&Event::new("e").with_payload(json!({"size": "big"})));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, fine_id);
    }

    #[tokio::test]
    async fn missing_workflow_skips_the_trigger() {
        let (engine, _) = engine_with(single_node_workflow());
        engine.upsert(Trigger::new("e", WorkflowId::new())).expect("upsert");
        assert!(engine.handle_event(Event::new("e")).await.is_empty());
    }

    #[tokio::test]
    async fn shut_down_engine_launches_nothing() {
        let workflow = single_node_workflow();
        let trigger = Trigger::new("e", workflow.id);
        let (engine, sink) = engine_with(workflow);
        engine.upsert(trigger).expect("upsert");

        engine.shutdown().await;
        assert!(engine.handle_event(Event::new("e")).await.is_empty());
        assert!(sink.records().is_empty());
        assert_eq!(engine.running_count(), 0);
    }

    #[tokio::test]
    async fn panicking_run_is_recorded_as_failed() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(NodeDefinition::new("boom", "explode"));
        let workflow = Workflow::new("fragile").with_graph(graph);
        let trigger = Trigger::new("e", workflow.id);
        let trigger_id = trigger.id;
        let (engine, sink) = engine_with(workflow);
        engine.upsert(trigger).expect("upsert");

        let run = engine.handle_event(Event::new("e")).await.into_iter().next().expect("run");
        let record = run.handle.await.expect("join");
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.execution_id, run.execution_id);
        assert_eq!(record.trigger_id, Some(trigger_id));
        assert!(record.error_message.as_deref().is_some_and(|m| m.contains("run aborted")));

        engine.shutdown().await;
        assert_eq!(engine.running_count(), 0);
        assert!(!engine.cancel(run.execution_id));
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn cancel_unknown_run_is_false() {
        let (engine, _) = engine_with(single_node_workflow());
        assert!(!engine.cancel(ExecutionId::new()));
    }
}

//! Workflow lookup and execution record persistence.
//!
//! Both are owned by the layer around the engine; the engine only reads
//! workflows and writes finished records.

use crate::error::TriggerError;
use async_trait::async_trait;
use nodeflow_core::WorkflowId;
use nodeflow_workflow::{ExecutionRecord, Workflow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Source of workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Gets a workflow by id.
    async fn get(&self, id: WorkflowId) -> Result<Arc<Workflow>, TriggerError>;
}

/// Destination for finished execution records.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    /// Persists a record.
    async fn record(&self, record: &ExecutionRecord) -> Result<(), TriggerError>;
}

/// Workflows held in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, Arc<Workflow>>>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a workflow.
    pub fn insert(&self, workflow: Workflow) {
        self.workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(workflow.id, Arc::new(workflow));
    }

    /// Number of stored workflows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workflows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, id: WorkflowId) -> Result<Arc<Workflow>, TriggerError> {
        self.workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(TriggerError::WorkflowNotFound { workflow_id: id })
    }
}

/// Records collected in memory.
#[derive(Debug, Default)]
pub struct InMemoryExecutionSink {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl InMemoryExecutionSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ExecutionSink for InMemoryExecutionSink {
    async fn record(&self, record: &ExecutionRecord) -> Result<(), TriggerError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

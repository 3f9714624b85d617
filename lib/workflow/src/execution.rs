//! Execution records and the run state machine.
//!
//! `Pending → Running → {Completed | Failed | Cancelled}`. A run may also go
//! straight from `Pending` to a terminal state (a cycle detected before any
//! node runs, a cancellation before the first node, an empty graph). Terminal
//! states are entered once.

use crate::context::JsonMap;
use crate::error::ExecutionError;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use nodeflow_core::{ExecutionId, TriggerId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The overall state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Context created, no node started yet.
    Pending,
    /// At least one node has started.
    Running,
    /// Every scheduled node succeeded.
    Completed,
    /// A node failed, or the graph could not be scheduled.
    Failed,
    /// Stopped between node steps.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether every scheduled node succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted record of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique identifier for this run.
    pub execution_id: ExecutionId,
    /// The workflow that ran.
    pub workflow_id: WorkflowId,
    /// The trigger that launched the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<TriggerId>,
    /// Current state.
    pub status: ExecutionStatus,
    /// The triggering payload.
    pub input_data: JsonMap,
    /// Results of the nodes that completed, keyed by node id.
    pub output_data: JsonMap,
    /// The first node error, or the scheduling error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the run's context was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall time from `started_at` to `completed_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
    /// Nodes served by the unavailable fallback.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_nodes: Vec<NodeId>,
}

impl ExecutionRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        trigger_id: Option<TriggerId>,
        input_data: JsonMap,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            trigger_id,
            status: ExecutionStatus::Pending,
            input_data,
            output_data: JsonMap::new(),
            error_message: None,
            started_at,
            completed_at: None,
            execution_time_ms: None,
            degraded_nodes: Vec::new(),
        }
    }

    /// Moves to `Running`. A no-op if already running.
    ///
    /// # Errors
    ///
    /// Fails if the run is already terminal.
    pub fn start(&mut self) -> Result<(), ExecutionError> {
        match self.status {
            ExecutionStatus::Pending => {
                self.status = ExecutionStatus::Running;
                Ok(())
            }
            ExecutionStatus::Running => Ok(()),
            _ => Err(self.invalid(ExecutionStatus::Running)),
        }
    }

    /// Marks the run completed.
    ///
    /// # Errors
    ///
    /// Fails if the run is already terminal.
    pub fn complete(&mut self, output_data: JsonMap) -> Result<(), ExecutionError> {
        self.finish(ExecutionStatus::Completed)?;
        self.output_data = output_data;
        Ok(())
    }

    /// Marks the run failed, keeping the outputs of nodes that did finish.
    ///
    /// # Errors
    ///
    /// Fails if the run is already terminal.
    pub fn fail(&mut self, error: impl Into<String>, output_data: JsonMap) -> Result<(), ExecutionError> {
        self.finish(ExecutionStatus::Failed)?;
        self.error_message = Some(error.into());
        self.output_data = output_data;
        Ok(())
    }

    /// Marks the run cancelled.
    ///
    /// # Errors
    ///
    /// Fails if the run is already terminal.
    pub fn cancel(&mut self, output_data: JsonMap) -> Result<(), ExecutionError> {
        self.finish(ExecutionStatus::Cancelled)?;
        self.output_data = output_data;
        Ok(())
    }

    fn finish(&mut self, to: ExecutionStatus) -> Result<(), ExecutionError> {
        if self.status.is_terminal() {
            return Err(self.invalid(to));
        }
        let now = Utc::now();
        self.status = to;
        self.completed_at = Some(now);
        self.execution_time_ms = Some((now - self.started_at).num_milliseconds());
        Ok(())
    }

    fn invalid(&self, to: ExecutionStatus) -> ExecutionError {
        ExecutionError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns the run's duration, if it has finished.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

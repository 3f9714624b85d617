//! Error types for the trigger crate.
//!
//! - `TriggerError`: trigger registration and store operations
//! - `ConditionError`: a malformed or unevaluable trigger condition

use nodeflow_core::{TriggerId, WorkflowId};
use std::fmt;

/// Errors from trigger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// Trigger not found.
    NotFound { id: TriggerId },
    /// The trigger's workflow is not in the store.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// Storage operation failed.
    StorageFailed { reason: String },
    /// Invalid trigger configuration.
    InvalidConfig { reason: String },
    /// The engine has been shut down and launches no new runs.
    ShutDown,
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "trigger not found: {id}"),
            Self::WorkflowNotFound { workflow_id } => write!(f, "workflow not found: {workflow_id}"),
            Self::StorageFailed { reason } => {
                write!(f, "trigger storage failed: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid trigger config: {reason}")
            }
            Self::ShutDown => write!(f, "trigger engine is shut down"),
        }
    }
}

impl std::error::Error for TriggerError {}

/// Errors from trigger conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// The condition could not be compiled.
    Compile { key: String, reason: String },
    /// The condition could not be evaluated against an event.
    Evaluate { key: String, reason: String },
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile { key, reason } => write!(f, "invalid condition on '{key}': {reason}"),
            Self::Evaluate { key, reason } => {
                write!(f, "condition on '{key}' could not be evaluated: {reason}")
            }
        }
    }
}

impl std::error::Error for ConditionError {}

impl From<ConditionError> for TriggerError {
    fn from(e: ConditionError) -> Self {
        Self::InvalidConfig {
            reason: e.to_string(),
        }
    }
}

//! Triggers and the events they match.

use crate::condition::Conditions;
use crate::error::ConditionError;
use nodeflow_core::{TriggerId, WorkflowId};
use nodeflow_workflow::{JsonMap, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Binds an event type (and optionally a source and a predicate) to a
/// workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique identifier for this trigger.
    pub id: TriggerId,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Event type this trigger listens for.
    pub event_type: String,
    /// Event source to match; `None` matches any source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The workflow to launch.
    pub workflow_id: WorkflowId,
    /// Runs only this node and its downstream nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<NodeId>,
    /// Condition map evaluated against the event payload.
    #[serde(default)]
    pub conditions: JsonValue,
    /// Inactive triggers never match.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Trigger {
    /// Creates an active trigger with no conditions.
    #[must_use]
    pub fn new(event_type: impl Into<String>, workflow_id: WorkflowId) -> Self {
        let event_type = event_type.into();
        Self {
            id: TriggerId::new(),
            name: event_type.clone(),
            event_type,
            source: None,
            workflow_id,
            target_node_id: None,
            conditions: JsonValue::Null,
            active: true,
        }
    }

    /// Restricts the trigger to one event source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the condition map.
    #[must_use]
    pub fn with_conditions(mut self, conditions: JsonValue) -> Self {
        self.conditions = conditions;
        self
    }

    /// Sets the node the run starts from.
    #[must_use]
    pub fn with_target_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.target_node_id = Some(node_id.into());
        self
    }

    /// Compiles the trigger's conditions.
    ///
    /// # Errors
    ///
    /// Returns a `ConditionError` if the conditions are malformed.
    pub fn compile_conditions(&self) -> Result<Conditions, ConditionError> {
        Conditions::compile(&self.conditions)
    }

    /// Whether the event's type and source select this trigger.
    #[must_use]
    pub fn selects(&self, event: &Event) -> bool {
        self.active
            && self.event_type == event.event_type
            && self
                .source
                .as_ref()
                .is_none_or(|source| event.source.as_ref() == Some(source))
    }
}

/// An inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, matched against `Trigger::event_type`.
    #[serde(alias = "type")]
    pub event_type: String,
    /// Where the event came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Data the conditions are evaluated against; becomes the run's input.
    #[serde(default)]
    pub payload: JsonMap,
    /// Extra context, passed to the run as shared data.
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Event {
    /// Creates an event with an empty payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: None,
            payload: JsonMap::new(),
            metadata: JsonMap::new(),
        }
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the payload from a JSON object; other values leave it empty.
    #[must_use]
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        if let JsonValue::Object(map) = payload {
            self.payload = map;
        }
        self
    }
}

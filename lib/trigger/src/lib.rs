//! Event triggers for nodeflow workflows.
//!
//! This crate provides:
//!
//! - **Conditions**: Compiled predicates over event payloads
//! - **Trigger Engine**: Matching events to triggers and launching runs
//! - **Stores**: Seams for workflow lookup and record persistence

pub mod condition;
pub mod engine;
pub mod error;
pub mod store;
pub mod trigger;

pub use condition::{Condition, Conditions, Predicate};
pub use engine::{LaunchedRun, TriggerEngine};
pub use error::{ConditionError, TriggerError};
pub use store::{ExecutionSink, InMemoryExecutionSink, InMemoryWorkflowStore, WorkflowStore};
pub use trigger::{Event, Trigger};

//! Workflow model and executor for nodeflow.
//!
//! This crate provides:
//!
//! - **Data types**: the port type system with its validation, coercion and
//!   compatibility rules
//! - **Graph model**: node definitions, port-to-port connections and
//!   topological scheduling with cycle detection
//! - **Registry**: node type to processor dispatch, including plugin
//!   delegation and the unavailable fallback
//! - **Execution**: per-run context, input resolution and the run state
//!   machine

pub mod builtin;
pub mod coerce;
pub mod connection;
pub mod context;
pub mod data_type;
pub mod definition;
pub mod error;
pub mod execution;
pub mod executor;
pub mod graph;
pub mod node;
pub mod port;
pub mod processor;
pub mod registry;

pub use connection::{Connection, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};
pub use context::{ExecutionContext, JsonMap};
pub use data_type::DataType;
pub use definition::Workflow;
pub use error::{ConversionError, ExecutionError, GraphError, NodeError, RegistryError};
pub use execution::{ExecutionRecord, ExecutionStatus};
pub use executor::{ExecutionRequest, WorkflowExecutor};
pub use graph::{ConnectionWarning, WorkflowGraph};
pub use node::{NodeDefinition, NodeId};
pub use port::{NodeSchema, PortConstraints, PortSchema};
pub use processor::{NodeProcessor, ProcessorKind, UnavailableProcessor};
pub use registry::{DelegateResolver, NodeRegistry, ResolvedProcessor, parse_plugin_node_type};

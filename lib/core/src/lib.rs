//! Core types shared by every nodeflow crate.
//!
//! This crate provides the strongly-typed identifiers for workflows,
//! triggers and executions, and the rootcause-backed `Result` alias.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExecutionId, ParseIdError, TriggerId, WorkflowId};

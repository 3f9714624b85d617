//! nodeflow engine process.
//!
//! Reads events as JSON lines on stdin, launches the workflows their
//! triggers select, and writes each finished execution record as a JSON
//! line on stdout. Logs go to stderr.

pub mod config;
pub mod definitions;
pub mod error;
pub mod input;
pub mod sink;

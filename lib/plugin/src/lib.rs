//! Plugin service integration for nodeflow.
//!
//! Node types of the form `plugin:<plugin_id>/<node_id>` run on an external
//! plugin service over HTTP. This crate provides the client for that
//! service, the delegate processor that calls it, and the catalog that
//! decides which plugins are reachable.

mod catalog;
mod client;
mod config;
mod delegate;
mod error;
pub mod mapping;

pub use catalog::PluginCatalog;
pub use client::{PluginClient, PluginInfo};
pub use config::PluginConfig;
pub use delegate::DelegateProcessor;
pub use error::PluginError;

//! Known plugins and delegate resolution.

use crate::client::PluginClient;
use crate::delegate::DelegateProcessor;
use crate::error::PluginError;
use nodeflow_workflow::{DelegateResolver, NodeProcessor};
use rootcause::prelude::Report;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// The set of plugins the service is known to host.
///
/// Resolves `plugin:<plugin_id>/<node_id>` node types: a known plugin yields
/// a [`DelegateProcessor`], an unknown one yields nothing and the registry
/// falls back to the unavailable processor.
#[derive(Debug)]
pub struct PluginCatalog {
    client: Arc<PluginClient>,
    known: RwLock<HashSet<String>>,
}

impl PluginCatalog {
    /// Creates a catalog seeded with `plugins`.
    #[must_use]
    pub fn new(client: Arc<PluginClient>, plugins: impl IntoIterator<Item = String>) -> Self {
        Self {
            client,
            known: RwLock::new(plugins.into_iter().collect()),
        }
    }

    /// Whether `plugin_id` is known.
    #[must_use]
    pub fn is_known(&self, plugin_id: &str) -> bool {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(plugin_id)
    }

    /// Known plugin ids, sorted.
    #[must_use]
    pub fn plugins(&self) -> Vec<String> {
        let mut plugins: Vec<String> = self
            .known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        plugins.sort();
        plugins
    }

    /// Replaces the known set with what the service advertises.
    ///
    /// On failure the previous set is kept.
    pub async fn refresh(&self) -> Result<usize, Report<PluginError>> {
        let listed = self.client.list_plugins().await?;
        let ids: HashSet<String> = listed.into_iter().map(|p| p.id).collect();
        let count = ids.len();

        *self.known.write().unwrap_or_else(PoisonError::into_inner) = ids;
        info!(count, "plugin catalog refreshed");
        Ok(count)
    }
}

impl DelegateResolver for PluginCatalog {
    fn resolve(&self, plugin_id: &str, node_id: &str) -> Option<Arc<dyn NodeProcessor>> {
        if !self.is_known(plugin_id) {
            debug!(plugin_id, "plugin not in catalog");
            return None;
        }
        Some(Arc::new(DelegateProcessor::new(
            Arc::clone(&self.client),
            plugin_id,
            node_id,
        )))
    }
}

//! Node type registry.
//!
//! Maps node type strings to processors and, optionally, port schemas.
//! Lookups are concurrent reads; registration takes a write lock and the
//! last registration for a type wins.
//!
//! Node types of the form `plugin:<plugin_id>/<node_id>` that have no
//! explicit registration are resolved through a [`DelegateResolver`]. A
//! plugin the resolver does not know yields an [`UnavailableProcessor`].

use crate::builtin::{ConstantProcessor, FailProcessor, MergeProcessor, PassthroughProcessor};
use crate::error::RegistryError;
use crate::port::NodeSchema;
use crate::processor::{NodeProcessor, ProcessorKind, UnavailableProcessor};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Prefix of node types dispatched to plugins.
pub const PLUGIN_NODE_PREFIX: &str = "plugin:";

/// Splits `plugin:<plugin_id>/<node_id>` into its parts.
#[must_use]
pub fn parse_plugin_node_type(node_type: &str) -> Option<(&str, &str)> {
    let rest = node_type.strip_prefix(PLUGIN_NODE_PREFIX)?;
    let (plugin_id, node_id) = rest.split_once('/')?;
    if plugin_id.is_empty() || node_id.is_empty() {
        return None;
    }
    Some((plugin_id, node_id))
}

/// Builds delegate processors for plugin node types.
pub trait DelegateResolver: Send + Sync {
    /// Returns a processor for `node_id` on `plugin_id`, or `None` if the
    /// plugin is not known.
    fn resolve(&self, plugin_id: &str, node_id: &str) -> Option<Arc<dyn NodeProcessor>>;
}

/// A processor returned by a lookup, tagged with its flavor.
#[derive(Clone)]
pub struct ResolvedProcessor {
    /// Which flavor served the lookup.
    pub kind: ProcessorKind,
    /// The processor itself.
    pub processor: Arc<dyn NodeProcessor>,
}

impl fmt::Debug for ResolvedProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProcessor")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registry of node processors and schemas.
#[derive(Default)]
pub struct NodeRegistry {
    processors: RwLock<HashMap<String, Arc<dyn NodeProcessor>>>,
    schemas: RwLock<HashMap<String, NodeSchema>>,
    resolver: RwLock<Option<Arc<dyn DelegateResolver>>>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish_non_exhaustive()
    }
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the in-process processors registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("passthrough", Arc::new(PassthroughProcessor));
        registry.register("constant", Arc::new(ConstantProcessor));
        registry.register("merge", Arc::new(MergeProcessor));
        registry.register("fail", Arc::new(FailProcessor));
        registry
    }

    /// Registers a processor; replaces any previous one for `node_type`.
    pub fn register(&self, node_type: impl Into<String>, processor: Arc<dyn NodeProcessor>) {
        let node_type = node_type.into();
        debug!(node_type = %node_type, kind = %processor.kind(), "registering processor");
        let mut processors = self.processors.write().unwrap_or_else(PoisonError::into_inner);
        if processors.insert(node_type.clone(), processor).is_some() {
            info!(node_type = %node_type, "replaced existing processor");
        }
    }

    /// Registers the port schema for `node_type`.
    pub fn register_schema(&self, node_type: impl Into<String>, schema: NodeSchema) {
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_type.into(), schema);
    }

    /// Installs the resolver used for `plugin:` node types.
    pub fn set_resolver(&self, resolver: Arc<dyn DelegateResolver>) {
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = Some(resolver);
    }

    /// Looks up the processor for `node_type`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if nothing is registered for the
    /// type and it does not name a plugin.
    pub fn get(&self, node_type: &str) -> Result<ResolvedProcessor, RegistryError> {
        let registered = self
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_type)
            .cloned();
        if let Some(processor) = registered {
            return Ok(ResolvedProcessor {
                kind: processor.kind(),
                processor,
            });
        }

        let Some((plugin_id, node_id)) = parse_plugin_node_type(node_type) else {
            return Err(RegistryError::NotFound {
                node_type: node_type.to_string(),
            });
        };

        let resolver = self
            .resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match resolver.and_then(|r| r.resolve(plugin_id, node_id)) {
            Some(processor) => Ok(ResolvedProcessor {
                kind: processor.kind(),
                processor,
            }),
            None => Ok(ResolvedProcessor {
                kind: ProcessorKind::Unavailable,
                processor: Arc::new(UnavailableProcessor::new(plugin_id, node_id)),
            }),
        }
    }

    /// Returns the port schema for `node_type`, if one is registered.
    #[must_use]
    pub fn schema_for(&self, node_type: &str) -> Option<NodeSchema> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_type)
            .cloned()
    }

    /// Whether a processor is explicitly registered for `node_type`.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(node_type)
    }

    /// Registered node types, sorted.
    #[must_use]
    pub fn node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionContext, JsonMap};
    use crate::data_type::DataType;
    use crate::definition::Workflow;
    use crate::error::NodeError;
    use crate::node::NodeDefinition;
    use crate::port::PortSchema;
    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};

    struct Fixed(JsonValue, ProcessorKind);

    #[async_trait]
    impl NodeProcessor for Fixed {
        async fn execute(
            &self,
            _node: &NodeDefinition,
            _input: JsonMap,
            _context: &ExecutionContext,
        ) -> Result<JsonValue, NodeError> {
            Ok(self.0.clone())
        }

        fn kind(&self) -> ProcessorKind {
            self.1
        }
    }

    struct KnownPlugins(Vec<&'static str>);

    impl DelegateResolver for KnownPlugins {
        fn resolve(&self, plugin_id: &str, _node_id: &str) -> Option<Arc<dyn NodeProcessor>> {
            self.0
                .contains(&plugin_id)
                .then(|| Arc::new(Fixed(json!("delegated"), ProcessorKind::Delegate)) as Arc<dyn NodeProcessor>)
        }
    }

    async fn run(resolved: &ResolvedProcessor) -> JsonValue {
        let ctx = ExecutionContext::new(Arc::new(Workflow::new("w")), JsonMap::new());
        let node = NodeDefinition::new("n", "t");
        resolved
            .processor
            .execute(&node, JsonMap::new(), &ctx)
            .await
            .expect("execute")
    }

    #[test]
    fn parses_plugin_node_types() {
        assert_eq!(parse_plugin_node_type("plugin:pdf/extract"), Some(("pdf", "extract")));
        assert_eq!(parse_plugin_node_type("plugin:pdf/"), None);
        assert_eq!(parse_plugin_node_type("plugin:/x"), None);
        assert_eq!(parse_plugin_node_type("pdf/extract"), None);
    }

    #[test]
    fn unknown_type_is_not_found() {
        let registry = NodeRegistry::with_builtins();
        assert_eq!(
            registry.get("unknown_x").map(|r| r.kind),
            Err(RegistryError::NotFound {
                node_type: "unknown_x".to_string()
            })
        );
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = NodeRegistry::new();
        registry.register("t", Arc::new(Fixed(json!(1), ProcessorKind::BuiltIn)));
        registry.register("t", Arc::new(Fixed(json!(2), ProcessorKind::BuiltIn)));

        let resolved = registry.get("t").expect("registered");
        assert_eq!(run(&resolved).await, json!(2));
        assert_eq!(registry.node_types(), vec!["t".to_string()]);
    }

    #[tokio::test]
    async fn plugin_types_resolve_through_resolver() {
        let registry = NodeRegistry::with_builtins();
        registry.set_resolver(Arc::new(KnownPlugins(vec!["pdf"])));

        let known = registry.get("plugin:pdf/extract").expect("delegate");
        assert_eq!(known.kind, ProcessorKind::Delegate);
        assert_eq!(run(&known).await, json!("delegated"));

        let unknown = registry.get("plugin:vision/ocr").expect("fallback");
        assert_eq!(unknown.kind, ProcessorKind::Unavailable);
        assert_eq!(run(&unknown).await["status"], json!("unavailable"));
    }

    #[test]
    fn plugin_types_without_resolver_are_unavailable() {
        let registry = NodeRegistry::new();
        let resolved = registry.get("plugin:pdf/extract").expect("fallback");
        assert_eq!(resolved.kind, ProcessorKind::Unavailable);
    }

    #[test]
    fn builtins_are_registered() {
        let registry = NodeRegistry::with_builtins();
        for t in ["passthrough", "constant", "merge", "fail"] {
            assert!(registry.contains(t), "{t} missing");
            assert_eq!(registry.get(t).map(|r| r.kind), Ok(ProcessorKind::BuiltIn));
        }
    }

    #[test]
    fn schemas_are_stored_per_type() {
        let registry = NodeRegistry::new();
        let schema = NodeSchema::new(vec![PortSchema::required("text", DataType::String)], vec![]);
        registry.register_schema("summarize", schema.clone());

        assert_eq!(registry.schema_for("summarize"), Some(schema));
        assert_eq!(registry.schema_for("other"), None);
    }
}

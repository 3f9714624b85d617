//! Per-node input mapping and default configuration.
//!
//! Each known plugin node reads a fixed set of keys from the resolved input
//! map. Unknown nodes receive the whole map.

use nodeflow_workflow::JsonMap;
use serde_json::{Value as JsonValue, json};

/// One argument a plugin node expects, and the input keys it may come from,
/// in priority order.
struct Argument {
    name: &'static str,
    sources: &'static [&'static str],
}

struct NodeProfile {
    node_ids: &'static [&'static str],
    arguments: &'static [Argument],
    defaults: fn() -> JsonValue,
}

const PROFILES: &[NodeProfile] = &[
    NodeProfile {
        node_ids: &["pdf_extract", "extract_text", "document_extract"],
        arguments: &[Argument {
            name: "file_path",
            sources: &["file_path", "path", "file"],
        }],
        defaults: || json!({"extract_images": false, "ocr_fallback": true}),
    },
    NodeProfile {
        node_ids: &["text_chunker", "chunk_text"],
        arguments: &[Argument {
            name: "text_input",
            sources: &["text_input", "text", "content"],
        }],
        defaults: || json!({"chunk_size": 1000, "chunk_overlap": 200}),
    },
    NodeProfile {
        node_ids: &["embedding", "generate_embeddings"],
        arguments: &[Argument {
            name: "text_input",
            sources: &["text_input", "chunks", "text"],
        }],
        defaults: || json!({"model": "all-MiniLM-L6-v2", "batch_size": 32}),
    },
    NodeProfile {
        node_ids: &["vector_search", "semantic_search"],
        arguments: &[
            Argument {
                name: "query",
                sources: &["query", "text_input", "text"],
            },
            Argument {
                name: "collection",
                sources: &["collection"],
            },
        ],
        defaults: || json!({"top_k": 5}),
    },
];

fn profile(node_id: &str) -> Option<&'static NodeProfile> {
    PROFILES.iter().find(|p| p.node_ids.contains(&node_id))
}

/// Builds the `inputs` payload for `node_id`.
///
/// Known nodes get only their arguments. If none of a known node's arguments
/// can be found, or the node is unknown, the whole map is passed.
#[must_use]
pub fn map_inputs(node_id: &str, input: &JsonMap) -> JsonMap {
    let Some(profile) = profile(node_id) else {
        return input.clone();
    };

    let mapped: JsonMap = profile
        .arguments
        .iter()
        .filter_map(|arg| {
            arg.sources
                .iter()
                .find_map(|source| input.get(*source))
                .map(|value| (arg.name.to_string(), value.clone()))
        })
        .collect();

    if mapped.is_empty() {
        input.clone()
    } else {
        mapped
    }
}

/// Merges the node's defaults with its own config. The node's config wins.
#[must_use]
pub fn merge_config(node_id: &str, node_config: &JsonMap) -> JsonMap {
    let mut config = match profile(node_id).map(|p| (p.defaults)()) {
        Some(JsonValue::Object(defaults)) => defaults,
        _ => JsonMap::new(),
    };
    config.extend(node_config.iter().map(|(k, v)| (k.clone(), v.clone())));
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(m) => m,
            _ => JsonMap::new(),
        }
    }

    #[test]
    fn known_node_extracts_its_keys() {
        let input = map(json!({"path": "/tmp/a.pdf", "filename": "a.pdf", "size": 10}));
        assert_eq!(
            map_inputs("pdf_extract", &input),
            map(json!({"file_path": "/tmp/a.pdf"}))
        );
    }

    #[test]
    fn first_matching_source_wins() {
        let input = map(json!({"text": "low", "text_input": "high"}));
        assert_eq!(
            map_inputs("text_chunker", &input),
            map(json!({"text_input": "high"}))
        );
    }

    #[test]
    fn search_maps_several_arguments() {
        let input = map(json!({"text": "rust", "collection": "docs", "noise": 1}));
        assert_eq!(
            map_inputs("vector_search", &input),
            map(json!({"query": "rust", "collection": "docs"}))
        );
    }

    #[test]
    fn unknown_or_unmatched_nodes_get_everything() {
        let input = map(json!({"a": 1}));
        assert_eq!(map_inputs("custom_node", &input), input);
        assert_eq!(map_inputs("pdf_extract", &input), input);
    }

    #[test]
    fn node_config_overrides_defaults() {
        let config = merge_config("text_chunker", &map(json!({"chunk_size": 500, "extra": true})));
        assert_eq!(
            config,
            map(json!({"chunk_size": 500, "chunk_overlap": 200, "extra": true}))
        );
        assert_eq!(merge_config("custom_node", &JsonMap::new()), JsonMap::new());
    }
}

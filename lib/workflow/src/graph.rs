//! Workflow graph model.
//!
//! The graph is stored the way the persistence layer hands it over: a list
//! of node definitions and a list of connections, both in declaration
//! order. Declaration order is significant: it breaks ties in the
//! topological order and decides which connection wins when several feed
//! the same input port. Scheduling builds a petgraph view on demand.

use crate::connection::Connection;
use crate::error::GraphError;
use crate::node::{NodeDefinition, NodeId};
use crate::port::NodeSchema;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A directed graph of nodes wired by connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Node definitions, in declaration order.
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Connections, in declaration order.
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// An advisory note about a connection whose port types do not line up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionWarning {
    /// Upstream node.
    pub from_node_id: NodeId,
    /// Downstream node.
    pub to_node_id: NodeId,
    /// What is wrong with it.
    pub message: String,
}

impl WorkflowGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node.
    pub fn add_node(&mut self, node: NodeDefinition) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Appends a connection.
    pub fn connect(&mut self, connection: Connection) -> &mut Self {
        self.connections.push(connection);
        self
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| &n.id == node_id)
    }

    /// Connections targeting `node_id`, in declaration order.
    pub fn incoming<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |c| &c.to_node_id == node_id)
    }

    /// Nodes with no incoming connection.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<&NodeDefinition> {
        let targets: HashSet<&NodeId> = self.connections.iter().map(|c| &c.to_node_id).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(&n.id))
            .collect()
    }

    /// Nodes with no outgoing connection.
    #[must_use]
    pub fn terminal_nodes(&self) -> Vec<&NodeDefinition> {
        let sources: HashSet<&NodeId> =
            self.connections.iter().map(|c| &c.from_node_id).collect();
        self.nodes
            .iter()
            .filter(|n| !sources.contains(&n.id))
            .collect()
    }

    /// Checks id uniqueness and that every connection references known nodes.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.index().map(|_| ())
    }

    /// Returns the node ids in a deterministic topological order.
    ///
    /// Uses Kahn's algorithm; among nodes that are ready at the same time the
    /// one declared first runs first.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::CycleDetected` if the graph is not a DAG, or a
    /// structural error from [`validate`](Self::validate).
    pub fn execution_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let graph = self.index()?;

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|idx| graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(self.nodes[i].id.clone());
            for edge in graph.edges_directed(NodeIndex::new(i), Direction::Outgoing) {
                let target = edge.target().index();
                in_degree[target] -= 1;
                if in_degree[target] == 0 {
                    ready.push(Reverse(target));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let scheduled: HashSet<&NodeId> = order.iter().collect();
            let nodes = self
                .nodes
                .iter()
                .filter(|n| !scheduled.contains(&n.id))
                .map(|n| n.id.clone())
                .collect();
            return Err(GraphError::CycleDetected { nodes });
        }

        Ok(order)
    }

    /// Returns `node_id` and every node reachable from it.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if `node_id` is not in the graph.
    pub fn downstream_of(&self, node_id: &NodeId) -> Result<HashSet<NodeId>, GraphError> {
        let graph = self.index()?;
        let start = self
            .nodes
            .iter()
            .position(|n| &n.id == node_id)
            .ok_or_else(|| GraphError::UnknownNode {
                node_id: node_id.clone(),
            })?;

        let mut reachable = HashSet::new();
        let mut bfs = Bfs::new(&graph, NodeIndex::new(start));
        while let Some(idx) = bfs.next(&graph) {
            reachable.insert(self.nodes[idx.index()].id.clone());
        }
        Ok(reachable)
    }

    /// Reports connections whose port types are incompatible or lossy.
    ///
    /// `schema_for` maps a node to its registered schema; nodes without a
    /// schema, or ports the schema does not declare, are not checked.
    pub fn connection_warnings<F>(&self, schema_for: F) -> Vec<ConnectionWarning>
    where
        F: Fn(&NodeDefinition) -> Option<NodeSchema>,
    {
        let mut warnings = Vec::new();
        for conn in &self.connections {
            let (Some(from), Some(to)) = (self.node(&conn.from_node_id), self.node(&conn.to_node_id))
            else {
                continue;
            };
            let (Some(from_schema), Some(to_schema)) = (schema_for(from), schema_for(to)) else {
                continue;
            };
            let (Some(out), Some(inp)) = (
                from_schema.output_port(&conn.from_port),
                to_schema.input_port(&conn.to_port),
            ) else {
                continue;
            };

            let message = if !out.data_type.is_compatible_with(inp.data_type) {
                Some(format!(
                    "{}:{} ({}) is not compatible with {}:{} ({})",
                    conn.from_node_id,
                    conn.from_port,
                    out.data_type,
                    conn.to_node_id,
                    conn.to_port,
                    inp.data_type
                ))
            } else {
                out.data_type
                    .conversion_warning(inp.data_type)
                    .map(str::to_string)
            };

            if let Some(message) = message {
                warnings.push(ConnectionWarning {
                    from_node_id: conn.from_node_id.clone(),
                    to_node_id: conn.to_node_id.clone(),
                    message,
                });
            }
        }
        warnings
    }

    /// Builds the petgraph view, validating structure on the way.
    ///
    /// Node indices equal declaration positions.
    fn index(&self) -> Result<DiGraph<(), ()>, GraphError> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.connections.len());
        let mut positions: HashMap<&NodeId, NodeIndex> = HashMap::new();

        for node in &self.nodes {
            let idx = graph.add_node(());
            if positions.insert(&node.id, idx).is_some() {
                return Err(GraphError::DuplicateNode {
                    node_id: node.id.clone(),
                });
            }
        }

        for conn in &self.connections {
            let lookup = |id: &NodeId| {
                positions
                    .get(id)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownNode { node_id: id.clone() })
            };
            let from = lookup(&conn.from_node_id)?;
            let to = lookup(&conn.to_node_id)?;
            graph.add_edge(from, to, ());
        }

        Ok(graph)
    }
}

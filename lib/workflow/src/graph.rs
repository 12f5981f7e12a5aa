//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed graphs where:
//! - Nodes are workflow steps bound to a handler type
//! - Edges carry a source node's output into a target node's input
//!
//! Node indices follow declaration order, which the resolver uses to break
//! ordering ties. Nodes are never removed in place; filtering builds a new
//! graph so that order is preserved.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "graph_serde::GraphParts", into = "graph_serde::GraphParts")]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    graph: DiGraph<Node, Edge>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Builds a graph from node and edge lists.
    ///
    /// Edges whose endpoints do not exist are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateNode` if two nodes share an id.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        for edge in edges {
            if let Err(err) = graph.add_edge(edge.clone()) {
                warn!(edge = %edge.id, error = %err, "dropping dangling edge");
            }
        }
        Ok(graph)
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateNode` if a node with the same id exists.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.node_index_map.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
        let node_id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        Ok(())
    }

    /// Adds an edge between two existing nodes.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if either endpoint is missing.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        let source = self.index_of(&edge.source)?;
        let target = self.index_of(&edge.target)?;
        self.graph.add_edge(source, target, edge);
        Ok(())
    }

    fn index_of(&self, node_id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.node_index_map
            .get(node_id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.clone(),
            })
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns true if the graph has a node with this id.
    #[must_use]
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.node_index_map.contains_key(node_id)
    }

    /// Position of a node in declaration order.
    #[must_use]
    pub fn declaration_index(&self, node_id: &NodeId) -> Option<usize> {
        self.node_index_map.get(node_id).map(|index| index.index())
    }

    /// Returns all nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all edges in declaration order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns nodes that have no incoming edges, in declaration order.
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    fn neighbors(&self, node_id: &NodeId, direction: Direction) -> Vec<&Node> {
        let Some(&index) = self.node_index_map.get(node_id) else {
            return Vec::new();
        };

        let mut indices: Vec<NodeIndex> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// Returns the direct successors of a node, in declaration order.
    pub fn successors(&self, node_id: &NodeId) -> Vec<&Node> {
        self.neighbors(node_id, Direction::Outgoing)
    }

    /// Returns the direct predecessors of a node, in declaration order.
    pub fn predecessors(&self, node_id: &NodeId) -> Vec<&Node> {
        self.neighbors(node_id, Direction::Incoming)
    }

    /// Returns the nodes that lie on at least one cycle, in declaration order.
    #[must_use]
    pub fn cyclic_nodes(&self) -> Vec<NodeId> {
        let mut on_cycle: Vec<NodeIndex> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&idx| self.graph.contains_edge(idx, idx))
            })
            .flatten()
            .collect();
        on_cycle.sort_unstable();
        on_cycle
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Returns true if the graph contains a cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Builds a new graph keeping only nodes matching `keep`, plus the edges
    /// between surviving nodes. Declaration order is preserved.
    #[must_use]
    pub fn filtered(&self, keep: impl Fn(&Node) -> bool) -> Self {
        let mut filtered = Self::new();
        for node in self.nodes().filter(|node| keep(*node)) {
            // Ids are already unique in `self`.
            let _ = filtered.add_node(node.clone());
        }
        for edge in self.edges() {
            let _ = filtered.add_edge(edge.clone());
        }
        filtered
    }

    /// Splits the graph back into node and edge lists, in declaration order.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
        let (nodes, edges) = self.graph.into_nodes_edges();
        (
            nodes.into_iter().map(|node| node.weight).collect(),
            edges.into_iter().map(|edge| edge.weight).collect(),
        )
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde representation of a graph as flat node and edge lists.
mod graph_serde {
    use super::*;

    #[derive(Serialize, Deserialize)]
    pub struct GraphParts {
        #[serde(default)]
        nodes: Vec<Node>,
        #[serde(default)]
        edges: Vec<Edge>,
    }

    impl TryFrom<GraphParts> for WorkflowGraph {
        type Error = GraphError;

        fn try_from(parts: GraphParts) -> Result<Self, Self::Error> {
            WorkflowGraph::from_parts(parts.nodes, parts.edges)
        }
    }

    impl From<WorkflowGraph> for GraphParts {
        fn from(graph: WorkflowGraph) -> Self {
            let (nodes, edges) = graph.into_parts();
            Self { nodes, edges }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> WorkflowGraph {
        WorkflowGraph::from_parts(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
            ],
            vec![Edge::between("A", "B"), Edge::between("B", "C")],
        )
        .expect("build graph")
    }

    #[test]
    fn add_and_get_node() {
        let graph = chain();
        let node = graph.get_node(&NodeId::new("B")).expect("node B");
        assert_eq!(node.type_id, "core.passthrough");
        assert_eq!(graph.declaration_index(&NodeId::new("C")), Some(2));
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut graph = chain();
        let err = graph
            .add_node(Node::action("B", "core.passthrough"))
            .expect_err("duplicate");
        assert_eq!(
            err,
            GraphError::DuplicateNode {
                node_id: NodeId::new("B")
            }
        );
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let graph = WorkflowGraph::from_parts(
            vec![Node::trigger("A", "manual"), Node::action("B", "core.passthrough")],
            vec![Edge::between("A", "B"), Edge::between("B", "ghost")],
        )
        .expect("build graph");
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn entry_nodes_returns_nodes_without_incoming() {
        let graph = chain();
        let entries: Vec<&str> = graph.entry_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(entries, vec!["A"]);
    }

    #[test]
    fn neighbors_in_declaration_order() {
        let graph = WorkflowGraph::from_parts(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
                Node::action("D", "core.join"),
            ],
            vec![
                Edge::between("A", "C"),
                Edge::between("A", "B"),
                Edge::between("C", "D"),
                Edge::between("B", "D"),
            ],
        )
        .expect("build graph");

        let succ: Vec<&str> = graph
            .successors(&NodeId::new("A"))
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(succ, vec!["B", "C"]);

        let pred: Vec<&str> = graph
            .predecessors(&NodeId::new("D"))
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(pred, vec!["B", "C"]);
    }

    #[test]
    fn cyclic_nodes_reported() {
        let graph = WorkflowGraph::from_parts(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
                Node::action("D", "core.passthrough"),
            ],
            vec![
                Edge::between("A", "B"),
                Edge::between("B", "C"),
                Edge::between("C", "B"),
                Edge::between("D", "D"),
            ],
        )
        .expect("build graph");

        assert!(graph.is_cyclic());
        let members = graph.cyclic_nodes();
        let cyclic: Vec<&str> = members.iter().map(NodeId::as_str).collect();
        assert_eq!(cyclic, vec!["B", "C", "D"]);
        assert!(!chain().is_cyclic());
    }

    #[test]
    fn filtered_preserves_order_and_edges() {
        let graph = chain();
        let filtered = graph.filtered(|node| !node.is_trigger());
        let ids: Vec<&str> = filtered.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
        assert_eq!(filtered.edge_count(), 1);
    }

    #[test]
    fn graph_serde_roundtrip() {
        let graph = chain();
        let json = serde_json::to_string(&graph).expect("serialize");
        let parsed: WorkflowGraph = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.node_count(), 3);
        assert_eq!(parsed.edge_count(), 2);
        assert!(parsed.get_node(&NodeId::new("A")).is_some());
    }
}

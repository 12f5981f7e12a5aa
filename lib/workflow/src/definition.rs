//! Workflow definition types.
//!
//! A workflow is a named graph of nodes. Graphs arrive from the editor as a
//! [`GraphSnapshot`] (`{nodes: [...], edges: [...]}`) and are converted into
//! a [`WorkflowGraph`] once per run.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use crate::node::{Node, NodeId, NodeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::WorkflowId;
use switchyard_integration::ActionConfig;

/// Type identifier of the built-in condition handler.
const CONDITION_TYPE: &str = "core.condition";

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    pub description: Option<String>,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates new metadata with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A stored workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
    /// The workflow graph (nodes and edges).
    pub graph: WorkflowGraph,
}

impl Workflow {
    /// Creates a new workflow around a graph.
    #[must_use]
    pub fn new(name: impl Into<String>, graph: WorkflowGraph) -> Self {
        Self::with_id(WorkflowId::new(), name, graph)
    }

    /// Creates a workflow with a specific ID.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>, graph: WorkflowGraph) -> Self {
        Self {
            id,
            metadata: WorkflowMetadata::new(name),
            graph,
        }
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Replaces the graph and bumps `updated_at`.
    pub fn replace_graph(&mut self, graph: WorkflowGraph) {
        self.graph = graph;
        self.metadata.updated_at = Utc::now();
    }
}

/// A node as the editor submits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    /// Node id.
    pub id: String,
    /// Handler type identifier.
    #[serde(rename = "type")]
    pub type_id: String,
    /// Whether the node is a trigger.
    #[serde(default)]
    pub is_trigger: bool,
    /// Explicit kind; inferred from `is_trigger` and `type` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Handler configuration.
    #[serde(default)]
    pub config: ActionConfig,
    /// Editor-only placeholder marker.
    #[serde(default)]
    pub is_placeholder: bool,
}

impl From<NodeSnapshot> for Node {
    fn from(snapshot: NodeSnapshot) -> Self {
        let kind = snapshot.kind.unwrap_or(if snapshot.is_trigger {
            NodeKind::Trigger
        } else if snapshot.type_id == CONDITION_TYPE {
            NodeKind::Condition
        } else {
            NodeKind::Action
        });
        let mut node = Node::new(NodeId::from(snapshot.id), kind, snapshot.type_id)
            .with_config(snapshot.config);
        node.is_ui_placeholder |= snapshot.is_placeholder;
        node
    }
}

impl From<&Node> for NodeSnapshot {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            type_id: node.type_id.clone(),
            is_trigger: node.is_trigger(),
            kind: Some(node.kind),
            config: node.config.clone(),
            is_placeholder: node.is_ui_placeholder,
        }
    }
}

/// Graph ingestion shape: `{nodes: [...], edges: [...]}`.
///
/// `connections` is accepted as an alias for `edges`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in declaration order.
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
    /// Edges in declaration order.
    #[serde(default, alias = "connections")]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Converts the snapshot into a graph, dropping dangling edges.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateNode` if two nodes share an id.
    pub fn into_graph(self) -> Result<WorkflowGraph, GraphError> {
        WorkflowGraph::from_parts(self.nodes.into_iter().map(Node::from), self.edges)
    }
}

impl From<&WorkflowGraph> for GraphSnapshot {
    fn from(graph: &WorkflowGraph) -> Self {
        Self {
            nodes: graph.nodes().map(NodeSnapshot::from).collect(),
            edges: graph.edges().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> GraphSnapshot {
        serde_json::from_value(json!({
            "nodes": [
                {"id": "t", "type": "webhook", "isTrigger": true, "config": {}},
                {"id": "c", "type": "core.condition", "config": {"field": "ok"}},
                {"id": "a", "type": "slack.postMessage", "config": {"channel": "#ops"}},
                {"id": "p", "type": "addAction"},
                {"id": "q", "type": "gmail.send", "isPlaceholder": true}
            ],
            "connections": [
                {"id": "e1", "source": "t", "target": "c"},
                {"id": "e2", "source": "c", "target": "a"},
                {"id": "e3", "source": "a", "target": "missing"}
            ]
        }))
        .expect("deserialize snapshot")
    }

    #[test]
    fn kinds_are_inferred() {
        let graph = snapshot().into_graph().expect("graph");
        let kind = |id: &str| graph.get_node(&NodeId::new(id)).map(|n| n.kind);
        assert_eq!(kind("t"), Some(NodeKind::Trigger));
        assert_eq!(kind("c"), Some(NodeKind::Condition));
        assert_eq!(kind("a"), Some(NodeKind::Action));
    }

    #[test]
    fn placeholders_are_flagged() {
        let graph = snapshot().into_graph().expect("graph");
        let placeholder = |id: &str| {
            graph
                .get_node(&NodeId::new(id))
                .map(|n| n.is_ui_placeholder)
        };
        assert_eq!(placeholder("p"), Some(true));
        assert_eq!(placeholder("q"), Some(true));
        assert_eq!(placeholder("a"), Some(false));
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let graph = snapshot().into_graph().expect("graph");
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn snapshot_roundtrip_through_graph() {
        let graph = snapshot().into_graph().expect("graph");
        let back = GraphSnapshot::from(&graph);
        assert_eq!(back.nodes.len(), 5);
        assert_eq!(back.nodes[1].kind, Some(NodeKind::Condition));
        let rebuilt = back.into_graph().expect("rebuild");
        assert_eq!(rebuilt.edge_count(), 2);
    }

    #[test]
    fn workflow_serde_roundtrip() {
        let workflow = Workflow::new("Serialization Test", snapshot().into_graph().expect("graph"));
        let json = serde_json::to_string(&workflow).expect("serialize");
        let parsed: Workflow = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(workflow.id, parsed.id);
        assert_eq!(workflow.name(), parsed.name());
        assert_eq!(parsed.graph.node_count(), 5);
    }
}

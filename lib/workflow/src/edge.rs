//! Edge types for workflow graphs.
//!
//! An edge says the target node consumes the source node's output.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Edge identifier.
    #[serde(default)]
    pub id: String,
    /// The node whose output flows along this edge.
    #[serde(rename = "sourceNodeId", alias = "source")]
    pub source: NodeId,
    /// The node consuming that output.
    #[serde(rename = "targetNodeId", alias = "target")]
    pub target: NodeId,
}

impl Edge {
    /// Creates an edge with an explicit id.
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Creates an edge whose id is derived from its endpoints.
    #[must_use]
    pub fn between(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
        }
    }

    /// Returns true if either endpoint is the given node.
    #[must_use]
    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.source == node_id || &self.target == node_id
    }
}

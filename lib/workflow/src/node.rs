//! Workflow node types.
//!
//! A node is one step of a workflow graph. Each node has:
//! - An id unique within its graph (assigned by the editor)
//! - A kind (trigger, action or condition)
//! - The type identifier of the handler that executes it
//! - Opaque configuration handed to that handler

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use switchyard_integration::ActionConfig;

/// Node types the visual editor inserts as "add a step here" markers.
pub const PLACEHOLDER_TYPES: [&str; 2] = ["addAction", "insertAction"];

/// Identifier of a node within a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point; its output is the run's runtime input.
    Trigger,
    /// A call to a capability.
    Action,
    /// A pure decision over its input.
    Condition,
}

/// A node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Identifier, unique within the graph.
    pub id: NodeId,
    /// What role the node plays.
    pub kind: NodeKind,
    /// Handler type identifier (e.g. `slack.postMessage`).
    pub type_id: String,
    /// Configuration passed to the handler.
    #[serde(default)]
    pub config: ActionConfig,
    /// Editor-only marker that never executes.
    #[serde(default)]
    pub is_ui_placeholder: bool,
}

impl Node {
    /// Creates a node.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, type_id: impl Into<String>) -> Self {
        let type_id = type_id.into();
        Self {
            id: id.into(),
            kind,
            is_ui_placeholder: PLACEHOLDER_TYPES.contains(&type_id.as_str()),
            type_id,
            config: ActionConfig::new(),
        }
    }

    /// Creates a trigger node.
    #[must_use]
    pub fn trigger(id: impl Into<NodeId>, type_id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Trigger, type_id)
    }

    /// Creates an action node.
    #[must_use]
    pub fn action(id: impl Into<NodeId>, type_id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Action, type_id)
    }

    /// Creates a condition node.
    #[must_use]
    pub fn condition(id: impl Into<NodeId>, type_id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Condition, type_id)
    }

    /// Replaces the node configuration.
    #[must_use]
    pub fn with_config(mut self, config: ActionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a single configuration value.
    #[must_use]
    pub fn with_config_value(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Marks the node as a UI placeholder.
    #[must_use]
    pub fn placeholder(mut self) -> Self {
        self.is_ui_placeholder = true;
        self
    }

    /// Returns true if this is a trigger node.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.kind == NodeKind::Trigger
    }

    /// Returns true if this node is dispatched to a handler (action or condition).
    #[must_use]
    pub fn is_executable(&self) -> bool {
        !self.is_trigger() && !self.is_ui_placeholder
    }
}

//! Error types for the workflow crate.
//!
//! Plain enums that callers match on; the CLI wraps them in rootcause reports.
//! - `GraphError`: low-level graph construction (nodes, edges)
//! - `ResolveError`: validation and ordering of a graph into a plan
//! - `RunError`: why a node halted a run
//! - `DispatchError`: a node could not be handed to its handler
//! - `CheckpointError`: persisting or loading a paused run
//! - `StoreError`: loading or saving workflow definitions
//! - `EngineError`: operations on runs (run, resume, cancel, listen)

use crate::execution::RunStatus;
use crate::node::NodeId;
use std::fmt;
use switchyard_core::{WorkflowId, WorkflowRunId};
use switchyard_integration::{HandlerError, RegistryError};

/// Errors from graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this id already exists in the graph.
    DuplicateNode { node_id: NodeId },
    /// No node with this id exists in the graph.
    NodeNotFound { node_id: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from resolving a graph into an execution plan.
///
/// Both variants abort the run before any node is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The graph is structurally unusable (no trigger, no action, no root).
    GraphInvalid { reason: String },
    /// The graph contains at least one cycle; `nodes` are the nodes on cycles.
    GraphCyclic { nodes: Vec<NodeId> },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphInvalid { reason } => write!(f, "invalid graph: {reason}"),
            Self::GraphCyclic { nodes } => {
                let nodes: Vec<&str> = nodes.iter().map(NodeId::as_str).collect();
                write!(f, "graph contains a cycle through [{}]", nodes.join(", "))
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Reasons a node halted a run.
///
/// Completed records are preserved; nothing after the failing node runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Dispatch did not finish within the per-node timeout.
    NodeTimeout { node_id: NodeId, timeout_ms: u64 },
    /// The handler errored, reported `success: false`, or was not registered.
    NodeHandlerFailed { node_id: NodeId, message: String },
}

impl RunError {
    /// The node that halted the run.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::NodeTimeout { node_id, .. } | Self::NodeHandlerFailed { node_id, .. } => {
                node_id
            }
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeTimeout {
                node_id,
                timeout_ms,
            } => write!(f, "node {node_id} timed out after {timeout_ms}ms"),
            Self::NodeHandlerFailed { node_id, message } => {
                write!(f, "node {node_id} failed: {message}")
            }
        }
    }
}

impl std::error::Error for RunError {}

/// Errors from dispatching a node to its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler is registered for the node's type.
    Registry(RegistryError),
    /// The handler could not run.
    Handler(HandlerError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::Handler(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Handler(err) => Some(err),
        }
    }
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        Self::Handler(err)
    }
}

/// Errors from workflow definition storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected a read or write.
    StorageFailed { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { message } => write!(f, "workflow storage failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from checkpoint storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// Could not reach the backing store.
    ConnectionFailed { message: String },
    /// Could not encode or decode a checkpoint.
    Serialization { message: String },
    /// The stored envelope has a schema version this build cannot read.
    UnsupportedVersion { found: u32, supported: u32 },
    /// The store rejected a read or write.
    StorageFailed { message: String },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "checkpoint store connection failed: {message}")
            }
            Self::Serialization { message } => {
                write!(f, "checkpoint serialization failed: {message}")
            }
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    f,
                    "unsupported checkpoint version {found} (supported up to {supported})"
                )
            }
            Self::StorageFailed { message } => {
                write!(f, "checkpoint storage failed: {message}")
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Errors from run lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The graph failed validation; nothing ran.
    Resolve(ResolveError),
    /// A stored workflow referenced by id does not exist.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// No run with this id is known to the controller.
    RunNotFound { run_id: WorkflowRunId },
    /// Resume was requested for a run that is unknown, not paused, or already terminal.
    ResumeTargetNotFound { run_id: WorkflowRunId },
    /// No trigger event arrived while listening.
    TriggerTimeout {
        run_id: WorkflowRunId,
        timeout_ms: u64,
    },
    /// The run cannot move between these states.
    InvalidStateTransition { from: RunStatus, to: RunStatus },
    /// Checkpoint persistence failed.
    Checkpoint(CheckpointError),
    /// Workflow definition storage failed.
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(err) => write!(f, "{err}"),
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::ResumeTargetNotFound { run_id } => {
                write!(f, "no paused run to resume: {run_id}")
            }
            Self::TriggerTimeout { run_id, timeout_ms } => {
                write!(
                    f,
                    "run {run_id} cancelled: no trigger event within {timeout_ms}ms"
                )
            }
            Self::InvalidStateTransition { from, to } => {
                write!(f, "invalid run state transition from {from} to {to}")
            }
            Self::Checkpoint(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolve(err) => Some(err),
            Self::Checkpoint(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        Self::Resolve(err)
    }
}

impl From<CheckpointError> for EngineError {
    fn from(err: CheckpointError) -> Self {
        Self::Checkpoint(err)
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

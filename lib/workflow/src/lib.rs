//! Workflow execution engine for switchyard.
//!
//! This crate provides the engine that turns a graph of trigger and action
//! nodes into a run:
//!
//! - **Graph Model**: directed graphs using petgraph, ingested from editor snapshots
//! - **Resolver**: validation and dependency ordering into an [`ExecutionPlan`]
//! - **Scheduler**: sequential dispatch with per-node timeouts and records
//! - **Sandbox**: interception of side-effecting handlers in test mode
//! - **Controller**: run lifecycle, pause/resume through checkpoints, cancellation

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod controller;
pub mod definition;
pub mod edge;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod graph;
pub mod nats;
pub mod node;
pub mod resolver;
pub mod sandbox;
pub mod scheduler;
pub mod store;

pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use controller::{RunController, RunRequest, RunResult, WorkflowSource};
pub use definition::{GraphSnapshot, NodeSnapshot, Workflow, WorkflowMetadata};
pub use edge::Edge;
pub use envelope::Envelope;
pub use error::{
    CheckpointError, DispatchError, EngineError, GraphError, ResolveError, RunError, StoreError,
};
pub use execution::{
    CancelReason, NodeExecutionRecord, NodeStatus, RunMode, RunStatus, RunSummary,
};
pub use graph::WorkflowGraph;
pub use nats::{NatsCheckpointStore, NatsConfig};
pub use node::{Node, NodeId, NodeKind};
pub use resolver::{ExecutionPlan, PlannedNode, ResolveOptions, resolve};
pub use sandbox::{Dispatcher, InterceptedAction, LiveDispatcher, SandboxDispatcher};
pub use scheduler::{ScheduleOutcome, Scheduler};
pub use store::{InMemoryWorkflowStore, WorkflowStore};

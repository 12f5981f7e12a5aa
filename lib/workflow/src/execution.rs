//! Run and node execution state.
//!
//! The run status machine is:
//!
//! ```text
//! idle -> listening -> running -> {paused <-> running} -> {completed | failed | cancelled}
//! ```
//!
//! A run may also start directly in `running` (no trigger wait), and any
//! non-terminal state may move to `cancelled`.

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use switchyard_core::{NodeExecutionId, WorkflowRunId};

/// Whether side-effecting handlers are really invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every handler executes for real.
    #[default]
    Live,
    /// Side-effecting handlers are intercepted and recorded.
    Sandbox,
}

impl RunMode {
    /// Returns true for sandbox mode.
    #[must_use]
    pub fn is_sandbox(self) -> bool {
        self == Self::Sandbox
    }
}

/// The overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet started.
    Idle,
    /// Waiting for a trigger event.
    Listening,
    /// Dispatching nodes.
    Running,
    /// Suspended on a node awaiting external input.
    Paused,
    /// Every planned node completed.
    Completed,
    /// A node failed or timed out.
    Failed,
    /// Cancelled by a caller or by trigger timeout.
    Cancelled,
}

impl RunStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the run may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use RunStatus::{Cancelled, Completed, Failed, Idle, Listening, Paused, Running};
        match (self, next) {
            (Idle, Listening | Running)
            | (Listening, Running)
            | (Running, Paused | Completed | Failed)
            | (Paused, Running) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// A caller asked for cancellation.
    Requested,
    /// No trigger event arrived before the listen timeout.
    TriggerTimeout,
}

/// The execution status of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Entered scheduling, not yet dispatched.
    Pending,
    /// Dispatched, awaiting the handler.
    Running,
    /// Handler succeeded.
    Completed,
    /// Handler failed or timed out.
    Failed,
    /// Handler asked the run to pause.
    Paused,
}

/// Execution record for a single node within a run.
///
/// Created when the node enters scheduling and mutated only by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionRecord {
    /// Unique identifier for this node execution.
    pub id: NodeExecutionId,
    /// The node being executed.
    pub node_id: NodeId,
    /// Handler type of the node.
    pub type_id: String,
    /// Current status.
    pub status: NodeStatus,
    /// Input handed to the handler; `null` until dispatch.
    #[serde(default)]
    pub input: JsonValue,
    /// Output produced by the handler; `null` until it completes or pauses.
    #[serde(default)]
    pub output: JsonValue,
    /// Error message if failed.
    pub error: Option<String>,
    /// When dispatch started.
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock dispatch time.
    pub duration_ms: Option<u64>,
}

impl NodeExecutionRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn new(node_id: NodeId, type_id: impl Into<String>) -> Self {
        Self {
            id: NodeExecutionId::new(),
            node_id,
            type_id: type_id.into(),
            status: NodeStatus::Pending,
            input: JsonValue::Null,
            output: JsonValue::Null,
            error: None,
            started_at: None,
            duration_ms: None,
        }
    }

    /// Marks the node as running with the given input.
    pub fn start(&mut self, input: JsonValue) {
        self.status = NodeStatus::Running;
        self.started_at = Some(Utc::now());
        self.input = input;
    }

    /// Marks the node as completed.
    pub fn complete(&mut self, output: JsonValue) {
        self.status = NodeStatus::Completed;
        self.output = output;
        self.stamp_duration();
    }

    /// Marks the node as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = NodeStatus::Failed;
        self.error = Some(error.into());
        self.stamp_duration();
    }

    /// Marks the node as paused with its partial output.
    pub fn pause(&mut self, output: JsonValue) {
        self.status = NodeStatus::Paused;
        self.output = output;
        self.stamp_duration();
    }

    fn stamp_duration(&mut self) {
        if let Some(started) = self.started_at {
            let elapsed = (Utc::now() - started).num_milliseconds();
            self.duration_ms = Some(u64::try_from(elapsed).unwrap_or(0));
        }
    }
}

/// Outcome of a finished or suspended run, as fed to history consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// The run.
    pub run_id: WorkflowRunId,
    /// Status at the time the summary was taken.
    pub status: RunStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

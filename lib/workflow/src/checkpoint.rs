//! Checkpoints of paused runs.
//!
//! When a node pauses, the run's context and the remaining plan suffix are
//! persisted as a [`Checkpoint`]. Resuming loads it, completes the paused node
//! with the resume payload and continues the suffix. Checkpoints are the only
//! durable run state; they are discarded when the run completes, fails or is
//! cancelled.

use crate::context::ExecutionContext;
use crate::envelope::Envelope;
use crate::error::CheckpointError;
use crate::execution::RunMode;
use crate::node::NodeId;
use crate::resolver::PlannedNode;
use crate::sandbox::InterceptedAction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchyard_core::{WorkflowId, WorkflowRunId};
use switchyard_integration::Identity;

/// Everything needed to continue a paused run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// The paused run.
    pub run_id: WorkflowRunId,
    /// The stored workflow the run came from, if it was not inline.
    pub workflow_id: Option<WorkflowId>,
    /// Live or sandbox.
    pub mode: RunMode,
    /// Identity the run executes on behalf of.
    pub identity: Identity,
    /// The node awaiting external input.
    pub paused_node: NodeId,
    /// Context as of the pause.
    pub context: ExecutionContext,
    /// Plan steps after the paused node.
    pub remaining: Vec<PlannedNode>,
    /// Actions intercepted before the pause (sandbox only).
    #[serde(default)]
    pub intercepted: Vec<InterceptedAction>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run paused.
    pub paused_at: DateTime<Utc>,
}

/// Trait for checkpoint persistence.
///
/// This abstraction allows the controller to be tested without NATS while
/// still supporting the NATS key-value implementation in production.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persists a checkpoint, replacing any previous one for the run.
    async fn save(&self, checkpoint: Envelope<Checkpoint>) -> Result<(), CheckpointError>;

    /// Loads the checkpoint of a run, if one exists.
    async fn load(
        &self,
        run_id: WorkflowRunId,
    ) -> Result<Option<Envelope<Checkpoint>>, CheckpointError>;

    /// Discards the checkpoint of a run. Deleting a missing checkpoint is not an error.
    async fn delete(&self, run_id: WorkflowRunId) -> Result<(), CheckpointError>;

    /// Lists runs that currently have a checkpoint.
    async fn list(&self) -> Result<Vec<WorkflowRunId>, CheckpointError>;
}

/// In-process checkpoint store.
///
/// Checkpoints are kept as encoded envelopes, so a load exercises the same
/// decoding path as an external store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    entries: Arc<Mutex<HashMap<WorkflowRunId, Vec<u8>>>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<WorkflowRunId, Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Envelope<Checkpoint>) -> Result<(), CheckpointError> {
        let bytes = checkpoint.to_json_bytes()?;
        self.entries().insert(checkpoint.payload.run_id, bytes);
        Ok(())
    }

    async fn load(
        &self,
        run_id: WorkflowRunId,
    ) -> Result<Option<Envelope<Checkpoint>>, CheckpointError> {
        let bytes = self.entries().get(&run_id).cloned();
        bytes
            .map(|bytes| Envelope::from_json_bytes(&bytes))
            .transpose()
    }

    async fn delete(&self, run_id: WorkflowRunId) -> Result<(), CheckpointError> {
        self.entries().remove(&run_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowRunId>, CheckpointError> {
        let mut ids: Vec<WorkflowRunId> = self.entries().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

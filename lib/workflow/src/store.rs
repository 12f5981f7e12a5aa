//! Workflow definition storage boundary.
//!
//! The engine never owns persistence of definitions. A run request that names
//! a workflow by id resolves it through a [`WorkflowStore`]; an applied
//! rewrite is handed back to the store for the caller to persist.

use crate::definition::Workflow;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchyard_core::WorkflowId;

/// Trait for loading and saving workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Loads a workflow by id.
    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, StoreError>;

    /// Saves a workflow, replacing any stored version.
    async fn save(&self, workflow: Workflow) -> Result<(), StoreError>;
}

/// In-process workflow store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<Mutex<HashMap<WorkflowId, Workflow>>>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given workflows.
    #[must_use]
    pub fn with_workflows(workflows: impl IntoIterator<Item = Workflow>) -> Self {
        let map = workflows.into_iter().map(|wf| (wf.id, wf)).collect();
        Self {
            workflows: Arc::new(Mutex::new(map)),
        }
    }

    fn workflows(&self) -> std::sync::MutexGuard<'_, HashMap<WorkflowId, Workflow>> {
        self.workflows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        Ok(self.workflows().get(&workflow_id).cloned())
    }

    async fn save(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.workflows().insert(workflow.id, workflow);
        Ok(())
    }
}

//! Dispatch of nodes to handlers, live or sandboxed.
//!
//! The scheduler never talks to the [`ActionRegistry`] directly. It goes
//! through a [`Dispatcher`]: [`LiveDispatcher`] invokes every handler, while
//! [`SandboxDispatcher`] replaces side-effecting handlers with a recorder
//! that captures what would have been sent.
//!
//! Both dispatchers expand `core.batch` nodes: every carried call is
//! dispatched as if it were its own node, so a batch sends (or, in sandbox
//! mode, intercepts) exactly the calls it replaced.

use crate::error::DispatchError;
use crate::node::{Node, NodeId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use switchyard_integration::{
    ActionHandler, ActionRegistry, ActionResult, BATCH_TYPE_ID, BatchHandler, Identity,
};
use tracing::debug;

/// A side effect captured in sandbox mode. Never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedAction {
    /// The node that would have performed the action.
    pub node_id: NodeId,
    /// Handler type of that node.
    pub type_id: String,
    /// Where the action would have been delivered.
    pub destination: String,
    /// What would have been sent: the node's config and resolved input.
    pub payload: JsonValue,
    /// When the action was intercepted.
    pub timestamp: DateTime<Utc>,
}

/// Hands a node to the handler registered for its type.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Dispatches a node.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler is registered for the node's type or
    /// the handler could not run.
    async fn dispatch(
        &self,
        node: &Node,
        identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, DispatchError>;

    /// Drains the actions intercepted so far. Live dispatch never intercepts.
    fn take_intercepted(&self) -> Vec<InterceptedAction> {
        Vec::new()
    }
}

/// Performs the calls a `core.batch` node carries through `dispatcher`, in
/// order, then lets the batch handler label their outputs.
///
/// Every call receives the batch node's input. The first call that fails or
/// pauses fails the batch; later calls are not made.
async fn dispatch_batch<D: Dispatcher + ?Sized>(
    dispatcher: &D,
    handler: &dyn ActionHandler,
    node: &Node,
    identity: &Identity,
    input: &JsonValue,
) -> Result<ActionResult, DispatchError> {
    let calls = BatchHandler::calls(&node.config)?;
    let mut outputs = Vec::with_capacity(calls.len());
    for call in calls {
        let call_id = call.id.clone();
        let member = Node::action(call.id, call.type_id).with_config(call.config);
        debug!(batch = %node.id, call = %member.id, "dispatching batched call");
        let result = dispatcher.dispatch(&member, identity, input).await?;
        if result.is_paused() {
            return Ok(ActionResult::failure(format!(
                "batched call {call_id} paused; batches cannot pause"
            )));
        }
        if !result.success {
            let reason = result.error.unwrap_or_else(|| "no error given".to_string());
            return Ok(ActionResult::failure(format!(
                "batched call {call_id} failed: {reason}"
            )));
        }
        outputs.push(result.output.unwrap_or(JsonValue::Null));
    }
    Ok(handler
        .execute(&node.config, identity, &JsonValue::Array(outputs))
        .await?)
}

/// Dispatches every node to its real handler.
#[derive(Debug, Clone)]
pub struct LiveDispatcher {
    registry: Arc<ActionRegistry>,
}

impl LiveDispatcher {
    /// Creates a live dispatcher over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Dispatcher for LiveDispatcher {
    async fn dispatch(
        &self,
        node: &Node,
        identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, DispatchError> {
        let handler = self.registry.resolve(&node.type_id)?;
        if node.type_id == BATCH_TYPE_ID {
            return dispatch_batch(self, handler.as_ref(), node, identity, input).await;
        }
        Ok(handler.execute(&node.config, identity, input).await?)
    }
}

/// Executes pure handlers for real and intercepts side-effecting ones.
#[derive(Debug)]
pub struct SandboxDispatcher {
    registry: Arc<ActionRegistry>,
    intercepted: Mutex<Vec<InterceptedAction>>,
}

impl SandboxDispatcher {
    /// Creates a sandbox dispatcher over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            intercepted: Mutex::new(Vec::new()),
        }
    }

    /// Creates a sandbox dispatcher that continues an earlier interception list.
    #[must_use]
    pub fn with_intercepted(registry: Arc<ActionRegistry>, intercepted: Vec<InterceptedAction>) -> Self {
        Self {
            registry,
            intercepted: Mutex::new(intercepted),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<InterceptedAction>> {
        // A poisoned list is still a valid list.
        self.intercepted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Dispatcher for SandboxDispatcher {
    async fn dispatch(
        &self,
        node: &Node,
        identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, DispatchError> {
        let handler = self.registry.resolve(&node.type_id)?;
        if node.type_id == BATCH_TYPE_ID {
            return dispatch_batch(self, handler.as_ref(), node, identity, input).await;
        }
        if !handler.is_side_effecting() {
            return Ok(handler.execute(&node.config, identity, input).await?);
        }

        let destination = handler.destination(&node.config);
        debug!(node = %node.id, %destination, "intercepting side-effecting action");
        self.lock().push(InterceptedAction {
            node_id: node.id.clone(),
            type_id: node.type_id.clone(),
            destination,
            payload: json!({
                "config": node.config,
                "input": input,
            }),
            timestamp: Utc::now(),
        });
        Ok(ActionResult::success(handler.preview(&node.config, input)))
    }

    fn take_intercepted(&self) -> Vec<InterceptedAction> {
        std::mem::take(&mut *self.lock())
    }
}

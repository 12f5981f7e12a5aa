//! Execution scheduler: walks a plan in order, one node at a time.
//!
//! For each step the scheduler computes the node's input from the context,
//! marks it running, dispatches it under the per-node timeout and records the
//! outcome. The first failure halts the remainder of the plan; the failing
//! node closes the execution path. A paused result
//! stops the walk and hands the remaining suffix back to the caller.

use crate::context::ExecutionContext;
use crate::error::RunError;
use crate::execution::NodeExecutionRecord;
use crate::node::NodeId;
use crate::resolver::PlannedNode;
use crate::sandbox::Dispatcher;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use switchyard_integration::Identity;
use tokio::sync::watch;
use tracing::{debug, warn};

/// How a walk over (part of) a plan ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// Every step completed.
    Completed,
    /// A node failed or timed out; later steps were not dispatched.
    Failed(RunError),
    /// A node asked to pause.
    Paused {
        /// The node awaiting external input.
        node_id: NodeId,
        /// Steps after the paused node, still to run.
        remaining: Vec<PlannedNode>,
    },
    /// Cancellation was observed between nodes.
    Cancelled {
        /// Steps that were never dispatched.
        remaining: Vec<PlannedNode>,
    },
}

/// Walks execution plans against a dispatcher.
pub struct Scheduler {
    dispatcher: Arc<dyn Dispatcher>,
    node_timeout: Duration,
}

impl Scheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(dispatcher: Arc<dyn Dispatcher>, node_timeout: Duration) -> Self {
        Self {
            dispatcher,
            node_timeout,
        }
    }

    /// Returns the dispatcher nodes are sent through.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.node_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Executes `steps` in order, mutating `ctx`.
    ///
    /// `cancel` is checked before each node; once it reads `true` no further
    /// node is dispatched.
    pub async fn execute(
        &self,
        steps: &[PlannedNode],
        ctx: &mut ExecutionContext,
        identity: &Identity,
        cancel: &watch::Receiver<bool>,
    ) -> ScheduleOutcome {
        for (index, step) in steps.iter().enumerate() {
            if *cancel.borrow() {
                debug!(run_id = %ctx.run_id, node = %step.node.id, "cancellation observed");
                return ScheduleOutcome::Cancelled {
                    remaining: steps[index..].to_vec(),
                };
            }

            match self.execute_step(step, ctx, identity).await {
                StepOutcome::Completed => {}
                StepOutcome::Failed(err) => return ScheduleOutcome::Failed(err),
                StepOutcome::Paused => {
                    return ScheduleOutcome::Paused {
                        node_id: step.node.id.clone(),
                        remaining: steps[index + 1..].to_vec(),
                    };
                }
            }
        }
        ScheduleOutcome::Completed
    }

    async fn execute_step(
        &self,
        step: &PlannedNode,
        ctx: &mut ExecutionContext,
        identity: &Identity,
    ) -> StepOutcome {
        let node = &step.node;
        let input = ctx.input_for(step);
        let run_id = ctx.run_id;
        let record = ctx.push_record(NodeExecutionRecord::new(node.id.clone(), &node.type_id));
        record.start(input.clone());
        debug!(%run_id, node = %node.id, type_id = %node.type_id, "node running");

        // Triggers are not dispatched: their output is the runtime input.
        if node.is_trigger() {
            record.complete(input.clone());
            ctx.complete(&node.id, input);
            debug!(%run_id, node = %node.id, "trigger completed");
            return StepOutcome::Completed;
        }

        let dispatched = tokio::time::timeout(
            self.node_timeout,
            self.dispatcher.dispatch(node, identity, &input),
        )
        .await;

        let failure = match dispatched {
            Err(_elapsed) => RunError::NodeTimeout {
                node_id: node.id.clone(),
                timeout_ms: self.timeout_ms(),
            },
            Ok(Err(err)) => RunError::NodeHandlerFailed {
                node_id: node.id.clone(),
                message: err.to_string(),
            },
            Ok(Ok(result)) if !result.success => RunError::NodeHandlerFailed {
                node_id: node.id.clone(),
                message: result
                    .error
                    .unwrap_or_else(|| "handler reported failure".to_string()),
            },
            Ok(Ok(result)) => {
                let output = result.output.clone().unwrap_or(JsonValue::Null);
                return if result.is_paused() {
                    if let Some(record) = ctx.record_mut(&node.id) {
                        record.pause(output);
                    }
                    debug!(%run_id, node = %node.id, "node paused");
                    StepOutcome::Paused
                } else {
                    if let Some(record) = ctx.record_mut(&node.id) {
                        record.complete(output.clone());
                    }
                    ctx.complete(&node.id, output);
                    debug!(%run_id, node = %node.id, "node completed");
                    StepOutcome::Completed
                };
            }
        };

        warn!(%run_id, node = %node.id, error = %failure, "node failed, halting run");
        if let Some(record) = ctx.record_mut(&node.id) {
            record.fail(failure.to_string());
        }
        ctx.halt(&node.id);
        StepOutcome::Failed(failure)
    }
}

enum StepOutcome {
    Completed,
    Failed(RunError),
    Paused,
}

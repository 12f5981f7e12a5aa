//! Run lifecycle: start, listen, pause, resume, cancel.
//!
//! The [`RunController`] owns the status of every run it has seen and drives
//! the [`Scheduler`] over resolved plans. A paused run leaves a [`Checkpoint`]
//! in the checkpoint store; resuming it continues the remaining suffix, so a
//! run can survive a process restart between pause and resume.
//!
//! Status changes go through [`RunStatus::can_transition_to`]. Runs execute
//! concurrently with each other; each owns its context and records.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::envelope::Envelope;
use crate::error::{EngineError, RunError};
use crate::execution::{CancelReason, NodeExecutionRecord, RunMode, RunStatus, RunSummary};
use crate::graph::WorkflowGraph;
use crate::node::NodeId;
use crate::resolver::{ExecutionPlan, PlannedNode, ResolveOptions, resolve};
use crate::sandbox::{Dispatcher, InterceptedAction, LiveDispatcher, SandboxDispatcher};
use crate::scheduler::{ScheduleOutcome, Scheduler};
use crate::store::WorkflowStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard_core::{WorkflowId, WorkflowRunId};
use switchyard_integration::{ActionRegistry, Identity};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Where a run's graph comes from.
#[derive(Debug, Clone)]
pub enum WorkflowSource {
    /// A graph submitted with the request.
    Inline(WorkflowGraph),
    /// A stored workflow, loaded through the [`WorkflowStore`].
    Stored(WorkflowId),
}

/// A request to execute a graph.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Id the run will carry. Generated on construction so callers can
    /// cancel or query a run that is still in flight.
    pub run_id: WorkflowRunId,
    /// The graph to execute.
    pub source: WorkflowSource,
    /// Output of the trigger node (or of the listen event).
    pub runtime_input: JsonValue,
    /// Live or sandbox.
    pub mode: RunMode,
    /// Drop trigger nodes and start from the remaining roots.
    pub skip_triggers: bool,
    /// Identity handlers execute on behalf of.
    pub identity: Identity,
}

impl RunRequest {
    /// A live run over an inline graph.
    #[must_use]
    pub fn inline(graph: WorkflowGraph) -> Self {
        Self::new(WorkflowSource::Inline(graph))
    }

    /// A live run over a stored workflow.
    #[must_use]
    pub fn stored(workflow_id: WorkflowId) -> Self {
        Self::new(WorkflowSource::Stored(workflow_id))
    }

    fn new(source: WorkflowSource) -> Self {
        Self {
            run_id: WorkflowRunId::new(),
            source,
            runtime_input: JsonValue::Null,
            mode: RunMode::Live,
            skip_triggers: false,
            identity: Identity::anonymous(),
        }
    }

    /// Sets the runtime input.
    #[must_use]
    pub fn with_input(mut self, input: JsonValue) -> Self {
        self.runtime_input = input;
        self
    }

    /// Sets the run mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Runs in sandbox mode.
    #[must_use]
    pub fn sandbox(self) -> Self {
        self.with_mode(RunMode::Sandbox)
    }

    /// Sets `skip_triggers`.
    #[must_use]
    pub fn skip_triggers(mut self, skip: bool) -> Self {
        self.skip_triggers = skip;
        self
    }

    /// Sets the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Uses a caller-chosen run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: WorkflowRunId) -> Self {
        self.run_id = run_id;
        self
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::live()
            .skip_triggers(self.skip_triggers)
            .sandbox(self.mode.is_sandbox())
    }
}

/// What a run (or a resumed run) returns to its caller.
///
/// A failed run still carries its full execution path and records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// The run.
    pub run_id: WorkflowRunId,
    /// Status after this call.
    pub status: RunStatus,
    /// True only when every planned node completed.
    pub success: bool,
    /// Node ids in completion order; a halting node closes the path.
    pub execution_path: Vec<NodeId>,
    /// One record per node that entered scheduling.
    pub records: Vec<NodeExecutionRecord>,
    /// Side effects captured instead of performed (sandbox only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercepted_actions: Option<Vec<InterceptedAction>>,
    /// Why the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The typed failure behind `error`.
    #[serde(skip)]
    pub failure: Option<RunError>,
    /// The node awaiting external input, when paused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<NodeId>,
    /// Why the run was cancelled, when cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunResult {
    /// Returns the record of a node.
    #[must_use]
    pub fn record(&self, node_id: &NodeId) -> Option<&NodeExecutionRecord> {
        self.records.iter().find(|record| &record.node_id == node_id)
    }

    /// Condenses the result into a history entry.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Controller-side state of one run.
#[derive(Debug)]
struct RunHandle {
    status: RunStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    cancel_reason: Option<CancelReason>,
    cancel: watch::Sender<bool>,
}

impl RunHandle {
    fn new(status: RunStatus, started_at: DateTime<Utc>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            status,
            started_at,
            completed_at: None,
            cancel_reason: None,
            cancel,
        }
    }

    fn summary(&self, run_id: WorkflowRunId) -> RunSummary {
        RunSummary {
            run_id,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Forgets the oldest finished runs once more than `keep` are tracked.
///
/// A handle whose cancel channel still has receivers belongs to a call that
/// has not returned yet; it counts towards `keep` but is never evicted.
fn evict_finished(runs: &mut HashMap<WorkflowRunId, RunHandle>, keep: usize) {
    let total = runs.values().filter(|handle| handle.status.is_terminal()).count();
    if total <= keep {
        return;
    }
    let mut idle: Vec<(Option<DateTime<Utc>>, WorkflowRunId)> = runs
        .iter()
        .filter(|(_, handle)| handle.status.is_terminal() && handle.cancel.receiver_count() == 0)
        .map(|(run_id, handle)| (handle.completed_at, *run_id))
        .collect();
    idle.sort_unstable();
    let excess = total - keep;
    for (_, run_id) in idle.iter().take(excess) {
        runs.remove(run_id);
    }
    debug!(evicted = excess.min(idle.len()), "forgot finished runs");
}

/// A run between scheduler walks.
struct ActiveRun {
    run_id: WorkflowRunId,
    workflow_id: Option<WorkflowId>,
    mode: RunMode,
    identity: Identity,
    context: ExecutionContext,
    started_at: DateTime<Utc>,
    dispatcher: Arc<dyn Dispatcher>,
}

enum ListenOutcome {
    Triggered(JsonValue),
    TimedOut,
    Cancelled,
}

/// Drives runs through their lifecycle.
pub struct RunController {
    registry: Arc<ActionRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    workflows: Arc<dyn WorkflowStore>,
    config: EngineConfig,
    runs: Mutex<HashMap<WorkflowRunId, RunHandle>>,
}

impl RunController {
    /// Creates a controller.
    ///
    /// The registry is read-only from here on and shared by every run.
    #[must_use]
    pub fn new(
        registry: Arc<ActionRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        workflows: Arc<dyn WorkflowStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            checkpoints,
            workflows,
            config,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    fn runs(&self) -> std::sync::MutexGuard<'_, HashMap<WorkflowRunId, RunHandle>> {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Resolves a request's graph into a plan without running it.
    ///
    /// # Errors
    ///
    /// - `WorkflowNotFound` if a stored workflow does not exist
    /// - `Resolve` if the graph is invalid or cyclic
    pub async fn plan(&self, request: &RunRequest) -> Result<ExecutionPlan, EngineError> {
        let (plan, _) = self.load_plan(request).await?;
        Ok(plan)
    }

    async fn load_plan(
        &self,
        request: &RunRequest,
    ) -> Result<(ExecutionPlan, Option<WorkflowId>), EngineError> {
        let options = request.resolve_options();
        match &request.source {
            WorkflowSource::Inline(graph) => Ok((resolve(graph, options)?, None)),
            WorkflowSource::Stored(workflow_id) => {
                let workflow = self
                    .workflows
                    .get(*workflow_id)
                    .await?
                    .ok_or(EngineError::WorkflowNotFound {
                        workflow_id: *workflow_id,
                    })?;
                Ok((resolve(&workflow.graph, options)?, Some(workflow.id)))
            }
        }
    }

    /// Executes a graph immediately with the request's runtime input.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be loaded or resolved (nothing is
    /// dispatched), or if checkpoint persistence fails. Node failures are not
    /// errors: they are reported in the returned [`RunResult`].
    #[instrument(skip(self, request), fields(run_id = %request.run_id, mode = ?request.mode))]
    pub async fn run(&self, request: RunRequest) -> Result<RunResult, EngineError> {
        let (plan, workflow_id) = self.load_plan(&request).await?;
        let run_id = request.run_id;
        self.register(run_id)?;
        self.transition(run_id, RunStatus::Running)?;
        info!(nodes = plan.len(), "run started");

        let active = self.activate(request, workflow_id);
        self.drive(active, plan.steps).await
    }

    /// Waits for a trigger event, then executes the graph with it as input.
    ///
    /// The graph is resolved before listening starts. If no event arrives
    /// within `timeout` the run is cancelled with
    /// [`CancelReason::TriggerTimeout`].
    ///
    /// # Errors
    ///
    /// - `TriggerTimeout` if the timer expires first
    /// - any error [`run`](Self::run) can return
    #[instrument(skip(self, request, events), fields(run_id = %request.run_id))]
    pub async fn listen(
        &self,
        mut request: RunRequest,
        timeout: Duration,
        mut events: mpsc::Receiver<JsonValue>,
    ) -> Result<RunResult, EngineError> {
        let (plan, workflow_id) = self.load_plan(&request).await?;
        let run_id = request.run_id;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let mut cancel = self.register(run_id)?;
        self.transition(run_id, RunStatus::Listening)?;
        debug!(timeout_ms, "listening for trigger event");

        let outcome = tokio::select! {
            Some(event) = events.recv() => ListenOutcome::Triggered(event),
            () = tokio::time::sleep(timeout) => ListenOutcome::TimedOut,
            Ok(()) = cancel.changed() => ListenOutcome::Cancelled,
        };

        match outcome {
            ListenOutcome::Triggered(event) => {
                self.transition(run_id, RunStatus::Running)?;
                info!(nodes = plan.len(), "trigger event received, run started");
                request.runtime_input = event;
                let active = self.activate(request, workflow_id);
                self.drive(active, plan.steps).await
            }
            ListenOutcome::TimedOut => {
                warn!(timeout_ms, "no trigger event, cancelling run");
                self.cancel_with(run_id, CancelReason::TriggerTimeout)?;
                Err(EngineError::TriggerTimeout { run_id, timeout_ms })
            }
            ListenOutcome::Cancelled => {
                info!("run cancelled while listening");
                let active = self.activate(request, workflow_id);
                Ok(self.result(active, RunStatus::Cancelled, None, None))
            }
        }
    }

    /// Resumes a paused run.
    ///
    /// The payload is merged into the paused node's output (object keys are
    /// overlaid; any other payload replaces the output, and `null` keeps it),
    /// the node is marked completed and the remaining plan suffix runs.
    ///
    /// # Errors
    ///
    /// - `ResumeTargetNotFound` if the run is unknown, not paused, or terminal
    /// - `Checkpoint` if the checkpoint cannot be loaded
    #[instrument(skip(self, payload))]
    pub async fn resume(
        &self,
        run_id: WorkflowRunId,
        payload: JsonValue,
    ) -> Result<RunResult, EngineError> {
        if let Some(status) = self.runs().get(&run_id).map(|handle| handle.status)
            && status != RunStatus::Paused
        {
            debug!(%status, "resume rejected, run is not paused");
            return Err(EngineError::ResumeTargetNotFound { run_id });
        }

        let Some(envelope) = self.checkpoints.load(run_id).await? else {
            return Err(EngineError::ResumeTargetNotFound { run_id });
        };
        let checkpoint = envelope.into_payload();
        self.claim_paused(run_id, checkpoint.started_at)?;
        info!(node = %checkpoint.paused_node, remaining = checkpoint.remaining.len(), "run resumed");

        let mut context = checkpoint.context;
        let paused_output = context
            .record(&checkpoint.paused_node)
            .map_or(JsonValue::Null, |record| record.output.clone());
        let output = merge_resume_payload(paused_output, payload);
        if let Some(record) = context.record_mut(&checkpoint.paused_node) {
            record.complete(output.clone());
        }
        context.complete(&checkpoint.paused_node, output);

        let dispatcher: Arc<dyn Dispatcher> = match checkpoint.mode {
            RunMode::Live => Arc::new(LiveDispatcher::new(Arc::clone(&self.registry))),
            RunMode::Sandbox => Arc::new(SandboxDispatcher::with_intercepted(
                Arc::clone(&self.registry),
                checkpoint.intercepted,
            )),
        };
        let active = ActiveRun {
            run_id,
            workflow_id: checkpoint.workflow_id,
            mode: checkpoint.mode,
            identity: checkpoint.identity,
            context,
            started_at: checkpoint.started_at,
            dispatcher,
        };
        self.drive(active, checkpoint.remaining).await
    }

    /// Cancels a run and returns its status after the call.
    ///
    /// Listening and paused runs are cancelled immediately and their
    /// checkpoint is discarded. A running run finishes its current node and
    /// halts before the next, so `Running` is returned. Terminal runs are left
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `RunNotFound` if the run is neither known nor checkpointed
    /// - `Checkpoint` if the checkpoint cannot be discarded
    #[instrument(skip(self))]
    pub async fn cancel(&self, run_id: WorkflowRunId) -> Result<RunStatus, EngineError> {
        let known = self.runs().get(&run_id).map(|handle| handle.status);
        match known {
            Some(status) if status.is_terminal() => {
                debug!(%status, "cancel ignored, run already finished");
                Ok(status)
            }
            Some(RunStatus::Running) => {
                self.request_cancel(run_id);
                info!("cancellation requested, run halts before its next node");
                Ok(RunStatus::Running)
            }
            Some(_) => {
                self.cancel_with(run_id, CancelReason::Requested)?;
                self.checkpoints.delete(run_id).await?;
                info!("run cancelled");
                Ok(RunStatus::Cancelled)
            }
            None => {
                let Some(envelope) = self.checkpoints.load(run_id).await? else {
                    return Err(EngineError::RunNotFound { run_id });
                };
                self.checkpoints.delete(run_id).await?;
                let mut handle = RunHandle::new(RunStatus::Cancelled, envelope.payload.started_at);
                handle.completed_at = Some(Utc::now());
                handle.cancel_reason = Some(CancelReason::Requested);
                let mut runs = self.runs();
                runs.insert(run_id, handle);
                evict_finished(&mut runs, self.config.retained_runs);
                drop(runs);
                info!("checkpointed run cancelled");
                Ok(RunStatus::Cancelled)
            }
        }
    }

    /// Returns the status of a run.
    ///
    /// Runs paused by another process are reported as paused when their
    /// checkpoint is present.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` if the run is neither known nor checkpointed.
    pub async fn status(&self, run_id: WorkflowRunId) -> Result<RunStatus, EngineError> {
        if let Some(status) = self.runs().get(&run_id).map(|handle| handle.status) {
            return Ok(status);
        }
        match self.checkpoints.load(run_id).await? {
            Some(_) => Ok(RunStatus::Paused),
            None => Err(EngineError::RunNotFound { run_id }),
        }
    }

    /// Returns why a run was cancelled, if it was.
    #[must_use]
    pub fn cancel_reason(&self, run_id: WorkflowRunId) -> Option<CancelReason> {
        self.runs()
            .get(&run_id)
            .and_then(|handle| handle.cancel_reason)
    }

    /// Summaries of the runs this controller still tracks, oldest first.
    ///
    /// Finished runs beyond [`EngineConfig::retained_runs`] are not included;
    /// record results into a history feed to keep them.
    #[must_use]
    pub fn summaries(&self) -> Vec<RunSummary> {
        let mut summaries: Vec<RunSummary> = self
            .runs()
            .iter()
            .map(|(run_id, handle)| handle.summary(*run_id))
            .collect();
        summaries.sort_by_key(|summary| summary.run_id);
        summaries
    }

    /// Runs that currently have a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `Checkpoint` if the store cannot be listed.
    pub async fn paused_runs(&self) -> Result<Vec<WorkflowRunId>, EngineError> {
        Ok(self.checkpoints.list().await?)
    }

    fn register(&self, run_id: WorkflowRunId) -> Result<watch::Receiver<bool>, EngineError> {
        let mut runs = self.runs();
        if let Some(existing) = runs.get(&run_id) {
            return Err(EngineError::InvalidStateTransition {
                from: existing.status,
                to: RunStatus::Idle,
            });
        }
        let handle = RunHandle::new(RunStatus::Idle, Utc::now());
        let cancel = handle.cancel.subscribe();
        runs.insert(run_id, handle);
        Ok(cancel)
    }

    /// Moves a paused (or unknown, checkpointed) run to running.
    fn claim_paused(
        &self,
        run_id: WorkflowRunId,
        started_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut runs = self.runs();
        let handle = runs
            .entry(run_id)
            .or_insert_with(|| RunHandle::new(RunStatus::Paused, started_at));
        if handle.status != RunStatus::Paused {
            return Err(EngineError::ResumeTargetNotFound { run_id });
        }
        handle.status = RunStatus::Running;
        Ok(())
    }

    fn transition(&self, run_id: WorkflowRunId, to: RunStatus) -> Result<(), EngineError> {
        let mut runs = self.runs();
        let handle = runs
            .get_mut(&run_id)
            .ok_or(EngineError::RunNotFound { run_id })?;
        if !handle.status.can_transition_to(to) {
            return Err(EngineError::InvalidStateTransition {
                from: handle.status,
                to,
            });
        }
        debug!(%run_id, from = %handle.status, %to, "run status changed");
        handle.status = to;
        if to.is_terminal() {
            handle.completed_at = Some(Utc::now());
            evict_finished(&mut runs, self.config.retained_runs);
        }
        Ok(())
    }

    fn cancel_with(&self, run_id: WorkflowRunId, reason: CancelReason) -> Result<(), EngineError> {
        self.transition(run_id, RunStatus::Cancelled)?;
        let mut runs = self.runs();
        if let Some(handle) = runs.get_mut(&run_id) {
            handle.cancel_reason = Some(reason);
            handle.cancel.send_replace(true);
        }
        Ok(())
    }

    fn request_cancel(&self, run_id: WorkflowRunId) {
        if let Some(handle) = self.runs().get_mut(&run_id) {
            handle.cancel_reason = Some(CancelReason::Requested);
            handle.cancel.send_replace(true);
        }
    }

    fn cancel_receiver(&self, run_id: WorkflowRunId) -> Result<watch::Receiver<bool>, EngineError> {
        self.runs()
            .get(&run_id)
            .map(|handle| handle.cancel.subscribe())
            .ok_or(EngineError::RunNotFound { run_id })
    }

    fn activate(&self, request: RunRequest, workflow_id: Option<WorkflowId>) -> ActiveRun {
        let dispatcher: Arc<dyn Dispatcher> = match request.mode {
            RunMode::Live => Arc::new(LiveDispatcher::new(Arc::clone(&self.registry))),
            RunMode::Sandbox => Arc::new(SandboxDispatcher::new(Arc::clone(&self.registry))),
        };
        let started_at = self
            .runs()
            .get(&request.run_id)
            .map_or_else(Utc::now, |handle| handle.started_at);
        ActiveRun {
            run_id: request.run_id,
            workflow_id,
            mode: request.mode,
            identity: request.identity,
            context: ExecutionContext::new(request.run_id, request.runtime_input),
            started_at,
            dispatcher,
        }
    }

    /// Walks `steps` and settles the run according to how the walk ended.
    async fn drive(
        &self,
        mut active: ActiveRun,
        steps: Vec<PlannedNode>,
    ) -> Result<RunResult, EngineError> {
        let run_id = active.run_id;
        let cancel = self.cancel_receiver(run_id)?;
        let scheduler = Scheduler::new(Arc::clone(&active.dispatcher), self.config.node_timeout());
        let outcome = scheduler
            .execute(&steps, &mut active.context, &active.identity, &cancel)
            .await;
        let cancel_requested = *cancel.borrow();

        match outcome {
            ScheduleOutcome::Completed => {
                self.transition(run_id, RunStatus::Completed)?;
                self.checkpoints.delete(run_id).await?;
                info!(%run_id, "run completed");
                Ok(self.result(active, RunStatus::Completed, None, None))
            }
            ScheduleOutcome::Failed(failure) => {
                self.transition(run_id, RunStatus::Failed)?;
                self.checkpoints.delete(run_id).await?;
                warn!(%run_id, error = %failure, "run failed");
                Ok(self.result(active, RunStatus::Failed, Some(failure), None))
            }
            ScheduleOutcome::Paused { node_id, .. } if cancel_requested => {
                debug!(%run_id, node = %node_id, "pause superseded by cancellation");
                self.settle_cancelled(active).await
            }
            ScheduleOutcome::Paused { node_id, remaining } => {
                let intercepted = active.dispatcher.take_intercepted();
                let checkpoint = Checkpoint {
                    run_id,
                    workflow_id: active.workflow_id,
                    mode: active.mode,
                    identity: active.identity.clone(),
                    paused_node: node_id.clone(),
                    context: active.context.clone(),
                    remaining,
                    intercepted: intercepted.clone(),
                    started_at: active.started_at,
                    paused_at: Utc::now(),
                };
                if let Err(err) = self.checkpoints.save(Envelope::new(checkpoint)).await {
                    warn!(%run_id, error = %err, "checkpoint save failed, failing run");
                    self.transition(run_id, RunStatus::Failed)?;
                    return Err(err.into());
                }
                self.transition(run_id, RunStatus::Paused)?;
                info!(%run_id, node = %node_id, "run paused");

                let mut result = self.result(active, RunStatus::Paused, None, Some(node_id));
                if result.intercepted_actions.is_some() {
                    result.intercepted_actions = Some(intercepted);
                }
                Ok(result)
            }
            ScheduleOutcome::Cancelled { remaining } => {
                debug!(%run_id, skipped = remaining.len(), "run halted by cancellation");
                self.settle_cancelled(active).await
            }
        }
    }

    async fn settle_cancelled(&self, active: ActiveRun) -> Result<RunResult, EngineError> {
        let run_id = active.run_id;
        self.transition(run_id, RunStatus::Cancelled)?;
        self.checkpoints.delete(run_id).await?;
        info!(%run_id, "run cancelled");
        Ok(self.result(active, RunStatus::Cancelled, None, None))
    }

    fn result(
        &self,
        active: ActiveRun,
        status: RunStatus,
        failure: Option<RunError>,
        paused_at: Option<NodeId>,
    ) -> RunResult {
        let (completed_at, cancel_reason) = self
            .runs()
            .get(&active.run_id)
            .map_or((None, None), |handle| {
                (handle.completed_at, handle.cancel_reason)
            });
        let intercepted_actions = active
            .mode
            .is_sandbox()
            .then(|| active.dispatcher.take_intercepted());
        RunResult {
            run_id: active.run_id,
            status,
            success: status == RunStatus::Completed,
            execution_path: active.context.execution_path,
            records: active.context.records,
            intercepted_actions,
            error: failure.as_ref().map(ToString::to_string),
            failure,
            paused_at,
            cancel_reason: (status == RunStatus::Cancelled)
                .then_some(cancel_reason)
                .flatten(),
            started_at: active.started_at,
            completed_at,
        }
    }
}

/// Combines a paused node's output with the resume payload.
fn merge_resume_payload(paused_output: JsonValue, payload: JsonValue) -> JsonValue {
    match (paused_output, payload) {
        (JsonValue::Object(mut output), JsonValue::Object(extra)) => {
            output.extend(extra);
            JsonValue::Object(output)
        }
        (output, JsonValue::Null) => output,
        (_, payload) => payload,
    }
}

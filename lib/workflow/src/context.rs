//! Per-run execution context.

use crate::execution::NodeExecutionRecord;
use crate::node::NodeId;
use crate::resolver::PlannedNode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use switchyard_core::WorkflowRunId;

/// State owned by a single run: the trigger output, resolved node outputs,
/// completion order and per-node records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// The run this context belongs to.
    pub run_id: WorkflowRunId,
    /// Output of the trigger (the run's runtime input).
    pub trigger_output: JsonValue,
    /// Output of every completed node.
    pub outputs: BTreeMap<NodeId, JsonValue>,
    /// Node ids in completion order.
    pub execution_path: Vec<NodeId>,
    /// One record per node that entered scheduling, in scheduling order.
    pub records: Vec<NodeExecutionRecord>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(run_id: WorkflowRunId, trigger_output: JsonValue) -> Self {
        Self {
            run_id,
            trigger_output,
            outputs: BTreeMap::new(),
            execution_path: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Computes the input for a planned node.
    ///
    /// Roots receive the trigger output. A node with one predecessor receives
    /// that predecessor's output; with several, an object keyed by
    /// predecessor id.
    #[must_use]
    pub fn input_for(&self, step: &PlannedNode) -> JsonValue {
        match step.predecessors.as_slice() {
            [] => self.trigger_output.clone(),
            [single] => self.outputs.get(single).cloned().unwrap_or(JsonValue::Null),
            many => {
                let merged: Map<String, JsonValue> = many
                    .iter()
                    .map(|pred| {
                        (
                            pred.to_string(),
                            self.outputs.get(pred).cloned().unwrap_or(JsonValue::Null),
                        )
                    })
                    .collect();
                JsonValue::Object(merged)
            }
        }
    }

    /// Records a node's output and appends it to the execution path.
    pub fn complete(&mut self, node_id: &NodeId, output: JsonValue) {
        self.outputs.insert(node_id.clone(), output);
        self.execution_path.push(node_id.clone());
    }

    /// Appends a node that halted the run to the execution path.
    ///
    /// The node gets no output, so nothing downstream can consume it.
    pub fn halt(&mut self, node_id: &NodeId) {
        self.execution_path.push(node_id.clone());
    }

    /// Returns the record for a node.
    #[must_use]
    pub fn record(&self, node_id: &NodeId) -> Option<&NodeExecutionRecord> {
        self.records.iter().find(|record| &record.node_id == node_id)
    }

    /// Returns the record for a node, mutably.
    pub fn record_mut(&mut self, node_id: &NodeId) -> Option<&mut NodeExecutionRecord> {
        self.records
            .iter_mut()
            .find(|record| &record.node_id == node_id)
    }

    /// Adds a record and returns it for mutation.
    pub fn push_record(&mut self, record: NodeExecutionRecord) -> &mut NodeExecutionRecord {
        self.records.push(record);
        let last = self.records.len() - 1;
        &mut self.records[last]
    }
}

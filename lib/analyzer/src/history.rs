//! Run history feed.
//!
//! The analyzer never observes runs directly. Finished runs are appended to a
//! [`RunHistory`] (from a [`RunResult`] or loaded from the external store) and
//! aggregated into [`HistoryStats`] over a window of recent runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchyard_workflow::{NodeExecutionRecord, NodeId, NodeStatus, RunResult, RunStatus, RunSummary};

/// One past run: its summary and per-node records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Status and timing of the run.
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Per-node records, if they were retained.
    #[serde(default)]
    pub records: Vec<NodeExecutionRecord>,
}

impl From<&RunResult> for RunRecord {
    fn from(result: &RunResult) -> Self {
        Self {
            summary: result.summary(),
            records: result.records.clone(),
        }
    }
}

/// Past runs of one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    /// Runs in the order they were recorded.
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

impl RunHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a run.
    pub fn push(&mut self, run: RunRecord) {
        self.runs.push(run);
    }

    /// Appends the outcome of a run.
    pub fn record(&mut self, result: &RunResult) {
        self.push(RunRecord::from(result));
    }

    /// Number of recorded runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if no run was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// The read-only feed of `{status, startedAt, completedAt}` per run.
    pub fn summaries(&self) -> impl Iterator<Item = &RunSummary> {
        self.runs.iter().map(|run| &run.summary)
    }

    /// The `window` most recent runs, oldest first.
    #[must_use]
    pub fn recent(&self, window: usize) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self.runs.iter().collect();
        runs.sort_by_key(|run| (run.summary.started_at, run.summary.run_id));
        let skip = runs.len().saturating_sub(window);
        runs.split_off(skip)
    }

    /// Aggregates the `window` most recent runs.
    #[must_use]
    pub fn stats(&self, window: usize) -> HistoryStats {
        HistoryStats::from_runs(&self.recent(window))
    }
}

/// Aggregated outcome of a window of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Runs in the window.
    pub runs: usize,
    /// Runs that completed or failed. Paused and cancelled runs are excluded.
    pub finished: usize,
    /// Runs that failed.
    pub failed: usize,
    /// `failed / finished`, or 0 with no finished run.
    pub failure_rate: f64,
    /// Failed records per node.
    pub node_failures: BTreeMap<NodeId, usize>,
    /// Records per node.
    pub node_executions: BTreeMap<NodeId, usize>,
    /// Mean dispatch time per node, over records that have one.
    pub mean_duration_ms: BTreeMap<NodeId, u64>,
}

impl HistoryStats {
    fn from_runs(runs: &[&RunRecord]) -> Self {
        let mut stats = Self {
            runs: runs.len(),
            ..Self::default()
        };
        let mut durations: BTreeMap<NodeId, (u64, u64)> = BTreeMap::new();

        for run in runs {
            match run.summary.status {
                RunStatus::Completed => stats.finished += 1,
                RunStatus::Failed => {
                    stats.finished += 1;
                    stats.failed += 1;
                }
                _ => {}
            }
            for record in &run.records {
                *stats
                    .node_executions
                    .entry(record.node_id.clone())
                    .or_default() += 1;
                if record.status == NodeStatus::Failed {
                    *stats
                        .node_failures
                        .entry(record.node_id.clone())
                        .or_default() += 1;
                }
                if let Some(ms) = record.duration_ms {
                    let (total, count) = durations.entry(record.node_id.clone()).or_default();
                    *total += ms;
                    *count += 1;
                }
            }
        }

        if stats.finished > 0 {
            stats.failure_rate = stats.failed as f64 / stats.finished as f64;
        }
        stats.mean_duration_ms = durations
            .into_iter()
            .map(|(node, (total, count))| (node, total / count))
            .collect();
        stats
    }

    /// Nodes with failed records, most failures first, ties by id.
    #[must_use]
    pub fn failing_nodes(&self) -> Vec<&NodeId> {
        let mut nodes: Vec<(&NodeId, usize)> = self
            .node_failures
            .iter()
            .map(|(node, count)| (node, *count))
            .collect();
        nodes.sort_by(|(a, ca), (b, cb)| cb.cmp(ca).then_with(|| a.cmp(b)));
        nodes.into_iter().map(|(node, _)| node).collect()
    }
}

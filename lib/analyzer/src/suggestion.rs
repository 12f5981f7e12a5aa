//! Optimization suggestions and their ranking.

use serde::{Deserialize, Serialize};
use std::fmt;
use switchyard_workflow::NodeId;

/// What kind of inefficiency a suggestion addresses.
///
/// Declaration order is the ranking order within a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Repeated failures across recent runs.
    ElevatedFailureRate,
    /// Same-family side-effecting calls that could be one batched call.
    UnbatchedCalls,
    /// Strictly sequential nodes that could run as a parallel section.
    LongSerialChain,
    /// A node with many direct successors.
    HighFanOut,
}

impl Category {
    /// Stable name, used in suggestion ids.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ElevatedFailureRate => "elevated_failure_rate",
            Self::UnbatchedCalls => "unbatched_calls",
            Self::LongSerialChain => "long_serial_chain",
            Self::HighFanOut => "high_fan_out",
        }
    }

    /// Multiplier applied to severity points when scoring.
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::ElevatedFailureRate => 4,
            Self::UnbatchedCalls => 3,
            Self::LongSerialChain | Self::HighFanOut => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgent a suggestion is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth knowing.
    Info,
    /// Measurable cost.
    Warning,
    /// The graph is unreliable.
    Critical,
}

impl Severity {
    /// Points deducted from the health score, before the category weight.
    #[must_use]
    pub fn points(self) -> u32 {
        match self {
            Self::Info => 1,
            Self::Warning => 3,
            Self::Critical => 5,
        }
    }
}

/// The graph change a suggestion proposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposedRewrite {
    /// Replace a serial chain by a `core.split` / `core.join` section with
    /// the chain members side by side.
    ///
    /// This changes data flow: each member receives the split node's input
    /// (what the first member used to receive) instead of its former
    /// predecessor's output, and the join node hands the merged member
    /// outputs to whatever followed the chain. Only apply it when the members
    /// do not read each other's results.
    Parallelize {
        /// The chain, in order.
        chain: Vec<NodeId>,
    },
    /// Replace same-family calls by one `core.batch` node.
    ///
    /// Every call is still made when the batch runs, in the listed order, and
    /// each receives the batch node's input. The batch output lists the call
    /// outputs under `items`.
    Batch {
        /// Capability family of the calls.
        family: String,
        /// The calls, in plan order.
        members: Vec<NodeId>,
    },
    /// No machine-applicable rewrite; the text says what to look at.
    Advice {
        /// What a person should change.
        message: String,
    },
}

/// A read-only finding about a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationSuggestion {
    /// Stable id: `<category>:<first affected node>`.
    pub id: String,
    /// What kind of inefficiency this is.
    pub category: Category,
    /// How urgent it is.
    pub severity: Severity,
    /// Nodes involved, most relevant first.
    pub affected_node_ids: Vec<NodeId>,
    /// The proposed change.
    pub proposed_rewrite: ProposedRewrite,
    /// Whether `apply` can perform the rewrite.
    pub auto_applicable: bool,
    /// One-line explanation.
    pub description: String,
}

impl OptimizationSuggestion {
    /// Builds a suggestion, deriving its id and auto-applicability.
    #[must_use]
    pub fn new(
        category: Category,
        severity: Severity,
        affected_node_ids: Vec<NodeId>,
        proposed_rewrite: ProposedRewrite,
        description: impl Into<String>,
    ) -> Self {
        let anchor = affected_node_ids
            .first()
            .map_or_else(|| "graph".to_string(), ToString::to_string);
        let auto_applicable = !matches!(proposed_rewrite, ProposedRewrite::Advice { .. });
        Self {
            id: format!("{}:{anchor}", category.as_str()),
            category,
            severity,
            affected_node_ids,
            proposed_rewrite,
            auto_applicable,
            description: description.into(),
        }
    }

    /// Points this suggestion deducts from the health score.
    #[must_use]
    pub fn deduction(&self) -> u32 {
        self.severity.points() * self.category.weight()
    }
}

/// Sorts suggestions: severity descending, then category, then the position
/// of the first affected node, then id.
///
/// `position` maps a node to its declaration index; unknown nodes sort last.
pub fn rank(
    suggestions: &mut [OptimizationSuggestion],
    position: impl Fn(&NodeId) -> Option<usize>,
) {
    let anchor = |s: &OptimizationSuggestion| {
        s.affected_node_ids
            .first()
            .and_then(|node| position(node))
            .unwrap_or(usize::MAX)
    };
    suggestions.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| anchor(a).cmp(&anchor(b)))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Health score: 100 minus the deductions of every suggestion, floored at 0.
#[must_use]
pub fn health_score(suggestions: &[OptimizationSuggestion]) -> u32 {
    let deductions: u32 = suggestions.iter().map(OptimizationSuggestion::deduction).sum();
    100_u32.saturating_sub(deductions)
}

//! Graph resolution: validation and linearization into an execution plan.
//!
//! Resolution runs before any node is dispatched. It:
//! 1. drops UI placeholder nodes (and, with `skip_triggers`, trigger nodes)
//!    together with the edges touching them
//! 2. rejects graphs with a cycle (`GraphCyclic`)
//! 3. rejects graphs without an action node or an eligible root (`GraphInvalid`)
//! 4. orders nodes topologically, breaking ties by declaration order

use crate::error::ResolveError;
use crate::graph::WorkflowGraph;
use crate::node::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

/// Options controlling resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Drop trigger nodes and start from the remaining action roots.
    pub skip_triggers: bool,
    /// The plan will execute in sandbox mode.
    pub is_sandbox: bool,
}

impl ResolveOptions {
    /// Options for a live run that keeps trigger nodes.
    #[must_use]
    pub fn live() -> Self {
        Self::default()
    }

    /// Sets `skip_triggers`.
    #[must_use]
    pub fn skip_triggers(mut self, skip: bool) -> Self {
        self.skip_triggers = skip;
        self
    }

    /// Sets `is_sandbox`.
    #[must_use]
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.is_sandbox = sandbox;
        self
    }
}

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedNode {
    /// The node to execute.
    pub node: Node,
    /// Direct predecessors that survived filtering, in declaration order.
    pub predecessors: Vec<NodeId>,
}

impl PlannedNode {
    /// Returns true if the node consumes the trigger output directly.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.predecessors.is_empty()
    }
}

/// A dependency-ordered list of nodes.
///
/// Every node appears after all of its predecessors. The plan is
/// self-contained so that a suffix of it can be checkpointed and resumed
/// without the original graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Steps in execution order.
    pub steps: Vec<PlannedNode>,
    /// Options the plan was resolved with.
    pub options: ResolveOptions,
}

impl ExecutionPlan {
    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Node ids in plan order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<&NodeId> {
        self.steps.iter().map(|step| &step.node.id).collect()
    }

    /// Position of a node in the plan.
    #[must_use]
    pub fn position(&self, node_id: &NodeId) -> Option<usize> {
        self.steps.iter().position(|step| &step.node.id == node_id)
    }

    /// Returns the step for a node.
    #[must_use]
    pub fn step(&self, node_id: &NodeId) -> Option<&PlannedNode> {
        self.steps.iter().find(|step| &step.node.id == node_id)
    }

    /// The steps strictly after `node_id`, or an empty slice if it is not in the plan.
    #[must_use]
    pub fn suffix_after(&self, node_id: &NodeId) -> &[PlannedNode] {
        match self.position(node_id) {
            Some(index) => &self.steps[index + 1..],
            None => &[],
        }
    }
}

/// Validates a graph and produces its execution plan.
///
/// # Errors
///
/// - `GraphCyclic` if the filtered graph contains a cycle
/// - `GraphInvalid` if no action node or no eligible root remains
pub fn resolve(
    graph: &WorkflowGraph,
    options: ResolveOptions,
) -> Result<ExecutionPlan, ResolveError> {
    let filtered = graph.filtered(|node| {
        !node.is_ui_placeholder && !(options.skip_triggers && node.is_trigger())
    });

    let cyclic = filtered.cyclic_nodes();
    if !cyclic.is_empty() {
        return Err(ResolveError::GraphCyclic { nodes: cyclic });
    }

    if !filtered.nodes().any(Node::is_executable) {
        return Err(ResolveError::GraphInvalid {
            reason: "graph has no action nodes".to_string(),
        });
    }

    let roots = filtered.entry_nodes();
    let has_eligible_root = if options.skip_triggers {
        !roots.is_empty()
    } else {
        roots.iter().any(|node| node.is_trigger())
    };
    if !has_eligible_root {
        let reason = if options.skip_triggers {
            "no root action node remains"
        } else {
            "graph has no trigger node"
        };
        return Err(ResolveError::GraphInvalid {
            reason: reason.to_string(),
        });
    }

    let steps = topological_order(&filtered);
    debug!(
        nodes = steps.len(),
        skip_triggers = options.skip_triggers,
        "resolved execution plan"
    );
    Ok(ExecutionPlan { steps, options })
}

/// Kahn's algorithm with a min-heap on declaration index.
fn topological_order(graph: &WorkflowGraph) -> Vec<PlannedNode> {
    let mut in_degree: HashMap<&NodeId, usize> = graph
        .nodes()
        .map(|node| (&node.id, graph.predecessors(&node.id).len()))
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = graph
        .nodes()
        .enumerate()
        .filter(|(_, node)| in_degree.get(&node.id) == Some(&0))
        .map(|(index, _)| Reverse(index))
        .collect();

    let by_index: Vec<&Node> = graph.nodes().collect();
    let mut steps = Vec::with_capacity(by_index.len());

    while let Some(Reverse(index)) = ready.pop() {
        let node = by_index[index];
        for successor in graph.successors(&node.id) {
            let Some(degree) = in_degree.get_mut(&successor.id) else {
                continue;
            };
            *degree -= 1;
            if *degree == 0 {
                if let Some(next) = graph.declaration_index(&successor.id) {
                    ready.push(Reverse(next));
                }
            }
        }
        steps.push(PlannedNode {
            node: node.clone(),
            predecessors: graph
                .predecessors(&node.id)
                .into_iter()
                .map(|pred| pred.id.clone())
                .collect(),
        });
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;

    fn graph(nodes: Vec<Node>, edges: &[(&str, &str)]) -> WorkflowGraph {
        WorkflowGraph::from_parts(
            nodes,
            edges.iter().map(|(s, t)| Edge::between(*s, *t)),
        )
        .expect("build graph")
    }

    fn order(plan: &ExecutionPlan) -> Vec<&str> {
        plan.node_ids().into_iter().map(NodeId::as_str).collect()
    }

    fn linear() -> WorkflowGraph {
        graph(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
                Node::action("D", "core.passthrough"),
                Node::action("E", "core.passthrough"),
            ],
            &[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")],
        )
    }

    #[test]
    fn linear_graph_resolves_in_order() {
        let plan = resolve(&linear(), ResolveOptions::live()).expect("resolve");
        assert_eq!(order(&plan), vec!["A", "B", "C", "D", "E"]);
        assert!(plan.steps[0].is_root());
        assert_eq!(plan.steps[2].predecessors, vec![NodeId::new("B")]);
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let g = graph(
            vec![
                Node::trigger("T", "manual"),
                Node::action("Z", "core.passthrough"),
                Node::action("Y", "core.passthrough"),
                Node::action("X", "core.join"),
            ],
            &[("T", "Y"), ("T", "Z"), ("Y", "X"), ("Z", "X")],
        );
        let plan = resolve(&g, ResolveOptions::live()).expect("resolve");
        assert_eq!(order(&plan), vec!["T", "Z", "Y", "X"]);
        assert_eq!(
            plan.step(&NodeId::new("X")).map(|s| s.predecessors.len()),
            Some(2)
        );
    }

    #[test]
    fn every_node_follows_its_predecessors() {
        let g = graph(
            vec![
                Node::action("D", "core.join"),
                Node::action("B", "core.passthrough"),
                Node::trigger("A", "manual"),
                Node::action("C", "core.passthrough"),
            ],
            &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
        );
        let plan = resolve(&g, ResolveOptions::live()).expect("resolve");
        for (index, step) in plan.steps.iter().enumerate() {
            for pred in &step.predecessors {
                let pred_index = plan.position(pred).expect("pred in plan");
                assert!(pred_index < index, "{pred} must precede {}", step.node.id);
            }
        }
        assert_eq!(order(&plan), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn placeholders_are_filtered() {
        let g = graph(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("P", "addAction"),
            ],
            &[("A", "B"), ("B", "P")],
        );
        let plan = resolve(&g, ResolveOptions::live()).expect("resolve");
        assert_eq!(order(&plan), vec!["A", "B"]);
    }

    #[test]
    fn skip_triggers_recomputes_roots() {
        let plan =
            resolve(&linear(), ResolveOptions::live().skip_triggers(true)).expect("resolve");
        assert_eq!(order(&plan), vec!["B", "C", "D", "E"]);
        assert!(plan.steps[0].is_root());
        assert!(plan.options.skip_triggers);
    }

    #[test]
    fn missing_trigger_is_invalid() {
        let g = graph(
            vec![
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
            ],
            &[("B", "C")],
        );
        let err = resolve(&g, ResolveOptions::live()).expect_err("invalid");
        assert!(matches!(err, ResolveError::GraphInvalid { .. }));

        let plan = resolve(&g, ResolveOptions::live().skip_triggers(true)).expect("resolve");
        assert_eq!(order(&plan), vec!["B", "C"]);
    }

    #[test]
    fn missing_action_is_invalid() {
        let g = graph(
            vec![Node::trigger("A", "manual"), Node::action("P", "addAction")],
            &[("A", "P")],
        );
        let err = resolve(&g, ResolveOptions::live()).expect_err("invalid");
        assert_eq!(
            err,
            ResolveError::GraphInvalid {
                reason: "graph has no action nodes".to_string()
            }
        );
    }

    #[test]
    fn only_triggers_with_skip_is_invalid() {
        let g = graph(vec![Node::trigger("A", "manual")], &[]);
        let err =
            resolve(&g, ResolveOptions::live().skip_triggers(true)).expect_err("invalid");
        assert!(matches!(err, ResolveError::GraphInvalid { .. }));
    }

    #[test]
    fn cycle_is_rejected() {
        let g = graph(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
            ],
            &[("A", "B"), ("B", "C"), ("C", "B")],
        );
        let err = resolve(&g, ResolveOptions::live()).expect_err("cyclic");
        assert_eq!(
            err,
            ResolveError::GraphCyclic {
                nodes: vec![NodeId::new("B"), NodeId::new("C")]
            }
        );
    }

    #[test]
    fn cycle_without_root_is_still_cyclic() {
        let g = graph(
            vec![
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
            ],
            &[("B", "C"), ("C", "B")],
        );
        let err =
            resolve(&g, ResolveOptions::live().skip_triggers(true)).expect_err("cyclic");
        assert!(matches!(err, ResolveError::GraphCyclic { .. }));
    }

    #[test]
    fn suffix_after_node() {
        let plan = resolve(&linear(), ResolveOptions::live()).expect("resolve");
        let rest: Vec<&str> = plan
            .suffix_after(&NodeId::new("C"))
            .iter()
            .map(|s| s.node.id.as_str())
            .collect();
        assert_eq!(rest, vec!["D", "E"]);
        assert!(plan.suffix_after(&NodeId::new("nope")).is_empty());
    }
}

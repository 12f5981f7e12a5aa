//! Structural detections over a resolved plan.
//!
//! Detections read the plan, never the raw graph, so placeholders and dangling
//! edges are already gone and every node appears after its predecessors.

use crate::classify::NodeClassifier;
use crate::config::AnalyzerConfig;
use crate::history::HistoryStats;
use crate::suggestion::{Category, OptimizationSuggestion, ProposedRewrite, Severity};
use std::collections::{BTreeMap, HashMap, HashSet};
use switchyard_workflow::{ExecutionPlan, Node, NodeId, PlannedNode};

/// Adjacency of a plan in both directions.
pub(crate) struct PlanView<'a> {
    steps: &'a [PlannedNode],
    by_id: HashMap<&'a NodeId, &'a PlannedNode>,
    successors: HashMap<&'a NodeId, Vec<&'a NodeId>>,
}

impl<'a> PlanView<'a> {
    pub(crate) fn new(plan: &'a ExecutionPlan) -> Self {
        let mut by_id = HashMap::new();
        let mut successors: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for step in &plan.steps {
            by_id.insert(&step.node.id, step);
            for pred in &step.predecessors {
                successors.entry(pred).or_default().push(&step.node.id);
            }
        }
        Self {
            steps: &plan.steps,
            by_id,
            successors,
        }
    }

    fn node(&self, id: &NodeId) -> Option<&'a Node> {
        self.by_id.get(id).map(|step| &step.node)
    }

    fn predecessors(&self, id: &NodeId) -> &'a [NodeId] {
        self.by_id
            .get(id)
            .map_or(&[], |step| step.predecessors.as_slice())
    }

    fn successors(&self, id: &NodeId) -> &[&'a NodeId] {
        self.successors.get(id).map_or(&[], Vec::as_slice)
    }

    fn is_action(&self, id: &NodeId) -> bool {
        self.node(id).is_some_and(|node| !node.is_trigger())
    }

    /// `from -> to` is the only way out of `from` and the only way into `to`.
    fn is_sole_link(&self, from: &NodeId, to: &NodeId) -> bool {
        self.is_action(from)
            && self.is_action(to)
            && matches!(self.successors(from), [only] if *only == to)
            && matches!(self.predecessors(to), [only] if only == from)
    }
}

/// Maximal runs of action nodes joined by sole links, at least
/// `serial_chain_threshold` long.
pub(crate) fn serial_chains(
    view: &PlanView<'_>,
    config: &AnalyzerConfig,
) -> Vec<OptimizationSuggestion> {
    let threshold = config.serial_chain_threshold.max(2);
    let mut suggestions = Vec::new();

    for step in view.steps {
        let start = &step.node.id;
        if !view.is_action(start) {
            continue;
        }
        let continues_chain = matches!(
            step.predecessors.as_slice(),
            [pred] if view.is_sole_link(pred, start)
        );
        if continues_chain {
            continue;
        }

        let mut chain = vec![start.clone()];
        let mut current = start;
        while let [next] = view.successors(current) {
            if !view.is_sole_link(current, next) {
                break;
            }
            chain.push((*next).clone());
            current = *next;
        }

        if chain.len() >= threshold {
            let severity = if chain.len() >= threshold * 2 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let description = format!(
                "{} nodes run strictly one after another and could run as a parallel section",
                chain.len()
            );
            suggestions.push(OptimizationSuggestion::new(
                Category::LongSerialChain,
                severity,
                chain.clone(),
                ProposedRewrite::Parallelize { chain },
                description,
            ));
        }
    }
    suggestions
}

/// Nodes with more than `fan_out_threshold` direct successors.
pub(crate) fn fan_out(view: &PlanView<'_>, config: &AnalyzerConfig) -> Vec<OptimizationSuggestion> {
    view.steps
        .iter()
        .filter_map(|step| {
            let successors = view.successors(&step.node.id);
            if successors.len() <= config.fan_out_threshold {
                return None;
            }
            let mut affected = vec![step.node.id.clone()];
            affected.extend(successors.iter().map(|id| (*id).clone()));
            let message = format!(
                "{} feeds {} nodes directly; put an intermediate step in front of related targets",
                step.node.id,
                successors.len()
            );
            Some(OptimizationSuggestion::new(
                Category::HighFanOut,
                Severity::Warning,
                affected,
                ProposedRewrite::Advice {
                    message: message.clone(),
                },
                message,
            ))
        })
        .collect()
}

/// Same-family side-effecting calls collected in plan order, with the
/// non-member nodes that depend on them.
#[derive(Default)]
struct OpenRun {
    members: Vec<NodeId>,
    downstream: HashSet<NodeId>,
}

impl OpenRun {
    fn reaches(&self, id: &NodeId) -> bool {
        self.downstream.contains(id) || self.members.contains(id)
    }
}

/// Runs of same-family side-effecting calls, in plan order, longer than
/// `unbatched_call_threshold`.
///
/// An aggregation node ends every open run. A call that depends on a run
/// through a node outside it ends that run and starts a new one, since
/// collapsing both into one node would close a cycle.
pub(crate) fn unbatched_calls(
    view: &PlanView<'_>,
    classifier: &dyn NodeClassifier,
    config: &AnalyzerConfig,
) -> Vec<OptimizationSuggestion> {
    let mut suggestions = Vec::new();
    let mut open: BTreeMap<String, OpenRun> = BTreeMap::new();

    for step in view.steps {
        let node = &step.node;
        if node.is_trigger() {
            continue;
        }
        if classifier.is_aggregation(&node.type_id) {
            for (family, run) in std::mem::take(&mut open) {
                flush_run(family, run.members, config, &mut suggestions);
            }
            continue;
        }

        let family = classifier
            .is_side_effecting(&node.type_id)
            .then(|| classifier.family(&node.type_id));
        if let Some(family) = &family {
            let blocked = open.get(family).is_some_and(|run| {
                step.predecessors
                    .iter()
                    .any(|pred| run.downstream.contains(pred))
            });
            if blocked && let Some(run) = open.remove(family) {
                flush_run(family.clone(), run.members, config, &mut suggestions);
            }
        }
        for (run_family, run) in &mut open {
            let is_member = family.as_ref() == Some(run_family);
            if !is_member && step.predecessors.iter().any(|pred| run.reaches(pred)) {
                run.downstream.insert(node.id.clone());
            }
        }
        if let Some(family) = family {
            open.entry(family).or_default().members.push(node.id.clone());
        }
    }
    for (family, run) in open {
        flush_run(family, run.members, config, &mut suggestions);
    }
    suggestions
}

fn flush_run(
    family: String,
    members: Vec<NodeId>,
    config: &AnalyzerConfig,
    suggestions: &mut Vec<OptimizationSuggestion>,
) {
    if members.len() <= config.unbatched_call_threshold {
        return;
    }
    let description = format!(
        "{} {family} calls are sent one at a time with no aggregation step",
        members.len()
    );
    suggestions.push(OptimizationSuggestion::new(
        Category::UnbatchedCalls,
        Severity::Warning,
        members.clone(),
        ProposedRewrite::Batch { family, members },
        description,
    ));
}

/// Failed over finished runs above `failure_rate_threshold`.
pub(crate) fn failure_rate(
    stats: &HistoryStats,
    config: &AnalyzerConfig,
) -> Option<OptimizationSuggestion> {
    if stats.finished == 0 || stats.failure_rate <= config.failure_rate_threshold {
        return None;
    }
    let affected: Vec<NodeId> = stats.failing_nodes().into_iter().cloned().collect();
    let message = match affected.first() {
        Some(node) => format!("most failures occur at {node}; check its handler and inputs"),
        None => "runs fail without a failing node record; check run history".to_string(),
    };
    let description = format!(
        "{} of the last {} finished runs failed ({:.1}%)",
        stats.failed,
        stats.finished,
        stats.failure_rate * 100.0
    );
    Some(OptimizationSuggestion::new(
        Category::ElevatedFailureRate,
        Severity::Critical,
        affected,
        ProposedRewrite::Advice { message },
        description,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_workflow::{Edge, ResolveOptions, WorkflowGraph, resolve};

    struct ByFamily;

    impl NodeClassifier for ByFamily {
        fn is_side_effecting(&self, type_id: &str) -> bool {
            !type_id.starts_with("core.")
        }

        fn is_aggregation(&self, type_id: &str) -> bool {
            type_id == "core.batch"
        }
    }

    fn plan(nodes: Vec<Node>, edges: &[(&str, &str)]) -> ExecutionPlan {
        let edges = edges.iter().map(|(s, t)| Edge::between(*s, *t));
        let graph = WorkflowGraph::from_parts(nodes, edges).expect("graph");
        resolve(&graph, ResolveOptions::live()).expect("resolve")
    }

    fn chain_ids(suggestions: &[OptimizationSuggestion]) -> Vec<Vec<&str>> {
        suggestions
            .iter()
            .map(|s| s.affected_node_ids.iter().map(NodeId::as_str).collect())
            .collect()
    }

    #[test]
    fn trigger_is_not_part_of_chain() {
        let plan = plan(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
                Node::action("D", "core.passthrough"),
                Node::action("E", "core.passthrough"),
            ],
            &[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")],
        );
        let found = serial_chains(&PlanView::new(&plan), &AnalyzerConfig::default());
        assert_eq!(chain_ids(&found), vec![vec!["B", "C", "D", "E"]]);
        assert_eq!(found[0].severity, Severity::Info);
    }

    #[test]
    fn short_chain_is_ignored() {
        let plan = plan(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
                Node::action("D", "core.passthrough"),
            ],
            &[("A", "B"), ("B", "C"), ("C", "D")],
        );
        assert!(serial_chains(&PlanView::new(&plan), &AnalyzerConfig::default()).is_empty());
    }

    #[test]
    fn merge_point_breaks_chain() {
        // B -> C -> D -> E -> F, with X also feeding E.
        let plan = plan(
            vec![
                Node::trigger("A", "manual"),
                Node::action("B", "core.passthrough"),
                Node::action("C", "core.passthrough"),
                Node::action("D", "core.passthrough"),
                Node::action("X", "core.passthrough"),
                Node::action("E", "core.passthrough"),
                Node::action("F", "core.passthrough"),
            ],
            &[
                ("A", "B"),
                ("B", "C"),
                ("C", "D"),
                ("D", "E"),
                ("A", "X"),
                ("X", "E"),
                ("E", "F"),
            ],
        );
        let config = AnalyzerConfig {
            serial_chain_threshold: 2,
            ..AnalyzerConfig::default()
        };
        let found = serial_chains(&PlanView::new(&plan), &config);
        assert_eq!(chain_ids(&found), vec![vec!["B", "C", "D"], vec!["E", "F"]]);
    }

    #[test]
    fn fan_out_above_threshold() {
        let mut nodes = vec![Node::trigger("A", "manual"), Node::action("H", "core.passthrough")];
        let mut edges = vec![("A", "H")];
        let targets = ["T1", "T2", "T3", "T4", "T5", "T6"];
        for target in targets {
            nodes.push(Node::action(target, "core.passthrough"));
            edges.push(("H", target));
        }
        let plan = plan(nodes, &edges);
        let found = fan_out(&PlanView::new(&plan), &AnalyzerConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "high_fan_out:H");
        assert_eq!(found[0].affected_node_ids.len(), 7);
        assert!(!found[0].auto_applicable);

        let raised = AnalyzerConfig {
            fan_out_threshold: 6,
            ..AnalyzerConfig::default()
        };
        assert!(fan_out(&PlanView::new(&plan), &raised).is_empty());
    }

    #[test]
    fn aggregation_resets_unbatched_run() {
        let plan = plan(
            vec![
                Node::trigger("A", "manual"),
                Node::action("S1", "slack.post"),
                Node::action("S2", "slack.post"),
                Node::action("G1", "gmail.send"),
                Node::action("S3", "slack.post"),
                Node::action("AGG", "core.batch"),
                Node::action("S4", "slack.post"),
                Node::action("S5", "slack.post"),
            ],
            &[
                ("A", "S1"),
                ("A", "S2"),
                ("A", "G1"),
                ("A", "S3"),
                ("S1", "AGG"),
                ("S2", "AGG"),
                ("G1", "AGG"),
                ("S3", "AGG"),
                ("AGG", "S4"),
                ("AGG", "S5"),
            ],
        );
        let config = AnalyzerConfig {
            unbatched_call_threshold: 2,
            ..AnalyzerConfig::default()
        };
        let found = unbatched_calls(&PlanView::new(&plan), &ByFamily, &config);
        assert_eq!(chain_ids(&found), vec![vec!["S1", "S2", "S3"]]);
        assert_eq!(
            found[0].proposed_rewrite,
            ProposedRewrite::Batch {
                family: "slack".to_string(),
                members: vec![NodeId::new("S1"), NodeId::new("S2"), NodeId::new("S3")],
            }
        );
    }

    #[test]
    fn call_depending_on_run_through_other_node_starts_new_run() {
        // S1 -> S2 -> G1 -> S3 -> S4: S3 waits on G1, which waits on S2.
        let plan = plan(
            vec![
                Node::trigger("A", "manual"),
                Node::action("S1", "slack.post"),
                Node::action("S2", "slack.post"),
                Node::action("G1", "gmail.send"),
                Node::action("S3", "slack.post"),
                Node::action("S4", "slack.post"),
            ],
            &[("A", "S1"), ("S1", "S2"), ("S2", "G1"), ("G1", "S3"), ("S3", "S4")],
        );
        let config = AnalyzerConfig {
            unbatched_call_threshold: 1,
            ..AnalyzerConfig::default()
        };
        let found = unbatched_calls(&PlanView::new(&plan), &ByFamily, &config);
        assert_eq!(chain_ids(&found), vec![vec!["S1", "S2"], vec!["S3", "S4"]]);
        assert!(found.iter().all(|s| s.auto_applicable));
    }

    #[test]
    fn pure_node_between_calls_splits_run() {
        let plan = plan(
            vec![
                Node::trigger("A", "manual"),
                Node::action("S1", "slack.post"),
                Node::action("X", "core.format"),
                Node::action("Y", "core.format"),
                Node::action("S2", "slack.post"),
                Node::action("S3", "slack.post"),
            ],
            &[("A", "S1"), ("S1", "X"), ("X", "Y"), ("Y", "S2"), ("A", "S3")],
        );
        let config = AnalyzerConfig {
            unbatched_call_threshold: 1,
            ..AnalyzerConfig::default()
        };
        let found = unbatched_calls(&PlanView::new(&plan), &ByFamily, &config);
        // S2 waits on S1 through X and Y; S3 only needs the trigger.
        assert_eq!(chain_ids(&found), vec![vec!["S2", "S3"]]);
    }

    #[test]
    fn failure_rate_threshold_is_exclusive() {
        let mut stats = HistoryStats {
            runs: 20,
            finished: 20,
            failed: 1,
            failure_rate: 0.05,
            ..HistoryStats::default()
        };
        assert!(failure_rate(&stats, &AnalyzerConfig::default()).is_none());

        stats.failed = 2;
        stats.failure_rate = 0.1;
        stats.node_failures.insert(NodeId::new("C"), 2);
        let found = failure_rate(&stats, &AnalyzerConfig::default()).expect("critical");
        assert_eq!(found.severity, Severity::Critical);
        assert_eq!(found.id, "elevated_failure_rate:C");
        assert!(!found.auto_applicable);
    }
}

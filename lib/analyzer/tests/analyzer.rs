//! Analysis and rewrites over whole graphs, including history recorded from
//! real runs through the controller.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use switchyard_analyzer::{
    AnalyzeError, Analyzer, AnalyzerConfig, Category, OptimizationSuggestion, ProposedRewrite,
    RewriteError, RunHistory, Severity,
};
use switchyard_integration::{
    ActionConfig, ActionHandler, ActionRegistry, ActionResult, HandlerError, HandlerInfo, Identity,
};
use switchyard_workflow::{
    Edge, EngineConfig, InMemoryCheckpointStore, InMemoryWorkflowStore, Node, NodeId,
    ResolveError, ResolveOptions, RunController, RunRequest, RunStatus, WorkflowGraph, resolve,
};

fn analyzer() -> Analyzer {
    Analyzer::new(
        Arc::new(ActionRegistry::with_builtins()),
        AnalyzerConfig::default(),
    )
}

fn graph(nodes: Vec<Node>, edges: &[(&str, &str)]) -> WorkflowGraph {
    WorkflowGraph::from_parts(nodes, edges.iter().map(|(s, t)| Edge::between(*s, *t)))
        .expect("graph")
}

/// `A` (trigger) followed by a chain of `(id, type)` actions.
fn chain(actions: &[(&str, &str)]) -> WorkflowGraph {
    let mut nodes = vec![Node::trigger("A", "manual")];
    let mut edges = Vec::new();
    let mut prev = "A";
    for (id, type_id) in actions {
        nodes.push(Node::action(*id, *type_id).with_config_value("channel", json!("#ops")));
        edges.push((prev, *id));
        prev = *id;
    }
    graph(nodes, &edges)
}

fn affected(ids: &[NodeId]) -> Vec<&str> {
    ids.iter().map(NodeId::as_str).collect()
}

#[test]
fn serial_chain_of_four_is_one_suggestion() {
    let graph = chain(&[
        ("B", "core.passthrough"),
        ("C", "core.passthrough"),
        ("D", "core.passthrough"),
        ("E", "core.passthrough"),
    ]);
    let report = analyzer()
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");

    assert_eq!(report.suggestions.len(), 1);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.category, Category::LongSerialChain);
    assert_eq!(affected(&suggestion.affected_node_ids), vec!["B", "C", "D", "E"]);
    assert!(suggestion.auto_applicable);
    assert_eq!(report.score, 98);
}

#[test]
fn parallelized_graph_resolves() {
    let graph = chain(&[
        ("B", "core.passthrough"),
        ("C", "core.passthrough"),
        ("D", "core.passthrough"),
        ("E", "core.passthrough"),
    ]);
    let analyzer = analyzer();
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");
    let rewritten = analyzer
        .apply_by_id(&graph, &report, "long_serial_chain:B")
        .expect("apply");

    let plan = resolve(&rewritten, ResolveOptions::live()).expect("resolve rewritten");
    let order: Vec<&str> = plan.node_ids().into_iter().map(NodeId::as_str).collect();
    assert_eq!(order, vec!["A", "B__split", "B", "C", "D", "E", "E__join"]);

    let again = analyzer
        .analyze(&rewritten, &RunHistory::new())
        .expect("analyze rewritten");
    assert!(again.suggestions.is_empty());
    assert_eq!(again.score, 100);
}

#[tokio::test]
async fn parallelized_members_read_split_input() {
    let graph = chain(&[
        ("B", "core.passthrough"),
        ("C", "core.passthrough"),
        ("D", "core.passthrough"),
        ("E", "core.passthrough"),
    ]);
    let analyzer = analyzer();
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");
    let rewritten = analyzer
        .apply_by_id(&graph, &report, "long_serial_chain:B")
        .expect("apply");

    let controller = RunController::new(
        Arc::new(ActionRegistry::with_builtins()),
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(InMemoryWorkflowStore::new()),
        EngineConfig::default(),
    );
    let result = controller
        .run(RunRequest::inline(rewritten).with_input(json!({"n": 1})))
        .await
        .expect("run");
    assert_eq!(result.status, RunStatus::Completed);

    for id in ["B", "C", "D", "E"] {
        let input = result.record(&NodeId::new(id)).map(|r| r.input.clone());
        assert_eq!(input, Some(json!({"n": 1})), "{id} reads the split input");
    }
    let join_input = result
        .record(&NodeId::new("E__join"))
        .map(|r| r.input.clone())
        .expect("join record");
    let keys: Vec<&str> = join_input
        .as_object()
        .map(|fields| fields.keys().map(String::as_str).collect())
        .unwrap_or_default();
    assert_eq!(keys, vec!["B", "C", "D", "E"]);
}

#[test]
fn analysis_is_deterministic() {
    let mut nodes = vec![Node::trigger("A", "manual"), Node::action("H", "core.passthrough")];
    let mut edges = vec![("A", "H")];
    let fan = ["P1", "P2", "P3", "P4", "P5", "P6"];
    for id in fan {
        nodes.push(Node::action(id, "slack.postMessage"));
        edges.push(("H", id));
    }
    let graph = graph(nodes, &edges);
    let analyzer = analyzer();

    let first = analyzer.analyze(&graph, &RunHistory::new()).expect("first");
    let second = analyzer.analyze(&graph, &RunHistory::new()).expect("second");
    assert_eq!(first, second);

    let ids: Vec<&str> = first.suggestions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["unbatched_calls:P1", "high_fan_out:H"]);
    // Two warnings: 3 * 3 + 3 * 2.
    assert_eq!(first.score, 85);
}

#[test]
fn unbatched_calls_collapse_into_batch_node() {
    let graph = chain(&[
        ("S1", "slack.postMessage"),
        ("S2", "slack.postMessage"),
        ("S3", "slack.postMessage"),
        ("S4", "slack.postMessage"),
    ]);
    let analyzer = analyzer();
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");

    let categories: Vec<Category> = report.suggestions.iter().map(|s| s.category).collect();
    assert_eq!(
        categories,
        vec![Category::UnbatchedCalls, Category::LongSerialChain]
    );
    let batch = &report.suggestions[0];
    assert_eq!(batch.severity, Severity::Warning);
    assert_eq!(
        batch.proposed_rewrite,
        ProposedRewrite::Batch {
            family: "slack".to_string(),
            members: ["S1", "S2", "S3", "S4"].into_iter().map(NodeId::new).collect(),
        }
    );
    assert_eq!(report.score, 89);

    let rewritten = analyzer.apply(&graph, batch).expect("apply");
    let ids: Vec<&str> = rewritten.nodes().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "slack__batch"]);
    assert_eq!(graph.node_count(), 5, "original graph is untouched");

    let after = analyzer
        .analyze(&rewritten, &RunHistory::new())
        .expect("analyze rewritten");
    assert_eq!(after.score, 100);
}

#[test]
fn calls_behind_other_nodes_are_batched_separately() {
    let graph = chain(&[
        ("S1", "slack.postMessage"),
        ("S2", "slack.postMessage"),
        ("G1", "gmail.send"),
        ("S3", "slack.postMessage"),
        ("S4", "slack.postMessage"),
    ]);
    let analyzer = Analyzer::new(
        Arc::new(ActionRegistry::with_builtins()),
        AnalyzerConfig {
            unbatched_call_threshold: 1,
            ..AnalyzerConfig::default()
        },
    );
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");

    let batches: Vec<Vec<&str>> = report
        .suggestions
        .iter()
        .filter(|s| s.category == Category::UnbatchedCalls)
        .map(|s| affected(&s.affected_node_ids))
        .collect();
    assert_eq!(batches, vec![vec!["S1", "S2"], vec!["S3", "S4"]]);

    for id in ["unbatched_calls:S1", "unbatched_calls:S3"] {
        let rewritten = analyzer
            .apply_by_id(&graph, &report, id)
            .unwrap_or_else(|err| panic!("{id}: {err}"));
        resolve(&rewritten, ResolveOptions::live()).expect("rewritten graph resolves");
    }
}

#[test]
fn batch_that_would_create_cycle_is_rejected() {
    let graph = chain(&[
        ("S1", "slack.postMessage"),
        ("X", "core.passthrough"),
        ("S2", "slack.postMessage"),
        ("S3", "slack.postMessage"),
        ("S4", "slack.postMessage"),
    ]);
    let before = serde_json::to_value(&graph).expect("serialize");
    let analyzer = analyzer();
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");
    assert!(
        report
            .suggestions
            .iter()
            .all(|s| s.category != Category::UnbatchedCalls),
        "S2 depends on S1 through X, so no batch spans both"
    );

    // A hand-built batch across X closes a cycle when collapsed.
    let members: Vec<NodeId> = ["S1", "S2", "S3", "S4"].into_iter().map(NodeId::new).collect();
    let forced = OptimizationSuggestion::new(
        Category::UnbatchedCalls,
        Severity::Warning,
        members.clone(),
        ProposedRewrite::Batch {
            family: "slack".to_string(),
            members,
        },
        "forced batch",
    );
    let err = analyzer.apply(&graph, &forced).expect_err("cycle");
    match err {
        RewriteError::RewriteInvalid {
            suggestion_id,
            reason,
        } => {
            assert_eq!(suggestion_id, "unbatched_calls:S1");
            assert!(reason.contains("cycle"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(serde_json::to_value(&graph).expect("serialize"), before);
}

#[test]
fn advice_and_unknown_ids_are_not_applied() {
    let mut nodes = vec![Node::trigger("A", "manual"), Node::action("H", "core.passthrough")];
    let mut edges = vec![("A", "H")];
    for id in ["T1", "T2", "T3", "T4", "T5", "T6"] {
        nodes.push(Node::action(id, "core.passthrough"));
        edges.push(("H", id));
    }
    let graph = graph(nodes, &edges);
    let analyzer = analyzer();
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");

    assert!(matches!(
        analyzer.apply_by_id(&graph, &report, "high_fan_out:H"),
        Err(RewriteError::NotAutoApplicable { suggestion_id }) if suggestion_id == "high_fan_out:H"
    ));
    assert!(matches!(
        analyzer.apply_by_id(&graph, &report, "long_serial_chain:T1"),
        Err(RewriteError::SuggestionNotFound { .. })
    ));
}

#[test]
fn cyclic_graph_cannot_be_analyzed() {
    let graph = graph(
        vec![
            Node::trigger("A", "manual"),
            Node::action("B", "core.passthrough"),
            Node::action("C", "core.passthrough"),
        ],
        &[("A", "B"), ("B", "C"), ("C", "B")],
    );
    let err = analyzer()
        .analyze(&graph, &RunHistory::new())
        .expect_err("cyclic");
    assert_eq!(
        err,
        AnalyzeError::Resolve(ResolveError::GraphCyclic {
            nodes: vec![NodeId::new("B"), NodeId::new("C")],
        })
    );
}

/// Fails every other call.
struct Flaky {
    calls: AtomicUsize,
}

#[async_trait]
impl ActionHandler for Flaky {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure("test.flaky", "Flaky")
    }

    async fn execute(
        &self,
        _config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Ok(ActionResult::failure("upstream timed out"));
        }
        Ok(ActionResult::success(input.clone()))
    }
}

#[tokio::test]
async fn recorded_failures_raise_critical_suggestion() {
    let registry = Arc::new(
        ActionRegistry::with_builtins()
            .with_handler(Arc::new(Flaky {
                calls: AtomicUsize::new(0),
            }))
            .expect("register flaky"),
    );
    let controller = RunController::new(
        Arc::clone(&registry),
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(InMemoryWorkflowStore::new()),
        EngineConfig::default(),
    );
    let graph = chain(&[("B", "test.flaky"), ("C", "core.passthrough")]);

    let mut history = RunHistory::new();
    for _ in 0..4 {
        let result = controller
            .run(RunRequest::inline(graph.clone()))
            .await
            .expect("run");
        history.record(&result);
    }
    let failed = history
        .summaries()
        .filter(|s| s.status == RunStatus::Failed)
        .count();
    assert_eq!(failed, 2);

    let analyzer = Analyzer::new(registry, AnalyzerConfig::default());
    let report = analyzer.analyze(&graph, &history).expect("analyze");
    assert_eq!(report.stats.finished, 4);
    assert_eq!(report.suggestions.len(), 1);

    let critical = &report.suggestions[0];
    assert_eq!(critical.category, Category::ElevatedFailureRate);
    assert_eq!(critical.severity, Severity::Critical);
    assert_eq!(affected(&critical.affected_node_ids), vec!["B"]);
    assert!(!critical.auto_applicable);
    assert_eq!(report.score, 80);
    assert!(matches!(
        analyzer.apply(&graph, critical),
        Err(RewriteError::NotAutoApplicable { .. })
    ));
}

/// Counts every message it would send.
struct CountingSlack {
    sent: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionHandler for CountingSlack {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::side_effecting("slack.postMessage", "Post message")
    }

    async fn execute(
        &self,
        _config: &ActionConfig,
        _identity: &Identity,
        _input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ActionResult::success(json!({"ts": n})))
    }
}

#[tokio::test]
async fn applied_batch_still_sends_every_call() {
    let sent = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(
        ActionRegistry::with_builtins()
            .with_handler(Arc::new(CountingSlack {
                sent: Arc::clone(&sent),
            }))
            .expect("register slack"),
    );
    let controller = RunController::new(
        Arc::clone(&registry),
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(InMemoryWorkflowStore::new()),
        EngineConfig::default(),
    );
    let graph = chain(&[
        ("S1", "slack.postMessage"),
        ("S2", "slack.postMessage"),
        ("S3", "slack.postMessage"),
        ("S4", "slack.postMessage"),
    ]);

    let original = controller
        .run(RunRequest::inline(graph.clone()))
        .await
        .expect("run original");
    assert_eq!(original.status, RunStatus::Completed);
    assert_eq!(sent.load(Ordering::SeqCst), 4);

    let analyzer = Analyzer::new(Arc::clone(&registry), AnalyzerConfig::default());
    let report = analyzer
        .analyze(&graph, &RunHistory::new())
        .expect("analyze");
    let rewritten = analyzer
        .apply_by_id(&graph, &report, "unbatched_calls:S1")
        .expect("apply");

    sent.store(0, Ordering::SeqCst);
    let batched = controller
        .run(RunRequest::inline(rewritten.clone()))
        .await
        .expect("run batched");
    assert_eq!(batched.status, RunStatus::Completed);
    assert_eq!(sent.load(Ordering::SeqCst), 4);
    let output = batched
        .records
        .iter()
        .find(|record| record.node_id.as_str() == "slack__batch")
        .map(|record| record.output.clone())
        .expect("batch output");
    assert_eq!(output["members"], json!(["S1", "S2", "S3", "S4"]));
    assert_eq!(output["items"].as_array().map(Vec::len), Some(4));

    let sandboxed = controller
        .run(RunRequest::inline(rewritten).sandbox())
        .await
        .expect("run sandboxed");
    assert_eq!(sent.load(Ordering::SeqCst), 4, "sandbox sends nothing");
    let intercepted: Vec<&str> = sandboxed
        .intercepted_actions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|action| action.node_id.as_str())
        .collect();
    assert_eq!(intercepted, vec!["S1", "S2", "S3", "S4"]);
}

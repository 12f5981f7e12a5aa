//! Command implementations.

use crate::cli::{AnalyzeArgs, ApplyArgs, CancelArgs, ResumeArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::CliError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use switchyard_analyzer::{Analyzer, RunHistory};
use switchyard_core::Result;
use switchyard_integration::ActionRegistry;
use switchyard_workflow::{
    CheckpointStore, GraphSnapshot, InMemoryCheckpointStore, InMemoryWorkflowStore,
    NatsCheckpointStore, RunController, RunRequest, RunResult, RunStatus, WorkflowGraph,
};
use tracing::{info, warn};

/// Shared state for one invocation.
pub struct Commands {
    config: CliConfig,
    registry: Arc<ActionRegistry>,
}

impl Commands {
    pub fn new(config: CliConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ActionRegistry::with_builtins()),
        }
    }

    async fn controller(&self, durable: bool) -> Result<RunController, CliError> {
        let checkpoints: Arc<dyn CheckpointStore> = match &self.config.nats {
            Some(nats) => {
                let store = NatsCheckpointStore::connect(nats).await.map_err(|e| {
                    CliError::CheckpointStore {
                        details: e.to_string(),
                    }
                })?;
                Arc::new(store)
            }
            None if durable => return Err(CliError::CheckpointStoreRequired.into()),
            None => {
                warn!("no checkpoint store configured; paused runs end with this process");
                Arc::new(InMemoryCheckpointStore::new())
            }
        };
        Ok(RunController::new(
            Arc::clone(&self.registry),
            checkpoints,
            Arc::new(InMemoryWorkflowStore::new()),
            self.config.engine.clone(),
        ))
    }

    fn analyzer(&self) -> Analyzer {
        Analyzer::new(Arc::clone(&self.registry), self.config.analyzer.clone())
    }

    pub async fn run(&self, args: RunArgs) -> Result<(), CliError> {
        let graph = load_graph(&args.graph)?;
        let mut request = RunRequest::inline(graph)
            .with_input(parse_json_arg(args.input.as_deref(), "input")?)
            .skip_triggers(args.skip_triggers);
        if args.sandbox {
            request = request.sandbox();
        }

        let controller = self.controller(false).await?;
        let result = controller.run(request).await.map_err(engine_error)?;
        finish(result, args.history.as_deref())
    }

    pub async fn resume(&self, args: ResumeArgs) -> Result<(), CliError> {
        let payload = parse_json_arg(args.payload.as_deref(), "payload")?;
        let controller = self.controller(true).await?;
        let result = controller
            .resume(args.run_id, payload)
            .await
            .map_err(engine_error)?;
        finish(result, args.history.as_deref())
    }

    pub async fn cancel(&self, args: CancelArgs) -> Result<(), CliError> {
        let controller = self.controller(true).await?;
        let status = controller
            .cancel(args.run_id)
            .await
            .map_err(engine_error)?;
        info!(run_id = %args.run_id, %status, "cancel requested");
        print_json(&serde_json::json!({ "runId": args.run_id, "status": status }))
    }

    pub fn analyze(&self, args: AnalyzeArgs) -> Result<(), CliError> {
        let graph = load_graph(&args.graph)?;
        let history = load_history(args.history.as_deref())?;
        let report = self
            .analyzer()
            .analyze(&graph, &history)
            .map_err(|e| CliError::Analyze {
                details: e.to_string(),
            })?;
        print_json(&report)
    }

    pub fn apply(&self, args: ApplyArgs) -> Result<(), CliError> {
        let graph = load_graph(&args.graph)?;
        let history = load_history(args.history.as_deref())?;
        let analyzer = self.analyzer();
        let report = analyzer
            .analyze(&graph, &history)
            .map_err(|e| CliError::Analyze {
                details: e.to_string(),
            })?;
        let rewritten = analyzer
            .apply_by_id(&graph, &report, &args.suggestion)
            .map_err(|e| CliError::Rewrite {
                details: e.to_string(),
            })?;

        let snapshot = GraphSnapshot::from(&rewritten);
        match args.output {
            Some(path) => {
                write_json(&path, &snapshot)?;
                info!(path = %path.display(), "wrote rewritten graph");
                Ok(())
            }
            None => print_json(&snapshot),
        }
    }
}

/// Prints a run result, records it, and turns a failed run into an error.
fn finish(result: RunResult, history: Option<&Path>) -> Result<(), CliError> {
    print_json(&result)?;
    if let Some(path) = history
        && result.status.is_terminal()
    {
        let mut runs = load_history(Some(path))?;
        runs.record(&result);
        write_json(path, &runs)?;
    }
    if result.status == RunStatus::Failed {
        return Err(CliError::RunFailed {
            run_id: result.run_id.to_string(),
            reason: result.error.unwrap_or_else(|| "unknown error".to_string()),
        }
        .into());
    }
    Ok(())
}

fn engine_error(err: switchyard_workflow::EngineError) -> CliError {
    CliError::Engine {
        details: err.to_string(),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|e| CliError::ReadFile {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    let value = serde_json::from_str(&raw).map_err(|e| CliError::Parse {
        what,
        details: e.to_string(),
    })?;
    Ok(value)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let raw = serde_json::to_string_pretty(value).map_err(|e| CliError::Parse {
        what: "output",
        details: e.to_string(),
    })?;
    std::fs::write(path, raw).map_err(|e| CliError::WriteFile {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let raw = serde_json::to_string_pretty(value).map_err(|e| CliError::Parse {
        what: "output",
        details: e.to_string(),
    })?;
    println!("{raw}");
    Ok(())
}

pub(crate) fn load_graph(path: &Path) -> Result<WorkflowGraph, CliError> {
    let snapshot: GraphSnapshot = read_json(path, "graph")?;
    let graph = snapshot.into_graph().map_err(|e| CliError::Parse {
        what: "graph",
        details: e.to_string(),
    })?;
    Ok(graph)
}

/// Loads a history file; a missing file is an empty history.
pub(crate) fn load_history(path: Option<&Path>) -> Result<RunHistory, CliError> {
    match path {
        Some(path) if path.exists() => read_json(path, "history"),
        _ => Ok(RunHistory::new()),
    }
}

/// Parses an inline JSON argument; absent means `null`.
pub(crate) fn parse_json_arg(raw: Option<&str>, what: &'static str) -> Result<JsonValue, CliError> {
    let Some(raw) = raw else {
        return Ok(JsonValue::Null);
    };
    let value = serde_json::from_str(raw).map_err(|e| CliError::Parse {
        what,
        details: e.to_string(),
    })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_analyzer::AnalyzerConfig;

    fn write(dir: &Path, name: &str, value: &JsonValue) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, value.to_string()).expect("write fixture");
        path
    }

    fn chain_graph() -> JsonValue {
        json!({
            "nodes": [
                {"id": "A", "type": "manual", "isTrigger": true},
                {"id": "B", "type": "core.passthrough"},
                {"id": "C", "type": "core.passthrough"},
                {"id": "D", "type": "core.passthrough"},
                {"id": "E", "type": "core.passthrough"},
                {"id": "add", "type": "addAction"}
            ],
            "edges": [
                {"source": "A", "target": "B"},
                {"source": "B", "target": "C"},
                {"source": "C", "target": "D"},
                {"source": "D", "target": "E"},
                {"source": "E", "target": "add"}
            ]
        })
    }

    #[test]
    fn graph_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(dir.path(), "graph.json", &chain_graph());
        let graph = load_graph(&path).expect("load");
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 5);
    }

    #[test]
    fn malformed_graph_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "{ nodes: ").expect("write fixture");
        let err = load_graph(&path).expect_err("malformed");
        assert!(err.to_string().contains("invalid graph"), "{err}");
    }

    #[test]
    fn missing_history_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = load_history(Some(&dir.path().join("history.json"))).expect("load");
        assert!(history.is_empty());
        assert!(load_history(None).expect("load").is_empty());
    }

    #[test]
    fn json_arguments() {
        assert_eq!(parse_json_arg(None, "input").expect("none"), JsonValue::Null);
        assert_eq!(
            parse_json_arg(Some(r#"{"approved": true}"#), "payload").expect("object"),
            json!({"approved": true})
        );
        assert!(parse_json_arg(Some("{"), "payload").is_err());
    }

    #[test]
    fn apply_writes_rewritten_graph() {
        let dir = tempfile::tempdir().expect("tempdir");
        let graph = write(dir.path(), "graph.json", &chain_graph());
        let output = dir.path().join("rewritten.json");
        let commands = Commands::new(CliConfig::default());

        commands
            .apply(ApplyArgs {
                graph,
                suggestion: "long_serial_chain:B".to_string(),
                history: None,
                output: Some(output.clone()),
            })
            .expect("apply");

        let rewritten = load_graph(&output).expect("reload");
        assert_eq!(rewritten.node_count(), 8);
        assert!(
            rewritten
                .nodes()
                .any(|node| node.type_id == "core.split")
        );
    }

    #[test]
    fn unknown_suggestion_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let graph = write(dir.path(), "graph.json", &chain_graph());
        let commands = Commands::new(CliConfig {
            analyzer: AnalyzerConfig {
                serial_chain_threshold: 10,
                ..AnalyzerConfig::default()
            },
            ..CliConfig::default()
        });

        let err = commands
            .apply(ApplyArgs {
                graph,
                suggestion: "long_serial_chain:B".to_string(),
                history: None,
                output: None,
            })
            .expect_err("no such suggestion");
        assert!(err.to_string().contains("suggestion not found"), "{err}");
    }

    #[tokio::test]
    async fn run_records_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let graph = write(dir.path(), "graph.json", &chain_graph());
        let history = dir.path().join("history.json");
        let commands = Commands::new(CliConfig::default());

        for _ in 0..2 {
            commands
                .run(RunArgs {
                    graph: graph.clone(),
                    input: Some(r#"{"n": 1}"#.to_string()),
                    sandbox: true,
                    skip_triggers: false,
                    history: Some(history.clone()),
                })
                .await
                .expect("run");
        }

        let recorded = load_history(Some(&history)).expect("history");
        assert_eq!(recorded.len(), 2);
        assert!(
            recorded
                .summaries()
                .all(|summary| summary.status == RunStatus::Completed)
        );
    }

    #[tokio::test]
    async fn resume_requires_durable_store() {
        let commands = Commands::new(CliConfig::default());
        let err = commands
            .resume(ResumeArgs {
                run_id: switchyard_core::WorkflowRunId::new(),
                payload: None,
                history: None,
            })
            .await
            .expect_err("no store");
        assert!(err.to_string().contains("no checkpoint store"), "{err}");
    }
}

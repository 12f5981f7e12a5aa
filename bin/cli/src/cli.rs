//! Command line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use switchyard_core::WorkflowRunId;

/// Run, resume and analyze switchyard workflows
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML or JSON); `SWITCHYARD__*` variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a graph file and print the result
    Run(RunArgs),
    /// Resume a paused run from its checkpoint
    Resume(ResumeArgs),
    /// Cancel a paused run and discard its checkpoint
    Cancel(CancelArgs),
    /// Print ranked optimization suggestions for a graph
    Analyze(AnalyzeArgs),
    /// Apply one suggestion and print the rewritten graph
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Graph file in the editor's `{nodes, edges}` shape
    pub graph: PathBuf,

    /// Runtime input as JSON; becomes the trigger output
    #[arg(short, long)]
    pub input: Option<String>,

    /// Intercept side-effecting nodes instead of performing them
    #[arg(long)]
    pub sandbox: bool,

    /// Drop trigger nodes and start from the first actions
    #[arg(long)]
    pub skip_triggers: bool,

    /// Append the finished run to this history file
    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Id of the paused run
    pub run_id: WorkflowRunId,

    /// JSON merged into the paused node's output
    #[arg(short, long)]
    pub payload: Option<String>,

    /// Append the finished run to this history file
    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Id of the paused run
    pub run_id: WorkflowRunId,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Graph file in the editor's `{nodes, edges}` shape
    pub graph: PathBuf,

    /// Run history file; analysis is structural only without it
    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Graph file in the editor's `{nodes, edges}` shape
    pub graph: PathBuf,

    /// Id of the suggestion, as printed by `analyze`
    pub suggestion: String,

    /// Run history file used for the analysis
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Write the rewritten graph here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

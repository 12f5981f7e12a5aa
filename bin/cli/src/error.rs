//! Errors reported by the command line.
//!
//! Library errors are flattened into `details` strings at this layer and the
//! commands return them wrapped in a `rootcause::Report`.

use std::fmt;
use std::path::PathBuf;

/// Errors from CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// A file could not be read.
    ReadFile { path: PathBuf, details: String },
    /// A file could not be written.
    WriteFile { path: PathBuf, details: String },
    /// Input was not in the expected shape.
    Parse { what: &'static str, details: String },
    /// The command needs a durable checkpoint store and none is configured.
    CheckpointStoreRequired,
    /// The checkpoint store could not be reached.
    CheckpointStore { details: String },
    /// The engine rejected the request.
    Engine { details: String },
    /// The run finished in the failed state.
    RunFailed { run_id: String, reason: String },
    /// The graph could not be analyzed.
    Analyze { details: String },
    /// The suggestion could not be applied.
    Rewrite { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::ReadFile { path, details } => {
                write!(f, "failed to read {}: {details}", path.display())
            }
            Self::WriteFile { path, details } => {
                write!(f, "failed to write {}: {details}", path.display())
            }
            Self::Parse { what, details } => write!(f, "invalid {what}: {details}"),
            Self::CheckpointStoreRequired => write!(
                f,
                "no checkpoint store configured; set nats.url in the config file or SWITCHYARD__NATS__URL"
            ),
            Self::CheckpointStore { details } => {
                write!(f, "checkpoint store unavailable: {details}")
            }
            Self::Engine { details } => write!(f, "engine error: {details}"),
            Self::RunFailed { run_id, reason } => write!(f, "run {run_id} failed: {reason}"),
            Self::Analyze { details } => write!(f, "analysis failed: {details}"),
            Self::Rewrite { details } => write!(f, "could not apply suggestion: {details}"),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_path() {
        let err = CliError::ReadFile {
            path: PathBuf::from("/tmp/graph.json"),
            details: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read /tmp/graph.json: No such file or directory"
        );
    }

    #[test]
    fn missing_store_explains_setting() {
        assert!(
            CliError::CheckpointStoreRequired
                .to_string()
                .contains("SWITCHYARD__NATS__URL")
        );
    }
}

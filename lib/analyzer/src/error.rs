//! Error types for the analyzer crate.
//!
//! - `AnalyzeError`: the graph could not be analyzed
//! - `RewriteError`: a suggestion could not be applied; the original graph
//!   is never modified

use std::fmt;
use switchyard_workflow::ResolveError;

/// Errors from analyzing a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeError {
    /// The graph does not resolve, so it has no plan to analyze.
    Resolve(ResolveError),
}

impl fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(err) => write!(f, "cannot analyze graph: {err}"),
        }
    }
}

impl std::error::Error for AnalyzeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolve(err) => Some(err),
        }
    }
}

impl From<ResolveError> for AnalyzeError {
    fn from(err: ResolveError) -> Self {
        Self::Resolve(err)
    }
}

/// Errors from applying a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The rewritten graph failed validation, or the suggestion no longer
    /// matches the graph.
    RewriteInvalid {
        suggestion_id: String,
        reason: String,
    },
    /// The suggestion has no machine-applicable rewrite.
    NotAutoApplicable { suggestion_id: String },
    /// No suggestion with this id exists in the report.
    SuggestionNotFound { suggestion_id: String },
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RewriteInvalid {
                suggestion_id,
                reason,
            } => write!(f, "rewrite for {suggestion_id} is invalid: {reason}"),
            Self::NotAutoApplicable { suggestion_id } => {
                write!(f, "suggestion {suggestion_id} cannot be applied automatically")
            }
            Self::SuggestionNotFound { suggestion_id } => {
                write!(f, "suggestion not found: {suggestion_id}")
            }
        }
    }
}

impl std::error::Error for RewriteError {}

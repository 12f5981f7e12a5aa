//! Bottleneck analysis for switchyard workflows.
//!
//! The analyzer is a read-only pass over a graph and the recent history of its
//! runs. It produces ranked [`OptimizationSuggestion`]s and a health score.
//! Batching and parallelization suggestions can be applied, which returns a
//! rewritten copy of the graph for the caller to persist.

mod classify;
mod config;
mod detect;
mod error;
mod history;
mod rewrite;
mod suggestion;

pub use classify::NodeClassifier;
pub use config::AnalyzerConfig;
pub use error::{AnalyzeError, RewriteError};
pub use history::{HistoryStats, RunHistory, RunRecord};
pub use suggestion::{
    Category, OptimizationSuggestion, ProposedRewrite, Severity, health_score, rank,
};

use detect::PlanView;
use serde::Serialize;
use std::sync::Arc;
use switchyard_integration::ActionRegistry;
use switchyard_workflow::{ResolveOptions, WorkflowGraph, resolve};
use tracing::{debug, info, instrument};

/// Result of analyzing one graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Suggestions, most urgent first.
    pub suggestions: Vec<OptimizationSuggestion>,
    /// Health score in `0..=100`.
    pub score: u32,
    /// History aggregates the report was computed from.
    pub stats: HistoryStats,
}

impl AnalysisReport {
    /// Looks up a suggestion by id.
    #[must_use]
    pub fn suggestion(&self, suggestion_id: &str) -> Option<&OptimizationSuggestion> {
        self.suggestions.iter().find(|s| s.id == suggestion_id)
    }
}

/// Runs detections and applies rewrites.
#[derive(Debug, Clone)]
pub struct Analyzer<C = Arc<ActionRegistry>> {
    classifier: C,
    config: AnalyzerConfig,
    options: ResolveOptions,
}

impl<C: NodeClassifier> Analyzer<C> {
    /// Creates an analyzer that resolves graphs as live runs would.
    pub fn new(classifier: C, config: AnalyzerConfig) -> Self {
        Self {
            classifier,
            config,
            options: ResolveOptions::live(),
        }
    }

    /// Resolves graphs with these options instead, both for analysis and for
    /// re-validating rewrites.
    #[must_use]
    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Thresholds in use.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyzes a graph against its run history.
    ///
    /// Identical inputs give identical suggestions in identical order.
    ///
    /// # Errors
    ///
    /// Returns `AnalyzeError::Resolve` if the graph does not resolve.
    #[instrument(skip_all, fields(nodes = graph.node_count(), runs = history.len()))]
    pub fn analyze(
        &self,
        graph: &WorkflowGraph,
        history: &RunHistory,
    ) -> Result<AnalysisReport, AnalyzeError> {
        let plan = resolve(graph, self.options)?;
        let view = PlanView::new(&plan);
        let stats = history.stats(self.config.history_window);

        let mut suggestions = Vec::new();
        suggestions.extend(detect::failure_rate(&stats, &self.config));
        suggestions.extend(detect::unbatched_calls(&view, &self.classifier, &self.config));
        suggestions.extend(detect::serial_chains(&view, &self.config));
        suggestions.extend(detect::fan_out(&view, &self.config));
        rank(&mut suggestions, |node| graph.declaration_index(node));

        let score = health_score(&suggestions);
        for suggestion in &suggestions {
            debug!(id = %suggestion.id, severity = ?suggestion.severity, "suggestion");
        }
        info!(suggestions = suggestions.len(), score, "analyzed graph");

        Ok(AnalysisReport {
            suggestions,
            score,
            stats,
        })
    }

    /// Applies a suggestion to a copy of `graph`.
    ///
    /// The rewritten graph must resolve; `graph` itself is never modified.
    ///
    /// # Errors
    ///
    /// - `NotAutoApplicable` for advice-only suggestions
    /// - `RewriteInvalid` if the suggestion no longer matches the graph or
    ///   the rewritten graph does not resolve
    #[instrument(skip_all, fields(suggestion = %suggestion.id))]
    pub fn apply(
        &self,
        graph: &WorkflowGraph,
        suggestion: &OptimizationSuggestion,
    ) -> Result<WorkflowGraph, RewriteError> {
        let invalid = |reason: String| RewriteError::RewriteInvalid {
            suggestion_id: suggestion.id.clone(),
            reason,
        };

        let rewritten = match &suggestion.proposed_rewrite {
            ProposedRewrite::Parallelize { chain } => rewrite::parallelize(graph, chain),
            ProposedRewrite::Batch { family, members } => rewrite::batch(graph, family, members),
            ProposedRewrite::Advice { .. } => {
                return Err(RewriteError::NotAutoApplicable {
                    suggestion_id: suggestion.id.clone(),
                });
            }
        }
        .map_err(invalid)?;

        if let Err(err) = resolve(&rewritten, self.options) {
            tracing::warn!(error = %err, "rewritten graph does not resolve");
            return Err(invalid(err.to_string()));
        }

        info!(
            nodes = rewritten.node_count(),
            edges = rewritten.edge_count(),
            "applied suggestion"
        );
        Ok(rewritten)
    }

    /// Applies the suggestion with this id from `report`.
    ///
    /// # Errors
    ///
    /// `SuggestionNotFound` if the report has no such suggestion, otherwise
    /// as [`Analyzer::apply`].
    pub fn apply_by_id(
        &self,
        graph: &WorkflowGraph,
        report: &AnalysisReport,
        suggestion_id: &str,
    ) -> Result<WorkflowGraph, RewriteError> {
        let suggestion =
            report
                .suggestion(suggestion_id)
                .ok_or_else(|| RewriteError::SuggestionNotFound {
                    suggestion_id: suggestion_id.to_string(),
                })?;
        self.apply(graph, suggestion)
    }
}

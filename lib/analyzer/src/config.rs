//! Analyzer thresholds.

use serde::Deserialize;

/// Detection thresholds for the bottleneck analyzer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyzerConfig {
    /// Minimum number of strictly sequential action nodes reported as a
    /// long serial chain.
    #[serde(default = "default_serial_chain_threshold")]
    pub serial_chain_threshold: usize,

    /// A node with more direct successors than this is a fan-out hotspot.
    #[serde(default = "default_fan_out_threshold")]
    pub fan_out_threshold: usize,

    /// More same-family side-effecting calls than this, with no aggregation
    /// node between them, are reported as unbatched.
    #[serde(default = "default_unbatched_call_threshold")]
    pub unbatched_call_threshold: usize,

    /// Failed runs over finished runs above this ratio is critical.
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,

    /// Number of most recent runs considered.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_serial_chain_threshold() -> usize {
    4
}

fn default_fan_out_threshold() -> usize {
    5
}

fn default_unbatched_call_threshold() -> usize {
    3
}

fn default_failure_rate_threshold() -> f64 {
    0.05
}

fn default_history_window() -> usize {
    50
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            serial_chain_threshold: default_serial_chain_threshold(),
            fan_out_threshold: default_fan_out_threshold(),
            unbatched_call_threshold: default_unbatched_call_threshold(),
            failure_rate_threshold: default_failure_rate_threshold(),
            history_window: default_history_window(),
        }
    }
}

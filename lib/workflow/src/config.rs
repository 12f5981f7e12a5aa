//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

/// Timeouts and retention applied by the run controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on a single node dispatch, in milliseconds.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// How long a listening run waits for its trigger event, in milliseconds.
    #[serde(default = "default_listen_timeout_ms")]
    pub listen_timeout_ms: u64,

    /// Finished runs the controller keeps for `status`, `cancel` and
    /// `summaries`. Older finished runs are forgotten first.
    #[serde(default = "default_retained_runs")]
    pub retained_runs: usize,
}

fn default_node_timeout_ms() -> u64 {
    30_000
}

fn default_listen_timeout_ms() -> u64 {
    300_000
}

fn default_retained_runs() -> usize {
    1_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: default_node_timeout_ms(),
            listen_timeout_ms: default_listen_timeout_ms(),
            retained_runs: default_retained_runs(),
        }
    }
}

impl EngineConfig {
    /// Per-node dispatch timeout.
    #[must_use]
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    /// Trigger listen timeout.
    #[must_use]
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }
}

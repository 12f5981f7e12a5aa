//! CLI configuration.
//!
//! Composed from the library configs and loaded via the `config` crate from
//! an optional file plus `SWITCHYARD__*` environment variables, e.g.
//! `SWITCHYARD__ENGINE__NODE_TIMEOUT_MS=5000` or `SWITCHYARD__NATS__URL`.

use serde::Deserialize;
use std::path::Path;
use switchyard_analyzer::AnalyzerConfig;
use switchyard_workflow::{EngineConfig, NatsConfig};

/// Configuration for every command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    /// Engine timeouts.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Analyzer thresholds.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Durable checkpoint store. Without it, paused runs only live as long
    /// as the process.
    #[serde(default)]
    pub nats: Option<NatsConfig>,
}

impl CliConfig {
    /// Loads configuration from `path` (if given) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`CliConfig::load`], reading variables from `env` instead of the
    /// process environment when given.
    fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("SWITCHYARD")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

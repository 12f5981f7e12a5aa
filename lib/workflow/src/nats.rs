//! NATS JetStream key-value checkpoint storage.
//!
//! Each paused run is one key (`run_<ulid>`) in a KV bucket, holding the
//! JSON-encoded [`Envelope<Checkpoint>`]. The bucket keeps only the latest
//! revision per key.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::envelope::Envelope;
use crate::error::CheckpointError;
use async_nats::jetstream;
use async_nats::jetstream::kv;
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use switchyard_core::WorkflowRunId;
use tracing::{debug, instrument, warn};

/// Default KV bucket for checkpoints.
const CHECKPOINT_BUCKET_NAME: &str = "switchyard-checkpoints";

/// Configuration for the NATS checkpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// KV bucket name (defaults to `switchyard-checkpoints`).
    #[serde(default)]
    pub bucket: Option<String>,
}

impl NatsConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bucket: None,
        }
    }

    /// Overrides the bucket name.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or(CHECKPOINT_BUCKET_NAME)
    }
}

/// NATS JetStream KV-backed checkpoint store.
pub struct NatsCheckpointStore {
    store: kv::Store,
}

impl NatsCheckpointStore {
    /// Connects to NATS and opens (or creates) the checkpoint bucket.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the connection or bucket setup fails.
    pub async fn connect(config: &NatsConfig) -> Result<Self, CheckpointError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            CheckpointError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;
        let jetstream = jetstream::new(client);

        let store = match jetstream.get_key_value(config.bucket()).await {
            Ok(store) => store,
            Err(_) => jetstream
                .create_key_value(kv::Config {
                    bucket: config.bucket().to_string(),
                    history: 1,
                    ..Default::default()
                })
                .await
                .map_err(|e| CheckpointError::ConnectionFailed {
                    message: format!("failed to create checkpoint bucket: {e}"),
                })?,
        };
        debug!(bucket = config.bucket(), "checkpoint bucket ready");

        Ok(Self { store })
    }

    /// Returns the key for a run's checkpoint.
    fn key(run_id: WorkflowRunId) -> String {
        run_id.to_string()
    }
}

#[async_trait]
impl CheckpointStore for NatsCheckpointStore {
    #[instrument(skip(self, checkpoint), fields(run_id = %checkpoint.payload.run_id))]
    async fn save(&self, checkpoint: Envelope<Checkpoint>) -> Result<(), CheckpointError> {
        let bytes = checkpoint.to_json_bytes()?;
        self.store
            .put(Self::key(checkpoint.payload.run_id), bytes.into())
            .await
            .map_err(|e| CheckpointError::StorageFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(
        &self,
        run_id: WorkflowRunId,
    ) -> Result<Option<Envelope<Checkpoint>>, CheckpointError> {
        let entry = self
            .store
            .get(Self::key(run_id))
            .await
            .map_err(|e| CheckpointError::StorageFailed {
                message: e.to_string(),
            })?;
        entry
            .map(|bytes| Envelope::from_json_bytes(&bytes))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn delete(&self, run_id: WorkflowRunId) -> Result<(), CheckpointError> {
        self.store
            .purge(Self::key(run_id))
            .await
            .map_err(|e| CheckpointError::StorageFailed {
                message: e.to_string(),
            })
    }

    async fn list(&self) -> Result<Vec<WorkflowRunId>, CheckpointError> {
        let keys: Vec<String> = self
            .store
            .keys()
            .await
            .map_err(|e| CheckpointError::StorageFailed {
                message: e.to_string(),
            })?
            .try_collect()
            .await
            .map_err(|e| CheckpointError::StorageFailed {
                message: e.to_string(),
            })?;

        let mut ids: Vec<WorkflowRunId> = keys
            .iter()
            .filter_map(|key| match key.parse() {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(%key, error = %err, "ignoring foreign key in checkpoint bucket");
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

//! Built-in handlers available in every registry.
//!
//! The `core.*` handlers are pure and always execute, including in sandbox
//! mode. `http.webhook` is the one built-in with external side effects.
//! `core.batch` is pure itself; the calls it carries are performed by the
//! dispatcher, each with its own effect kind.

use crate::error::HandlerError;
use crate::handler::{ActionConfig, ActionHandler, ActionResult, HandlerInfo, Identity};
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::debug;

/// Returns one instance of every built-in handler.
#[must_use]
pub fn all() -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(PassthroughHandler),
        Arc::new(ConditionHandler),
        Arc::new(ApprovalHandler),
        Arc::new(SplitHandler),
        Arc::new(JoinHandler),
        Arc::new(BatchHandler),
        Arc::new(WebhookHandler::new()),
    ]
}

fn required_str<'a>(
    config: &'a ActionConfig,
    key: &str,
    type_id: &str,
) -> Result<&'a str, HandlerError> {
    config
        .get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| HandlerError::InvalidConfig {
            type_id: type_id.to_string(),
            reason: format!("missing string field '{key}'"),
        })
}

/// `core.passthrough`: forwards its input, overlaying `config.values` when
/// both are objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHandler;

#[async_trait]
impl ActionHandler for PassthroughHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure("core.passthrough", "Passthrough")
    }

    async fn execute(
        &self,
        config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        let mut output = input.clone();
        if let (JsonValue::Object(out), Some(JsonValue::Object(values))) =
            (&mut output, config.get("values"))
        {
            for (key, value) in values {
                out.insert(key.clone(), value.clone());
            }
        }
        Ok(ActionResult::success(output))
    }
}

/// `core.condition`: compares `input[config.field]` against `config.equals`.
///
/// Without `equals`, the result is the truthiness of the field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionHandler;

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

#[async_trait]
impl ActionHandler for ConditionHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure("core.condition", "Condition")
    }

    async fn execute(
        &self,
        config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        let field = required_str(config, "field", "core.condition")?;
        let value = input.get(field).cloned().unwrap_or(JsonValue::Null);
        let result = match config.get("equals") {
            Some(expected) => &value == expected,
            None => truthy(&value),
        };
        Ok(ActionResult::success(json!({
            "result": result,
            "field": field,
            "value": value,
        })))
    }
}

/// `core.approval`: pauses the run until a human responds.
///
/// The resume payload is merged into `{"awaiting": "approval", "message": ..}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalHandler;

#[async_trait]
impl ActionHandler for ApprovalHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure("core.approval", "Human approval")
    }

    async fn execute(
        &self,
        config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        let message = config
            .get("message")
            .cloned()
            .unwrap_or_else(|| json!("approval required"));
        Ok(ActionResult::paused(json!({
            "awaiting": "approval",
            "message": message,
            "input": input,
        })))
    }
}

/// `core.split`: marks the start of a parallelizable section.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitHandler;

#[async_trait]
impl ActionHandler for SplitHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure("core.split", "Split")
    }

    async fn execute(
        &self,
        _config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        Ok(ActionResult::success(input.clone()))
    }
}

/// `core.join`: gathers the outputs of a parallelizable section.
///
/// Its input is already the predecessor outputs keyed by node id.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinHandler;

#[async_trait]
impl ActionHandler for JoinHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure("core.join", "Join").aggregating()
    }

    async fn execute(
        &self,
        _config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        Ok(ActionResult::success(input.clone()))
    }
}

/// Type identifier of the batch aggregation node.
pub const BATCH_TYPE_ID: &str = "core.batch";

/// One call carried by a `core.batch` node.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedCall {
    /// Id of the node the call came from.
    pub id: String,
    /// Handler type of the call.
    pub type_id: String,
    /// The call's own configuration.
    pub config: ActionConfig,
}

/// `core.batch`: one node standing for several same-family calls.
///
/// `config.calls` holds `{id, type, config}` for every call the batch
/// performs. The dispatcher performs the calls in order, then hands their
/// outputs to this handler as a JSON array, which it labels with
/// `config.members` and `config.family`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchHandler;

impl BatchHandler {
    /// Reads the calls a batch node carries.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config.calls` is missing, an entry lacks an
    /// `id` or `type`, or an entry is itself a batch.
    pub fn calls(config: &ActionConfig) -> Result<Vec<BatchedCall>, HandlerError> {
        let invalid = |reason: String| HandlerError::InvalidConfig {
            type_id: BATCH_TYPE_ID.to_string(),
            reason,
        };
        let Some(JsonValue::Array(entries)) = config.get("calls") else {
            return Err(invalid("missing array field 'calls'".to_string()));
        };
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let field = |key: &str| {
                    entry
                        .get(key)
                        .and_then(JsonValue::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| invalid(format!("calls[{index}] has no string '{key}'")))
                };
                let id = field("id")?;
                let type_id = field("type")?;
                if type_id == BATCH_TYPE_ID {
                    return Err(invalid(format!("calls[{index}] is itself a batch")));
                }
                let config = match entry.get("config") {
                    Some(JsonValue::Object(config)) => config.clone(),
                    None | Some(JsonValue::Null) => ActionConfig::new(),
                    Some(_) => {
                        return Err(invalid(format!("calls[{index}].config is not an object")));
                    }
                };
                Ok(BatchedCall {
                    id,
                    type_id,
                    config,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ActionHandler for BatchHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::pure(BATCH_TYPE_ID, "Batch").aggregating()
    }

    async fn execute(
        &self,
        config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        let calls = Self::calls(config)?;
        let Some(items) = input.as_array().filter(|items| items.len() == calls.len()) else {
            return Err(HandlerError::InvalidInput {
                type_id: BATCH_TYPE_ID.to_string(),
                reason: format!("expected the outputs of {} batched calls", calls.len()),
            });
        };
        let members: Vec<&str> = calls.iter().map(|call| call.id.as_str()).collect();
        Ok(ActionResult::success(json!({
            "family": config.get("family").cloned().unwrap_or(JsonValue::Null),
            "members": members,
            "items": items,
        })))
    }
}

/// `http.webhook`: POSTs a JSON body to `config.url`.
///
/// The body is `config.body` when present, otherwise the node input.
#[derive(Debug, Clone, Default)]
pub struct WebhookHandler {
    client: reqwest::Client,
}

impl WebhookHandler {
    /// Creates a webhook handler with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a webhook handler using the given client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for WebhookHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo::side_effecting("http.webhook", "Webhook")
    }

    async fn execute(
        &self,
        config: &ActionConfig,
        _identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError> {
        let url = required_str(config, "url", "http.webhook")?;
        let body = config.get("body").unwrap_or(input);

        debug!(url, "posting webhook");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| HandlerError::RequestFailed {
                type_id: "http.webhook".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ActionResult::failure(format!(
                "webhook returned HTTP {}",
                status.as_u16()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| HandlerError::RequestFailed {
                type_id: "http.webhook".to_string(),
                reason: e.to_string(),
            })?;
        let payload = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
        Ok(ActionResult::success(json!({
            "status": status.as_u16(),
            "body": payload,
        })))
    }
}

//! Action handler contract and related types.
//!
//! Every node type the engine can execute is backed by an [`ActionHandler`].
//! Handlers receive the node's configuration, the identity the run executes
//! on behalf of, and the node's resolved runtime input.

use crate::error::HandlerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use switchyard_core::UserId;

/// Opaque key-value configuration attached to a node.
pub type ActionConfig = Map<String, JsonValue>;

/// Config keys consulted, in order, when naming where a side effect goes.
const DESTINATION_KEYS: [&str; 4] = ["to", "channel", "url", "destination"];

/// The identity a run executes on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// The user who owns the run, if any.
    pub user_id: Option<UserId>,
}

impl Identity {
    /// An identity bound to a user.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// An identity with no user attached (system or CLI runs).
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Whether a handler reaches outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Computes its output from config and input only. Always executes, even
    /// in sandbox mode.
    Pure,
    /// Sends, writes or posts to an external system. Intercepted in sandbox
    /// mode.
    SideEffecting,
}

/// Static description of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInfo {
    /// Node type identifier, e.g. `slack.postMessage`.
    pub type_id: String,
    /// Human-readable name.
    pub name: String,
    /// Capability family used to group calls (e.g. `slack`).
    pub family: String,
    /// Whether execution has external side effects.
    pub effect: EffectKind,
    /// Whether this node collects the outputs of several calls into one.
    pub aggregates: bool,
}

impl HandlerInfo {
    /// Creates info for a pure handler, deriving the family from the type id.
    #[must_use]
    pub fn pure(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        let type_id = type_id.into();
        Self {
            family: family_of(&type_id).to_string(),
            type_id,
            name: name.into(),
            effect: EffectKind::Pure,
            aggregates: false,
        }
    }

    /// Creates info for a side-effecting handler.
    #[must_use]
    pub fn side_effecting(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            effect: EffectKind::SideEffecting,
            ..Self::pure(type_id, name)
        }
    }

    /// Marks the handler as an aggregation point.
    #[must_use]
    pub fn aggregating(mut self) -> Self {
        self.aggregates = true;
        self
    }
}

/// Returns the capability family of a type identifier: the segment before
/// the first `.`, or the whole identifier if there is none.
#[must_use]
pub fn family_of(type_id: &str) -> &str {
    type_id.split_once('.').map_or(type_id, |(family, _)| family)
}

/// Status a handler can report besides plain success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The node is waiting for external input before it can complete.
    Paused,
}

/// The result of executing a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the handler succeeded.
    pub success: bool,
    /// Output data, threaded into dependents' input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    /// Error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the handler asks the run to pause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

impl ActionResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(output: JsonValue) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            status: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            status: None,
        }
    }

    /// Creates a result that suspends the run until it is resumed.
    ///
    /// `output` is the partial output the node has produced so far; a resume
    /// payload is merged into it.
    #[must_use]
    pub fn paused(output: JsonValue) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            status: Some(ActionStatus::Paused),
        }
    }

    /// Returns true if the handler asked the run to pause.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.status == Some(ActionStatus::Paused)
    }
}

/// Trait implemented by every node type the engine can dispatch.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Returns the static description of this handler.
    fn info(&self) -> HandlerInfo;

    /// Executes the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler could not run at all. A handler that
    /// ran but failed reports it through [`ActionResult::failure`] instead.
    async fn execute(
        &self,
        config: &ActionConfig,
        identity: &Identity,
        input: &JsonValue,
    ) -> Result<ActionResult, HandlerError>;

    /// Returns true if this handler has external side effects.
    fn is_side_effecting(&self) -> bool {
        self.info().effect == EffectKind::SideEffecting
    }

    /// Names where a side effect would be delivered.
    fn destination(&self, config: &ActionConfig) -> String {
        DESTINATION_KEYS
            .iter()
            .find_map(|key| config.get(*key).and_then(JsonValue::as_str))
            .map_or_else(|| self.info().family, str::to_string)
    }

    /// Best-effort output standing in for a call that was not performed.
    fn preview(&self, config: &ActionConfig, input: &JsonValue) -> JsonValue {
        json!({
            "sandbox": true,
            "type": self.info().type_id,
            "destination": self.destination(config),
            "input": input,
        })
    }
}

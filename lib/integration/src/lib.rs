//! Action handler framework for switchyard.
//!
//! This crate provides:
//!
//! - **Handler contract**: `(config, identity, input) -> ActionResult`
//! - **Action registry**: closed lookup table keyed by node type identifier
//! - **Built-in handlers**: pure `core.*` helpers and the `http.webhook` action

pub mod builtin;
pub mod error;
pub mod handler;
pub mod registry;

pub use builtin::{BATCH_TYPE_ID, BatchHandler, BatchedCall};
pub use error::{HandlerError, RegistryError};
pub use handler::{
    ActionConfig, ActionHandler, ActionResult, ActionStatus, EffectKind, HandlerInfo, Identity,
    family_of,
};
pub use registry::ActionRegistry;

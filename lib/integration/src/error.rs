//! Error types for the integration crate.
//!
//! - `HandlerError`: a handler could not produce an [`ActionResult`](crate::ActionResult)
//! - `RegistryError`: registry construction and lookup failures

use std::fmt;

/// Errors raised by an action handler while executing a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The node configuration is missing a field or has the wrong shape.
    InvalidConfig { type_id: String, reason: String },
    /// The runtime input could not be used by the handler.
    InvalidInput { type_id: String, reason: String },
    /// The external capability rejected or failed the call.
    RequestFailed { type_id: String, reason: String },
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { type_id, reason } => {
                write!(f, "invalid config for '{type_id}': {reason}")
            }
            Self::InvalidInput { type_id, reason } => {
                write!(f, "invalid input for '{type_id}': {reason}")
            }
            Self::RequestFailed { type_id, reason } => {
                write!(f, "'{type_id}' request failed: {reason}")
            }
        }
    }
}

impl std::error::Error for HandlerError {}

/// Errors from the action registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler for this type identifier is already registered.
    DuplicateType { type_id: String },
    /// No handler is registered for this type identifier.
    UnknownType { type_id: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateType { type_id } => {
                write!(f, "handler already registered for type '{type_id}'")
            }
            Self::UnknownType { type_id } => {
                write!(f, "no handler registered for type '{type_id}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

//! Registry mapping node type identifiers to handlers.
//!
//! The registry is built once at startup and shared read-only across runs.

use crate::builtin;
use crate::error::RegistryError;
use crate::handler::{ActionHandler, HandlerInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// Closed lookup table of action handlers, keyed by type identifier.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("types", &self.type_ids())
            .finish()
    }
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `core.*` and `http.*` handlers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for handler in builtin::all() {
            let type_id = handler.info().type_id;
            registry.handlers.insert(type_id, handler);
        }
        registry
    }

    /// Registers a handler under the type identifier from its info.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateType` if a handler is already registered for it.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) -> Result<(), RegistryError> {
        let type_id = handler.info().type_id;
        if self.handlers.contains_key(&type_id) {
            return Err(RegistryError::DuplicateType { type_id });
        }
        self.handlers.insert(type_id, handler);
        Ok(())
    }

    /// Registers a handler, consuming and returning the registry.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateType` if a handler is already registered for it.
    pub fn with_handler(mut self, handler: Arc<dyn ActionHandler>) -> Result<Self, RegistryError> {
        self.register(handler)?;
        Ok(self)
    }

    /// Looks up the handler for a type identifier.
    #[must_use]
    pub fn get(&self, type_id: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(type_id).cloned()
    }

    /// Looks up the handler for a type identifier.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if nothing is registered for it.
    pub fn resolve(&self, type_id: &str) -> Result<Arc<dyn ActionHandler>, RegistryError> {
        self.get(type_id).ok_or_else(|| RegistryError::UnknownType {
            type_id: type_id.to_string(),
        })
    }

    /// Returns the info of the handler registered for a type, if any.
    #[must_use]
    pub fn info(&self, type_id: &str) -> Option<HandlerInfo> {
        self.handlers.get(type_id).map(|handler| handler.info())
    }

    /// Returns true if a handler is registered for the type identifier.
    #[must_use]
    pub fn contains(&self, type_id: &str) -> bool {
        self.handlers.contains_key(type_id)
    }

    /// Returns all registered type identifiers, sorted.
    #[must_use]
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::PassthroughHandler;

    #[test]
    fn builtins_are_registered() {
        let registry = ActionRegistry::with_builtins();
        for type_id in [
            "core.passthrough",
            "core.condition",
            "core.approval",
            "core.split",
            "core.join",
            "core.batch",
            "http.webhook",
        ] {
            assert!(registry.contains(type_id), "missing {type_id}");
        }
        assert!(registry.get("slack.postMessage").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ActionRegistry::new();
        registry
            .register(Arc::new(PassthroughHandler))
            .expect("first registration");

        let err = registry
            .register(Arc::new(PassthroughHandler))
            .expect_err("duplicate");
        assert_eq!(
            err,
            RegistryError::DuplicateType {
                type_id: "core.passthrough".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_unknown_type() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());
        let err = registry.resolve("gmail.send").err().expect("unknown");
        assert!(matches!(err, RegistryError::UnknownType { .. }));
    }

    #[test]
    fn type_ids_are_sorted() {
        let registry = ActionRegistry::with_builtins();
        let ids = registry.type_ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}

//! Node classification for detections.

use std::sync::Arc;
use switchyard_integration::{ActionRegistry, EffectKind, family_of};

/// Answers the questions detections ask about a node type.
pub trait NodeClassifier {
    /// Capability family used to group calls.
    fn family(&self, type_id: &str) -> String {
        family_of(type_id).to_string()
    }

    /// Whether executing the type reaches outside the process.
    fn is_side_effecting(&self, type_id: &str) -> bool;

    /// Whether the type collects several calls into one.
    fn is_aggregation(&self, type_id: &str) -> bool;
}

/// Classifies by the handler registered for each type.
///
/// Unregistered types outside the `core` family are treated as external
/// capabilities, so they count as side-effecting.
impl NodeClassifier for ActionRegistry {
    fn family(&self, type_id: &str) -> String {
        self.info(type_id)
            .map_or_else(|| family_of(type_id).to_string(), |info| info.family)
    }

    fn is_side_effecting(&self, type_id: &str) -> bool {
        match self.info(type_id) {
            Some(info) => info.effect == EffectKind::SideEffecting,
            None => family_of(type_id) != "core",
        }
    }

    fn is_aggregation(&self, type_id: &str) -> bool {
        self.info(type_id).is_some_and(|info| info.aggregates)
    }
}

impl<T: NodeClassifier + ?Sized> NodeClassifier for Arc<T> {
    fn family(&self, type_id: &str) -> String {
        (**self).family(type_id)
    }

    fn is_side_effecting(&self, type_id: &str) -> bool {
        (**self).is_side_effecting(type_id)
    }

    fn is_aggregation(&self, type_id: &str) -> bool {
        (**self).is_aggregation(type_id)
    }
}

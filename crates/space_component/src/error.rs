//! Component-level error types.

use crate::component::TypeKey;
use crate::entity::EntityId;

/// Errors raised while editing the component set of a single entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    /// The entity (or bundle, or query) already names this component type.
    ///
    /// `entity` is `None` when the conflict is inside a bundle or query that
    /// does not belong to an entity yet.
    #[error("duplicate component type {component}{}", on_entity(.entity))]
    DuplicateComponentType {
        /// The entity whose component set was being edited.
        entity: Option<EntityId>,
        /// The conflicting component type.
        component: TypeKey,
    },

    /// The entity has no component of this type.
    #[error("component {component} not found on entity {entity}")]
    ComponentNotFound {
        /// The entity that was searched.
        entity: EntityId,
        /// The missing component type.
        component: TypeKey,
    },

    /// A stored value did not downcast to the type its key promised.
    #[error("stored value is not a {expected}")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: TypeKey,
    },
}

impl ComponentError {
    /// Returns `true` for absent-key failures.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::ComponentNotFound { .. } | Self::TypeMismatch { .. }
        )
    }

    /// Returns `true` for duplicate-key conflicts.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateComponentType { .. })
    }
}

fn on_entity(entity: &Option<EntityId>) -> String {
    match entity {
        Some(id) => format!(" on entity {id}"),
        None => String::new(),
    }
}

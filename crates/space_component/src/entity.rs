//! Entity identities and the detached [`Entity`] container.
//!
//! An [`EntityId`] is a random 128-bit identifier generated when the entity
//! is constructed, so an entity has a stable identity before it is ever
//! registered with a manager. Cross-entity references are stored as ids,
//! never as references to the other entity.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bundle::Bundle;
use crate::component::{Component, TypeKey};
use crate::error::ComponentError;
use crate::type_map::TypeMap;

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from a raw 128-bit value.
    #[must_use]
    pub const fn from_u128(raw: u128) -> Self {
        Self(Uuid::from_u128(raw))
    }

    /// Returns the raw 128-bit value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0.as_u128()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// An identity plus the set of components it owns, at most one per type.
///
/// Components are kept in the order they were added, which is also the
/// order structural events report them in.
///
/// A detached entity is an ordinary container: editing it raises no events.
/// Once an entity is handed to an entity manager it is only reachable through
/// shared references, and structural edits go through the manager so its
/// type index stays in step.
pub struct Entity {
    id: EntityId,
    pub(crate) components: TypeMap,
}

impl Entity {
    /// Creates an empty entity with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(EntityId::new())
    }

    /// Creates an empty entity with the given id.
    #[must_use]
    pub fn with_id(id: EntityId) -> Self {
        Self {
            id,
            components: TypeMap::new(),
        }
    }

    /// Creates an entity with a fresh id from a bundle of components.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DuplicateComponentType`] if two values in
    /// the bundle share a type. Nothing is constructed in that case.
    pub fn from_bundle<B: Bundle>(bundle: B) -> Result<Self, ComponentError> {
        let mut entity = Self::new();
        for (key, value) in bundle.into_values()? {
            entity.components.insert(key, value);
        }
        Ok(entity)
    }

    /// Returns this entity's id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Adds a component.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DuplicateComponentType`] if a component of
    /// the same type is already present; the entity is left unchanged.
    pub fn insert<C: Component>(&mut self, component: C) -> Result<(), ComponentError> {
        self.insert_boxed(TypeKey::of::<C>(), Box::new(component))
    }

    /// Type-erased form of [`Entity::insert`].
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DuplicateComponentType`] if `key` is already
    /// present, or [`ComponentError::TypeMismatch`] if `value` is not a
    /// `key`.
    pub fn insert_boxed(&mut self, key: TypeKey, value: Box<dyn Any>) -> Result<(), ComponentError> {
        if !key.matches(value.as_ref()) {
            return Err(ComponentError::TypeMismatch { expected: key });
        }
        if self.components.contains_key(key) {
            return Err(ComponentError::DuplicateComponentType {
                entity: Some(self.id),
                component: key,
            });
        }
        self.components.insert(key, value);
        Ok(())
    }

    /// Removes and returns the component of type `C`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ComponentNotFound`] if there is none.
    pub fn remove<C: Component>(&mut self) -> Result<C, ComponentError> {
        let key = TypeKey::of::<C>();
        let value = self.remove_boxed(key)?;
        value
            .downcast::<C>()
            .map(|boxed| *boxed)
            .map_err(|_| ComponentError::TypeMismatch { expected: key })
    }

    /// Type-erased form of [`Entity::remove`].
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ComponentNotFound`] if `key` is absent.
    pub fn remove_boxed(&mut self, key: TypeKey) -> Result<Box<dyn Any>, ComponentError> {
        self.components
            .remove(key)
            .ok_or(ComponentError::ComponentNotFound {
                entity: self.id,
                component: key,
            })
    }

    /// Stores `component`, returning the previous component of the same type
    /// if there was one.
    pub fn replace<C: Component>(&mut self, component: C) -> Option<C> {
        self.components
            .insert(TypeKey::of::<C>(), Box::new(component))
            .and_then(|old| old.downcast::<C>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns the component of type `C`, if present.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components
            .get(TypeKey::of::<C>())
            .and_then(|value| value.downcast_ref::<C>())
    }

    /// Returns the component of type `C` mutably, if present.
    #[must_use]
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components
            .get_mut(TypeKey::of::<C>())
            .and_then(|value| value.downcast_mut::<C>())
    }

    /// Returns `true` if the entity has a component of type `C`.
    #[must_use]
    pub fn contains<C: Component>(&self) -> bool {
        self.contains_key(TypeKey::of::<C>())
    }

    /// Returns `true` if the entity has a component stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.components.contains_key(key)
    }

    /// Iterates over the component types this entity owns, in the order
    /// they were added.
    pub fn types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.components.keys()
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the entity has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("components", &self.components)
            .finish()
    }
}

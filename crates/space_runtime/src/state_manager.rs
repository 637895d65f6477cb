//! Singleton states keyed by type.
//!
//! A state behaves like a component of one implicit entity: at most one
//! value per type, looked up by type. With a single owner there is nothing
//! to intersect, so no secondary index is kept.

use std::any::Any;

use space_component::{Bundle, ComponentError, TypeKey, TypeMap};
use tracing::debug;

use crate::error::SpaceError;

/// The set of singleton states, kept in the order they were added.
#[derive(Debug, Default)]
pub struct StateManager {
    states: TypeMap,
}

impl StateManager {
    /// Creates an empty state store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a state.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateStateType`] if a state of the same type
    /// is already present.
    pub fn add<S: Any>(&mut self, state: S) -> Result<(), SpaceError> {
        self.add_boxed(TypeKey::of::<S>(), Box::new(state))
    }

    /// Adds every state in `bundle`, or none of them.
    ///
    /// Returns the added types in bundle order.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateStateType`] if a type is already
    /// present or appears twice in the bundle.
    pub fn add_all<B: Bundle>(&mut self, bundle: B) -> Result<Vec<TypeKey>, SpaceError> {
        let values = bundle.into_values().map_err(|err| match err {
            ComponentError::DuplicateComponentType { component, .. } => {
                SpaceError::DuplicateStateType(component)
            }
            other => SpaceError::Component(other),
        })?;
        if let Some((key, _)) = values.iter().find(|(key, _)| self.states.contains_key(*key)) {
            return Err(SpaceError::DuplicateStateType(*key));
        }
        let mut added = Vec::with_capacity(values.len());
        for (key, value) in values {
            debug!(state = %key, "state added");
            self.states.insert(key, value);
            added.push(key);
        }
        Ok(added)
    }

    /// Type-erased form of [`StateManager::add`].
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateStateType`] if `key` is present, or a
    /// type mismatch if `value` is not a `key`.
    pub fn add_boxed(&mut self, key: TypeKey, value: Box<dyn Any>) -> Result<(), SpaceError> {
        if !key.matches(value.as_ref()) {
            return Err(ComponentError::TypeMismatch { expected: key }.into());
        }
        if self.states.contains_key(key) {
            return Err(SpaceError::DuplicateStateType(key));
        }
        debug!(state = %key, "state added");
        self.states.insert(key, value);
        Ok(())
    }

    /// Stores `state`, returning the previous state of the same type if
    /// there was one.
    pub fn replace<S: Any>(&mut self, state: S) -> Option<S> {
        self.states
            .insert(TypeKey::of::<S>(), Box::new(state))
            .and_then(|old| old.downcast::<S>().ok())
            .map(|boxed| *boxed)
    }

    /// Removes and returns the state of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if there is none.
    pub fn remove<S: Any>(&mut self) -> Result<S, SpaceError> {
        let key = TypeKey::of::<S>();
        self.remove_boxed(key)?
            .downcast::<S>()
            .map(|boxed| *boxed)
            .map_err(|_| ComponentError::TypeMismatch { expected: key }.into())
    }

    /// Type-erased form of [`StateManager::remove`].
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if `key` is absent.
    pub fn remove_boxed(&mut self, key: TypeKey) -> Result<Box<dyn Any>, SpaceError> {
        let value = self
            .states
            .remove(key)
            .ok_or(SpaceError::StateNotFound(key))?;
        debug!(state = %key, "state removed");
        Ok(value)
    }

    /// Removes the state of type `S` if there is one.
    pub fn discard<S: Any>(&mut self) -> Option<S> {
        self.remove::<S>().ok()
    }

    /// Removes every state, returning the removed types in the order they
    /// were added.
    pub fn clear(&mut self) -> Vec<TypeKey> {
        let removed: Vec<TypeKey> = self.states.drain().into_iter().map(|(key, _)| key).collect();
        debug!(count = removed.len(), "states cleared");
        removed
    }

    /// Returns the state of type `S`, if present.
    #[must_use]
    pub fn get<S: Any>(&self) -> Option<&S> {
        self.states
            .get(TypeKey::of::<S>())
            .and_then(|value| value.downcast_ref::<S>())
    }

    /// Returns the state of type `S` mutably, if present.
    #[must_use]
    pub fn get_mut<S: Any>(&mut self) -> Option<&mut S> {
        self.states
            .get_mut(TypeKey::of::<S>())
            .and_then(|value| value.downcast_mut::<S>())
    }

    /// Returns the state of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if there is none.
    pub fn state<S: Any>(&self) -> Result<&S, SpaceError> {
        self.get::<S>()
            .ok_or(SpaceError::StateNotFound(TypeKey::of::<S>()))
    }

    /// Returns the state of type `S` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if there is none.
    pub fn state_mut<S: Any>(&mut self) -> Result<&mut S, SpaceError> {
        self.get_mut::<S>()
            .ok_or(SpaceError::StateNotFound(TypeKey::of::<S>()))
    }

    /// Returns `true` if a state of type `S` is present.
    #[must_use]
    pub fn contains<S: Any>(&self) -> bool {
        self.contains_key(TypeKey::of::<S>())
    }

    /// Returns `true` if a state is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.states.contains_key(key)
    }

    /// Iterates over the types of the present states, oldest first.
    pub fn types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.states.keys()
    }

    /// Returns the number of states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if there are no states.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Gravity(f32);
    #[derive(Debug, PartialEq)]
    struct Paused(bool);
    #[derive(Debug, PartialEq)]
    struct Wind(f32);

    #[test]
    fn test_add_and_lookup() {
        let mut states = StateManager::new();
        states.add(Gravity(9.8)).unwrap();
        assert_eq!(states.state::<Gravity>().unwrap(), &Gravity(9.8));
        assert!(states.contains::<Gravity>());
        assert!(!states.contains::<Paused>());
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn test_add_duplicate_keeps_original() {
        let mut states = StateManager::new();
        states.add(Gravity(9.8)).unwrap();
        let err = states.add(Gravity(1.6)).unwrap_err();
        assert!(matches!(err, SpaceError::DuplicateStateType(key) if key == TypeKey::of::<Gravity>()));
        assert_eq!(states.state::<Gravity>().unwrap(), &Gravity(9.8));
    }

    #[test]
    fn test_add_all_is_atomic() {
        let mut states = StateManager::new();
        states.add(Paused(false)).unwrap();

        let err = states.add_all((Gravity(9.8), Paused(true))).unwrap_err();
        assert!(err.is_duplicate());
        assert!(!states.contains::<Gravity>());
        assert_eq!(states.state::<Paused>().unwrap(), &Paused(false));

        let err = states.add_all((Gravity(1.0), Gravity(2.0))).unwrap_err();
        assert!(matches!(err, SpaceError::DuplicateStateType(_)));
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn test_add_all_returns_types_in_order() {
        let mut states = StateManager::new();
        let added = states.add_all((Paused(true), Gravity(0.0))).unwrap();
        assert_eq!(
            added,
            vec![TypeKey::of::<Paused>(), TypeKey::of::<Gravity>()]
        );
    }

    #[test]
    fn test_remove_and_lookup_errors() {
        let mut states = StateManager::new();
        states.add(Gravity(9.8)).unwrap();
        assert_eq!(states.remove::<Gravity>().unwrap(), Gravity(9.8));

        let err = states.remove::<Gravity>().unwrap_err();
        assert!(err.is_lookup());
        assert!(states.state::<Gravity>().unwrap_err().is_lookup());
        assert!(states.discard::<Gravity>().is_none());
    }

    #[test]
    fn test_replace_and_mutate() {
        let mut states = StateManager::new();
        assert_eq!(states.replace(Paused(false)), None);
        assert_eq!(states.replace(Paused(true)), Some(Paused(false)));
        states.state_mut::<Paused>().unwrap().0 = false;
        assert_eq!(states.get::<Paused>(), Some(&Paused(false)));
    }

    #[test]
    fn test_add_boxed_rejects_mismatch() {
        let mut states = StateManager::new();
        let err = states
            .add_boxed(TypeKey::of::<Gravity>(), Box::new(Paused(true)))
            .unwrap_err();
        assert!(matches!(err, SpaceError::Component(ComponentError::TypeMismatch { .. })));
        assert!(states.is_empty());
    }

    #[test]
    fn test_clear_returns_types_in_add_order() {
        let mut states = StateManager::new();
        states.add_all((Gravity(1.0), Paused(false))).unwrap();
        states.add(Wind(0.5)).unwrap();
        assert_eq!(
            states.clear(),
            vec![
                TypeKey::of::<Gravity>(),
                TypeKey::of::<Paused>(),
                TypeKey::of::<Wind>(),
            ]
        );
        assert!(states.is_empty());
    }
}

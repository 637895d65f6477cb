//! Mutation handles that pair a structural change with its event.
//!
//! Each handle borrows the whole [`Space`], applies the change to the
//! relevant manager, and only then raises the structural event, so handlers
//! observe the store after the change. If the change itself fails nothing
//! is raised.

use std::any::Any;
use std::collections::HashSet;
use std::rc::Rc;

use space_component::{Bundle, Component, Entity, EntityId, TypeKey};
use tracing::debug;

use crate::error::SpaceError;
use crate::events::{
    ComponentAdded, ComponentRemoved, StateAdded, StateRemoved, SystemAdded, SystemRemoved,
};
use crate::space::Space;
use crate::system::{EventKey, System, SystemId, Systems};

/// Structural access to the entity store. See [`Space::entities_mut`].
pub struct EntitiesMut<'a> {
    space: &'a mut Space,
}

impl<'a> EntitiesMut<'a> {
    pub(crate) fn new(space: &'a mut Space) -> Self {
        Self { space }
    }

    /// Registers `entity`, then raises `EntityAdded` and one
    /// `ComponentAdded` per component.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateEntity`] if the id is taken, or the
    /// first handler failure.
    pub fn add(&mut self, entity: Entity) -> Result<EntityId, SpaceError> {
        let components: Vec<TypeKey> = entity.types().collect();
        let id = self.space.entities.add(entity)?;
        self.space.raise_entity_added(id, components)?;
        Ok(id)
    }

    /// Builds an entity from `bundle` and registers it. `ComponentAdded`
    /// events follow the bundle order.
    ///
    /// # Errors
    ///
    /// Returns a duplicate-component error if two values share a type, or
    /// the first handler failure.
    pub fn create<B: Bundle>(&mut self, bundle: B) -> Result<EntityId, SpaceError> {
        let id = self.space.entities.create(bundle)?;
        self.space.raise_entity_added(id, B::type_keys())?;
        Ok(id)
    }

    /// Deregisters the entity, then raises one `ComponentRemoved` per
    /// component followed by `EntityRemoved`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if there is none, or the first
    /// handler failure.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, SpaceError> {
        let entity = self.space.entities.remove(id)?;
        self.space.raise_entity_removed(&entity)?;
        Ok(entity)
    }

    /// Removes the entity if it is registered.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure.
    pub fn discard(&mut self, id: EntityId) -> Result<Option<Entity>, SpaceError> {
        if !self.space.entities.contains(id) {
            return Ok(None);
        }
        self.remove(id).map(Some)
    }

    /// Removes every entity, raising removal events for each. Returns how
    /// many were removed.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure. Every entity is already removed
    /// by then.
    pub fn clear(&mut self) -> Result<usize, SpaceError> {
        let removed = self.space.entities.clear();
        for entity in &removed {
            self.space.raise_entity_removed(entity)?;
        }
        Ok(removed.len())
    }

    /// Structural access to one registered entity.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if there is none.
    pub fn entity(&mut self, id: EntityId) -> Result<EntityMut<'_>, SpaceError> {
        self.space.entity_mut(id)
    }
}

/// Structural access to one registered entity. See [`Space::entity_mut`].
pub struct EntityMut<'a> {
    space: &'a mut Space,
    id: EntityId,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(space: &'a mut Space, id: EntityId) -> Self {
        Self { space, id }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Adds a component, then raises `ComponentAdded`.
    ///
    /// # Errors
    ///
    /// Returns a duplicate-component error if the entity already has a `C`
    /// (the entity is left unchanged), [`SpaceError::EntityNotFound`] if a
    /// handler removed the entity, or the first handler failure.
    pub fn insert<C: Component>(&mut self, component: C) -> Result<&mut Self, SpaceError> {
        self.space.entities.insert_component(self.id, component)?;
        self.space.raise(ComponentAdded {
            entity: self.id,
            component: TypeKey::of::<C>(),
        })?;
        Ok(self)
    }

    /// Removes the `C` component, then raises `ComponentRemoved`.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if the entity has no `C`, or the first handler
    /// failure.
    pub fn remove<C: Component>(&mut self) -> Result<C, SpaceError> {
        let component = self.space.entities.remove_component::<C>(self.id)?;
        self.space.raise(ComponentRemoved {
            entity: self.id,
            component: TypeKey::of::<C>(),
        })?;
        Ok(component)
    }

    /// Stores `component`, returning the previous `C` if there was one.
    /// Raises `ComponentRemoved` for a replaced value, then `ComponentAdded`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if a handler removed the
    /// entity, or the first handler failure.
    pub fn replace<C: Component>(&mut self, component: C) -> Result<Option<C>, SpaceError> {
        let previous = self.space.entities.replace_component(self.id, component)?;
        let key = TypeKey::of::<C>();
        if previous.is_some() {
            self.space.raise(ComponentRemoved {
                entity: self.id,
                component: key,
            })?;
        }
        self.space.raise(ComponentAdded {
            entity: self.id,
            component: key,
        })?;
        Ok(previous)
    }

    #[must_use]
    pub fn get<C: Component>(&self) -> Option<&C> {
        self.space.entities.get(self.id)?.get::<C>()
    }

    /// Edits a component value in place. Raises nothing.
    #[must_use]
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.space.entities.component_mut::<C>(self.id).ok()
    }

    #[must_use]
    pub fn contains<C: Component>(&self) -> bool {
        self.get::<C>().is_some()
    }
}

/// Structural access to the state store. See [`Space::states_mut`].
pub struct StatesMut<'a> {
    space: &'a mut Space,
}

impl<'a> StatesMut<'a> {
    pub(crate) fn new(space: &'a mut Space) -> Self {
        Self { space }
    }

    /// Adds a state, then raises `StateAdded`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateStateType`] if one is present, or the
    /// first handler failure.
    pub fn add<S: Any>(&mut self, state: S) -> Result<&mut Self, SpaceError> {
        self.space.states.add(state)?;
        self.space.raise(StateAdded {
            state: TypeKey::of::<S>(),
        })?;
        Ok(self)
    }

    /// Adds every state in `bundle` (or none), then raises `StateAdded` for
    /// each in bundle order.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateStateType`] on any collision, or the
    /// first handler failure.
    pub fn add_all<B: Bundle>(&mut self, bundle: B) -> Result<&mut Self, SpaceError> {
        for state in self.space.states.add_all(bundle)? {
            self.space.raise(StateAdded { state })?;
        }
        Ok(self)
    }

    /// Stores `state`, returning the previous `S` if there was one. Raises
    /// `StateRemoved` for a replaced value, then `StateAdded`.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure.
    pub fn replace<S: Any>(&mut self, state: S) -> Result<Option<S>, SpaceError> {
        let previous = self.space.states.replace(state);
        let key = TypeKey::of::<S>();
        if previous.is_some() {
            self.space.raise(StateRemoved { state: key })?;
        }
        self.space.raise(StateAdded { state: key })?;
        Ok(previous)
    }

    /// Removes the `S` state, then raises `StateRemoved`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if there is none, or the first
    /// handler failure.
    pub fn remove<S: Any>(&mut self) -> Result<S, SpaceError> {
        let state = self.space.states.remove::<S>()?;
        self.space.raise(StateRemoved {
            state: TypeKey::of::<S>(),
        })?;
        Ok(state)
    }

    /// Removes the `S` state if there is one.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure.
    pub fn discard<S: Any>(&mut self) -> Result<Option<S>, SpaceError> {
        if !self.space.states.contains::<S>() {
            return Ok(None);
        }
        self.remove::<S>().map(Some)
    }

    /// Removes every state, raising `StateRemoved` for each. Returns how
    /// many were removed.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure.
    pub fn clear(&mut self) -> Result<usize, SpaceError> {
        let removed = self.space.states.clear();
        for state in &removed {
            self.space.raise(StateRemoved { state: *state })?;
        }
        Ok(removed.len())
    }
}

/// Installs and uninstalls systems. See [`Space::systems_mut`].
pub struct SystemsMut<'a> {
    space: &'a mut Space,
}

impl<'a> SystemsMut<'a> {
    pub(crate) fn new(space: &'a mut Space) -> Self {
        Self { space }
    }

    /// Installs `system`. See [`SystemsMut::add_shared`].
    ///
    /// # Errors
    ///
    /// As [`SystemsMut::add_shared`].
    pub fn add<S: System>(&mut self, system: S) -> Result<SystemId, SpaceError> {
        self.add_shared(Rc::new(system))
    }

    /// Installs a system the caller may keep a handle to.
    ///
    /// The bindings are registered first, then [`System::on_added`] runs,
    /// then `SystemAdded` is raised. Both steps always run once the system
    /// is registered. A failure in either leaves the system installed with
    /// its bindings in place.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateSystem`] if the id is taken,
    /// [`SpaceError::MissingKeyFunction`] for keyed bindings on an event type
    /// without a key function, [`SpaceError::Hook`] if `on_added` fails, or
    /// else the first handler failure.
    pub fn add_shared(&mut self, system: Rc<dyn System>) -> Result<SystemId, SpaceError> {
        let id = self.space.systems.insert(Rc::clone(&system))?;
        let hooked = system
            .on_added(self.space)
            .map_err(|source| hook_error(&id, "on_added", source));
        let raised = self.space.raise(SystemAdded { system: id.clone() });
        hooked.and(raised)?;
        Ok(id)
    }

    /// Installs several systems in order and returns their ids.
    ///
    /// Ids are checked before anything is installed. Each system then goes
    /// through [`SystemsMut::add_shared`]; on a failure the systems before
    /// it stay installed.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateSystem`] if an id is taken or repeats
    /// within `systems`, or the first error from installing one.
    pub fn add_all(&mut self, systems: impl Systems) -> Result<Vec<SystemId>, SpaceError> {
        let systems = systems.into_systems();
        let mut seen = HashSet::new();
        for system in &systems {
            let id = system.id();
            if self.space.systems.contains(&id) || !seen.insert(id.clone()) {
                return Err(SpaceError::DuplicateSystem(id));
            }
        }
        systems
            .into_iter()
            .map(|system| self.add_shared(system))
            .collect()
    }

    /// Uninstalls the system with `id` and returns it.
    ///
    /// [`System::on_removed`] runs first while the system is still
    /// installed; then its bindings are dropped and `SystemRemoved` is
    /// raised. A failing hook leaves the system installed.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::SystemNotFound`] if it is not installed,
    /// [`SpaceError::Hook`] if `on_removed` fails, or the first handler
    /// failure.
    pub fn remove(&mut self, id: &SystemId) -> Result<Rc<dyn System>, SpaceError> {
        let system = self
            .space
            .systems
            .get(id)
            .cloned()
            .ok_or_else(|| SpaceError::SystemNotFound(id.clone()))?;
        system
            .on_removed(self.space)
            .map_err(|source| hook_error(id, "on_removed", source))?;
        let system = self.space.systems.take(id)?;
        self.space.raise(SystemRemoved { system: id.clone() })?;
        Ok(system)
    }

    /// Uninstalls several systems in order and returns them.
    ///
    /// Every id is checked before anything is removed. On a hook or handler
    /// failure the systems before it stay removed.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::SystemNotFound`] if an id is not installed or
    /// repeats, or the first error from removing one.
    pub fn remove_all(
        &mut self,
        ids: impl IntoIterator<Item = SystemId>,
    ) -> Result<Vec<Rc<dyn System>>, SpaceError> {
        let ids: Vec<SystemId> = ids.into_iter().collect();
        let mut seen = HashSet::new();
        for id in &ids {
            if !self.space.systems.contains(id) || !seen.insert(id) {
                return Err(SpaceError::SystemNotFound(id.clone()));
            }
        }
        ids.iter().map(|id| self.remove(id)).collect()
    }

    /// Uninstalls the system whose id is the type `S`.
    ///
    /// # Errors
    ///
    /// As [`SystemsMut::remove`].
    pub fn remove_type<S: System>(&mut self) -> Result<Rc<dyn System>, SpaceError> {
        self.remove(&SystemId::of::<S>())
    }

    /// Sets the key function for events of type `E`.
    pub fn set_key<E: Any>(
        &mut self,
        key_fn: impl Fn(&E) -> Vec<EventKey> + 'static,
    ) -> &mut Self {
        let event_type = TypeKey::of::<E>();
        debug!(event = %event_type, "key function set");
        self.space.systems.set_key(key_fn);
        self
    }
}

fn hook_error(system: &SystemId, hook: &'static str, source: anyhow::Error) -> SpaceError {
    SpaceError::from_callback(source, |source| SpaceError::Hook {
        system: system.clone(),
        hook,
        source,
    })
}

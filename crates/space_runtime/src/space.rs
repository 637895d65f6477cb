//! The [`Space`]: the composition root owning every manager and the event
//! queue.
//!
//! Reading goes through the managers directly ([`Space::entities`],
//! [`Space::states`], [`Space::systems`]). Structural changes go through the
//! handles returned by [`Space::entities_mut`], [`Space::entity_mut`],
//! [`Space::states_mut`], and [`Space::systems_mut`], which apply the change
//! and then raise the matching structural event. Editing the *value* of an
//! existing component or state is not structural and raises nothing.

use std::any::Any;
use std::ops::Index;

use space_component::{Component, ComponentSet, Entity, EntityId, TypeKey};
use tracing::trace;

use crate::access::{EntitiesMut, EntityMut, StatesMut, SystemsMut};
use crate::config::{SpaceConfig, StructuralEvents};
use crate::entity_manager::EntityManager;
use crate::error::SpaceError;
use crate::event_queue::EventQueue;
use crate::events::{ComponentAdded, ComponentRemoved, EntityAdded, EntityRemoved};
use crate::query::{Query, QueryMut};
use crate::state_manager::StateManager;
use crate::system_manager::SystemManager;

/// Entities, states, systems, and pending events, dispatched on one thread.
#[derive(Debug)]
pub struct Space {
    pub(crate) entities: EntityManager,
    pub(crate) states: StateManager,
    pub(crate) systems: SystemManager,
    pub(crate) event_queue: EventQueue,
    config: SpaceConfig,
}

impl Space {
    /// Create an empty space with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SpaceConfig::default())
    }

    /// Create an empty space with the given configuration.
    #[must_use]
    pub fn with_config(config: SpaceConfig) -> Self {
        Self {
            entities: EntityManager::new(),
            states: StateManager::new(),
            systems: SystemManager::new(),
            event_queue: EventQueue::with_capacity(config.queue_capacity),
            config,
        }
    }

    /// The configuration the space was built with.
    #[must_use]
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    // -- Managers --

    /// Read access to the entity store and its queries.
    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Structural access to the entity store.
    pub fn entities_mut(&mut self) -> EntitiesMut<'_> {
        EntitiesMut::new(self)
    }

    /// Read access to the state store.
    #[must_use]
    pub fn states(&self) -> &StateManager {
        &self.states
    }

    /// Structural access to the state store.
    pub fn states_mut(&mut self) -> StatesMut<'_> {
        StatesMut::new(self)
    }

    /// The installed systems and their handler lists.
    #[must_use]
    pub fn systems(&self) -> &SystemManager {
        &self.systems
    }

    /// Install and uninstall systems.
    pub fn systems_mut(&mut self) -> SystemsMut<'_> {
        SystemsMut::new(self)
    }

    /// Events posted and not yet pumped.
    #[must_use]
    pub fn event_queue(&self) -> &EventQueue {
        &self.event_queue
    }

    /// Direct access to the pending events, bypassing dispatch.
    pub fn event_queue_mut(&mut self) -> &mut EventQueue {
        &mut self.event_queue
    }

    // -- Shortcuts --

    /// Returns the entity registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if there is none.
    pub fn entity(&self, id: EntityId) -> Result<&Entity, SpaceError> {
        self.entities.entity(id)
    }

    /// Structural access to one registered entity.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if there is none.
    pub fn entity_mut(&mut self, id: EntityId) -> Result<EntityMut<'_>, SpaceError> {
        if !self.entities.contains(id) {
            return Err(SpaceError::EntityNotFound(id));
        }
        Ok(EntityMut::new(self, id))
    }

    /// See [`EntityManager::component`].
    ///
    /// # Errors
    ///
    /// Returns a lookup error if the entity or the component is absent.
    pub fn component<C: Component>(&self, id: EntityId) -> Result<&C, SpaceError> {
        self.entities.component(id)
    }

    /// See [`EntityManager::component_mut`].
    ///
    /// # Errors
    ///
    /// Returns a lookup error if the entity or the component is absent.
    pub fn component_mut<C: Component>(&mut self, id: EntityId) -> Result<&mut C, SpaceError> {
        self.entities.component_mut(id)
    }

    /// See [`StateManager::state`].
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if there is none.
    pub fn state<S: Any>(&self) -> Result<&S, SpaceError> {
        self.states.state()
    }

    /// See [`StateManager::state_mut`].
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::StateNotFound`] if there is none.
    pub fn state_mut<S: Any>(&mut self) -> Result<&mut S, SpaceError> {
        self.states.state_mut()
    }

    /// See [`EntityManager::query`].
    #[must_use]
    pub fn query<Q: ComponentSet>(&self) -> Query<'_, Q> {
        self.entities.query()
    }

    /// See [`EntityManager::query_mut`].
    ///
    /// # Errors
    ///
    /// Returns a duplicate-component error if `Q` names a type twice.
    pub fn query_mut<Q: ComponentSet>(&mut self) -> Result<QueryMut<'_, Q>, SpaceError> {
        self.entities.query_mut()
    }

    // -- Events --

    /// Runs every handler bound to `E` now, in priority order.
    ///
    /// An event type with no handlers is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure; handlers after it do not run.
    pub fn process<E: Any>(&mut self, event: E) -> Result<(), SpaceError> {
        self.dispatch(TypeKey::of::<E>(), &event)
    }

    /// Appends `event` to the queue.
    pub fn post<E: Any>(&mut self, event: E) {
        let event_type = TypeKey::of::<E>();
        self.event_queue.push(event);
        trace!(event = %event_type, pending = self.event_queue.len(), "event posted");
    }

    /// Processes queued events in FIFO order until the queue is empty,
    /// including events posted while pumping. Returns how many were
    /// processed.
    ///
    /// A handler that keeps posting events keeps the pump running.
    ///
    /// # Errors
    ///
    /// Stops at the first handler failure. The failing event is consumed;
    /// later events stay queued.
    pub fn pump(&mut self) -> Result<usize, SpaceError> {
        self.pump_n(usize::MAX)
    }

    /// Processes at most `max` queued events, stopping early if the queue
    /// empties. Returns how many were processed.
    ///
    /// # Errors
    ///
    /// Stops at the first handler failure, as [`Space::pump`] does.
    pub fn pump_n(&mut self, max: usize) -> Result<usize, SpaceError> {
        let mut processed = 0;
        while processed < max {
            let Some(event) = self.event_queue.pop_front() else {
                break;
            };
            self.dispatch(event.event_type(), event.payload())?;
            processed += 1;
        }
        trace!(processed, pending = self.event_queue.len(), "pump finished");
        Ok(processed)
    }

    fn dispatch(&mut self, event_type: TypeKey, event: &dyn Any) -> Result<(), SpaceError> {
        let handlers = self.systems.dispatch_list(event_type, event);
        trace!(event = %event_type, handlers = handlers.len(), "processing event");
        for handler in &handlers {
            handler.call(self, event_type, event)?;
        }
        Ok(())
    }

    // -- Structural events --

    /// Raises a structural event the way the config asks for.
    pub(crate) fn raise<E: Any>(&mut self, event: E) -> Result<(), SpaceError> {
        match self.config.structural_events {
            StructuralEvents::Process => self.process(event),
            StructuralEvents::Post => {
                self.post(event);
                Ok(())
            }
            StructuralEvents::Silent => Ok(()),
        }
    }

    pub(crate) fn raise_entity_added(
        &mut self,
        entity: EntityId,
        components: Vec<TypeKey>,
    ) -> Result<(), SpaceError> {
        self.raise(EntityAdded { entity })?;
        for component in components {
            self.raise(ComponentAdded { entity, component })?;
        }
        Ok(())
    }

    pub(crate) fn raise_entity_removed(&mut self, entity: &Entity) -> Result<(), SpaceError> {
        let id = entity.id();
        for component in entity.types() {
            self.raise(ComponentRemoved {
                entity: id,
                component,
            })?;
        }
        self.raise(EntityRemoved { entity: id })
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<EntityId> for Space {
    type Output = Entity;

    /// # Panics
    ///
    /// Panics if no entity is registered under `id`.
    fn index(&self, id: EntityId) -> &Entity {
        &self.entities[id]
    }
}

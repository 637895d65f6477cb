//! # space_runtime
//!
//! A single-threaded entity-component-system runtime.
//!
//! A [`Space`] owns four parts:
//!
//! - [`EntityManager`]: entities plus a per-type index that answers
//!   multi-type [`Query`]s by intersecting the smallest index first.
//! - [`StateManager`]: singleton values keyed by type.
//! - [`SystemManager`]: installed [`System`]s and their [`Binding`]s,
//!   sorted by [`Priority`] per event type.
//! - [`EventQueue`]: events waiting for [`Space::pump`].
//!
//! Handlers run synchronously on the caller's stack. Structural changes made
//! through the space raise the events in [`events`].

pub mod access;
pub mod config;
pub mod entity_manager;
pub mod error;
pub mod event_queue;
pub mod events;
pub mod query;
pub mod space;
pub mod state_manager;
pub mod system;
pub mod system_manager;

pub use access::{EntitiesMut, EntityMut, StatesMut, SystemsMut};
pub use config::{SpaceConfig, StructuralEvents};
pub use entity_manager::EntityManager;
pub use error::SpaceError;
pub use event_queue::{EventQueue, QueuedEvent};
pub use query::{Matches, Query, QueryMut, Zip, ZipEntity};
pub use space::Space;
pub use state_manager::StateManager;
pub use system::{
    Binding, EventKey, FnSystem, Handler, Priority, System, SystemId, Systems, bind,
};
pub use system_manager::SystemManager;

pub use space_component::{
    Bundle, Component, ComponentError, ComponentSet, Entity, EntityId, TypeKey,
};

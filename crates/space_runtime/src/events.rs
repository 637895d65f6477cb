//! Structural events raised by the space when its contents change.
//!
//! Every event is raised after the change it describes has been applied,
//! so a handler always observes a store that already reflects it. Adding an
//! entity raises [`EntityAdded`] followed by one [`ComponentAdded`] per
//! component; removing one raises a [`ComponentRemoved`] per component
//! followed by [`EntityRemoved`].

use space_component::{EntityId, TypeKey};

use crate::system::SystemId;

/// An entity was registered with the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityAdded {
    pub entity: EntityId,
}

/// An entity was removed from the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRemoved {
    pub entity: EntityId,
}

/// A component was added to a registered entity.
///
/// Keyed by the component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentAdded {
    pub entity: EntityId,
    pub component: TypeKey,
}

/// A component was removed from a registered entity.
///
/// Keyed by the component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRemoved {
    pub entity: EntityId,
    pub component: TypeKey,
}

/// A state was added. Keyed by the state type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateAdded {
    pub state: TypeKey,
}

/// A state was removed. Keyed by the state type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRemoved {
    pub state: TypeKey,
}

/// A system was installed. Keyed by the system id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAdded {
    pub system: SystemId,
}

/// A system was uninstalled. Keyed by the system id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRemoved {
    pub system: SystemId,
}

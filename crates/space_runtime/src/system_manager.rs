//! System registry: installed systems and their handlers, ordered by
//! priority per event type.
//!
//! Each event type has one list of unkeyed handlers and, for event types
//! with a key function, one list per [`EventKey`]. Every list is kept sorted
//! by descending priority. A new handler goes after all handlers of equal
//! priority, so ties run in system-add order and then in the order the
//! system declared its bindings.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use space_component::TypeKey;
use tracing::debug;

use crate::error::SpaceError;
use crate::events::{
    ComponentAdded, ComponentRemoved, StateAdded, StateRemoved, SystemAdded, SystemRemoved,
};
use crate::system::{EventKey, Handler, System, SystemId};

/// Maps an event to the keys that select its keyed handlers.
pub(crate) type KeyFn = Rc<dyn Fn(&dyn Any) -> Vec<EventKey>>;

/// The installed systems and their handlers.
pub struct SystemManager {
    systems: Vec<(SystemId, Rc<dyn System>)>,
    handlers: HashMap<TypeKey, Vec<Handler>>,
    keyed: HashMap<TypeKey, HashMap<EventKey, Vec<Handler>>>,
    key_fns: HashMap<TypeKey, KeyFn>,
}

impl SystemManager {
    /// Creates an empty registry with key functions for the structural
    /// events.
    #[must_use]
    pub fn new() -> Self {
        let mut manager = Self {
            systems: Vec::new(),
            handlers: HashMap::new(),
            keyed: HashMap::new(),
            key_fns: HashMap::new(),
        };
        manager.set_key(|event: &ComponentAdded| vec![EventKey::Type(event.component)]);
        manager.set_key(|event: &ComponentRemoved| vec![EventKey::Type(event.component)]);
        manager.set_key(|event: &StateAdded| vec![EventKey::Type(event.state)]);
        manager.set_key(|event: &StateRemoved| vec![EventKey::Type(event.state)]);
        manager.set_key(|event: &SystemAdded| vec![EventKey::System(event.system.clone())]);
        manager.set_key(|event: &SystemRemoved| vec![EventKey::System(event.system.clone())]);
        manager
    }

    // -- Lookup --

    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &SystemId) -> bool {
        self.systems.iter().any(|(installed, _)| installed == id)
    }

    #[must_use]
    pub fn get(&self, id: &SystemId) -> Option<&Rc<dyn System>> {
        self.systems
            .iter()
            .find(|(installed, _)| installed == id)
            .map(|(_, system)| system)
    }

    /// Iterates over installed system ids in installation order.
    pub fn ids(&self) -> impl Iterator<Item = &SystemId> + '_ {
        self.systems.iter().map(|(id, _)| id)
    }

    /// The unkeyed handlers for events of type `E`, highest priority first.
    #[must_use]
    pub fn bindings_for<E: Any>(&self) -> &[Handler] {
        self.bindings_for_type(TypeKey::of::<E>())
    }

    /// Type-erased form of [`SystemManager::bindings_for`]. An event type
    /// with no bindings yields an empty slice.
    #[must_use]
    pub fn bindings_for_type(&self, event: TypeKey) -> &[Handler] {
        self.handlers
            .get(&event)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The handlers bound to `key` for events of type `event`.
    #[must_use]
    pub fn keyed_bindings_for(&self, event: TypeKey, key: &EventKey) -> &[Handler] {
        self.keyed
            .get(&event)
            .and_then(|by_key| by_key.get(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Event types that have at least one handler, keyed or not.
    pub fn event_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.handlers
            .keys()
            .chain(self.keyed.keys().filter(|key| !self.handlers.contains_key(*key)))
            .copied()
    }

    /// Returns `true` if events of type `event` have a key function.
    #[must_use]
    pub fn has_key_fn(&self, event: TypeKey) -> bool {
        self.key_fns.contains_key(&event)
    }

    // -- Registration --

    /// Sets the key function for events of type `E`, replacing any previous
    /// one.
    pub fn set_key<E: Any>(&mut self, key_fn: impl Fn(&E) -> Vec<EventKey> + 'static) {
        let key_fn: KeyFn = Rc::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
            Some(event) => key_fn(event),
            None => Vec::new(),
        });
        self.key_fns.insert(TypeKey::of::<E>(), key_fn);
    }

    /// Installs `system` and registers its bindings. Hooks are run by the
    /// caller.
    ///
    /// Validation happens before anything is registered, so a failure leaves
    /// the manager unchanged.
    pub(crate) fn insert(&mut self, system: Rc<dyn System>) -> Result<SystemId, SpaceError> {
        let id = system.id();
        if self.contains(&id) {
            return Err(SpaceError::DuplicateSystem(id));
        }
        let bindings = system.bindings();
        if let Some(binding) = bindings
            .iter()
            .find(|binding| !binding.keys().is_empty() && !self.has_key_fn(binding.event_type()))
        {
            return Err(SpaceError::MissingKeyFunction {
                system: id,
                event: binding.event_type(),
            });
        }

        let count = bindings.len();
        for binding in bindings {
            let event = binding.event_type();
            let keys = binding.keys().to_vec();
            let handler = binding.into_handler(id.clone());
            if keys.is_empty() {
                insert_sorted(self.handlers.entry(event).or_default(), handler);
            } else {
                let by_key = self.keyed.entry(event).or_default();
                for key in keys {
                    insert_sorted(by_key.entry(key).or_default(), handler.clone());
                }
            }
        }
        self.systems.push((id.clone(), system));
        debug!(system = %id, bindings = count, "system installed");
        Ok(id)
    }

    /// Uninstalls the system and drops its handlers. Hooks are run by the
    /// caller.
    pub(crate) fn take(&mut self, id: &SystemId) -> Result<Rc<dyn System>, SpaceError> {
        let position = self
            .systems
            .iter()
            .position(|(installed, _)| installed == id)
            .ok_or_else(|| SpaceError::SystemNotFound(id.clone()))?;
        let (_, system) = self.systems.remove(position);

        self.handlers.retain(|_, handlers| {
            handlers.retain(|handler| handler.system() != id);
            !handlers.is_empty()
        });
        self.keyed.retain(|_, by_key| {
            by_key.retain(|_, handlers| {
                handlers.retain(|handler| handler.system() != id);
                !handlers.is_empty()
            });
            !by_key.is_empty()
        });
        debug!(system = %id, "system uninstalled");
        Ok(system)
    }

    /// The handlers to run for one event, in dispatch order: keyed handlers
    /// for each key the event yields, then the unkeyed handlers. A handler
    /// runs once per matching key, so repeated keys run it repeatedly.
    ///
    /// The list is a snapshot; changes made while it runs apply to the next
    /// event.
    pub(crate) fn dispatch_list(&self, event_type: TypeKey, event: &dyn Any) -> Vec<Handler> {
        let mut list: Vec<Handler> = Vec::new();
        let keyed = self.keyed.get(&event_type).zip(self.key_fns.get(&event_type));
        if let Some((by_key, key_fn)) = keyed {
            for key in key_fn(event) {
                list.extend(by_key.get(&key).into_iter().flatten().cloned());
            }
        }
        list.extend(self.bindings_for_type(event_type).iter().cloned());
        list
    }
}

impl Default for SystemManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.ids().collect::<Vec<_>>())
            .field("handlers", &self.handlers)
            .field("keyed", &self.keyed)
            .finish_non_exhaustive()
    }
}

fn insert_sorted(handlers: &mut Vec<Handler>, handler: Handler) {
    let position = handlers.partition_point(|existing| existing.priority() >= handler.priority());
    handlers.insert(position, handler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Space;
    use crate::system::{Binding, FnSystem, Priority, bind};

    struct Hit;
    struct Other;

    fn noop(priority: i64, name: &'static str) -> Binding {
        bind(priority, |_: &mut Space, _: &Hit| Ok(())).named(name)
    }

    fn names(handlers: &[Handler]) -> Vec<&str> {
        handlers.iter().map(Handler::name).collect()
    }

    #[test]
    fn test_bindings_sorted_by_descending_priority() {
        let mut systems = SystemManager::new();
        systems
            .insert(Rc::new(
                FnSystem::new("s")
                    .binding(noop(10, "a"))
                    .binding(noop(5, "b"))
                    .binding(noop(10, "c")),
            ))
            .unwrap();
        assert_eq!(names(systems.bindings_for::<Hit>()), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_equal_priority_ties_follow_add_order() {
        let mut systems = SystemManager::new();
        systems
            .insert(Rc::new(FnSystem::new("first").binding(noop(1, "x"))))
            .unwrap();
        systems
            .insert(Rc::new(FnSystem::new("second").binding(noop(1, "y"))))
            .unwrap();
        systems
            .insert(Rc::new(FnSystem::new("third").binding(noop(2, "z"))))
            .unwrap();
        assert_eq!(names(systems.bindings_for::<Hit>()), vec!["z", "x", "y"]);
        let priorities: Vec<Priority> = systems
            .bindings_for::<Hit>()
            .iter()
            .map(Handler::priority)
            .collect();
        assert_eq!(priorities, vec![Priority(2), Priority(1), Priority(1)]);
    }

    #[test]
    fn test_unbound_event_type_yields_empty_list() {
        let systems = SystemManager::new();
        assert!(systems.bindings_for::<Other>().is_empty());
    }

    #[test]
    fn test_duplicate_system_is_rejected() {
        let mut systems = SystemManager::new();
        systems
            .insert(Rc::new(FnSystem::new("s").binding(noop(0, "a"))))
            .unwrap();
        let err = systems
            .insert(Rc::new(FnSystem::new("s").binding(noop(0, "b"))))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(names(systems.bindings_for::<Hit>()), vec!["a"]);
        assert_eq!(systems.len(), 1);
    }

    #[test]
    fn test_take_removes_every_binding() {
        let mut systems = SystemManager::new();
        systems.set_key(|_: &Hit| vec![EventKey::name("only")]);
        systems
            .insert(Rc::new(
                FnSystem::new("gone")
                    .binding(noop(0, "a"))
                    .binding(bind(0, |_: &mut Space, _: &Other| Ok(())))
                    .binding(noop(0, "k").with_key("only")),
            ))
            .unwrap();
        systems
            .insert(Rc::new(FnSystem::new("stays").binding(noop(0, "b"))))
            .unwrap();

        systems.take(&SystemId::named("gone")).unwrap();
        assert_eq!(names(systems.bindings_for::<Hit>()), vec!["b"]);
        assert!(systems.bindings_for::<Other>().is_empty());
        assert!(
            systems
                .keyed_bindings_for(TypeKey::of::<Hit>(), &EventKey::name("only"))
                .is_empty()
        );
        assert!(!systems.contains(&SystemId::named("gone")));
        assert_eq!(systems.event_types().collect::<Vec<_>>(), vec![TypeKey::of::<Hit>()]);
    }

    #[test]
    fn test_take_unknown_system_is_lookup_error() {
        let mut systems = SystemManager::new();
        let err = systems.take(&SystemId::named("nobody")).err().unwrap();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_keyed_binding_without_key_fn_is_rejected() {
        let mut systems = SystemManager::new();
        let err = systems
            .insert(Rc::new(
                FnSystem::new("keyed")
                    .binding(noop(0, "plain"))
                    .binding(noop(0, "k").with_key("a")),
            ))
            .unwrap_err();
        assert!(matches!(err, SpaceError::MissingKeyFunction { event, .. } if event == TypeKey::of::<Hit>()));
        assert!(systems.is_empty());
        assert!(systems.bindings_for::<Hit>().is_empty());
    }

    #[test]
    fn test_dispatch_list_runs_keyed_handlers_first() {
        let mut systems = SystemManager::new();
        systems.set_key(|_: &Hit| vec![EventKey::name("b"), EventKey::name("a")]);
        systems
            .insert(Rc::new(
                FnSystem::new("s")
                    .binding(noop(100, "plain"))
                    .binding(noop(0, "on_a").with_key("a"))
                    .binding(noop(0, "on_b").with_key("b"))
                    .binding(noop(0, "on_both").with_key("a").with_key("b"))
                    .binding(noop(0, "on_c").with_key("c")),
            ))
            .unwrap();

        let list = systems.dispatch_list(TypeKey::of::<Hit>(), &Hit);
        assert_eq!(
            names(&list),
            vec!["on_b", "on_both", "on_a", "on_both", "plain"]
        );
    }

    #[test]
    fn test_repeated_key_repeats_handler() {
        let mut systems = SystemManager::new();
        systems.set_key(|_: &Hit| vec![EventKey::name("a"), EventKey::name("a")]);
        systems
            .insert(Rc::new(FnSystem::new("s").binding(noop(0, "on_a").with_key("a"))))
            .unwrap();

        let list = systems.dispatch_list(TypeKey::of::<Hit>(), &Hit);
        assert_eq!(names(&list), vec!["on_a", "on_a"]);
    }

    #[test]
    fn test_builtin_key_functions() {
        let systems = SystemManager::new();
        assert!(systems.has_key_fn(TypeKey::of::<ComponentAdded>()));
        assert!(systems.has_key_fn(TypeKey::of::<SystemRemoved>()));
        assert!(!systems.has_key_fn(TypeKey::of::<Hit>()));
    }
}

//! Systems and their event bindings.
//!
//! A system is a behavior unit with no data of its own. It declares a list
//! of [`Binding`]s, each attaching a callback to one event type at one
//! [`Priority`], and may react to being installed or uninstalled through the
//! optional [`System::on_added`] and [`System::on_removed`] hooks.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use space_component::{ComponentError, TypeKey};

use crate::error::SpaceError;
use crate::space::Space;

/// Type-erased event callback. The event is restored to its concrete type
/// before the host closure runs.
pub(crate) type Callback = Rc<dyn Fn(&mut Space, &dyn Any) -> anyhow::Result<()>>;

/// A lifecycle hook for [`FnSystem`].
type HookFn = Rc<dyn Fn(&mut Space) -> anyhow::Result<()>>;

/// Identifies an installed system.
///
/// Type-backed systems are identified by their Rust type, so one instance
/// per type can be installed. [`FnSystem`]s carry an explicit name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemId {
    Type(TypeKey),
    Named(Cow<'static, str>),
}

impl SystemId {
    /// The id of the system type `S`.
    #[must_use]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self::Type(TypeKey::of::<S>())
    }

    /// A named id.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(key) => fmt::Display::fmt(key, f),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Dispatch priority. Higher values run first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(pub i64);

impl Priority {
    pub const DEFAULT: Self = Self(0);
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A key that narrows which events a binding receives.
///
/// Events of a type with a key function produce a list of keys; a keyed
/// binding only fires for events whose list contains one of its keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Type(TypeKey),
    System(SystemId),
    Name(Cow<'static, str>),
}

impl EventKey {
    /// The key for type `T`, as produced by component and state events.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeKey::of::<T>())
    }

    /// A free-form named key.
    #[must_use]
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Name(name.into())
    }
}

impl From<TypeKey> for EventKey {
    fn from(key: TypeKey) -> Self {
        Self::Type(key)
    }
}

impl From<SystemId> for EventKey {
    fn from(id: SystemId) -> Self {
        Self::System(id)
    }
}

impl From<&'static str> for EventKey {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

/// One event type, one priority, one callback.
#[derive(Clone)]
pub struct Binding {
    event: TypeKey,
    priority: Priority,
    name: Cow<'static, str>,
    keys: Vec<EventKey>,
    callback: Callback,
}

/// Binds `callback` to events of type `E` at `priority`.
///
/// The callback receives the space and the event. Returning an error stops
/// the current dispatch and surfaces from the call that triggered it.
///
/// # Examples
///
/// ```rust
/// use space_runtime::{bind, FnSystem, Space};
///
/// struct Ping(u32);
/// struct Pongs(u32);
///
/// let mut space = Space::new();
/// space.states_mut().add(Pongs(0)).unwrap();
/// space
///     .systems_mut()
///     .add(FnSystem::new("pong").binding(bind(0, |space: &mut Space, ping: &Ping| {
///         space.state_mut::<Pongs>()?.0 += ping.0;
///         Ok(())
///     })))
///     .unwrap();
///
/// space.process(Ping(3)).unwrap();
/// assert_eq!(space.state::<Pongs>().unwrap().0, 3);
/// ```
pub fn bind<E: Any>(
    priority: impl Into<Priority>,
    callback: impl Fn(&mut Space, &E) -> anyhow::Result<()> + 'static,
) -> Binding {
    let event = TypeKey::of::<E>();
    let callback: Callback = Rc::new(move |space: &mut Space, payload: &dyn Any| -> anyhow::Result<()> {
        let event = payload.downcast_ref::<E>().ok_or(SpaceError::Component(
            ComponentError::TypeMismatch {
                expected: TypeKey::of::<E>(),
            },
        ))?;
        callback(space, event)
    });
    Binding {
        event,
        priority: priority.into(),
        name: Cow::Borrowed(event.short_name()),
        keys: Vec::new(),
        callback,
    }
}

impl Binding {
    /// Names the binding for diagnostics. Defaults to the event type name.
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Restricts the binding to events that yield `key`.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<EventKey>) -> Self {
        let key = key.into();
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    /// The event type this binding handles.
    #[must_use]
    pub fn event_type(&self) -> TypeKey {
        self.event
    }

    /// The priority handlers created from this binding run at.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The keys this binding is restricted to. Empty for unkeyed bindings.
    #[must_use]
    pub fn keys(&self) -> &[EventKey] {
        &self.keys
    }

    pub(crate) fn into_handler(self, system: SystemId) -> Handler {
        Handler {
            system,
            name: self.name,
            priority: self.priority,
            callback: self.callback,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// An installed binding: a callback tagged with the system that owns it.
#[derive(Clone)]
pub struct Handler {
    system: SystemId,
    name: Cow<'static, str>,
    priority: Priority,
    callback: Callback,
}

impl Handler {
    /// The system that installed this handler.
    #[must_use]
    pub fn system(&self) -> &SystemId {
        &self.system
    }

    /// The binding name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The priority the handler was bound at.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Runs the callback, attributing a failure to this handler.
    pub(crate) fn call(
        &self,
        space: &mut Space,
        event_type: TypeKey,
        event: &dyn Any,
    ) -> Result<(), SpaceError> {
        (self.callback)(space, event).map_err(|source| {
            SpaceError::from_callback(source, |source| SpaceError::Handler {
                system: self.system.clone(),
                handler: self.name.clone(),
                event: event_type,
                source,
            })
        })
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("system", &self.system)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A behavior unit: a set of bindings plus optional lifecycle hooks.
///
/// # Examples
///
/// ```rust
/// use space_runtime::{bind, Binding, Space, System};
///
/// struct Tick;
/// struct Counter(u64);
///
/// struct CountTicks;
///
/// impl System for CountTicks {
///     fn bindings(&self) -> Vec<Binding> {
///         vec![bind(0, |space: &mut Space, _: &Tick| {
///             space.state_mut::<Counter>()?.0 += 1;
///             Ok(())
///         })]
///     }
///
///     fn on_added(&self, space: &mut Space) -> anyhow::Result<()> {
///         space.states_mut().add(Counter(0))?;
///         Ok(())
///     }
/// }
///
/// let mut space = Space::new();
/// space.systems_mut().add(CountTicks).unwrap();
/// space.post(Tick);
/// space.post(Tick);
/// space.pump().unwrap();
/// assert_eq!(space.state::<Counter>().unwrap().0, 2);
/// ```
pub trait System: 'static {
    /// The identity under which the system is installed. Defaults to the
    /// implementing type.
    fn id(&self) -> SystemId {
        SystemId::of::<Self>()
    }

    /// The bindings to register, in declaration order.
    fn bindings(&self) -> Vec<Binding>;

    /// Runs after the bindings are registered.
    fn on_added(&self, space: &mut Space) -> anyhow::Result<()> {
        let _ = space;
        Ok(())
    }

    /// Runs before the bindings are removed.
    fn on_removed(&self, space: &mut Space) -> anyhow::Result<()> {
        let _ = space;
        Ok(())
    }
}

/// Several systems installed or passed around together.
///
/// Implemented for tuples of one to eight systems and for a
/// `Vec<Rc<dyn System>>`.
pub trait Systems {
    /// The systems, in installation order.
    fn into_systems(self) -> Vec<Rc<dyn System>>;
}

impl Systems for Vec<Rc<dyn System>> {
    fn into_systems(self) -> Vec<Rc<dyn System>> {
        self
    }
}

macro_rules! impl_systems_tuple {
    ($($S:ident),+) => {
        impl<$($S: System),+> Systems for ($($S,)+) {
            #[allow(non_snake_case)]
            fn into_systems(self) -> Vec<Rc<dyn System>> {
                let ($($S,)+) = self;
                vec![$(Rc::new($S) as Rc<dyn System>),+]
            }
        }
    };
}

impl_systems_tuple!(A);
impl_systems_tuple!(A, B);
impl_systems_tuple!(A, B, C);
impl_systems_tuple!(A, B, C, D);
impl_systems_tuple!(A, B, C, D, E);
impl_systems_tuple!(A, B, C, D, E, F);
impl_systems_tuple!(A, B, C, D, E, F, G);
impl_systems_tuple!(A, B, C, D, E, F, G, H);

/// A named system assembled from closures.
#[derive(Clone)]
pub struct FnSystem {
    id: SystemId,
    bindings: Vec<Binding>,
    on_added: Option<HookFn>,
    on_removed: Option<HookFn>,
}

impl FnSystem {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: SystemId::named(name),
            bindings: Vec::new(),
            on_added: None,
            on_removed: None,
        }
    }

    /// Adds a binding.
    #[must_use]
    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Sets the hook run after installation.
    #[must_use]
    pub fn on_added(mut self, hook: impl Fn(&mut Space) -> anyhow::Result<()> + 'static) -> Self {
        self.on_added = Some(Rc::new(hook));
        self
    }

    /// Sets the hook run before removal.
    #[must_use]
    pub fn on_removed(
        mut self,
        hook: impl Fn(&mut Space) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.on_removed = Some(Rc::new(hook));
        self
    }
}

impl System for FnSystem {
    fn id(&self) -> SystemId {
        self.id.clone()
    }

    fn bindings(&self) -> Vec<Binding> {
        self.bindings.clone()
    }

    fn on_added(&self, space: &mut Space) -> anyhow::Result<()> {
        match &self.on_added {
            Some(hook) => hook(space),
            None => Ok(()),
        }
    }

    fn on_removed(&self, space: &mut Space) -> anyhow::Result<()> {
        match &self.on_removed {
            Some(hook) => hook(space),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for FnSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("id", &self.id)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tick;
    struct Physics;

    impl System for Physics {
        fn bindings(&self) -> Vec<Binding> {
            vec![bind(5, |_: &mut Space, _: &Tick| Ok(()))]
        }
    }

    #[test]
    fn test_default_system_id_is_type() {
        assert_eq!(Physics.id(), SystemId::of::<Physics>());
        assert_eq!(Physics.id().to_string(), "Physics");
    }

    #[test]
    fn test_system_tuple_keeps_order() {
        let systems = (FnSystem::new("first"), Physics, FnSystem::new("last")).into_systems();
        let ids: Vec<String> = systems.iter().map(|system| system.id().to_string()).collect();
        assert_eq!(ids, vec!["first", "Physics", "last"]);
    }

    #[test]
    fn test_fn_system_id_is_name() {
        let system = FnSystem::new("render");
        assert_eq!(system.id(), SystemId::named("render"));
        assert_eq!(system.id().to_string(), "render");
    }

    #[test]
    fn test_bind_records_event_and_priority() {
        let binding = bind(-3, |_: &mut Space, _: &Tick| Ok(()));
        assert_eq!(binding.event_type(), TypeKey::of::<Tick>());
        assert_eq!(binding.priority(), Priority(-3));
        assert_eq!(binding.name(), "Tick");
        assert!(binding.keys().is_empty());
    }

    #[test]
    fn test_binding_builder() {
        let binding = bind(0, |_: &mut Space, _: &Tick| Ok(()))
            .named("advance")
            .with_key("a")
            .with_key("b")
            .with_key("a");
        assert_eq!(binding.name(), "advance");
        assert_eq!(binding.keys(), &[EventKey::name("a"), EventKey::name("b")]);
    }

    #[test]
    fn test_priority_orders_numerically() {
        assert!(Priority(10) > Priority(5));
        assert!(Priority(-1) < Priority::DEFAULT);
        assert_eq!(Priority::from(7i64), Priority(7));
    }

    #[test]
    fn test_event_key_conversions() {
        assert_eq!(EventKey::from(TypeKey::of::<Tick>()), EventKey::of::<Tick>());
        assert_eq!(
            EventKey::from(SystemId::named("x")),
            EventKey::System(SystemId::named("x"))
        );
        assert_eq!(EventKey::from(String::from("k")), EventKey::name("k"));
    }

    #[test]
    fn test_fn_system_hooks_default_to_ok() {
        let system = FnSystem::new("idle");
        let mut space = Space::new();
        assert!(System::on_added(&system, &mut space).is_ok());
        assert!(System::on_removed(&system, &mut space).is_ok());
    }

    #[test]
    fn test_callback_rejects_wrong_event_type() {
        let binding = bind(0, |_: &mut Space, _: &Tick| Ok(()));
        let handler = binding.into_handler(SystemId::named("t"));
        let mut space = Space::new();
        let err = handler
            .call(&mut space, TypeKey::of::<u32>(), &5u32)
            .unwrap_err();
        assert!(matches!(
            err,
            SpaceError::Component(ComponentError::TypeMismatch { expected }) if expected == TypeKey::of::<Tick>()
        ));
    }
}

//! Core [`Component`] marker and the [`TypeKey`] token used to index
//! type-keyed storage.
//!
//! Components, states, and events are all plain Rust values. The runtime
//! never inspects them; it only needs to know their concrete type, which it
//! captures as a [`TypeKey`] when the value is stored. Typed retrieval then
//! performs a checked downcast against that key.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A runtime token for a concrete Rust type.
///
/// Equality, ordering, and hashing use only the [`TypeId`]. The type name is
/// carried along so errors and logs can say *which* type was involved.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the [`TypeKey`] for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying [`TypeId`].
    #[must_use]
    pub fn type_id(self) -> TypeId {
        self.id
    }

    /// Returns the full type path, e.g. `"my_game::Position"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Returns the last path segment of the type name, e.g. `"Position"`.
    ///
    /// Generic arguments are kept as-is.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    /// Returns `true` if `value` is an instance of the type this key names.
    #[must_use]
    pub fn matches(self, value: &dyn Any) -> bool {
        value.type_id() == self.id
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// The component marker.
///
/// Every `'static` type is a component; there is nothing to implement. The
/// trait exists so signatures can say what a type parameter is *for*.
///
/// # Examples
///
/// ```rust
/// use space_component::{Component, Entity, TypeKey};
///
/// #[derive(Debug, PartialEq)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// fn key_of<C: Component>() -> TypeKey {
///     TypeKey::of::<C>()
/// }
///
/// let mut entity = Entity::new();
/// entity.insert(Health { current: 80.0, max: 100.0 }).unwrap();
/// assert!(entity.contains_key(key_of::<Health>()));
/// ```
pub trait Component: Any {}

impl<T: Any> Component for T {}

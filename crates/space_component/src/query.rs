//! Component sets: tuples of component *types* that a query asks for.
//!
//! Where a [`Bundle`](crate::Bundle) carries values, a [`ComponentSet`] only
//! names types. It knows the ordered [`TypeKey`]s to look up in an index and
//! how to borrow the matching components out of one [`Entity`].

use std::collections::HashSet;

use crate::component::{Component, TypeKey};
use crate::entity::Entity;
use crate::error::ComponentError;

/// A tuple of one to eight component types.
///
/// # Examples
///
/// ```rust
/// use space_component::{ComponentSet, Entity};
///
/// struct Position(f32);
/// struct Velocity(f32);
///
/// let mut entity = Entity::new();
/// entity.insert(Position(0.0)).unwrap();
/// entity.insert(Velocity(2.0)).unwrap();
///
/// if let Some((pos, vel)) = <(Position, Velocity)>::fetch_mut(&mut entity) {
///     pos.0 += vel.0;
/// }
/// assert_eq!(entity.get::<Position>().unwrap().0, 2.0);
/// ```
pub trait ComponentSet: 'static {
    /// Shared borrows of each component, in declaration order.
    type Refs<'a>;

    /// Exclusive borrows of each component, in declaration order.
    type RefsMut<'a>;

    /// Returns the component types in declaration order.
    fn type_keys() -> Vec<TypeKey>;

    /// Borrows every component in the set from `entity`, or `None` if any is
    /// missing.
    fn fetch(entity: &Entity) -> Option<Self::Refs<'_>>;

    /// Mutably borrows every component in the set from `entity`, or `None`
    /// if any is missing.
    ///
    /// A set that names the same type twice never matches.
    fn fetch_mut(entity: &mut Entity) -> Option<Self::RefsMut<'_>>;

    /// Checks that no type appears twice.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DuplicateComponentType`] for the first
    /// repeated type.
    fn check_distinct() -> Result<(), ComponentError> {
        let mut seen = HashSet::new();
        for key in Self::type_keys() {
            if !seen.insert(key) {
                return Err(ComponentError::DuplicateComponentType {
                    entity: None,
                    component: key,
                });
            }
        }
        Ok(())
    }
}

macro_rules! impl_component_set {
    ($(($T:ident, $t:ident)),+) => {
        impl<$($T: Component),+> ComponentSet for ($($T,)+) {
            type Refs<'a> = ($(&'a $T,)+);
            type RefsMut<'a> = ($(&'a mut $T,)+);

            fn type_keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$T>()),+]
            }

            fn fetch(entity: &Entity) -> Option<Self::Refs<'_>> {
                Some(($(entity.get::<$T>()?,)+))
            }

            fn fetch_mut(entity: &mut Entity) -> Option<Self::RefsMut<'_>> {
                $(let mut $t: Option<&mut $T> = None;)+
                for (key, value) in entity.components.iter_mut() {
                    $(
                        if *key == TypeKey::of::<$T>() {
                            $t = value.downcast_mut::<$T>();
                            continue;
                        }
                    )+
                }
                Some(($($t?,)+))
            }
        }
    };
}

impl_component_set!((A, a));
impl_component_set!((A, a), (B, b));
impl_component_set!((A, a), (B, b), (C, c));
impl_component_set!((A, a), (B, b), (C, c), (D, d));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g), (H, h));

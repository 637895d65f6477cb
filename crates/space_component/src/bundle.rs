//! Tuples of components that are added to an entity together.

use std::any::Any;
use std::collections::HashSet;

use crate::component::{Component, TypeKey};
use crate::error::ComponentError;

/// A group of components inserted as one unit.
///
/// Implemented for tuples of zero to eight components. A single component
/// is passed as a one-element tuple, `(value,)`. A bundle must not contain
/// two values of the same type.
pub trait Bundle: 'static {
    /// Returns the component types in declaration order.
    fn type_keys() -> Vec<TypeKey>;

    /// Consumes the bundle, yielding each value with its type key.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DuplicateComponentType`] if two values share
    /// a type.
    fn into_values(self) -> Result<Vec<(TypeKey, Box<dyn Any>)>, ComponentError>;
}

fn check_unique(keys: &[TypeKey]) -> Result<(), ComponentError> {
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        if !seen.insert(*key) {
            return Err(ComponentError::DuplicateComponentType {
                entity: None,
                component: *key,
            });
        }
    }
    Ok(())
}

macro_rules! impl_bundle_tuple {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$T>()),*]
            }

            #[allow(non_snake_case, unused_mut)]
            fn into_values(self) -> Result<Vec<(TypeKey, Box<dyn Any>)>, ComponentError> {
                check_unique(&Self::type_keys())?;
                let ($($T,)*) = self;
                let mut values: Vec<(TypeKey, Box<dyn Any>)> = Vec::new();
                $(values.push((TypeKey::of::<$T>(), Box::new($T)));)*
                Ok(values)
            }
        }
    };
}

impl_bundle_tuple!();
impl_bundle_tuple!(A);
impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);

//! [`TypeMap`]: boxed values keyed by their type, remembering insertion order.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;

use crate::component::TypeKey;

/// At most one boxed value per type.
///
/// Lookups go through a hash map. Iteration and draining follow the order in
/// which types were first inserted; replacing a value keeps its position.
#[derive(Default)]
pub struct TypeMap {
    values: HashMap<TypeKey, Box<dyn Any>>,
    order: Vec<TypeKey>,
}

impl TypeMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the value it replaced.
    ///
    /// The caller guarantees that `value` is a `key`.
    pub fn insert(&mut self, key: TypeKey, value: Box<dyn Any>) -> Option<Box<dyn Any>> {
        let previous = self.values.insert(key, value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: TypeKey) -> Option<Box<dyn Any>> {
        let value = self.values.remove(&key)?;
        if let Some(position) = self.order.iter().position(|stored| *stored == key) {
            self.order.remove(position);
        }
        Some(value)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<&dyn Any> {
        self.values.get(&key).map(|value| &**value)
    }

    /// Returns the value stored under `key` mutably.
    #[must_use]
    pub fn get_mut(&mut self, key: TypeKey) -> Option<&mut dyn Any> {
        self.values.get_mut(&key).map(|value| &mut **value)
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Iterates over the stored types in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.order.iter().copied()
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Removes every value, returning them in insertion order.
    pub fn drain(&mut self) -> Vec<(TypeKey, Box<dyn Any>)> {
        let mut values = std::mem::take(&mut self.values);
        self.order
            .drain(..)
            .filter_map(|key| values.remove(&key).map(|value| (key, value)))
            .collect()
    }

    /// Unordered mutable iteration, for borrowing several values at once.
    pub(crate) fn iter_mut(&mut self) -> hash_map::IterMut<'_, TypeKey, Box<dyn Any>> {
        self.values.iter_mut()
    }
}

impl fmt::Debug for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.order.iter().map(|key| key.short_name()))
            .finish()
    }
}

//! Entity storage with a per-type secondary index.
//!
//! Alongside the entities themselves, the manager keeps one index per
//! component type: the set of ids of every registered entity that owns a
//! component of that type. Every structural edit goes through the manager,
//! which keeps the invariant that an entity owns a `T` if and only if its id
//! is in `T`'s index. Types whose index becomes empty are dropped from it.
//!
//! A manager on its own raises no events. Mutating through
//! [`Space::entities_mut`](crate::Space::entities_mut) performs the same
//! edits and then raises the structural events.

use std::collections::{HashMap, HashSet};
use std::ops::Index;

use space_component::{Bundle, Component, ComponentError, ComponentSet, Entity, EntityId, TypeKey};
use tracing::debug;

use crate::error::SpaceError;
use crate::query::{Matches, Query, QueryMut};

/// The set of registered entities.
#[derive(Debug, Default)]
pub struct EntityManager {
    entities: HashMap<EntityId, Entity>,
    index: HashMap<TypeKey, HashSet<EntityId>>,
    // Registration sequence numbers, so `clear` can replay add order.
    added: HashMap<EntityId, u64>,
    next_added: u64,
}

impl EntityManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Lookup --

    /// Returns the number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if an entity is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns the entity registered under `id`, if any.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns the entity registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if there is none.
    pub fn entity(&self, id: EntityId) -> Result<&Entity, SpaceError> {
        self.entities.get(&id).ok_or(SpaceError::EntityNotFound(id))
    }

    /// Iterates over all registered entities.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Iterates over all registered ids.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Iterates over the component types owned by at least one entity.
    pub fn component_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.index.keys().copied()
    }

    // -- Entity lifecycle --

    /// Registers `entity` and indexes each of its components.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::DuplicateEntity`] if an entity with the same id
    /// is already registered. The manager is left unchanged.
    pub fn add(&mut self, entity: Entity) -> Result<EntityId, SpaceError> {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Err(SpaceError::DuplicateEntity(id));
        }
        for key in entity.types() {
            self.index.entry(key).or_default().insert(id);
        }
        debug!(entity = %id, components = entity.len(), "entity added");
        self.entities.insert(id, entity);
        self.added.insert(id, self.next_added);
        self.next_added += 1;
        Ok(id)
    }

    /// Builds a new entity from `bundle` and registers it.
    ///
    /// # Errors
    ///
    /// Returns a duplicate-component error if two values in the bundle share
    /// a type.
    pub fn create<B: Bundle>(&mut self, bundle: B) -> Result<EntityId, SpaceError> {
        let entity = Entity::from_bundle(bundle)?;
        self.add(entity)
    }

    /// Deregisters the entity and returns it with its components intact.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] if there is none.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, SpaceError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(SpaceError::EntityNotFound(id))?;
        for key in entity.types() {
            self.unindex(key, id);
        }
        self.added.remove(&id);
        debug!(entity = %id, "entity removed");
        Ok(entity)
    }

    /// Removes the entity if it is registered.
    pub fn discard(&mut self, id: EntityId) -> Option<Entity> {
        self.remove(id).ok()
    }

    /// Removes every entity, returning them in the order they were added.
    pub fn clear(&mut self) -> Vec<Entity> {
        self.index.clear();
        let added = std::mem::take(&mut self.added);
        let mut removed: Vec<Entity> = self.entities.drain().map(|(_, entity)| entity).collect();
        removed.sort_by_key(|entity| added.get(&entity.id()).copied());
        debug!(count = removed.len(), "entities cleared");
        removed
    }

    // -- Component operations --

    /// Adds a component to a registered entity.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] for an unknown id, or a
    /// duplicate-component error if the entity already has a `C`. Neither
    /// leaves a change behind.
    pub fn insert_component<C: Component>(
        &mut self,
        id: EntityId,
        component: C,
    ) -> Result<(), SpaceError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SpaceError::EntityNotFound(id))?;
        entity.insert(component)?;
        self.index.entry(TypeKey::of::<C>()).or_default().insert(id);
        Ok(())
    }

    /// Removes and returns the `C` component of a registered entity.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] for an unknown id, or a
    /// component lookup error if the entity has no `C`.
    pub fn remove_component<C: Component>(&mut self, id: EntityId) -> Result<C, SpaceError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SpaceError::EntityNotFound(id))?;
        let component = entity.remove::<C>()?;
        self.unindex(TypeKey::of::<C>(), id);
        Ok(component)
    }

    /// Stores `component` on a registered entity, returning the previous
    /// value of the same type if there was one.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::EntityNotFound`] for an unknown id.
    pub fn replace_component<C: Component>(
        &mut self,
        id: EntityId,
        component: C,
    ) -> Result<Option<C>, SpaceError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SpaceError::EntityNotFound(id))?;
        let previous = entity.replace(component);
        self.index.entry(TypeKey::of::<C>()).or_default().insert(id);
        Ok(previous)
    }

    /// Returns the `C` component of a registered entity.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if the entity or the component is absent.
    pub fn component<C: Component>(&self, id: EntityId) -> Result<&C, SpaceError> {
        self.entity(id)?
            .get::<C>()
            .ok_or_else(|| missing_component::<C>(id))
    }

    /// Returns the `C` component of a registered entity mutably.
    ///
    /// Editing a component's value does not touch the index.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if the entity or the component is absent.
    pub fn component_mut<C: Component>(&mut self, id: EntityId) -> Result<&mut C, SpaceError> {
        self.entities
            .get_mut(&id)
            .ok_or(SpaceError::EntityNotFound(id))?
            .get_mut::<C>()
            .ok_or_else(|| missing_component::<C>(id))
    }

    // -- Queries --

    /// Iterates over the ids of entities that own a `C`.
    pub fn ids_with<C: Component>(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.index
            .get(&TypeKey::of::<C>())
            .into_iter()
            .flatten()
            .copied()
    }

    /// Iterates over every `C` component with the id of its owner.
    pub fn components<C: Component>(&self) -> impl Iterator<Item = (EntityId, &C)> + '_ {
        self.ids_with::<C>().filter_map(move |id| {
            self.entities
                .get(&id)
                .and_then(|entity| entity.get::<C>())
                .map(|component| (id, component))
        })
    }

    /// Returns a lazy view over the entities owning every type in `Q`.
    ///
    /// ```rust
    /// use space_runtime::EntityManager;
    ///
    /// struct X(u8);
    /// struct Y(u8);
    ///
    /// let mut entities = EntityManager::new();
    /// entities.create((X(1), Y(2))).unwrap();
    /// entities.create((X(3),)).unwrap();
    ///
    /// let query = entities.query::<(X, Y)>();
    /// let sums: Vec<u8> = query.zip().map(|(x, y)| x.0 + y.0).collect();
    /// assert_eq!(sums, vec![3]);
    /// ```
    #[must_use]
    pub fn query<Q: ComponentSet>(&self) -> Query<'_, Q> {
        Query::new(self)
    }

    /// Returns a view that hands out mutable component tuples one entity at
    /// a time.
    ///
    /// # Errors
    ///
    /// Returns a duplicate-component error if `Q` names a type twice.
    pub fn query_mut<Q: ComponentSet>(&mut self) -> Result<QueryMut<'_, Q>, SpaceError> {
        QueryMut::new(self)
    }

    pub(crate) fn matches(&self, keys: &[TypeKey]) -> Matches<'_> {
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match self.index.get(key) {
                Some(set) => sets.push(set),
                None => return Matches::empty(),
            }
        }
        Matches::new(sets)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    fn unindex(&mut self, key: TypeKey, id: EntityId) {
        if let Some(set) = self.index.get_mut(&key) {
            set.remove(&id);
            if set.is_empty() {
                self.index.remove(&key);
            }
        }
    }
}

impl Index<EntityId> for EntityManager {
    type Output = Entity;

    /// # Panics
    ///
    /// Panics if no entity is registered under `id`.
    fn index(&self, id: EntityId) -> &Entity {
        match self.entities.get(&id) {
            Some(entity) => entity,
            None => panic!("entity {id} not found"),
        }
    }
}

fn missing_component<C: Component>(id: EntityId) -> SpaceError {
    SpaceError::Component(ComponentError::ComponentNotFound {
        entity: id,
        component: TypeKey::of::<C>(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct X(i32);
    #[derive(Debug, Clone, PartialEq)]
    struct Y(i32);
    #[derive(Debug, Clone, PartialEq)]
    struct Z(i32);

    /// Checks that every index entry matches entity ownership, both ways.
    fn assert_index_consistent(entities: &EntityManager) {
        for entity in entities.iter() {
            for key in entity.types() {
                assert!(
                    entities.index.get(&key).is_some_and(|set| set.contains(&entity.id())),
                    "{} owns {key} but is not indexed",
                    entity.id()
                );
            }
        }
        for (key, ids) in &entities.index {
            assert!(!ids.is_empty(), "empty index kept for {key}");
            for id in ids {
                assert!(entities.entities[id].contains_key(*key));
            }
        }
    }

    #[test]
    fn test_add_indexes_components() {
        let mut entities = EntityManager::new();
        let id = entities
            .add(Entity::from_bundle((X(1), Y(2))).unwrap())
            .unwrap();
        assert!(entities.contains(id));
        assert_eq!(entities.ids_with::<X>().collect::<Vec<_>>(), vec![id]);
        assert_eq!(entities.ids_with::<Y>().collect::<Vec<_>>(), vec![id]);
        assert_eq!(entities.ids_with::<Z>().count(), 0);
        assert_index_consistent(&entities);
    }

    #[test]
    fn test_add_duplicate_entity_is_rejected() {
        let mut entities = EntityManager::new();
        let id = EntityId::from_u128(1);
        entities.add(Entity::with_id(id)).unwrap();

        let mut twin = Entity::with_id(id);
        twin.insert(X(9)).unwrap();
        let err = entities.add(twin).unwrap_err();
        assert!(matches!(err, SpaceError::DuplicateEntity(found) if found == id));
        assert!(err.is_duplicate());
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.ids_with::<X>().count(), 0);
    }

    #[test]
    fn test_create_rejects_duplicate_types() {
        let mut entities = EntityManager::new();
        let err = entities.create((X(1), X(2))).unwrap_err();
        assert!(err.is_duplicate());
        assert!(entities.is_empty());
    }

    #[test]
    fn test_remove_unindexes() {
        let mut entities = EntityManager::new();
        let id = entities.create((X(1), Y(2))).unwrap();
        let keep = entities.create((X(3),)).unwrap();

        let removed = entities.remove(id).unwrap();
        assert_eq!(removed.get::<X>(), Some(&X(1)));
        assert_eq!(entities.ids_with::<X>().collect::<Vec<_>>(), vec![keep]);
        assert_eq!(entities.ids_with::<Y>().count(), 0);
        assert!(!entities.component_types().any(|key| key == TypeKey::of::<Y>()));
        assert_index_consistent(&entities);
    }

    #[test]
    fn test_remove_absent_is_lookup_error() {
        let mut entities = EntityManager::new();
        let err = entities.remove(EntityId::from_u128(5)).unwrap_err();
        assert!(err.is_lookup());
        assert!(entities.discard(EntityId::from_u128(5)).is_none());
    }

    #[test]
    fn test_insert_component_updates_index() {
        let mut entities = EntityManager::new();
        let id = entities.create((X(1),)).unwrap();
        entities.insert_component(id, Y(2)).unwrap();
        assert_eq!(entities.component::<Y>(id).unwrap(), &Y(2));
        assert_eq!(entities.query::<(X, Y)>().count(), 1);
        assert_index_consistent(&entities);
    }

    #[test]
    fn test_insert_duplicate_component_leaves_entity_unchanged() {
        let mut entities = EntityManager::new();
        let id = entities.create((X(1), Y(2))).unwrap();

        let err = entities.insert_component(id, X(100)).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(entities.component::<X>(id).unwrap(), &X(1));
        assert_eq!(entities[id].len(), 2);
        assert_index_consistent(&entities);
    }

    #[test]
    fn test_insert_component_on_unknown_entity() {
        let mut entities = EntityManager::new();
        let err = entities
            .insert_component(EntityId::from_u128(3), X(1))
            .unwrap_err();
        assert!(matches!(err, SpaceError::EntityNotFound(_)));
    }

    #[test]
    fn test_remove_component_updates_index() {
        let mut entities = EntityManager::new();
        let id = entities.create((X(1), Y(2))).unwrap();
        assert_eq!(entities.remove_component::<Y>(id).unwrap(), Y(2));
        assert_eq!(entities.query::<(X, Y)>().count(), 0);
        assert_eq!(entities.query::<(X,)>().count(), 1);

        let err = entities.remove_component::<Y>(id).unwrap_err();
        assert!(err.is_lookup());
        assert_index_consistent(&entities);
    }

    #[test]
    fn test_replace_component() {
        let mut entities = EntityManager::new();
        let id = entities.create((X(1),)).unwrap();
        assert_eq!(entities.replace_component(id, X(2)).unwrap(), Some(X(1)));
        assert_eq!(entities.replace_component(id, Y(5)).unwrap(), None);
        assert_eq!(entities.component::<X>(id).unwrap(), &X(2));
        assert_eq!(entities.ids_with::<Y>().collect::<Vec<_>>(), vec![id]);
        assert_index_consistent(&entities);
    }

    #[test]
    fn test_component_mut_edits_value() {
        let mut entities = EntityManager::new();
        let id = entities.create((X(1),)).unwrap();
        entities.component_mut::<X>(id).unwrap().0 = 42;
        assert_eq!(entities[id].get::<X>(), Some(&X(42)));
        assert!(entities.component_mut::<Y>(id).unwrap_err().is_lookup());
    }

    #[test]
    fn test_components_of_one_type() {
        let mut entities = EntityManager::new();
        let a = entities.create((X(1),)).unwrap();
        let b = entities.create((X(2), Y(0))).unwrap();
        entities.create((Y(3),)).unwrap();

        let found: HashSet<(EntityId, i32)> = entities
            .components::<X>()
            .map(|(id, x)| (id, x.0))
            .collect();
        assert_eq!(found, HashSet::from([(a, 1), (b, 2)]));
    }

    #[test]
    fn test_clear_returns_entities_in_add_order() {
        let mut entities = EntityManager::new();
        let ids: Vec<EntityId> = (0..16)
            .map(|i| entities.create((X(i),)).unwrap())
            .collect();
        entities.remove(ids[3]).unwrap();
        let late = entities.create((Y(1),)).unwrap();

        let removed: Vec<EntityId> = entities.clear().iter().map(Entity::id).collect();
        let mut expected = ids.clone();
        expected.remove(3);
        expected.push(late);
        assert_eq!(removed, expected);
        assert!(entities.is_empty());
        assert_eq!(entities.component_types().count(), 0);
    }

    #[test]
    fn test_index_consistency_over_mixed_operations() {
        let mut entities = EntityManager::new();
        let mut ids = Vec::new();
        for i in 0..12 {
            let id = match i % 3 {
                0 => entities.create((X(i),)).unwrap(),
                1 => entities.create((X(i), Y(i))).unwrap(),
                _ => entities.create((Y(i), Z(i))).unwrap(),
            };
            ids.push(id);
        }
        for (i, id) in ids.iter().enumerate() {
            match i % 4 {
                0 => {
                    entities.remove(*id).unwrap();
                }
                1 => {
                    let _ = entities.insert_component(*id, Z(0));
                }
                2 => {
                    let _ = entities.remove_component::<X>(*id);
                }
                _ => {
                    entities.replace_component(*id, Y(-1)).unwrap();
                }
            }
            assert_index_consistent(&entities);
        }

        for entity in entities.iter() {
            let in_query = entities
                .query::<(Y,)>()
                .ids()
                .any(|id| id == entity.id());
            assert_eq!(in_query, entity.contains::<Y>());
        }
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn test_index_panics_on_unknown_id() {
        let entities = EntityManager::new();
        let _ = &entities[EntityId::from_u128(77)];
    }
}

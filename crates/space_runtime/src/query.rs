//! Lazy multi-type queries over an [`EntityManager`].
//!
//! Matching is an intersection of the per-type indexes. The smallest index
//! drives the iteration and every candidate is checked against the remaining
//! indexes, smallest first, so the cost follows the rarest requested type.
//! Each call to [`Query::zip`] (or any other iterator constructor) recomputes
//! the intersection, so the view reflects edits made since the last pass.

use std::collections::HashSet;
use std::collections::hash_set;
use std::marker::PhantomData;

use space_component::{ComponentSet, EntityId, TypeKey};

use crate::entity_manager::EntityManager;
use crate::error::SpaceError;

/// Ids of the entities present in every one of a list of index sets.
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    driver: Option<hash_set::Iter<'a, EntityId>>,
    rest: Vec<&'a HashSet<EntityId>>,
}

impl<'a> Matches<'a> {
    pub(crate) fn new(mut sets: Vec<&'a HashSet<EntityId>>) -> Self {
        sets.sort_by_key(|set| set.len());
        let mut sets = sets.into_iter();
        let driver = sets.next().map(|set| set.iter());
        Self {
            driver,
            rest: sets.collect(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            driver: None,
            rest: Vec::new(),
        }
    }
}

impl Iterator for Matches<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        let driver = self.driver.as_mut()?;
        driver
            .find(|id| self.rest.iter().all(|set| set.contains(*id)))
            .copied()
    }
}

/// A re-iterable view over the entities that own every type in `Q`.
pub struct Query<'a, Q: ComponentSet> {
    manager: &'a EntityManager,
    keys: Vec<TypeKey>,
    _marker: PhantomData<fn() -> Q>,
}

impl<'a, Q: ComponentSet> Query<'a, Q> {
    pub(crate) fn new(manager: &'a EntityManager) -> Self {
        Self {
            manager,
            keys: Q::type_keys(),
            _marker: PhantomData,
        }
    }

    /// The requested component types, in order.
    #[must_use]
    pub fn types(&self) -> &[TypeKey] {
        &self.keys
    }

    /// Iterates over component tuples, one per matching entity, in the order
    /// the types were requested.
    #[must_use]
    pub fn zip(&self) -> Zip<'a, Q> {
        Zip {
            manager: self.manager,
            matches: self.manager.matches(&self.keys),
            _marker: PhantomData,
        }
    }

    /// Like [`Query::zip`], with the entity id first.
    #[must_use]
    pub fn zip_entity(&self) -> ZipEntity<'a, Q> {
        ZipEntity { inner: self.zip() }
    }

    /// Iterates over the ids of matching entities.
    #[must_use]
    pub fn ids(&self) -> Matches<'a> {
        self.manager.matches(&self.keys)
    }

    /// Counts the matching entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.ids().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids().next().is_none()
    }
}

impl<'a, Q: ComponentSet> IntoIterator for &Query<'a, Q> {
    type Item = Q::Refs<'a>;
    type IntoIter = Zip<'a, Q>;

    fn into_iter(self) -> Zip<'a, Q> {
        self.zip()
    }
}

/// Iterator returned by [`Query::zip`].
pub struct Zip<'a, Q: ComponentSet> {
    manager: &'a EntityManager,
    matches: Matches<'a>,
    _marker: PhantomData<fn() -> Q>,
}

impl<'a, Q: ComponentSet> Zip<'a, Q> {
    fn next_entry(&mut self) -> Option<(EntityId, Q::Refs<'a>)> {
        let manager = self.manager;
        self.matches.by_ref().find_map(|id| {
            manager
                .get(id)
                .and_then(|entity| Q::fetch(entity))
                .map(|refs| (id, refs))
        })
    }
}

impl<'a, Q: ComponentSet> Iterator for Zip<'a, Q> {
    type Item = Q::Refs<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().map(|(_, refs)| refs)
    }
}

/// Iterator returned by [`Query::zip_entity`].
pub struct ZipEntity<'a, Q: ComponentSet> {
    inner: Zip<'a, Q>,
}

impl<'a, Q: ComponentSet> Iterator for ZipEntity<'a, Q> {
    type Item = (EntityId, Q::Refs<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_entry()
    }
}

/// Mutable access to the entities that own every type in `Q`.
///
/// The matching ids are captured when the view is created. Components are
/// then borrowed one entity at a time:
///
/// ```rust
/// use space_runtime::EntityManager;
///
/// struct Position(f32);
/// struct Velocity(f32);
///
/// let mut entities = EntityManager::new();
/// let id = entities.create((Position(0.0), Velocity(1.5))).unwrap();
///
/// let mut query = entities.query_mut::<(Position, Velocity)>().unwrap();
/// while let Some((_, (position, velocity))) = query.fetch_next() {
///     position.0 += velocity.0;
/// }
/// assert_eq!(entities.component::<Position>(id).unwrap().0, 1.5);
/// ```
pub struct QueryMut<'a, Q: ComponentSet> {
    manager: &'a mut EntityManager,
    ids: Vec<EntityId>,
    cursor: usize,
    _marker: PhantomData<fn() -> Q>,
}

impl<'a, Q: ComponentSet> QueryMut<'a, Q> {
    pub(crate) fn new(manager: &'a mut EntityManager) -> Result<Self, SpaceError> {
        Q::check_distinct()?;
        let ids = manager.matches(&Q::type_keys()).collect();
        Ok(Self {
            manager,
            ids,
            cursor: 0,
            _marker: PhantomData,
        })
    }

    /// The ids that matched when the view was created.
    #[must_use]
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Borrows the components of one entity, if it matches.
    pub fn get(&mut self, id: EntityId) -> Option<Q::RefsMut<'_>> {
        self.manager.entity_mut(id).and_then(|entity| Q::fetch_mut(entity))
    }

    /// Borrows the components of the next matching entity.
    pub fn fetch_next(&mut self) -> Option<(EntityId, Q::RefsMut<'_>)> {
        let id = *self.ids.get(self.cursor)?;
        self.cursor += 1;
        self.get(id).map(|refs| (id, refs))
    }

    /// Starts another pass over the captured ids.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct X(u32);
    #[derive(Debug, PartialEq)]
    struct Y(u32);
    #[derive(Debug, PartialEq)]
    struct Z(u32);

    fn abc() -> (EntityManager, EntityId, EntityId, EntityId) {
        let mut entities = EntityManager::new();
        let a = entities.create((X(1), Y(10))).unwrap();
        let b = entities.create((X(2),)).unwrap();
        let c = entities.create((X(3), Y(30), Z(300))).unwrap();
        (entities, a, b, c)
    }

    #[test]
    fn test_query_intersection() {
        let (entities, a, _b, c) = abc();
        let query = entities.query::<(X, Y)>();

        let found: HashSet<(u32, u32)> = query.zip().map(|(x, y)| (x.0, y.0)).collect();
        assert_eq!(found, HashSet::from([(1, 10), (3, 30)]));

        let ids: HashSet<EntityId> = query.ids().collect();
        assert_eq!(ids, HashSet::from([a, c]));
    }

    #[test]
    fn test_query_tuples_follow_requested_order() {
        let (entities, ..) = abc();
        let found: HashSet<(u32, u32)> = entities
            .query::<(Y, X)>()
            .zip()
            .map(|(y, x)| (y.0, x.0))
            .collect();
        assert_eq!(found, HashSet::from([(10, 1), (30, 3)]));
    }

    #[test]
    fn test_query_with_unindexed_type_is_empty() {
        struct Missing;
        let (entities, ..) = abc();
        let query = entities.query::<(X, Missing)>();
        assert!(query.is_empty());
        assert_eq!(query.zip().count(), 0);
    }

    #[test]
    fn test_zip_entity() {
        let (entities, _a, _b, c) = abc();
        let found: Vec<(EntityId, u32)> = entities
            .query::<(Z, X)>()
            .zip_entity()
            .map(|(id, (z, _x))| (id, z.0))
            .collect();
        assert_eq!(found, vec![(c, 300)]);
    }

    #[test]
    fn test_query_is_reiterable_and_stable() {
        let (entities, ..) = abc();
        let query = entities.query::<(X,)>();
        let first: Vec<EntityId> = query.ids().collect();
        let second: Vec<EntityId> = query.ids().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!((&query).into_iter().count(), 3);
    }

    #[test]
    fn test_query_reflects_later_edits() {
        let (mut entities, _a, b, _c) = abc();
        assert_eq!(entities.query::<(X, Y)>().count(), 2);
        entities.insert_component(b, Y(20)).unwrap();
        assert_eq!(entities.query::<(X, Y)>().count(), 3);
    }

    #[test]
    fn test_matches_drives_from_smallest_set() {
        let small: HashSet<EntityId> = HashSet::from([EntityId::from_u128(1)]);
        let large: HashSet<EntityId> = (0..100).map(EntityId::from_u128).collect();
        let matches = Matches::new(vec![&large, &small]);
        assert_eq!(matches.rest.len(), 1);
        assert_eq!(matches.rest[0].len(), 100);
        assert_eq!(matches.collect::<Vec<_>>(), vec![EntityId::from_u128(1)]);
    }

    #[test]
    fn test_query_mut_writes_through() {
        let (mut entities, a, b, c) = abc();
        {
            let mut query = entities.query_mut::<(X, Y)>().unwrap();
            assert_eq!(query.len(), 2);
            while let Some((_, (x, y))) = query.fetch_next() {
                x.0 += y.0;
            }
        }
        assert_eq!(entities.component::<X>(a).unwrap(), &X(11));
        assert_eq!(entities.component::<X>(b).unwrap(), &X(2));
        assert_eq!(entities.component::<X>(c).unwrap(), &X(33));
    }

    #[test]
    fn test_query_mut_rewind_and_get() {
        let (mut entities, a, b, _c) = abc();
        let mut query = entities.query_mut::<(Y,)>().unwrap();
        while query.fetch_next().is_some() {}
        assert!(query.fetch_next().is_none());
        query.rewind();
        assert!(query.fetch_next().is_some());

        if let Some((y,)) = query.get(a) {
            y.0 = 0;
        }
        assert!(query.get(b).is_none());
        drop(query);
        assert_eq!(entities.component::<Y>(a).unwrap(), &Y(0));
    }

    #[test]
    fn test_query_mut_rejects_repeated_type() {
        let (mut entities, ..) = abc();
        let err = entities.query_mut::<(X, Y, X)>().err().unwrap();
        assert!(err.is_duplicate());
    }
}

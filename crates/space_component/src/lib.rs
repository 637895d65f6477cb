//! # space_component
//!
//! The data half of the space runtime: what a component is, how an entity
//! owns its components, and how groups of components are named.
//!
//! This crate provides:
//!
//! - [`TypeKey`]: the runtime token that keys every type-indexed map.
//! - [`Component`]: the marker for values stored on entities.
//! - [`EntityId`] and [`Entity`]: identities and the detached component set.
//! - [`Bundle`]: tuples of component values inserted together.
//! - [`ComponentSet`]: tuples of component types fetched together by queries.
//! - [`TypeMap`]: one boxed value per type, in insertion order.
//! - [`ComponentError`]: failures when editing one entity.

pub mod bundle;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod type_map;

pub use bundle::Bundle;
pub use component::{Component, TypeKey};
pub use entity::{Entity, EntityId};
pub use error::ComponentError;
pub use query::ComponentSet;
pub use type_map::TypeMap;

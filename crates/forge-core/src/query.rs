//! Multi-component queries.
//!
//! A query is a tuple of component types; the result is every entity that
//! has all of them. Evaluation drives from the smallest participating store
//! and probes the others, so it is linear in the size of that store. Systems
//! are expected to query once per tick, not once per entity.

use crate::entity::Entity;
use crate::storage::{Component, ErasedStore};
use std::any::TypeId;

/// A tuple of component types usable with [`World::query`](crate::world::World::query).
pub trait Query {
    fn type_ids() -> Vec<TypeId>;
}

macro_rules! impl_query {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Query for ($($name,)+) {
            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),+]
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);

/// Entities present in every store, in the dense order of the smallest one.
pub(crate) fn intersect(stores: &[&dyn ErasedStore]) -> Vec<Entity> {
    let Some(driver) = stores.iter().min_by_key(|s| s.entity_list().len()) else {
        return Vec::new();
    };
    driver
        .entity_list()
        .iter()
        .copied()
        .filter(|&entity| stores.iter().all(|s| s.contains_entity(entity)))
        .collect()
}

//! Sparse-set component storage.
//!
//! One [`ComponentStore`] exists per component type. Components live packed
//! in a dense array next to a parallel array of their owning entities; a
//! sparse array maps an entity's index to its dense slot. Iteration walks the
//! dense arrays directly, and removal swaps the last slot into the hole so the
//! arrays stay packed. Removal therefore reorders iteration: after removing
//! the entity in slot `i`, the former last entity occupies slot `i`.

use crate::entity::Entity;
use std::any::Any;

const VACANT: u32 = u32::MAX;

/// Anything that can be attached to an entity.
///
/// Components are plain data; any `Send + Sync + 'static` type qualifies.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Packed storage for every component of type `T`.
#[derive(Debug, Clone)]
pub struct ComponentStore<T> {
    dense: Vec<T>,
    entities: Vec<Entity>,
    sparse: Vec<u32>,
    revision: u64,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentStore<T> {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            entities: Vec::new(),
            sparse: Vec::new(),
            revision: 0,
        }
    }

    fn slot_of(&self, entity: Entity) -> Option<usize> {
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == VACANT {
            return None;
        }
        let slot = slot as usize;
        (self.entities[slot] == entity).then_some(slot)
    }

    /// Insert or overwrite the component for `entity`. Returns the value it replaced.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, VACANT);
        }
        let slot = self.sparse[index];
        if slot != VACANT {
            let slot = slot as usize;
            let previous = std::mem::replace(&mut self.dense[slot], value);
            if self.entities[slot] == entity {
                return Some(previous);
            }
            // Leftover from an older generation of the same index.
            self.entities[slot] = entity;
            return None;
        }
        self.sparse[index] = self.dense.len() as u32;
        self.dense.push(value);
        self.entities.push(entity);
        None
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slot_of(entity).map(|slot| &self.dense[slot])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slot_of(entity).map(|slot| &mut self.dense[slot])
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.slot_of(entity).is_some()
    }

    /// Swap-and-pop removal. Absent entities are a defined miss.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.slot_of(entity)?;
        let value = self.dense.swap_remove(slot);
        self.entities.swap_remove(slot);
        if let Some(&moved) = self.entities.get(slot) {
            self.sparse[moved.index() as usize] = slot as u32;
        }
        self.sparse[entity.index() as usize] = VACANT;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Owning entities in dense order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Components in dense order, parallel to [`entities`](Self::entities).
    pub fn components(&self) -> &[T] {
        &self.dense
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.dense.iter_mut())
    }

    /// Visit every component in dense order with mutable access.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(Entity, &mut T)) {
        for (entity, value) in self.iter_mut() {
            f(entity, value);
        }
    }

    pub fn clear(&mut self) {
        self.dense.clear();
        self.entities.clear();
        self.sparse.clear();
    }

    /// World revision at which this store last changed shape.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Check the dense/sparse invariant. Linear; meant for tests and debugging.
    pub fn is_consistent(&self) -> bool {
        if self.dense.len() != self.entities.len() {
            return false;
        }
        let mapped = self.sparse.iter().filter(|&&slot| slot != VACANT).count();
        if mapped != self.entities.len() {
            return false;
        }
        self.entities.iter().enumerate().all(|(slot, entity)| {
            self.sparse.get(entity.index() as usize).copied() == Some(slot as u32)
        })
    }
}

// ---------------------------------------------------------------------------
// Type-erased access for the world's store registry
// ---------------------------------------------------------------------------

/// Object-safe view of a [`ComponentStore`] used by the world to operate on
/// stores without knowing their component type.
pub(crate) trait ErasedStore: Send + Sync {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn contains_entity(&self, entity: Entity) -> bool;
    fn entity_list(&self) -> &[Entity];
    fn clear_all(&mut self);
    fn revision(&self) -> u64;
    fn set_revision(&mut self, revision: u64);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn contains_entity(&self, entity: Entity) -> bool {
        self.contains(entity)
    }

    fn entity_list(&self) -> &[Entity] {
        self.entities()
    }

    fn clear_all(&mut self) {
        self.clear();
    }

    fn revision(&self) -> u64 {
        ComponentStore::revision(self)
    }

    fn set_revision(&mut self, revision: u64) {
        ComponentStore::set_revision(self, revision);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! The world: entity registry, one component store per type, and the
//! tile-keyed spatial index.
//!
//! All reads and writes go through the typed API. Operations on stale or
//! never-issued entities are silent misses; deferred despawn makes stale
//! handles routine, so none of them are errors.
//!
//! Every structural change to a store (add, overwrite, remove, despawn, a
//! move through `set_position`, an edit through `modify`) stamps that store
//! with a fresh world revision. Systems that derive state
//! from which entities carry which components (resource networks) compare
//! revisions to decide whether their derived state is out of date.

use crate::components::{Position, Sprite};
use crate::entity::{Entity, EntityRegistry};
use crate::fixed::Fixed64;
use crate::query::{self, Query};
use crate::spatial::{SpatialIndex, TilePos};
use crate::storage::{Component, ComponentStore, ErasedStore};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

#[derive(Default)]
pub struct World {
    entities: EntityRegistry,
    stores: HashMap<TypeId, Box<dyn ErasedStore>>,
    spatial: SpatialIndex,
    pending_despawn: Vec<Entity>,
    revision: u64,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("stores", &self.stores.len())
            .field("placed", &self.spatial.len())
            .field("pending_despawn", &self.pending_despawn.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Entities --

    pub fn spawn(&mut self) -> Entity {
        self.entities.create()
    }

    /// Remove `entity` from every store and the spatial index, then free its id.
    /// Returns `false` for stale handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.spatial.unplace(entity);
        let revision = self.bump();
        for store in self.stores.values_mut() {
            if store.remove_entity(entity) {
                store.set_revision(revision);
            }
        }
        self.entities.destroy(entity)
    }

    /// Queue `entity` for removal at the next [`process_pending`](Self::process_pending).
    pub fn despawn_deferred(&mut self, entity: Entity) {
        if self.entities.is_alive(entity) && !self.pending_despawn.contains(&entity) {
            self.pending_despawn.push(entity);
        }
    }

    /// Despawn everything queued by [`despawn_deferred`](Self::despawn_deferred).
    /// Returns how many entities were actually removed.
    pub fn process_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_despawn);
        pending.into_iter().filter(|&e| self.despawn(e)).count()
    }

    pub fn pending_despawns(&self) -> &[Entity] {
        &self.pending_despawn
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    /// Recreate a persisted entity with its original id.
    pub(crate) fn restore_entity(&mut self, entity: Entity) -> bool {
        self.entities.restore(entity)
    }

    /// Drop every entity and component. Handles issued before the clear stay dead.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.spatial.clear();
        self.pending_despawn.clear();
        let revision = self.bump();
        for store in self.stores.values_mut() {
            store.clear_all();
            store.set_revision(revision);
        }
    }

    // -- Components --

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Read-only view of the store for `T`, if any entity ever carried one.
    pub fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        self.stores
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref())
    }

    fn store_mut<T: Component>(&mut self) -> Option<&mut ComponentStore<T>> {
        self.stores
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut())
    }

    fn store_or_insert<T: Component>(&mut self) -> &mut ComponentStore<T> {
        self.stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStore::<T>::new()))
            .as_any_mut()
            .downcast_mut()
            .expect("component stores are keyed by their own TypeId")
    }

    /// Attach `component` to `entity`, replacing any existing `T`.
    ///
    /// Returns the replaced value. Adding to a dead entity is a no-op that
    /// drops the component. Adding a [`Position`] also places the entity in
    /// the spatial index.
    pub fn add<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        if !self.entities.is_alive(entity) {
            log::trace!("add {} to dead entity {entity}", std::any::type_name::<T>());
            return None;
        }
        if let Some(position) = (&component as &dyn Any).downcast_ref::<Position>() {
            self.spatial.place(entity, position.tile);
        }
        let revision = self.bump();
        let store = self.store_or_insert::<T>();
        store.set_revision(revision);
        store.insert(entity, component)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store::<T>()?.get(entity)
    }

    /// Mutable access for the duration of the borrow.
    ///
    /// Edits made here are not recorded in the store's revision. Editing a
    /// [`Position`] does not move the entity in the spatial index; use
    /// [`set_position`](Self::set_position) for that, and
    /// [`modify`](Self::modify) for other edits that change links.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.store_mut::<T>()?.get_mut(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.store::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Detach `T` from `entity`. Removing twice is the same as removing once.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = self.store_mut::<T>()?.remove(entity)?;
        if TypeId::of::<T>() == TypeId::of::<Position>() {
            self.spatial.unplace(entity);
        }
        self.stamp::<T>();
        Some(removed)
    }

    /// Edit `entity`'s `T` in place and record the edit as a change to the
    /// store, so systems watching `T` notice it. Use this instead of
    /// [`get_mut`](Self::get_mut) for edits that change what the component
    /// links to (pipe connections, for example).
    pub fn modify<T: Component, R>(&mut self, entity: Entity, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let result = f(self.store_mut::<T>()?.get_mut(entity)?);
        self.stamp::<T>();
        Some(result)
    }

    fn stamp<T: Component>(&mut self) {
        let revision = self.bump();
        if let Some(store) = self.store_mut::<T>() {
            store.set_revision(revision);
        }
    }

    /// Move `entity` to `tile`, keeping the spatial index in step.
    /// Returns `false` if the entity has no position.
    ///
    /// A move that changes the tile stamps the [`Position`] store, since
    /// moving can take an entity into or out of range of its neighbours.
    pub fn set_position(&mut self, entity: Entity, tile: TilePos) -> bool {
        let Some(position) = self.get_mut::<Position>(entity) else {
            return false;
        };
        if position.tile == tile {
            return true;
        }
        position.tile = tile;
        self.spatial.place(entity, tile);
        self.stamp::<Position>();
        true
    }

    /// Revision at which the store for `T` last changed shape. `0` if no store exists.
    pub fn revision_of<T: Component>(&self) -> u64 {
        self.revision_of_type(TypeId::of::<T>())
    }

    pub fn revision_of_type(&self, type_id: TypeId) -> u64 {
        self.stores.get(&type_id).map_or(0, |s| s.revision())
    }

    // -- Queries --

    /// Every entity carrying a `T`, in dense order.
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.store::<T>()
            .map(|s| s.entities().to_vec())
            .unwrap_or_default()
    }

    /// Every entity carrying all components of the tuple `Q`.
    ///
    /// Linear in the smallest participating store. Call once per tick, not
    /// once per entity.
    pub fn query<Q: Query>(&self) -> Vec<Entity> {
        let mut stores: Vec<&dyn ErasedStore> = Vec::new();
        for type_id in Q::type_ids() {
            match self.stores.get(&type_id) {
                Some(store) => stores.push(store.as_ref()),
                None => return Vec::new(),
            }
        }
        query::intersect(&stores)
    }

    pub fn for_each<T: Component>(&self, mut f: impl FnMut(Entity, &T)) {
        if let Some(store) = self.store::<T>() {
            for (entity, value) in store.iter() {
                f(entity, value);
            }
        }
    }

    pub fn for_each_mut<T: Component>(&mut self, f: impl FnMut(Entity, &mut T)) {
        if let Some(store) = self.store_mut::<T>() {
            store.for_each_mut(f);
        }
    }

    // -- Spatial --

    fn positioned_at(&self, entity: Entity, tile: TilePos) -> bool {
        self.get::<Position>(entity).is_some_and(|p| p.tile == tile)
    }

    /// The entity occupying `tile`.
    ///
    /// Tries the spatial index first. On a miss, scans every entity with a
    /// position and a sprite for one whose footprint covers the tile, which
    /// is how multi-tile buildings are found. That fallback is O(n).
    pub fn get_entity_at(&self, tile: TilePos) -> Option<Entity> {
        if let Some(&hit) = self
            .spatial
            .occupants(tile)
            .iter()
            .find(|&&e| self.positioned_at(e, tile))
        {
            return Some(hit);
        }
        self.query::<(Position, Sprite)>().into_iter().find(|&e| {
            match (self.get::<Position>(e), self.get::<Sprite>(e)) {
                (Some(position), Some(sprite)) => sprite.covers(position.tile, tile),
                _ => false,
            }
        })
    }

    /// Entities whose position lies within Euclidean `radius` tiles of `center`.
    ///
    /// Candidates come from the spatial index inside the `2 * radius` square
    /// around `center`; the exact distance check runs on those only.
    pub fn get_entities_near(&self, center: TilePos, radius: Fixed64) -> Vec<Entity> {
        if radius < Fixed64::ZERO {
            return Vec::new();
        }
        let r: i32 = radius.saturating_ceil().saturating_to_num();
        let min = TilePos::new(center.x.saturating_sub(r), center.y.saturating_sub(r));
        let max = TilePos::new(center.x.saturating_add(r), center.y.saturating_add(r));
        self.spatial
            .entities_in_rect(min, max)
            .into_iter()
            .filter(|&(tile, entity)| center.within(tile, radius) && self.positioned_at(entity, tile))
            .map(|(_, entity)| entity)
            .collect()
    }

    /// Number of entities registered in the spatial index.
    pub fn placed_count(&self) -> usize {
        self.spatial.len()
    }
}

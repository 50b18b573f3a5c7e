//! Entity identifiers and the registry that issues them.
//!
//! An [`Entity`] is an `(index, generation)` pair. Indices are recycled after
//! an entity is destroyed; the generation stored in the registry is bumped on
//! every destroy, so handles to the previous occupant compare unequal to the
//! new one and [`EntityRegistry::is_alive`] reports them dead.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Generational handle identifying one simulated object. Cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u16,
}

impl Entity {
    /// Build a handle from its raw parts. Mostly useful for persistence and tests;
    /// gameplay code receives entities from [`EntityRegistry::create`].
    pub const fn from_raw_parts(index: u32, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Slot index. Shared by every generation that has occupied the slot.
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u16,
    alive: bool,
}

/// Issues entity handles and tracks which of them are alive.
///
/// Freed indices are reused in FIFO order, which keeps a recently destroyed
/// index out of circulation for as long as possible and makes generation
/// wrap-around practically unobservable.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    alive: usize,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity, reusing the oldest freed index if any.
    pub fn create(&mut self) -> Entity {
        self.alive += 1;
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return Entity::from_raw_parts(index, slot.generation);
        }
        // u32 indices: four billion live slots is far beyond any world size.
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        Entity::from_raw_parts(index, 0)
    }

    /// Destroy `entity`. Returns `false` (and does nothing) for stale handles.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(entity.index);
        self.alive -= 1;
        true
    }

    /// `true` iff the registry's current generation for the index matches.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Recreate the exact `(index, generation)` pair of a persisted entity.
    ///
    /// Slots skipped over while growing are put on the free list. Returns
    /// `false` if the index is currently occupied.
    pub fn restore(&mut self, entity: Entity) -> bool {
        let index = entity.index as usize;
        while self.slots.len() <= index {
            let skipped = self.slots.len() as u32;
            self.slots.push(Slot::default());
            self.free.push_back(skipped);
        }
        if self.slots[index].alive {
            return false;
        }
        self.free.retain(|&i| i != entity.index);
        self.slots[index] = Slot {
            generation: entity.generation,
            alive: true,
        };
        self.alive += 1;
        true
    }

    /// Destroy every live entity. Generations keep counting so handles from
    /// before the clear stay dead.
    pub fn clear(&mut self) {
        let live: Vec<Entity> = self.iter_alive().collect();
        for entity in live {
            self.destroy(entity);
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Live entities in index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::from_raw_parts(index as u32, slot.generation))
    }
}

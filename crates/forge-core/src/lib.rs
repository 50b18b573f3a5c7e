//! Forge Core -- the entity/component data store for the Forge factory simulation.
//!
//! This crate owns everything the per-tick simulation reads and writes:
//! entity identifiers, sparse-set component storage, the [`world::World`]
//! that ties them together with a tile-keyed spatial index, the
//! priority-ordered [`scheduler::Scheduler`], world persistence, and the
//! staging queues that hand background work back to the tick thread.
//!
//! # Tick Model
//!
//! A tick is single-threaded. The scheduler runs every registered system in
//! ascending priority order; systems mutate the world only through its
//! typed API:
//!
//! ```rust,ignore
//! let mut world = World::new();
//! let pole = world.spawn();
//! world.add(pole, Position::at(4, 7));
//! world.add(pole, Sprite::new("small-pole", 1, 1));
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.register(CleanupSystem);
//! scheduler.update(&mut world, Fixed64::from_num(1) / 60);
//! ```
//!
//! # Key Types
//!
//! - [`entity::Entity`] -- generational `(index, generation)` handle.
//! - [`storage::ComponentStore`] -- packed sparse set for one component type.
//! - [`world::World`] -- type-keyed store registry, spatial index, queries.
//! - [`scheduler::System`] -- per-tick update unit with an integer priority.
//! - [`persist::PersistRegistry`] -- allow-list of persisted component types.
//! - [`staging::LoadQueue`] / [`staging::SaveQueue`] -- background I/O staging.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod components;
pub mod entity;
pub mod fixed;
pub mod persist;
pub mod query;
pub mod scheduler;
pub mod spatial;
pub mod staging;
pub mod storage;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

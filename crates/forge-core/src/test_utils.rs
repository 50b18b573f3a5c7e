//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`; downstream
//! crates enable the `test-utils` feature in their dev-dependencies.

use crate::components::{Position, Sprite};
use crate::entity::Entity;
use crate::fixed::Fixed64;
use crate::world::World;

// ===========================================================================
// Fixed-point helpers
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// One tick at 60 ticks per second.
pub fn tick_dt() -> Fixed64 {
    Fixed64::ONE / 60
}

/// Assert two fixed-point values differ by at most `epsilon`.
pub fn assert_fixed_eq(actual: Fixed64, expected: f64, epsilon: f64) {
    let diff = (actual.to_num::<f64>() - expected).abs();
    assert!(
        diff <= epsilon,
        "expected {expected} +/- {epsilon}, got {actual}"
    );
}

// ===========================================================================
// World builders
// ===========================================================================

/// Spawn an entity standing on `(x, y)`.
pub fn spawn_at(world: &mut World, x: i32, y: i32) -> Entity {
    let e = world.spawn();
    world.add(e, Position::at(x, y));
    e
}

/// Spawn a building with a `width` by `height` footprint anchored at `(x, y)`.
pub fn spawn_building(world: &mut World, texture: &str, x: i32, y: i32, width: u32, height: u32) -> Entity {
    let e = spawn_at(world, x, y);
    world.add(e, Sprite::new(texture, width, height));
    e
}

/// A world with `count` single-tile sprites laid out along a row.
pub fn row_world(count: i32) -> World {
    let mut world = World::new();
    for x in 0..count {
        spawn_building(&mut world, "crate", x, 0, 1, 1);
    }
    world
}

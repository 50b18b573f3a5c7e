//! Criterion benchmarks for the Forge world.
//!
//! - `store_iteration`: dense iteration over 10k components
//! - `query_intersection`: two-component query where one store is sparse
//! - `spatial_lookup`: radius and tile lookups over a 100x100 grid

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use forge_core::components::Position;
use forge_core::spatial::TilePos;
use forge_core::test_utils::*;
use forge_core::world::World;

#[derive(Debug, Clone, Copy)]
struct Heat(u32);

#[derive(Debug, Clone, Copy)]
struct Powered;

fn build_grid(side: i32) -> World {
    let mut world = World::new();
    for x in 0..side {
        for y in 0..side {
            let e = spawn_at(&mut world, x, y);
            world.add(e, Heat((x * side + y) as u32));
            if (x + y) % 10 == 0 {
                world.add(e, Powered);
            }
        }
    }
    world
}

fn store_iteration(c: &mut Criterion) {
    let mut world = build_grid(100);
    c.bench_function("store_iteration", |b| {
        b.iter(|| {
            world.for_each_mut::<Heat>(|_, h| h.0 = h.0.wrapping_add(1));
            black_box(&world);
        })
    });
}

fn query_intersection(c: &mut Criterion) {
    let world = build_grid(100);
    c.bench_function("query_intersection", |b| {
        b.iter(|| black_box(world.query::<(Heat, Powered, Position)>().len()))
    });
}

fn spatial_lookup(c: &mut Criterion) {
    let world = build_grid(100);
    let mut group = c.benchmark_group("spatial_lookup");
    group.bench_function("entity_at", |b| {
        b.iter(|| black_box(world.get_entity_at(TilePos::new(black_box(57), 33))))
    });
    group.bench_function("entities_near_r8", |b| {
        b.iter(|| black_box(world.get_entities_near(TilePos::new(50, 50), fixed(8.0)).len()))
    });
    group.finish();
}

criterion_group!(benches, store_iteration, query_intersection, spatial_lookup);
criterion_main!(benches);

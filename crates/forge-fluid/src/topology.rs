//! Fluid network layout: pipes linked by explicit connections.

use crate::components::{FluidConsumer, FluidProducer, FluidTank, Pipe};
use forge_core::components::Position;
use forge_core::entity::Entity;
use forge_core::world::World;
use forge_network::{Roles, Topology};
use std::any::TypeId;

#[derive(Debug, Clone, Copy, Default)]
pub struct FluidTopology;

impl Topology for FluidTopology {
    fn watched(&self) -> Vec<TypeId> {
        vec![
            TypeId::of::<Pipe>(),
            TypeId::of::<FluidProducer>(),
            TypeId::of::<FluidConsumer>(),
            TypeId::of::<FluidTank>(),
        ]
    }

    fn distributors(&self, world: &World) -> Vec<Entity> {
        world.entities_with::<Pipe>()
    }

    fn links(&self, world: &World, distributor: Entity) -> Vec<Entity> {
        world
            .get::<Pipe>(distributor)
            .map(|pipe| {
                pipe.connections
                    .iter()
                    .copied()
                    .filter(|&e| world.has::<Pipe>(e))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attachments(&self, world: &World, distributor: Entity) -> Vec<Entity> {
        world
            .get::<Pipe>(distributor)
            .map(|pipe| {
                pipe.connections
                    .iter()
                    .copied()
                    .filter(|&e| world.is_alive(e) && !world.has::<Pipe>(e))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn roles(&self, world: &World, entity: Entity) -> Roles {
        Roles {
            producer: world.has::<FluidProducer>(entity),
            consumer: world.has::<FluidConsumer>(entity),
            storage: world.has::<FluidTank>(entity),
        }
    }
}

fn is_fluid_entity(world: &World, entity: Entity) -> bool {
    world.has::<Pipe>(entity)
        || world.has::<FluidProducer>(entity)
        || world.has::<FluidConsumer>(entity)
        || world.has::<FluidTank>(entity)
}

/// Connect `pipe` to every fluid entity on the four tiles around it.
///
/// Pipe-to-pipe connections are recorded on both pipes. Returns the number
/// of new connections made from `pipe`.
pub fn connect_adjacent(world: &mut World, pipe: Entity) -> usize {
    let Some(tile) = world.get::<Position>(pipe).map(|p| p.tile) else {
        return 0;
    };
    if !world.has::<Pipe>(pipe) {
        return 0;
    }

    let mut made = 0;
    for neighbor_tile in tile.neighbors_4() {
        let Some(neighbor) = world.get_entity_at(neighbor_tile) else {
            continue;
        };
        if neighbor == pipe || !is_fluid_entity(world, neighbor) {
            continue;
        }
        if link(world, pipe, neighbor) {
            made += 1;
        }
        link(world, neighbor, pipe);
    }
    made
}

/// Connect `pipe` to `other`, both ways when `other` is a pipe as well.
///
/// Returns whether any connection was added. The fluid networks rebuild on
/// the next tick.
pub fn connect_pipes(world: &mut World, pipe: Entity, other: Entity) -> bool {
    if pipe == other || !world.is_alive(other) {
        return false;
    }
    let forward = link(world, pipe, other);
    let back = link(world, other, pipe);
    forward || back
}

/// Remove the connection between `pipe` and `other` in both directions.
/// Returns whether any connection was removed.
pub fn disconnect_pipes(world: &mut World, pipe: Entity, other: Entity) -> bool {
    let forward = unlink(world, pipe, other);
    let back = unlink(world, other, pipe);
    forward || back
}

// Edits go through `World::modify` so the watched `Pipe` store is stamped.
// A pipe whose connections would not change is not stamped.

fn link(world: &mut World, from: Entity, to: Entity) -> bool {
    if world.get::<Pipe>(from).is_none_or(|p| p.connections.contains(&to)) {
        return false;
    }
    world.modify::<Pipe, _>(from, |p| p.connect(to)).unwrap_or(false)
}

fn unlink(world: &mut World, from: Entity, to: Entity) -> bool {
    if !world.get::<Pipe>(from).is_some_and(|p| p.connections.contains(&to)) {
        return false;
    }
    world.modify::<Pipe, _>(from, |p| p.disconnect(to)).unwrap_or(false)
}

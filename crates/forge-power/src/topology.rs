//! Power network layout: poles wired by reach, members found by supply area.

use crate::components::{Accumulator, Generator, PowerConsumer, PowerPole};
use forge_core::components::Position;
use forge_core::entity::Entity;
use forge_core::world::World;
use forge_network::{Roles, Topology};
use std::any::TypeId;

#[derive(Debug, Clone, Copy, Default)]
pub struct PowerTopology;

impl PowerTopology {
    fn pole_at(world: &World, entity: Entity) -> Option<(&PowerPole, &Position)> {
        Some((world.get::<PowerPole>(entity)?, world.get::<Position>(entity)?))
    }
}

impl Topology for PowerTopology {
    /// Links depend on where poles and members stand, so moves count too.
    fn watched(&self) -> Vec<TypeId> {
        vec![
            TypeId::of::<Position>(),
            TypeId::of::<PowerPole>(),
            TypeId::of::<Generator>(),
            TypeId::of::<PowerConsumer>(),
            TypeId::of::<Accumulator>(),
        ]
    }

    fn distributors(&self, world: &World) -> Vec<Entity> {
        world.query::<(PowerPole, Position)>()
    }

    fn links(&self, world: &World, distributor: Entity) -> Vec<Entity> {
        let Some((pole, position)) = Self::pole_at(world, distributor) else {
            return Vec::new();
        };
        world
            .get_entities_near(position.tile, pole.wire_reach)
            .into_iter()
            .filter(|&other| other != distributor)
            .filter(|&other| match Self::pole_at(world, other) {
                Some((other_pole, other_pos)) => {
                    let reach = pole.wire_reach.min(other_pole.wire_reach);
                    position.tile.within(other_pos.tile, reach)
                }
                None => false,
            })
            .collect()
    }

    fn attachments(&self, world: &World, distributor: Entity) -> Vec<Entity> {
        let Some((pole, position)) = Self::pole_at(world, distributor) else {
            return Vec::new();
        };
        world
            .get_entities_near(position.tile, pole.supply_area)
            .into_iter()
            .filter(|&e| !world.has::<PowerPole>(e))
            .collect()
    }

    fn roles(&self, world: &World, entity: Entity) -> Roles {
        Roles {
            producer: world.has::<Generator>(entity),
            consumer: world.has::<PowerConsumer>(entity),
            storage: world.has::<Accumulator>(entity),
        }
    }
}

//! The fluid system: rebuilds pipe networks when their layout changes and
//! balances pumps, tanks, and consumers once per tick.

use crate::components::{FluidConsumer, FluidProducer, FluidTank, FluidType, Pipe};
use crate::topology::FluidTopology;
use forge_core::entity::Entity;
use forge_core::fixed::{Fixed64, Ticks, over};
use forge_core::scheduler::{System, priority};
use forge_core::world::World;
use forge_network::{Network, NetworkId, NetworkSet, StorageCell, Throttle, Topology, Transition, settle};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Tank fill band that switches pumps off and on.
    pub throttle: Throttle,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the fluid system on state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FluidEvent {
    /// A network can no longer meet its consumers' draw.
    PressureLow {
        network: NetworkId,
        pressure: Fixed64,
        tick: Ticks,
    },
    PressureRestored { network: NetworkId, tick: Ticks },
    TankFull {
        tank: Entity,
        network: NetworkId,
        tick: Ticks,
    },
    TankEmpty {
        tank: Entity,
        network: NetworkId,
        tick: Ticks,
    },
}

// ---------------------------------------------------------------------------
// FluidSystem
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FluidSystem {
    networks: NetworkSet,
    topology: FluidTopology,
    config: FluidConfig,
    /// Fluid each network carried on the last tick.
    fluids: BTreeMap<NetworkId, FluidType>,
    events: Vec<FluidEvent>,
    tick: Ticks,
}

impl Default for FluidSystem {
    fn default() -> Self {
        Self::new(FluidConfig::default())
    }
}

impl FluidSystem {
    pub fn new(config: FluidConfig) -> Self {
        let topology = FluidTopology;
        Self {
            networks: NetworkSet::new(topology.watched()),
            topology,
            config,
            fluids: BTreeMap::new(),
            events: Vec::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn networks(&self) -> &NetworkSet {
        &self.networks
    }

    /// Pressure of a network as of the last tick.
    pub fn pressure(&self, network: NetworkId) -> Option<Fixed64> {
        self.networks.network(network).map(|n| n.satisfaction)
    }

    /// The fluid a network carried on the last tick, if it carried any.
    pub fn fluid_of(&self, network: NetworkId) -> Option<FluidType> {
        self.fluids.get(&network).copied()
    }

    pub fn mark_dirty(&mut self) {
        self.networks.mark_dirty();
    }

    pub fn drain_events(&mut self) -> Vec<FluidEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn ticks(&self) -> Ticks {
        self.tick
    }

    fn stamp_membership(&self, world: &mut World) {
        let nets = &self.networks;
        world.for_each_mut::<Pipe>(|e, pipe| {
            pipe.network = nets.network_of(e);
            if pipe.network.is_none() {
                pipe.contents = Fixed64::ZERO;
            }
        });
        world.for_each_mut::<FluidTank>(|e, tank| tank.network = nets.network_of(e));
        world.for_each_mut::<FluidProducer>(|e, producer| {
            producer.network = nets.network_of(e);
            if producer.network.is_none() {
                producer.active = false;
            }
        });
        world.for_each_mut::<FluidConsumer>(|e, consumer| {
            consumer.network = nets.network_of(e);
            if consumer.network.is_none() {
                consumer.pressure = Fixed64::ZERO;
                consumer.received = Fixed64::ZERO;
            }
        });
    }

    /// The first producer decides a network's fluid; without producers the
    /// first tank holding something does.
    fn network_fluid(world: &World, network: &Network) -> Option<FluidType> {
        network
            .producers
            .iter()
            .find_map(|&e| world.get::<FluidProducer>(e).map(|p| p.fluid))
            .or_else(|| {
                network.storage.iter().find_map(|&e| {
                    world
                        .get::<FluidTank>(e)
                        .filter(|t| !t.is_empty())
                        .and_then(|t| t.fluid)
                })
            })
    }

    fn equilibrate(&mut self, world: &mut World, dt: Fixed64) {
        self.fluids.clear();
        for network in self.networks.iter_mut() {
            let fluid = Self::network_fluid(world, network);
            if let Some(fluid) = fluid {
                self.fluids.insert(network.id, fluid);
            }
            let carries = |f: FluidType| fluid == Some(f);
            // A dry network still owes its consumers, whatever they want.
            let serves = |f: FluidType| fluid.is_none_or(|n| n == f);

            let pumps: Vec<Entity> = network
                .producers
                .iter()
                .copied()
                .filter(|&e| world.get::<FluidProducer>(e).is_some_and(|p| carries(p.fluid)))
                .collect();
            let drains: Vec<Entity> = network
                .consumers
                .iter()
                .copied()
                .filter(|&e| world.get::<FluidConsumer>(e).is_some_and(|c| serves(c.fluid)))
                .collect();
            let tanks: Vec<Entity> = network
                .storage
                .iter()
                .copied()
                .filter(|&e| {
                    world
                        .get::<FluidTank>(e)
                        .is_some_and(|t| fluid.is_none_or(|f| t.accepts(f)))
                })
                .collect();

            let production = pumps
                .iter()
                .filter_map(|&e| world.get::<FluidProducer>(e))
                .fold(Fixed64::ZERO, |acc, p| acc.saturating_add(p.rate.max(Fixed64::ZERO)));
            let consumption = drains
                .iter()
                .filter_map(|&e| world.get::<FluidConsumer>(e))
                .fold(Fixed64::ZERO, |acc, c| acc.saturating_add(c.rate.max(Fixed64::ZERO)));
            let cells: Vec<StorageCell> = tanks
                .iter()
                .filter_map(|&e| world.get::<FluidTank>(e))
                .map(|t| StorageCell {
                    stored: t.amount,
                    capacity: t.capacity,
                    rate: t.flow_rate,
                })
                .collect();

            let settlement = settle(
                production,
                consumption,
                &cells,
                dt,
                network.producers_engaged,
                &self.config.throttle,
            );
            let balance = &settlement.balance;

            let mut capacity = Fixed64::ZERO;
            let mut stored = Fixed64::ZERO;
            for (&e, flow) in tanks.iter().zip(&balance.storage_flow) {
                let Some(tank) = world.get_mut::<FluidTank>(e) else {
                    continue;
                };
                let was_full = tank.is_full();
                let was_empty = tank.is_empty();
                let ceiling = tank.capacity.max(Fixed64::ZERO);
                tank.amount = tank.amount.saturating_add(*flow).clamp(Fixed64::ZERO, ceiling);
                tank.fluid = if tank.is_empty() { None } else { fluid.or(tank.fluid) };
                capacity = capacity.saturating_add(ceiling);
                stored = stored.saturating_add(tank.amount);

                if !was_full && tank.is_full() {
                    self.events.push(FluidEvent::TankFull {
                        tank: e,
                        network: network.id,
                        tick: self.tick,
                    });
                } else if !was_empty && tank.is_empty() {
                    self.events.push(FluidEvent::TankEmpty {
                        tank: e,
                        network: network.id,
                        tick: self.tick,
                    });
                }
            }

            for &e in &network.producers {
                if let Some(producer) = world.get_mut::<FluidProducer>(e) {
                    producer.active = settlement.engaged
                        && carries(producer.fluid)
                        && producer.rate > Fixed64::ZERO;
                }
            }

            let pressure = balance.satisfaction;
            for &e in &network.consumers {
                if let Some(consumer) = world.get_mut::<FluidConsumer>(e) {
                    if serves(consumer.fluid) {
                        consumer.pressure = pressure;
                        consumer.received = over(consumer.rate.saturating_mul(pressure), dt);
                    } else {
                        consumer.pressure = Fixed64::ZERO;
                        consumer.received = Fixed64::ZERO;
                    }
                }
            }

            network.apply(balance, capacity, stored);
            network.producers_engaged = settlement.engaged_next;

            // Pipes show tank fill when there are tanks, otherwise how well
            // pumps keep up with the draw.
            let shown = match network.fill() {
                Some(fill) => fill,
                None if balance.production > Fixed64::ZERO => pressure,
                None => Fixed64::ZERO,
            };
            for &e in &network.distributors {
                if let Some(pipe) = world.get_mut::<Pipe>(e) {
                    pipe.contents = pipe.capacity.max(Fixed64::ZERO).saturating_mul(shown);
                }
            }

            match network.record_shortage(balance.is_short()) {
                Some(Transition::Began) => {
                    log::info!("fluid pressure low on {}: {}", network.id, pressure);
                    self.events.push(FluidEvent::PressureLow {
                        network: network.id,
                        pressure,
                        tick: self.tick,
                    });
                }
                Some(Transition::Ended) => {
                    log::info!("fluid pressure restored on {}", network.id);
                    self.events.push(FluidEvent::PressureRestored {
                        network: network.id,
                        tick: self.tick,
                    });
                }
                None => {}
            }
        }
    }
}

impl System for FluidSystem {
    fn name(&self) -> &str {
        "fluid"
    }

    /// Fluids are balanced alongside power, after production has run.
    fn priority(&self) -> i32 {
        priority::POWER + 10
    }

    fn update(&mut self, world: &mut World, dt: Fixed64) {
        if self.networks.refresh(world, &self.topology) {
            self.stamp_membership(world);
        }
        self.equilibrate(world, dt);
        self.tick += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================
